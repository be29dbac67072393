// 该文件是 Lanshan （岚山） 项目的一部分。
// src/output/save_image_file.rs - 保存可视化图像
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::{
  model::DetectionResult,
  output::{Render, draw::Draw},
};

/// 可视化结果的默认文件名，写在工作目录下
pub const VISUALIZED_RESULT: &str = "visualized_result.jpg";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
  score_threshold: f32,
  labels: Option<Vec<String>>,
}

impl Default for SaveImageFileOutput {
  fn default() -> Self {
    Self {
      path: PathBuf::from(VISUALIZED_RESULT),
      draw: Draw::default(),
      score_threshold: 0.0,
      labels: None,
    }
  }
}

impl SaveImageFileOutput {
  pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.path = path.into();
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }

  pub fn with_labels(mut self, labels: Option<&[String]>) -> Self {
    self.labels = labels.map(<[String]>::to_vec);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<RgbImage, DetectionResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &DetectionResult) -> Result<(), Self::Error> {
    let mut image = frame.clone();
    self.draw.draw_detections(
      &mut image,
      result,
      self.labels.as_deref(),
      self.score_threshold,
    );
    self.save_image(&image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::DetectItem, output::draw::label_color};
  use image::Rgb;

  #[test]
  fn default_path_is_working_directory_file() {
    assert_eq!(
      SaveImageFileOutput::default().path(),
      Path::new("visualized_result.jpg")
    );
  }

  #[test]
  fn renders_a_copy_and_overwrites_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("nested").join("out.png");
    std::fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    std::fs::write(&target, b"stale").expect("stale");

    let frame = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
    let result = DetectionResult {
      items: vec![DetectItem {
        label_id: 1,
        score: 0.9,
        bbox: [4.0, 4.0, 20.0, 20.0],
      }],
    };
    let output = SaveImageFileOutput::default()
      .with_path(&target)
      .with_score_threshold(0.5);
    output.render_result(&frame, &result).expect("render");

    // 原图不变
    assert_eq!(frame.get_pixel(4, 10), &Rgb([10, 10, 10]));
    let saved = image::open(&target).expect("open").to_rgb8();
    assert_eq!(saved.dimensions(), (32, 32));
    assert_eq!(saved.get_pixel(4, 10), &label_color(1));
  }
}
