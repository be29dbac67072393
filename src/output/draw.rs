// 该文件是 Lanshan （岚山） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{DetectItem, DetectionResult};

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const COLOR_MAP_SIZE: i32 = 1000;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/noto/NotoSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {0}: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(PathBuf),
}

/// 类别颜色，按类别编号的二进制位交错生成，共 1000 种
pub fn label_color(label_id: i32) -> Rgb<u8> {
  let mut lab = label_id.rem_euclid(COLOR_MAP_SIZE);
  let mut color = [0u8; 3];
  let mut j = 0;
  while lab != 0 {
    for (c, channel) in color.iter_mut().enumerate() {
      *channel |= (((lab >> c) & 1) as u8) << (7 - j);
    }
    j += 1;
    lab >>= 3;
  }
  Rgb(color)
}

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path).map_err(|e| DrawError::Io(path.to_path_buf(), e))?;
    let font =
      FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    debug!("加载字体: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  /// 查找系统字体，找不到时只画框
  pub fn with_system_font(self) -> Self {
    for candidate in SYSTEM_FONTS {
      let path = Path::new(candidate);
      if path.is_file()
        && let Ok(draw) = Draw::default().with_font_file(path)
      {
        return Self {
          font: draw.font,
          ..self
        };
      }
    }
    warn!("未找到可用字体，可视化结果中不绘制标签文字");
    self
  }

  /// 指定了字体文件时必须能加载，否则查找系统字体
  pub fn from_font_option(font: Option<&Path>) -> Result<Self, DrawError> {
    match font {
      Some(path) => Draw::default().with_font_file(path),
      None => Ok(Draw::default().with_system_font()),
    }
  }

  fn label_text(item: &DetectItem, labels: Option<&[String]>) -> String {
    let name = labels
      .and_then(|labels| usize::try_from(item.label_id).ok().and_then(|i| labels.get(i)))
      .cloned()
      .unwrap_or_else(|| item.label_id.to_string());
    format!("{} {:.2}", name, item.score)
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem, label: &str) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x_min = (item.bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (item.bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (item.bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (item.bbox[3].ceil() as i32).clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = label_color(item.label_id);
    for t in 0..self.thickness {
      let (bw, bh) = (x_max - x_min - 2 * t, y_max - y_min - 2 * t);
      if bw <= 0 || bh <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(bw as u32 + 1, bh as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, font, label);
    let tab_w = (text_w as i32 + 2 * LABEL_PADDING).min(w - x_min);
    let tab_h = text_h as i32 + 2 * LABEL_PADDING;
    // 框上方放不下时放在框内
    let tab_y = if y_min >= tab_h { y_min - tab_h } else { y_min };
    if tab_w <= 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(x_min, tab_y).of_size(tab_w as u32, tab_h as u32),
      color,
    );
    draw_text_mut(
      image,
      TEXT_COLOR,
      x_min + LABEL_PADDING,
      tab_y + LABEL_PADDING,
      scale,
      font,
      label,
    );
  }

  /// 在图像上绘制分数不低于阈值的检测框
  pub fn draw_detections(
    &self,
    image: &mut RgbImage,
    result: &DetectionResult,
    labels: Option<&[String]>,
    score_threshold: f32,
  ) -> usize {
    let mut drawn = 0;
    for item in result.above(score_threshold) {
      let label = Self::label_text(item, labels);
      self.draw_item(image, item, &label);
      drawn += 1;
    }
    debug!("绘制 {} 个检测框", drawn);
    drawn
  }
}
