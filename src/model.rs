// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model.rs - 检测模型
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

use std::{fmt, path::PathBuf};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

use crate::runtime::{BackendError, RuntimeError};

mod infer_cfg;
mod labels;
mod postprocess;
mod ppyoloe;
mod preprocess;
mod yolor;

pub use self::infer_cfg::{InferConfig, InferConfigError, PreprocessOp};
pub use self::labels::COCO_LABELS;
pub use self::postprocess::{iou, nms};
pub use self::ppyoloe::{PPYOLOE_TRT_SHAPES, Ppyoloe, PpyoloeBundle};
pub use self::preprocess::{Letterbox, letterbox, resize};
pub use self::yolor::{YOLOR_TRT_SHAPES, Yolor, YolorBundle};

/// 检测器：把解码后的图像变为检测结果
pub trait Detector {
  type Error;

  fn predict(&mut self, image: &RgbImage) -> Result<DetectionResult, Self::Error>;

  /// 类别名称，下标即类别编号
  fn labels(&self) -> Option<&[String]> {
    None
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("缺少模型文件: {0}")]
  MissingFile(PathBuf),
  #[error("模型路径无效: {0}")]
  InvalidPath(String),
  #[error("部署配置错误: {0}")]
  Config(#[from] InferConfigError),
  #[error("运行时错误: {0}")]
  Runtime(#[from] RuntimeError),
  #[error("后端错误: {0}")]
  Backend(#[from] BackendError),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  pub label_id: i32,
  pub score: f32,
  /// [x_min, y_min, x_max, y_max]，原图像素坐标
  pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
  pub items: Vec<DetectItem>,
}

impl DetectionResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 分数不低于阈值的检测项
  pub fn above(&self, score_threshold: f32) -> impl Iterator<Item = &DetectItem> {
    self
      .items
      .iter()
      .filter(move |item| item.score >= score_threshold)
  }
}

impl fmt::Display for DetectionResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "DetectionResult: [xmin, ymin, xmax, ymax, score, label_id]")?;
    for item in &self.items {
      let [x0, y0, x1, y1] = item.bbox;
      writeln!(
        f,
        "{:.6},{:.6}, {:.6}, {:.6}, {:.6}, {}",
        x0, y0, x1, y1, item.score, item.label_id
      )?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_lists_one_box_per_line() {
    let result = DetectionResult {
      items: vec![DetectItem {
        label_id: 2,
        score: 0.5,
        bbox: [1.0, 2.0, 3.5, 4.25],
      }],
    };

    assert_eq!(
      result.to_string(),
      "DetectionResult: [xmin, ymin, xmax, ymax, score, label_id]\n\
       1.000000,2.000000, 3.500000, 4.250000, 0.500000, 2\n"
    );
  }

  #[test]
  fn above_keeps_threshold_inclusive() {
    let item = |score| DetectItem {
      label_id: 0,
      score,
      bbox: [0.0; 4],
    };
    let result = DetectionResult {
      items: vec![item(0.2), item(0.5), item(0.9)],
    };
    assert_eq!(result.above(0.5).count(), 2);
    assert_eq!(result.above(0.0).count(), 3);
  }
}
