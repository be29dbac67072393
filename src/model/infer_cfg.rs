// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/infer_cfg.rs - PaddleDetection 部署配置
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

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InferConfigError {
  #[error("无法读取配置文件 {0}: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("配置解析错误: {0}")]
  Parse(#[from] serde_yaml::Error),
  #[error("预处理中缺少 Resize")]
  MissingResize,
  #[error("{0} 的参数无效: {1}")]
  InvalidOp(&'static str, String),
}

/// `infer_cfg.yml` 中的预处理算子
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PreprocessOp {
  Resize {
    /// [h, w]
    target_size: [u32; 2],
    #[serde(default)]
    keep_ratio: bool,
    #[serde(default = "default_interp")]
    interp: u32,
  },
  NormalizeImage {
    mean: [f32; 3],
    std: [f32; 3],
    #[serde(default = "default_is_scale")]
    is_scale: bool,
  },
  Permute,
  PadStride {
    stride: u32,
  },
}

fn default_interp() -> u32 {
  1
}

fn default_is_scale() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferConfig {
  #[serde(default)]
  pub arch: Option<String>,
  #[serde(rename = "Preprocess")]
  pub preprocess: Vec<PreprocessOp>,
  #[serde(default)]
  pub label_list: Vec<String>,
}

impl InferConfig {
  pub fn from_file(path: &Path) -> Result<Self, InferConfigError> {
    let text =
      std::fs::read_to_string(path).map_err(|e| InferConfigError::Io(path.to_path_buf(), e))?;
    debug!("读取部署配置: {}", path.display());
    text.parse()
  }

  fn validate(&self) -> Result<(), InferConfigError> {
    let mut has_resize = false;
    for op in &self.preprocess {
      match op {
        PreprocessOp::Resize { target_size, .. } => {
          if target_size.contains(&0) {
            return Err(InferConfigError::InvalidOp(
              "Resize",
              format!("target_size {:?}", target_size),
            ));
          }
          has_resize = true;
        }
        PreprocessOp::NormalizeImage { std, .. } => {
          if std.contains(&0.0) {
            return Err(InferConfigError::InvalidOp(
              "NormalizeImage",
              format!("std {:?}", std),
            ));
          }
        }
        PreprocessOp::PadStride { stride } if *stride == 0 => {
          return Err(InferConfigError::InvalidOp("PadStride", "stride 0".into()));
        }
        _ => {}
      }
    }

    if !has_resize {
      return Err(InferConfigError::MissingResize);
    }
    Ok(())
  }
}

impl std::str::FromStr for InferConfig {
  type Err = InferConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let config: InferConfig = serde_yaml::from_str(s)?;
    config.validate()?;
    Ok(config)
  }
}
