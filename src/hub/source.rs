// 该文件是 Lanshan （岚山） 项目的一部分。
// src/hub/source.rs - 模型来源
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

use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
  hub::{HubError, ModelHub},
  runtime::ModelFormat,
};

/// 模型所在位置：本地路径或仓库中的名字
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
  Local(PathBuf),
  Hub(String),
}

impl ModelSource {
  /// 本地路径优先，其次仓库名，都没有时用默认仓库名
  pub fn resolve(local: Option<PathBuf>, hub: Option<String>, default_hub: &str) -> Self {
    match (local, hub) {
      (Some(path), hub) => {
        if let Some(name) = hub {
          warn!("已指定本地模型 {}，忽略仓库模型 {}", path.display(), name);
        }
        ModelSource::Local(path)
      }
      (None, Some(name)) => ModelSource::Hub(name),
      (None, None) => ModelSource::Hub(default_hub.to_string()),
    }
  }

  /// 取得本地路径，仓库模型需要下载
  ///
  /// `connect` 只在需要下载时调用，本地模型不会触碰仓库配置。
  pub fn materialize<H, F>(self, connect: F, format: ModelFormat) -> Result<PathBuf, HubError>
  where
    H: ModelHub,
    F: FnOnce() -> Result<H, HubError>,
  {
    match self {
      ModelSource::Local(path) => Ok(path),
      ModelSource::Hub(name) => {
        info!("从模型仓库获取 {}", name);
        connect()?.download_model(&name, format)
      }
    }
  }
}
