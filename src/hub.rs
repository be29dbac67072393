// 该文件是 Lanshan （岚山） 项目的一部分。
// src/hub.rs - 模型仓库
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

use thiserror::Error;

use crate::runtime::ModelFormat;

mod archive;
mod client;
mod source;

pub use self::archive::{extract_tgz, sha256_file};
pub use self::client::{
  CACHE_ENV, DEFAULT_HUB_URL, HUB_URL_ENV, HubClient, MARKER_FILE, ModelMarker, TEST_IMAGE_URL,
  default_cache_dir,
};
pub use self::source::ModelSource;

#[derive(Error, Debug)]
pub enum HubError {
  #[error("网络错误: {0}")]
  Http(#[from] reqwest::Error),
  #[error("请求 {url} 失败，状态码 {status}")]
  Status { url: String, status: u16 },
  #[error("模型仓库中没有 {name}（{format} 格式）: {msg}")]
  NotFound {
    name: String,
    format: ModelFormat,
    msg: String,
  },
  #[error("{path} 校验失败，期望 sha256 {expected}，实际 {actual}")]
  Checksum {
    path: PathBuf,
    expected: String,
    actual: String,
  },
  #[error("压缩包错误: {0}")]
  Archive(String),
  #[error("URL 错误: {0}")]
  Url(#[from] url::ParseError),
  #[error("清单解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("无法确定缓存目录，请设置 --cache_dir 或 LANSHAN_HOME")]
  NoCacheDir,
}

/// 按名字取得本地模型目录的模型仓库
pub trait ModelHub {
  fn download_model(&self, name: &str, format: ModelFormat) -> Result<PathBuf, HubError>;
}

impl<H: ModelHub + ?Sized> ModelHub for &H {
  fn download_model(&self, name: &str, format: ModelFormat) -> Result<PathBuf, HubError> {
    (**self).download_model(name, format)
  }
}
