// 该文件是 Lanshan （岚山） 项目的一部分。
// src/hub/client.rs - 模型仓库客户端
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

use std::{
  fs::File,
  io::BufWriter,
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  hub::{HubError, ModelHub, extract_tgz, sha256_file},
  runtime::ModelFormat,
};

pub const DEFAULT_HUB_URL: &str = "http://paddlepaddle.org.cn/paddlehub";
pub const HUB_URL_ENV: &str = "LANSHAN_HUB_URL";
pub const CACHE_ENV: &str = "LANSHAN_HOME";
/// 已下载模型目录中的标记文件
pub const MARKER_FILE: &str = ".lanshan-model.json";
/// 未指定 `--image` 时使用的测试图片
pub const TEST_IMAGE_URL: &str =
  "https://gitee.com/paddlepaddle/PaddleDetection/raw/release/2.4/demo/000000014439.jpg";

const MODELS_DIR: &str = "models";
const STAGING_DIR: &str = "tmp";
const IMAGES_DIR: &str = "images";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// `~/.lanshan`，`LANSHAN_HOME` 由命令行参数层处理
pub fn default_cache_dir() -> Option<PathBuf> {
  dirs::home_dir().map(|home| home.join(".lanshan"))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
  status: i32,
  #[serde(default)]
  msg: String,
  #[serde(default)]
  data: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
  name: String,
  url: String,
  #[serde(default)]
  sha256: Option<String>,
  #[serde(default)]
  version: Option<String>,
}

/// 写在模型目录中的下载记录，存在即视为缓存命中
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMarker {
  pub name: String,
  pub url: String,
  pub version: Option<String>,
  /// RFC 3339
  pub downloaded_at: String,
}

pub struct HubClient {
  base_url: Url,
  cache_dir: PathBuf,
  http: reqwest::blocking::Client,
}

impl HubClient {
  pub fn new(base_url: &str, cache_dir: impl Into<PathBuf>) -> Result<Self, HubError> {
    let http = Self::http_builder().build()?;
    Self::with_http(base_url, cache_dir, http)
  }

  fn http_builder() -> reqwest::blocking::ClientBuilder {
    reqwest::blocking::Client::builder()
      .timeout(DOWNLOAD_TIMEOUT)
      .user_agent(concat!("lanshan/", env!("CARGO_PKG_VERSION")))
  }

  fn with_http(
    base_url: &str,
    cache_dir: impl Into<PathBuf>,
    http: reqwest::blocking::Client,
  ) -> Result<Self, HubError> {
    // 保证 join 时保留最后一段路径
    let base = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };

    Ok(Self {
      base_url: Url::parse(&base)?,
      cache_dir: cache_dir.into(),
      http,
    })
  }

  /// 由命令行给出的地址与缓存目录构造，未给出时使用默认值
  ///
  /// 环境变量已由 [`crate::args::HubArgs`] 读入，这里不再重复读取。
  pub fn from_options(hub_url: Option<&str>, cache_dir: Option<&Path>) -> Result<Self, HubError> {
    let base_url = hub_url.unwrap_or(DEFAULT_HUB_URL);
    let cache_dir = cache_dir
      .map(Path::to_path_buf)
      .or_else(default_cache_dir)
      .ok_or(HubError::NoCacheDir)?;
    debug!("模型仓库 {}，缓存目录 {}", base_url, cache_dir.display());

    Self::new(base_url, cache_dir)
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// 模型在缓存中的目录
  pub fn model_dir(&self, name: &str) -> PathBuf {
    self.cache_dir.join(MODELS_DIR).join(name)
  }

  /// 读取已缓存模型的标记，没有缓存时为 `None`
  pub fn cached_marker(&self, name: &str) -> Option<ModelMarker> {
    let marker = self.model_dir(name).join(MARKER_FILE);
    let text = std::fs::read_to_string(marker).ok()?;
    match serde_json::from_str(&text) {
      Ok(marker) => Some(marker),
      Err(e) => {
        warn!("模型 {} 的缓存标记损坏，将重新下载: {}", name, e);
        None
      }
    }
  }

  pub fn search_url(&self, name: &str, format: ModelFormat) -> Result<Url, HubError> {
    let mut url = self.base_url.join("search")?;
    url.set_query(Some(&format!(
      "name={}&format={}",
      urlencoding::encode(name),
      format.as_str()
    )));
    Ok(url)
  }

  fn search(&self, name: &str, format: ModelFormat) -> Result<ManifestEntry, HubError> {
    let url = self.search_url(name, format)?;
    info!("查询模型仓库: {}", url);
    let response = self.http.get(url.clone()).send()?;
    if !response.status().is_success() {
      return Err(HubError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let body: SearchResponse = serde_json::from_str(&response.text()?)?;
    if body.status != 0 {
      return Err(HubError::NotFound {
        name: name.to_string(),
        format,
        msg: body.msg,
      });
    }
    body
      .data
      .into_iter()
      .find(|entry| entry.name == name)
      .ok_or_else(|| HubError::NotFound {
        name: name.to_string(),
        format,
        msg: "清单为空".to_string(),
      })
  }

  /// 下载单个文件到 `dest`，先写临时文件再改名
  pub fn fetch_file(&self, url: &str, dest: &Path) -> Result<PathBuf, HubError> {
    let url = Url::parse(url)?;
    if let Some(parent) = dest.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    info!("下载 {} 到 {}", url, dest.display());
    let mut response = self.http.get(url.clone()).send()?;
    if !response.status().is_success() {
      return Err(HubError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let partial = dest.with_extension("partial");
    let result = (|| -> Result<(), HubError> {
      let mut writer = BufWriter::new(File::create(&partial)?);
      let written = response.copy_to(&mut writer)?;
      debug!("已下载 {} 字节", written);
      writer.into_inner().map_err(|e| e.into_error())?;
      std::fs::rename(&partial, dest)?;
      Ok(())
    })();
    if result.is_err() {
      let _ = std::fs::remove_file(&partial);
    }
    result.map(|_| dest.to_path_buf())
  }

  /// 检测测试图片，已缓存时直接使用
  pub fn detection_test_image(&self) -> Result<PathBuf, HubError> {
    let name = TEST_IMAGE_URL.rsplit('/').next().unwrap_or("test.jpg");
    let dest = self.cache_dir.join(IMAGES_DIR).join(name);
    if dest.is_file() {
      debug!("使用已缓存的测试图片 {}", dest.display());
      return Ok(dest);
    }
    self.fetch_file(TEST_IMAGE_URL, &dest)
  }

  fn install(&self, entry: &ManifestEntry, archive: &Path) -> Result<PathBuf, HubError> {
    if let Some(expected) = &entry.sha256 {
      let actual = sha256_file(archive)?;
      if !actual.eq_ignore_ascii_case(expected) {
        return Err(HubError::Checksum {
          path: archive.to_path_buf(),
          expected: expected.clone(),
          actual,
        });
      }
      info!("{} 校验通过", entry.name);
    } else {
      warn!("清单未提供 {} 的 sha256，跳过校验", entry.name);
    }

    let staging = self
      .cache_dir
      .join(STAGING_DIR)
      .join(format!("{}-{}", entry.name, std::process::id()));
    if staging.exists() {
      std::fs::remove_dir_all(&staging)?;
    }
    extract_tgz(archive, &staging)?;

    // 压缩包只有一个顶层目录时取该目录，否则取整个解压目录
    let top: Vec<PathBuf> = std::fs::read_dir(&staging)?
      .filter_map(|e| e.ok().map(|e| e.path()))
      .collect();
    let root = match top.as_slice() {
      [single] if single.is_dir() => single.clone(),
      _ => staging.clone(),
    };

    let target = self.model_dir(&entry.name);
    if target.exists() {
      std::fs::remove_dir_all(&target)?;
    }
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&root, &target)?;
    if staging.exists() {
      std::fs::remove_dir_all(&staging)?;
    }

    let marker = ModelMarker {
      name: entry.name.clone(),
      url: entry.url.clone(),
      version: entry.version.clone(),
      downloaded_at: chrono::Utc::now().to_rfc3339(),
    };
    std::fs::write(
      target.join(MARKER_FILE),
      serde_json::to_string_pretty(&marker)?,
    )?;

    Ok(target)
  }
}

impl ModelHub for HubClient {
  fn download_model(&self, name: &str, format: ModelFormat) -> Result<PathBuf, HubError> {
    if let Some(marker) = self.cached_marker(name) {
      info!(
        "使用已缓存的模型 {}（下载于 {}）",
        marker.name, marker.downloaded_at
      );
      return Ok(self.model_dir(name));
    }

    let entry = self.search(name, format)?;
    let archive = self
      .cache_dir
      .join(STAGING_DIR)
      .join(format!("{}.tgz", entry.name));
    self.fetch_file(&entry.url, &archive)?;

    let installed = self.install(&entry, &archive);
    let _ = std::fs::remove_file(&archive);
    let dir = installed?;
    info!("模型 {} 已保存到 {}", name, dir.display());
    Ok(dir)
  }
}
