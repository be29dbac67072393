// 该文件是 Lanshan （岚山） 项目的一部分。
// src/hub/archive.rs - 模型压缩包
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
  io::{BufReader, Read},
  path::Path,
};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::hub::HubError;

/// 文件内容的 sha256，小写十六进制
pub fn sha256_file(path: &Path) -> Result<String, HubError> {
  let mut reader = BufReader::new(File::open(path)?);
  let mut hasher = Sha256::new();
  let mut buf = [0u8; 64 * 1024];
  loop {
    let n = reader.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}

/// 解压 `.tgz` 到 `dest`，条目路径越出 `dest` 时报错
pub fn extract_tgz(archive: &Path, dest: &Path) -> Result<(), HubError> {
  std::fs::create_dir_all(dest)?;
  let decoder = GzDecoder::new(BufReader::new(File::open(archive)?));
  let mut tar = tar::Archive::new(decoder);

  let entries = tar
    .entries()
    .map_err(|e| HubError::Archive(format!("{}: {}", archive.display(), e)))?;
  for entry in entries {
    let mut entry = entry.map_err(|e| HubError::Archive(e.to_string()))?;
    let path = entry.path()?.into_owned();
    // unpack_in 拒绝含 `..` 或绝对路径的条目
    let unpacked = entry
      .unpack_in(dest)
      .map_err(|e| HubError::Archive(format!("{}: {}", path.display(), e)))?;
    if !unpacked {
      return Err(HubError::Archive(format!(
        "条目路径越出解压目录: {}",
        path.display()
      )));
    }
    debug!("解压 {}", path.display());
  }
  Ok(())
}
