// 该文件是 Lanshan （岚山） 项目的一部分。
// src/device.rs - 推理设备
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

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// 推理设备
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Device {
  #[default]
  Cpu,
  /// GPU 及其设备编号
  Gpu(u32),
}

impl Device {
  /// 解析命令行中的设备字符串。
  ///
  /// 只有 `gpu`（不区分大小写）会选择 GPU，其余任何值都按 CPU 处理，
  /// 不是 `cpu` 的值会记录一条警告。
  pub fn from_flag(flag: &str, device_id: u32) -> Self {
    if flag.eq_ignore_ascii_case("gpu") {
      Device::Gpu(device_id)
    } else {
      if !flag.eq_ignore_ascii_case("cpu") {
        warn!("未知的推理设备 '{}'，将使用 CPU", flag);
      }
      Device::Cpu
    }
  }

  pub fn is_gpu(&self) -> bool {
    matches!(self, Device::Gpu(_))
  }

  pub fn kind(&self) -> DeviceKind {
    match self {
      Device::Cpu => DeviceKind::Cpu,
      Device::Gpu(_) => DeviceKind::Gpu,
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "CPU"),
      Device::Gpu(id) => write!(f, "GPU:{}", id),
    }
  }
}

/// 不带设备编号的设备类别，用于后端选择表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
  Cpu,
  Gpu,
}

impl fmt::Display for DeviceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DeviceKind::Cpu => write!(f, "CPU"),
      DeviceKind::Gpu => write!(f, "GPU"),
    }
  }
}
