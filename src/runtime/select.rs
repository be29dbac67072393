// 该文件是 Lanshan （岚山） 项目的一部分。
// src/runtime/select.rs - 后端选择与校验
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

use tracing::{error, info};

use crate::{
  device::DeviceKind,
  runtime::{BackendKind, BackendRegistry, ModelFormat, RuntimeError, SupportedBackends},
};

use crate::runtime::BackendKind::{Lite, OpenVino, Ort, PaddleInference, TensorRt};

/// 各模型格式默认可用的后端，按优先级排列
pub fn default_backends_by_format(format: ModelFormat) -> &'static [BackendKind] {
  match format {
    ModelFormat::Paddle => &[PaddleInference, Lite, Ort, OpenVino, TensorRt],
    ModelFormat::Onnx => &[Ort, OpenVino, TensorRt],
  }
}

/// 各设备默认可用的后端
pub fn default_backends_by_device(device: DeviceKind) -> &'static [BackendKind] {
  match device {
    DeviceKind::Cpu => &[PaddleInference, Ort, OpenVino, Lite],
    DeviceKind::Gpu => &[PaddleInference, Ort, TensorRt],
  }
}

/// 候选后端：格式默认表与设备默认表的交集，再与模型支持的后端求交，保持格式表的顺序
pub fn candidate_backends(
  format: ModelFormat,
  device: DeviceKind,
  supported: &SupportedBackends,
) -> Vec<BackendKind> {
  let by_device = default_backends_by_device(device);
  let by_model = supported.for_device(device);
  default_backends_by_format(format)
    .iter()
    .copied()
    .filter(|b| by_device.contains(b) && by_model.contains(b))
    .collect()
}

/// 未指定后端时自动选择第一个已编译进来的候选后端
pub fn auto_select_backend(
  format: ModelFormat,
  device: DeviceKind,
  supported: &SupportedBackends,
  registry: &BackendRegistry,
) -> Result<BackendKind, RuntimeError> {
  let candidates = candidate_backends(format, device, supported);
  if candidates.is_empty() {
    error!("模型格式 {} 与设备 {} 没有可用的候选后端", format, device);
    return Err(RuntimeError::NoBackend {
      format,
      device,
      candidates,
    });
  }

  match candidates
    .iter()
    .copied()
    .find(|b| registry.is_available(*b, format))
  {
    Some(backend) => {
      info!("将使用 {} 后端推理该模型", backend);
      Ok(backend)
    }
    None => {
      error!(
        "模型格式 {} 与设备 {} 的候选后端为 {:?}，但均未编译进来",
        format, device, candidates
      );
      Err(RuntimeError::NoBackend {
        format,
        device,
        candidates,
      })
    }
  }
}

/// 校验显式指定的后端
pub fn validate_backend(
  backend: BackendKind,
  format: ModelFormat,
  device: DeviceKind,
  supported: &SupportedBackends,
  registry: &BackendRegistry,
) -> Result<(), RuntimeError> {
  if backend == TensorRt && device != DeviceKind::Gpu {
    return Err(RuntimeError::UnsupportedDevice { backend, device });
  }
  if backend == PaddleInference && format != ModelFormat::Paddle {
    return Err(RuntimeError::UnsupportedFormat { backend, format });
  }
  if !supported.for_device(device).contains(&backend) {
    return Err(RuntimeError::UnsupportedByModel { backend, device });
  }
  if !registry.is_available(backend, format) {
    return Err(RuntimeError::BackendUnavailable { backend, format });
  }
  Ok(())
}
