// 该文件是 Lanshan （岚山） 项目的一部分。
// src/runtime/option.rs - 运行时配置
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

use std::{collections::BTreeMap, fmt, path::PathBuf};

use crate::{device::Device, runtime::BackendKind};

/// TensorRT 输入形状范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrtShape {
  pub min: Vec<i64>,
  pub opt: Vec<i64>,
  pub max: Vec<i64>,
}

impl TrtShape {
  /// 固定形状，`opt` 与 `max` 都等于 `min`
  pub fn fixed(shape: &[i64]) -> Self {
    Self {
      min: shape.to_vec(),
      opt: shape.to_vec(),
      max: shape.to_vec(),
    }
  }

  pub fn is_fixed(&self) -> bool {
    self.min == self.opt && self.opt == self.max
  }

  /// `1x3x640x640` 形式的维度字符串
  pub fn dims_string(dims: &[i64]) -> String {
    dims
      .iter()
      .map(|d| d.to_string())
      .collect::<Vec<_>>()
      .join("x")
  }
}

impl fmt::Display for TrtShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_fixed() {
      write!(f, "{}", Self::dims_string(&self.min))
    } else {
      write!(
        f,
        "{} / {} / {}",
        Self::dims_string(&self.min),
        Self::dims_string(&self.opt),
        Self::dims_string(&self.max)
      )
    }
  }
}

/// 运行时配置，由 [`RuntimeOptionBuilder`] 构建，构建后不可修改
#[derive(Debug, Clone, Default)]
pub struct RuntimeOption {
  device: Device,
  backend: Option<BackendKind>,
  cpu_threads: Option<usize>,
  trt_shapes: BTreeMap<String, TrtShape>,
  trt_fp16: bool,
  trt_cache_file: Option<PathBuf>,
}

impl RuntimeOption {
  pub fn builder() -> RuntimeOptionBuilder {
    RuntimeOptionBuilder::default()
  }

  pub fn device(&self) -> Device {
    self.device
  }

  /// 显式指定的后端，`None` 表示自动选择
  pub fn backend(&self) -> Option<BackendKind> {
    self.backend
  }

  pub fn cpu_threads(&self) -> Option<usize> {
    self.cpu_threads
  }

  pub fn trt_input_shapes(&self) -> &BTreeMap<String, TrtShape> {
    &self.trt_shapes
  }

  pub fn trt_input_shape(&self, name: &str) -> Option<&TrtShape> {
    self.trt_shapes.get(name)
  }

  pub fn trt_fp16(&self) -> bool {
    self.trt_fp16
  }

  pub fn trt_cache_file(&self) -> Option<&PathBuf> {
    self.trt_cache_file.as_ref()
  }
}

#[derive(Debug, Default)]
pub struct RuntimeOptionBuilder {
  option: RuntimeOption,
}

impl RuntimeOptionBuilder {
  pub fn use_cpu(mut self) -> Self {
    self.option.device = Device::Cpu;
    self
  }

  pub fn use_gpu(mut self, device_id: u32) -> Self {
    self.option.device = Device::Gpu(device_id);
    self
  }

  pub fn use_device(mut self, device: Device) -> Self {
    self.option.device = device;
    self
  }

  pub fn use_backend(mut self, backend: BackendKind) -> Self {
    self.option.backend = Some(backend);
    self
  }

  pub fn use_ort_backend(self) -> Self {
    self.use_backend(BackendKind::Ort)
  }

  pub fn use_trt_backend(self) -> Self {
    self.use_backend(BackendKind::TensorRt)
  }

  pub fn set_cpu_thread_num(mut self, threads: usize) -> Self {
    self.option.cpu_threads = Some(threads);
    self
  }

  /// 为输入张量设置固定形状
  pub fn set_trt_input_shape(mut self, name: &str, shape: &[i64]) -> Self {
    self
      .option
      .trt_shapes
      .insert(name.to_string(), TrtShape::fixed(shape));
    self
  }

  /// 为动态输入设置形状范围
  pub fn set_trt_input_shape_range(
    mut self,
    name: &str,
    min: &[i64],
    opt: &[i64],
    max: &[i64],
  ) -> Self {
    self.option.trt_shapes.insert(
      name.to_string(),
      TrtShape {
        min: min.to_vec(),
        opt: opt.to_vec(),
        max: max.to_vec(),
      },
    );
    self
  }

  pub fn enable_trt_fp16(mut self) -> Self {
    self.option.trt_fp16 = true;
    self
  }

  pub fn set_trt_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.option.trt_cache_file = Some(path.into());
    self
  }

  pub fn build(self) -> RuntimeOption {
    self.option
  }
}
