// 该文件是 Lanshan （岚山） 项目的一部分。
// src/runtime/backend.rs - 推理后端接口
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
use tracing::debug;

use crate::runtime::{BackendKind, ModelFormat, RuntimeOption};

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("张量 {name} 形状 {shape:?} 与数据长度 {len} 不匹配")]
  ShapeMismatch {
    name: String,
    shape: Vec<i64>,
    len: usize,
  },
  #[error("后端 {0} 不支持 {1} 格式的模型")]
  UnsupportedFormat(BackendKind, ModelFormat),
  #[error("模型文件错误: {0}")]
  ModelFile(#[from] std::io::Error),
  #[error("推理引擎错误: {0}")]
  Engine(String),
}

/// 以名字标识的 `f32` 张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  pub name: String,
  pub shape: Vec<i64>,
  pub data: Vec<f32>,
}

impl Tensor {
  pub fn new(name: &str, shape: Vec<i64>, data: Vec<f32>) -> Result<Self, BackendError> {
    let expected = shape.iter().map(|d| (*d).max(0) as usize).product::<usize>();
    if shape.iter().any(|d| *d < 0) || expected != data.len() {
      return Err(BackendError::ShapeMismatch {
        name: name.to_string(),
        shape,
        len: data.len(),
      });
    }

    Ok(Self {
      name: name.to_string(),
      shape,
      data,
    })
  }

  pub fn numel(&self) -> usize {
    self.data.len()
  }
}

/// 后端声明的输入/输出信息，动态维度为 -1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
  pub name: String,
  pub shape: Vec<i64>,
}

impl TensorInfo {
  pub fn new(name: &str, shape: &[i64]) -> Self {
    Self {
      name: name.to_string(),
      shape: shape.to_vec(),
    }
  }

  pub fn is_dynamic(&self) -> bool {
    self.shape.iter().any(|d| *d < 0)
  }
}

/// 已解析的模型文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
  pub format: ModelFormat,
  pub model_file: PathBuf,
  /// Paddle 格式的权重文件，ONNX 格式为空
  pub params_file: Option<PathBuf>,
}

impl ModelFiles {
  pub fn onnx(model_file: impl Into<PathBuf>) -> Self {
    Self {
      format: ModelFormat::Onnx,
      model_file: model_file.into(),
      params_file: None,
    }
  }

  pub fn paddle(model_file: impl Into<PathBuf>, params_file: impl Into<PathBuf>) -> Self {
    Self {
      format: ModelFormat::Paddle,
      model_file: model_file.into(),
      params_file: Some(params_file.into()),
    }
  }
}

/// 推理后端
pub trait Backend {
  fn inputs(&self) -> &[TensorInfo];
  fn outputs(&self) -> &[TensorInfo];
  /// 输入按 [`Backend::inputs`] 的顺序给出，输出按 [`Backend::outputs`] 的顺序返回
  fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BackendError>;
}

/// 可以创建某类后端的工厂，代表一个已编译进来的推理引擎
pub trait BackendFactory {
  fn name(&self) -> &'static str;
  fn supports(&self, backend: BackendKind, format: ModelFormat) -> bool;
  fn create(
    &self,
    backend: BackendKind,
    files: &ModelFiles,
    option: &RuntimeOption,
  ) -> Result<Box<dyn Backend>, BackendError>;
}

/// 已编译进来的后端集合
#[derive(Default)]
pub struct BackendRegistry {
  factories: Vec<Box<dyn BackendFactory>>,
}

impl BackendRegistry {
  pub fn empty() -> Self {
    Self::default()
  }

  /// 按编译特性注册内置后端
  pub fn builtin() -> Self {
    #[allow(unused_mut)]
    let mut registry = Self::empty();
    #[cfg(feature = "onnxruntime")]
    registry.register(crate::runtime::OrtBackendFactory);
    registry
  }

  pub fn register<F: BackendFactory + 'static>(&mut self, factory: F) -> &mut Self {
    debug!("注册推理后端: {}", factory.name());
    self.factories.push(Box::new(factory));
    self
  }

  pub fn with<F: BackendFactory + 'static>(mut self, factory: F) -> Self {
    self.register(factory);
    self
  }

  pub fn find(&self, backend: BackendKind, format: ModelFormat) -> Option<&dyn BackendFactory> {
    self
      .factories
      .iter()
      .find(|f| f.supports(backend, format))
      .map(|f| f.as_ref())
  }

  pub fn is_available(&self, backend: BackendKind, format: ModelFormat) -> bool {
    self.find(backend, format).is_some()
  }

  /// 是否有工厂能运行该格式的模型，不论后端种类
  pub fn supports_format(&self, format: ModelFormat) -> bool {
    BackendKind::ALL
      .iter()
      .any(|&backend| self.is_available(backend, format))
  }
}
