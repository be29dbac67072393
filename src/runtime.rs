// 该文件是 Lanshan （岚山） 项目的一部分。
// src/runtime.rs - 推理运行时
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

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::DeviceKind;

mod backend;
mod option;
pub mod select;

#[cfg(feature = "onnxruntime")]
mod ort_backend;
#[cfg(feature = "onnxruntime")]
pub use self::ort_backend::OrtBackendFactory;

pub use self::backend::{
  Backend, BackendError, BackendFactory, BackendRegistry, ModelFiles, Tensor, TensorInfo,
};
pub use self::option::{RuntimeOption, RuntimeOptionBuilder, TrtShape};

/// 推理后端类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
  PaddleInference,
  Ort,
  TensorRt,
  OpenVino,
  Lite,
}

impl BackendKind {
  pub const ALL: [BackendKind; 5] = [
    BackendKind::PaddleInference,
    BackendKind::Ort,
    BackendKind::TensorRt,
    BackendKind::OpenVino,
    BackendKind::Lite,
  ];
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BackendKind::PaddleInference => "Paddle Inference",
      BackendKind::Ort => "ONNX Runtime",
      BackendKind::TensorRt => "TensorRT",
      BackendKind::OpenVino => "OpenVINO",
      BackendKind::Lite => "Paddle Lite",
    };
    write!(f, "{}", name)
  }
}

/// 模型文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
  Paddle,
  Onnx,
}

impl ModelFormat {
  /// 模型仓库查询时使用的格式名
  pub fn as_str(&self) -> &'static str {
    match self {
      ModelFormat::Paddle => "paddle",
      ModelFormat::Onnx => "onnx",
    }
  }
}

impl fmt::Display for ModelFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// 模型在各设备上支持的后端
#[derive(Debug, Clone, Copy)]
pub struct SupportedBackends {
  pub cpu: &'static [BackendKind],
  pub gpu: &'static [BackendKind],
}

impl SupportedBackends {
  pub fn for_device(&self, device: DeviceKind) -> &'static [BackendKind] {
    match device {
      DeviceKind::Cpu => self.cpu,
      DeviceKind::Gpu => self.gpu,
    }
  }
}

#[derive(Error, Debug)]
pub enum RuntimeError {
  #[error("模型格式 {format} 在设备 {device} 上没有可用后端，候选后端: {candidates:?}")]
  NoBackend {
    format: ModelFormat,
    device: DeviceKind,
    candidates: Vec<BackendKind>,
  },
  #[error("后端 {backend} 不支持设备 {device}")]
  UnsupportedDevice {
    backend: BackendKind,
    device: DeviceKind,
  },
  #[error("后端 {backend} 不支持 {format} 格式的模型")]
  UnsupportedFormat {
    backend: BackendKind,
    format: ModelFormat,
  },
  #[error("该模型在设备 {device} 上不支持后端 {backend}")]
  UnsupportedByModel {
    backend: BackendKind,
    device: DeviceKind,
  },
  #[error("后端 {backend}（{format} 格式）未编译进来")]
  BackendUnavailable {
    backend: BackendKind,
    format: ModelFormat,
  },
  #[error("缺少输入张量: {0}")]
  MissingInput(String),
  #[error("后端错误: {0}")]
  Backend(#[from] BackendError),
}

/// 推理运行时，持有配置与已创建的后端
pub struct Runtime {
  option: RuntimeOption,
  kind: BackendKind,
  backend: Box<dyn Backend>,
}

impl Runtime {
  pub fn init(
    option: RuntimeOption,
    files: &ModelFiles,
    supported: &SupportedBackends,
    registry: &BackendRegistry,
  ) -> Result<Self, RuntimeError> {
    let device = option.device().kind();
    let kind = match option.backend() {
      Some(kind) => {
        select::validate_backend(kind, files.format, device, supported, registry)?;
        kind
      }
      None => select::auto_select_backend(files.format, device, supported, registry)?,
    };

    let factory = registry
      .find(kind, files.format)
      .ok_or(RuntimeError::BackendUnavailable {
        backend: kind,
        format: files.format,
      })?;

    info!(
      "使用 {} 在 {} 上加载模型: {}",
      kind,
      option.device(),
      files.model_file.display()
    );
    let backend = factory.create(kind, files, &option)?;

    for input in backend.inputs() {
      debug!("模型输入 {}: {:?}", input.name, input.shape);
      if kind == BackendKind::TensorRt
        && input.is_dynamic()
        && option.trt_input_shape(&input.name).is_none()
      {
        warn!("动态输入 {} 未设置 TensorRT 形状", input.name);
      }
    }
    for output in backend.outputs() {
      debug!("模型输出 {}: {:?}", output.name, output.shape);
    }

    Ok(Self {
      option,
      kind,
      backend,
    })
  }

  pub fn option(&self) -> &RuntimeOption {
    &self.option
  }

  pub fn backend_kind(&self) -> BackendKind {
    self.kind
  }

  pub fn input_infos(&self) -> &[TensorInfo] {
    self.backend.inputs()
  }

  pub fn output_infos(&self) -> &[TensorInfo] {
    self.backend.outputs()
  }

  /// 按模型声明的输入顺序整理张量后推理，多余的张量会被忽略
  pub fn infer(&mut self, mut inputs: Vec<Tensor>) -> Result<Vec<Tensor>, RuntimeError> {
    let mut ordered = Vec::with_capacity(self.backend.inputs().len());
    for info in self.backend.inputs() {
      let position = inputs
        .iter()
        .position(|t| t.name == info.name)
        .ok_or_else(|| RuntimeError::MissingInput(info.name.clone()))?;
      ordered.push(inputs.swap_remove(position));
    }
    for extra in &inputs {
      debug!("模型未使用输入张量: {}", extra.name);
    }

    Ok(self.backend.infer(&ordered)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::device::Device;

  const SUPPORTED: SupportedBackends = SupportedBackends {
    cpu: &[BackendKind::Ort],
    gpu: &[BackendKind::Ort, BackendKind::TensorRt],
  };

  struct Echo {
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
  }

  impl Backend for Echo {
    fn inputs(&self) -> &[TensorInfo] {
      &self.inputs
    }

    fn outputs(&self) -> &[TensorInfo] {
      &self.outputs
    }

    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BackendError> {
      Ok(inputs.to_vec())
    }
  }

  struct EchoFactory;

  impl BackendFactory for EchoFactory {
    fn name(&self) -> &'static str {
      "echo"
    }

    fn supports(&self, backend: BackendKind, format: ModelFormat) -> bool {
      format == ModelFormat::Onnx && matches!(backend, BackendKind::Ort | BackendKind::TensorRt)
    }

    fn create(
      &self,
      _backend: BackendKind,
      _files: &ModelFiles,
      _option: &RuntimeOption,
    ) -> Result<Box<dyn Backend>, BackendError> {
      Ok(Box::new(Echo {
        inputs: vec![TensorInfo::new("a", &[1]), TensorInfo::new("b", &[1])],
        outputs: vec![TensorInfo::new("a", &[1]), TensorInfo::new("b", &[1])],
      }))
    }
  }

  fn registry() -> BackendRegistry {
    BackendRegistry::empty().with(EchoFactory)
  }

  #[test]
  fn infer_orders_inputs_by_declaration() {
    let option = RuntimeOption::builder().build();
    let mut runtime =
      Runtime::init(option, &ModelFiles::onnx("m.onnx"), &SUPPORTED, &registry()).expect("init");
    assert_eq!(runtime.backend_kind(), BackendKind::Ort);

    let b = Tensor::new("b", vec![1], vec![2.0]).expect("b");
    let a = Tensor::new("a", vec![1], vec![1.0]).expect("a");
    let extra = Tensor::new("c", vec![1], vec![3.0]).expect("c");
    let outputs = runtime.infer(vec![b, extra, a]).expect("infer");
    assert_eq!(outputs[0].name, "a");
    assert_eq!(outputs[1].name, "b");
  }

  #[test]
  fn infer_reports_missing_input() {
    let option = RuntimeOption::builder().build();
    let mut runtime =
      Runtime::init(option, &ModelFiles::onnx("m.onnx"), &SUPPORTED, &registry()).expect("init");
    let a = Tensor::new("a", vec![1], vec![1.0]).expect("a");
    assert!(matches!(
      runtime.infer(vec![a]),
      Err(RuntimeError::MissingInput(name)) if name == "b"
    ));
  }

  #[test]
  fn trt_on_gpu_is_accepted() {
    let option = RuntimeOption::builder()
      .use_gpu(0)
      .use_trt_backend()
      .set_trt_input_shape("a", &[1])
      .build();
    let runtime =
      Runtime::init(option, &ModelFiles::onnx("m.onnx"), &SUPPORTED, &registry()).expect("init");
    assert_eq!(runtime.backend_kind(), BackendKind::TensorRt);
    assert_eq!(runtime.option().device(), Device::Gpu(0));
  }

  #[test]
  fn trt_on_cpu_is_rejected() {
    let option = RuntimeOption::builder().use_trt_backend().build();
    let err = Runtime::init(option, &ModelFiles::onnx("m.onnx"), &SUPPORTED, &registry())
      .err()
      .expect("cpu + trt must fail");
    assert!(matches!(err, RuntimeError::UnsupportedDevice { .. }));
  }
}
