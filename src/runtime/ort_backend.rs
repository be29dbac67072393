// 该文件是 Lanshan （岚山） 项目的一部分。
// src/runtime/ort_backend.rs - ONNX Runtime 后端
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

use ort::{
  execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
  },
  session::{Session, SessionInputValue, builder::GraphOptimizationLevel},
  value::{Tensor as OrtTensor, ValueType},
};
use tracing::{debug, info};

use crate::{
  device::Device,
  runtime::{
    Backend, BackendError, BackendFactory, BackendKind, ModelFiles, ModelFormat, RuntimeOption,
    Tensor, TensorInfo, TrtShape,
  },
};

fn engine_error(err: ort::Error) -> BackendError {
  BackendError::Engine(err.to_string())
}

/// 基于 `ort` 的后端工厂，支持 ONNX 格式的 ONNX Runtime 与 TensorRT 执行
pub struct OrtBackendFactory;

impl BackendFactory for OrtBackendFactory {
  fn name(&self) -> &'static str {
    "onnxruntime"
  }

  fn supports(&self, backend: BackendKind, format: ModelFormat) -> bool {
    format == ModelFormat::Onnx && matches!(backend, BackendKind::Ort | BackendKind::TensorRt)
  }

  fn create(
    &self,
    backend: BackendKind,
    files: &ModelFiles,
    option: &RuntimeOption,
  ) -> Result<Box<dyn Backend>, BackendError> {
    if !self.supports(backend, files.format) {
      return Err(BackendError::UnsupportedFormat(backend, files.format));
    }

    let mut builder = Session::builder()
      .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
      .map_err(engine_error)?;
    if let Some(threads) = option.cpu_threads() {
      builder = builder.with_intra_threads(threads).map_err(engine_error)?;
    }

    let session = builder
      .with_execution_providers(execution_providers(backend, option))
      .and_then(|b| b.commit_from_file(&files.model_file))
      .map_err(engine_error)?;
    info!("ONNX Runtime 会话创建完成");

    let inputs = session
      .inputs
      .iter()
      .map(|i| TensorInfo::new(&i.name, &dimensions(&i.input_type)))
      .collect();
    let outputs = session
      .outputs
      .iter()
      .map(|o| TensorInfo::new(&o.name, &dimensions(&o.output_type)))
      .collect();

    Ok(Box::new(OrtBackend {
      session,
      inputs,
      outputs,
    }))
  }
}

fn dimensions(value_type: &ValueType) -> Vec<i64> {
  match value_type {
    ValueType::Tensor { dimensions, .. } => dimensions.clone(),
    _ => Vec::new(),
  }
}

fn profile_shapes(option: &RuntimeOption, pick: fn(&TrtShape) -> &Vec<i64>) -> String {
  option
    .trt_input_shapes()
    .iter()
    .map(|(name, shape)| format!("{}:{}", name, TrtShape::dims_string(pick(shape))))
    .collect::<Vec<_>>()
    .join(",")
}

fn execution_providers(backend: BackendKind, option: &RuntimeOption) -> Vec<ExecutionProviderDispatch> {
  let mut providers = Vec::new();

  if let Device::Gpu(device_id) = option.device() {
    if backend == BackendKind::TensorRt {
      let mut trt = TensorRTExecutionProvider::default()
        .with_device_id(device_id as i32)
        .with_fp16(option.trt_fp16());
      if !option.trt_input_shapes().is_empty() {
        let min = profile_shapes(option, |s| &s.min);
        debug!("TensorRT 输入形状: {}", min);
        trt = trt
          .with_profile_min_shapes(min)
          .with_profile_opt_shapes(profile_shapes(option, |s| &s.opt))
          .with_profile_max_shapes(profile_shapes(option, |s| &s.max));
      }
      if let Some(cache) = option.trt_cache_file() {
        trt = trt
          .with_engine_cache(true)
          .with_engine_cache_path(cache.display().to_string());
      }
      providers.push(trt.build());
    }
    providers.push(
      CUDAExecutionProvider::default()
        .with_device_id(device_id as i32)
        .build(),
    );
  }

  providers.push(CPUExecutionProvider::default().build());
  providers
}

struct OrtBackend {
  session: Session,
  inputs: Vec<TensorInfo>,
  outputs: Vec<TensorInfo>,
}

impl Backend for OrtBackend {
  fn inputs(&self) -> &[TensorInfo] {
    &self.inputs
  }

  fn outputs(&self) -> &[TensorInfo] {
    &self.outputs
  }

  fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BackendError> {
    let mut feed: Vec<(String, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
    for tensor in inputs {
      let shape = tensor.shape.iter().map(|d| *d as usize).collect::<Vec<_>>();
      let value = OrtTensor::from_array((shape, tensor.data.clone())).map_err(engine_error)?;
      feed.push((tensor.name.clone(), value.into()));
    }

    let outputs = self.session.run(feed).map_err(engine_error)?;

    let mut results = Vec::with_capacity(self.outputs.len());
    for info in &self.outputs {
      let value = &outputs[info.name.as_str()];
      // PaddleDetection 导出的框数量输出为 int32
      let (shape, data) = match value.try_extract_raw_tensor::<f32>() {
        Ok((shape, data)) => (shape, data.to_vec()),
        Err(_) => match value.try_extract_raw_tensor::<i32>() {
          Ok((shape, data)) => (shape, data.iter().map(|v| *v as f32).collect()),
          Err(_) => {
            let (shape, data) = value
              .try_extract_raw_tensor::<i64>()
              .map_err(engine_error)?;
            (shape, data.iter().map(|v| *v as f32).collect())
          }
        },
      };
      results.push(Tensor::new(&info.name, shape.to_vec(), data)?);
    }
    Ok(results)
  }
}
