// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/ppyoloe.rs - PPYOLOE 检测模型
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  frame::{Normalize, RgbNchwFrame},
  model::{
    DetectionResult, Detector, InferConfig, ModelError, PreprocessOp,
    postprocess::decode_ppdet_rows,
    preprocess::{filter_for_interp, resize},
  },
  runtime::{
    BackendKind, BackendRegistry, ModelFiles, ModelFormat, Runtime, RuntimeOption,
    SupportedBackends, Tensor,
  },
};

/// `--use_trt` 时固定的 TensorRT 输入形状
pub const PPYOLOE_TRT_SHAPES: [(&str, &[i64]); 2] =
  [("image", &[1, 3, 640, 640]), ("scale_factor", &[1, 2])];

const PPYOLOE_SUPPORTED: SupportedBackends = SupportedBackends {
  cpu: &[
    BackendKind::OpenVino,
    BackendKind::PaddleInference,
    BackendKind::Ort,
    BackendKind::Lite,
  ],
  gpu: &[
    BackendKind::PaddleInference,
    BackendKind::Ort,
    BackendKind::TensorRt,
  ],
};

/// PaddleDetection 导出目录中的模型文件
#[derive(Debug, Clone)]
pub struct PpyoloeBundle {
  pub files: ModelFiles,
  pub config_file: PathBuf,
}

impl PpyoloeBundle {
  pub const MODEL_FILE: &'static str = "model.pdmodel";
  pub const PARAMS_FILE: &'static str = "model.pdiparams";
  pub const CONFIG_FILE: &'static str = "infer_cfg.yml";
  pub const ONNX_FILE: &'static str = "model.onnx";

  /// 目录中有 `model.onnx` 时按 ONNX 加载，否则按 Paddle 格式加载
  pub fn from_dir(dir: &Path) -> Result<Self, ModelError> {
    if !dir.is_dir() {
      return Err(ModelError::InvalidPath(format!(
        "{} 不是模型目录",
        dir.display()
      )));
    }

    let config_file = dir.join(Self::CONFIG_FILE);
    if !config_file.is_file() {
      return Err(ModelError::MissingFile(config_file));
    }

    let onnx = dir.join(Self::ONNX_FILE);
    let files = if onnx.is_file() {
      ModelFiles::onnx(onnx)
    } else {
      let model_file = dir.join(Self::MODEL_FILE);
      let params_file = dir.join(Self::PARAMS_FILE);
      for file in [&model_file, &params_file] {
        if !file.is_file() {
          return Err(ModelError::MissingFile(file.clone()));
        }
      }
      ModelFiles::paddle(model_file, params_file)
    };
    debug!("PPYOLOE 模型文件: {:?}", files);

    Ok(Self { files, config_file })
  }
}

pub struct Ppyoloe {
  runtime: Runtime,
  config: InferConfig,
}

impl Ppyoloe {
  pub const DEFAULT_HUB_NAME: &'static str = "ppyoloe_crn_l_300e_coco";

  pub fn new(
    bundle: &PpyoloeBundle,
    option: RuntimeOption,
    registry: &BackendRegistry,
  ) -> Result<Self, ModelError> {
    let config = InferConfig::from_file(&bundle.config_file)?;
    if let Some(arch) = &config.arch
      && !matches!(arch.as_str(), "YOLO" | "PPYOLOE")
    {
      warn!("部署配置的 arch 为 {}，可能不是 PPYOLOE 模型", arch);
    }

    let runtime = Runtime::init(option, &bundle.files, &PPYOLOE_SUPPORTED, registry)?;
    info!("PPYOLOE 初始化完成，后端: {}", runtime.backend_kind());

    Ok(Self { runtime, config })
  }

  /// 向模型仓库请求的格式：有 Paddle 引擎时取 Paddle 原生格式，否则取 ONNX 导出
  pub fn hub_format(registry: &BackendRegistry) -> ModelFormat {
    if registry.supports_format(ModelFormat::Paddle) {
      ModelFormat::Paddle
    } else {
      ModelFormat::Onnx
    }
  }

  pub fn config(&self) -> &InferConfig {
    &self.config
  }

  pub fn runtime(&self) -> &Runtime {
    &self.runtime
  }

  /// 按部署配置的算子顺序生成 `image`、`im_shape` 与 `scale_factor` 三个输入
  fn preprocess(&self, image: &RgbImage) -> Result<Vec<Tensor>, ModelError> {
    let (src_w, src_h) = image.dimensions();
    let mut resized: Option<RgbImage> = None;
    let mut normalize = Normalize::default();
    let mut pad_stride = None;

    for op in &self.config.preprocess {
      match op {
        PreprocessOp::Resize {
          target_size,
          keep_ratio,
          interp,
        } => {
          let current = resized.as_ref().unwrap_or(image);
          let (cur_w, cur_h) = current.dimensions();
          let (width, height) = if *keep_ratio {
            let [t_h, t_w] = *target_size;
            let (t_min, t_max) = (t_h.min(t_w), t_h.max(t_w));
            let (i_min, i_max) = (cur_w.min(cur_h), cur_w.max(cur_h));
            let scale = (t_min as f32 / i_min as f32).min(t_max as f32 / i_max as f32);
            (
              (cur_w as f32 * scale).round() as u32,
              (cur_h as f32 * scale).round() as u32,
            )
          } else {
            (target_size[1], target_size[0])
          };
          resized = Some(resize(
            current,
            width.max(1),
            height.max(1),
            filter_for_interp(*interp),
          ));
        }
        PreprocessOp::NormalizeImage {
          mean,
          std,
          is_scale,
        } => {
          normalize = Normalize {
            scale: if *is_scale { 1.0 / 255.0 } else { 1.0 },
            mean: *mean,
            std: *std,
          };
        }
        // 帧总是 CHW 排列
        PreprocessOp::Permute => {}
        PreprocessOp::PadStride { stride } => pad_stride = Some(*stride as usize),
      }
    }

    let current = resized.as_ref().unwrap_or(image);
    let (width, height) = current.dimensions();
    let scale_y = height as f32 / src_h as f32;
    let scale_x = width as f32 / src_w as f32;
    debug!(
      "PPYOLOE 输入尺寸 {}x{}，缩放系数 ({:.4}, {:.4})",
      width, height, scale_y, scale_x
    );

    let mut frame = RgbNchwFrame::from_rgb_image(current, &normalize);
    if let Some(stride) = pad_stride {
      frame = frame.pad_to_stride(stride);
    }

    Ok(vec![
      frame.into_tensor("image")?,
      Tensor::new("im_shape", vec![1, 2], vec![height as f32, width as f32])?,
      Tensor::new("scale_factor", vec![1, 2], vec![scale_y, scale_x])?,
    ])
  }

  fn postprocess(outputs: &[Tensor]) -> Result<DetectionResult, ModelError> {
    let boxes = outputs
      .iter()
      .find(|t| t.shape.last() == Some(&6))
      .ok_or_else(|| {
        ModelError::InvalidOutput("缺少形状为 [N, 6] 的检测框输出，导出模型时需包含 NMS".into())
      })?;
    let count = outputs
      .iter()
      .find(|t| t.name != boxes.name && t.numel() == 1)
      .map(|t| t.data[0].max(0.0) as usize);

    let items = decode_ppdet_rows(&boxes.data, count);
    debug!("PPYOLOE 检测到 {} 个物体", items.len());
    Ok(DetectionResult { items })
  }
}

impl Detector for Ppyoloe {
  type Error = ModelError;

  fn predict(&mut self, image: &RgbImage) -> Result<DetectionResult, Self::Error> {
    let inputs = self.preprocess(image)?;
    let outputs = self.runtime.infer(inputs)?;
    Self::postprocess(&outputs)
  }

  fn labels(&self) -> Option<&[String]> {
    if self.config.label_list.is_empty() {
      None
    } else {
      Some(&self.config.label_list)
    }
  }
}
