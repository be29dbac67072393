// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/yolor.rs - YOLOR 检测模型
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
use tracing::{debug, info};

use crate::{
  frame::{Normalize, RgbNchwFrame},
  model::{
    DetectItem, DetectionResult, Detector, ModelError,
    labels::coco_labels,
    postprocess::{decode_yolo_rows, nms},
    preprocess::letterbox,
  },
  runtime::{
    BackendKind, BackendRegistry, ModelFiles, Runtime, RuntimeOption, SupportedBackends, Tensor,
  },
};

/// `--use_trt` 时固定的 TensorRT 输入形状
pub const YOLOR_TRT_SHAPES: [(&str, &[i64]); 1] = [("images", &[1, 3, 640, 640])];

const YOLOR_SUPPORTED: SupportedBackends = SupportedBackends {
  cpu: &[BackendKind::OpenVino, BackendKind::Ort],
  gpu: &[BackendKind::Ort, BackendKind::TensorRt],
};

const INPUT_NAME: &str = "images";
const PAD_VALUE: [u8; 3] = [114, 114, 114];

/// YOLOR 的 ONNX 模型文件
#[derive(Debug, Clone)]
pub struct YolorBundle {
  pub files: ModelFiles,
}

impl YolorBundle {
  /// 接受 `.onnx` 文件，或只含一个 `.onnx` 文件的目录
  pub fn from_path(path: &Path) -> Result<Self, ModelError> {
    if path.is_file() {
      return Ok(Self {
        files: ModelFiles::onnx(path),
      });
    }
    if !path.is_dir() {
      return Err(ModelError::MissingFile(path.to_path_buf()));
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(path)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "onnx"))
      .collect();

    match candidates.len() {
      1 => {
        let model_file = candidates.remove(0);
        debug!("YOLOR 模型文件: {}", model_file.display());
        Ok(Self {
          files: ModelFiles::onnx(model_file),
        })
      }
      0 => Err(ModelError::MissingFile(path.join("*.onnx"))),
      n => Err(ModelError::InvalidPath(format!(
        "{} 中有 {} 个 onnx 文件，无法确定模型",
        path.display(),
        n
      ))),
    }
  }
}

pub struct Yolor {
  runtime: Runtime,
  labels: Vec<String>,
  size: u32,
  conf_threshold: f32,
  nms_threshold: f32,
}

impl Yolor {
  pub const DEFAULT_HUB_NAME: &'static str = "YOLOR-W6";

  pub fn new(
    bundle: &YolorBundle,
    option: RuntimeOption,
    registry: &BackendRegistry,
  ) -> Result<Self, ModelError> {
    let runtime = Runtime::init(option, &bundle.files, &YOLOR_SUPPORTED, registry)?;
    info!("YOLOR 初始化完成，后端: {}", runtime.backend_kind());

    Ok(Self {
      runtime,
      labels: coco_labels(),
      size: 640,
      conf_threshold: 0.25,
      nms_threshold: 0.5,
    })
  }

  pub fn runtime(&self) -> &Runtime {
    &self.runtime
  }

  fn postprocess(&self, outputs: &[Tensor]) -> Result<Vec<DetectItem>, ModelError> {
    let output = outputs
      .first()
      .ok_or_else(|| ModelError::InvalidOutput("YOLOR 没有输出张量".into()))?;
    let row_len = output
      .shape
      .last()
      .copied()
      .filter(|len| *len > 5)
      .ok_or_else(|| {
        ModelError::InvalidOutput(format!("YOLOR 输出形状 {:?} 无效", output.shape))
      })? as usize;

    let candidates = decode_yolo_rows(&output.data, row_len, self.conf_threshold);
    debug!("YOLOR 候选框 {} 个", candidates.len());
    Ok(nms(candidates, self.nms_threshold))
  }
}

impl Detector for Yolor {
  type Error = ModelError;

  fn predict(&mut self, image: &RgbImage) -> Result<DetectionResult, Self::Error> {
    let (width, height) = image.dimensions();
    let boxed = letterbox(image, self.size, self.size, PAD_VALUE, false);
    let input =
      RgbNchwFrame::from_rgb_image(&boxed.image, &Normalize::unit()).into_tensor(INPUT_NAME)?;

    let outputs = self.runtime.infer(vec![input])?;
    let mut items = self.postprocess(&outputs)?;
    for item in items.iter_mut() {
      item.bbox = boxed.restore(item.bbox, width, height);
    }
    debug!("YOLOR 检测到 {} 个物体", items.len());

    Ok(DetectionResult { items })
  }

  fn labels(&self) -> Option<&[String]> {
    Some(&self.labels)
  }
}
