// 该文件是 Lanshan （岚山） 项目的一部分。
// src/frame.rs - NCHW 帧定义
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

use image::RgbImage;

use crate::runtime::{BackendError, Tensor};

const RGB_CHANNELS: usize = 3;

/// 逐通道归一化参数：`(x * scale - mean) / std`
#[derive(Debug, Clone, PartialEq)]
pub struct Normalize {
  pub scale: f32,
  pub mean: [f32; 3],
  pub std: [f32; 3],
}

impl Normalize {
  /// 只缩放到 [0, 1]
  pub fn unit() -> Self {
    Self {
      scale: 1.0 / 255.0,
      mean: [0.0; 3],
      std: [1.0; 3],
    }
  }

  fn apply(&self, channel: usize, value: u8) -> f32 {
    (value as f32 * self.scale - self.mean[channel]) / self.std[channel]
  }
}

impl Default for Normalize {
  fn default() -> Self {
    Self {
      scale: 1.0,
      mean: [0.0; 3],
      std: [1.0; 3],
    }
  }
}

/// 单张 RGB 图像的 NCHW 浮点帧
#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl RgbNchwFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0.0; RGB_CHANNELS * width * height].into_boxed_slice(),
    }
  }

  /// HWC 排列的 RGB 图像转为 CHW 排列并归一化
  pub fn from_rgb_image(image: &RgbImage, normalize: &Normalize) -> Self {
    let (width, height) = image.dimensions();
    let mut frame = Self::with_shape(height as usize, width as usize);
    let plane = frame.width * frame.height;

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = y as usize * frame.width + x as usize;
      for c in 0..RGB_CHANNELS {
        frame.data[c * plane + idx] = normalize.apply(c, pixel[c]);
      }
    }
    frame
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  /// 右侧与下方补零，使宽高都是 `stride` 的整数倍
  pub fn pad_to_stride(self, stride: usize) -> Self {
    if stride <= 1 {
      return self;
    }
    let height = self.height.div_ceil(stride) * stride;
    let width = self.width.div_ceil(stride) * stride;
    if (height, width) == (self.height, self.width) {
      return self;
    }

    let mut padded = Self::with_shape(height, width);
    for c in 0..RGB_CHANNELS {
      for y in 0..self.height {
        let src = c * self.height * self.width + y * self.width;
        let dst = c * height * width + y * width;
        padded.data[dst..dst + self.width].copy_from_slice(&self.data[src..src + self.width]);
      }
    }
    padded
  }

  /// 形状为 `[1, 3, h, w]` 的输入张量
  pub fn into_tensor(self, name: &str) -> Result<Tensor, BackendError> {
    let shape = vec![
      1,
      RGB_CHANNELS as i64,
      self.height as i64,
      self.width as i64,
    ];
    Tensor::new(name, shape, self.data.into_vec())
  }
}
