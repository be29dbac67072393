// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/preprocess.rs - 图像预处理
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

use image::{Rgb, RgbImage, imageops::FilterType};

/// OpenCV 插值编号到 `image` 滤波器
pub fn filter_for_interp(interp: u32) -> FilterType {
  match interp {
    0 => FilterType::Nearest,
    2 => FilterType::CatmullRom,
    4 => FilterType::Lanczos3,
    _ => FilterType::Triangle,
  }
}

pub fn resize(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
  if image.dimensions() == (width, height) {
    return image.clone();
  }
  image::imageops::resize(image, width, height, filter)
}

/// 等比缩放并居中填充后的图像，以及还原坐标所需的参数
#[derive(Debug, Clone)]
pub struct Letterbox {
  pub image: RgbImage,
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
}

impl Letterbox {
  /// 把填充后图像上的框还原到原图，并裁剪到原图范围
  pub fn restore(&self, bbox: [f32; 4], width: u32, height: u32) -> [f32; 4] {
    let (w, h) = (width as f32, height as f32);
    [
      ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h),
      ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h),
    ]
  }
}

/// 等比缩放到 `width x height` 内并用 `pad` 颜色居中填充。
/// `scale_up` 为假时不放大小图。
pub fn letterbox(
  image: &RgbImage,
  width: u32,
  height: u32,
  pad: [u8; 3],
  scale_up: bool,
) -> Letterbox {
  let (src_w, src_h) = image.dimensions();
  let mut scale = (width as f32 / src_w as f32).min(height as f32 / src_h as f32);
  if !scale_up {
    scale = scale.min(1.0);
  }

  let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, width);
  let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, height);
  let resized = resize(image, new_w, new_h, FilterType::Triangle);

  let pad_x = ((width - new_w) as f32 / 2.0 - 0.1).round().max(0.0);
  let pad_y = ((height - new_h) as f32 / 2.0 - 0.1).round().max(0.0);

  let mut canvas = RgbImage::from_pixel(width, height, Rgb(pad));
  image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

  Letterbox {
    image: canvas,
    scale,
    pad_x,
    pad_y,
  }
}
