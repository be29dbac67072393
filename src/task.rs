// 该文件是 Lanshan （岚山） 项目的一部分。
// src/task.rs - 推理任务
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
use tracing::info;

use crate::{
  model::{DetectionResult, Detector},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单张图像：在副本上推理，打印结果，再把结果画到原图上
pub struct OneShotTask;

impl<
  'a,
  'm,
  'o,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Detector<Error = ME>,
  O: Render<RgbImage, DetectionResult, Error = RE>,
> Task<&'a RgbImage, &'m mut M, &'o O> for OneShotTask
{
  type Output = DetectionResult;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: &'a RgbImage,
    model: &'m mut M,
    output: &'o O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务，输入图像 {}x{}", input.width(), input.height());
    let frame = input.clone();
    let now = std::time::Instant::now();
    let result = model.predict(&frame)?;
    info!(
      "推理完成，检测到 {} 个物体，耗时: {:.2?}",
      result.len(),
      now.elapsed()
    );

    println!("{}", result);

    let now = std::time::Instant::now();
    output.render_result(input, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}
