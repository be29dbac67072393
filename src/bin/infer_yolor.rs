// 该文件是 Lanshan （岚山） 项目的一部分。
// src/bin/infer_yolor.rs - YOLOR 单图推理
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lanshan::{
  args::{HubArgs, RuntimeArgs, VisualizeArgs, build_option},
  hub::ModelSource,
  model::{Detector, YOLOR_TRT_SHAPES, Yolor, YolorBundle},
  output::{SaveImageFileOutput, VISUALIZED_RESULT, draw::Draw},
  runtime::{BackendRegistry, ModelFormat},
  task::{OneShotTask, Task},
};

/// YOLOR 目标检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YOLOR 的 ONNX 模型文件，或只含一个 ONNX 文件的目录
  #[arg(long, value_name = "MODEL")]
  pub model: Option<PathBuf>,

  /// 模型仓库中的模型名，未指定模型文件时使用
  #[arg(long = "model_hub", value_name = "NAME")]
  pub model_hub: Option<String>,

  /// 测试图片路径，不指定时使用下载的测试图片
  #[arg(long, value_name = "FILE")]
  pub image: Option<PathBuf>,

  #[command(flatten)]
  pub runtime: RuntimeArgs,

  #[command(flatten)]
  pub hub: HubArgs,

  #[command(flatten)]
  pub visualize: VisualizeArgs,
}

fn main() -> Result<()> {
  lanshan::init_tracing();

  let args = Args::parse();

  let option = build_option(&args.runtime, &YOLOR_TRT_SHAPES);
  let registry = BackendRegistry::builtin();
  // 只有下载模型或测试图片时才需要仓库与缓存目录
  let connect = || args.hub.connect();

  let source = ModelSource::resolve(args.model, args.model_hub, Yolor::DEFAULT_HUB_NAME);
  info!("模型来源: {:?}", source);
  let model_path = source
    .materialize(connect, ModelFormat::Onnx)
    .context("获取模型失败")?;
  let bundle = YolorBundle::from_path(&model_path)?;
  let mut model = Yolor::new(&bundle, option, &registry)?;

  let image_path = match args.image {
    Some(path) => path,
    None => connect()?
      .detection_test_image()
      .context("获取测试图片失败")?,
  };
  info!("输入图片: {}", image_path.display());
  let image = lanshan::load_image(&image_path)
    .with_context(|| format!("无法读取图片 {}", image_path.display()))?;

  let draw = Draw::from_font_option(args.visualize.font.as_deref())?;
  let output = SaveImageFileOutput::default()
    .with_draw(draw)
    .with_labels(model.labels());

  OneShotTask.run_task(&image, &mut model, &output)?;
  println!("Visualized result save in ./{}", VISUALIZED_RESULT);

  Ok(())
}
