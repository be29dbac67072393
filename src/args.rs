// 该文件是 Lanshan （岚山） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{ArgAction, Args};
use tracing::info;

use crate::{
  device::Device,
  hub::{CACHE_ENV, HUB_URL_ENV, HubClient, HubError},
  runtime::RuntimeOption,
};

/// 推理设备与后端参数
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
  /// 推理设备，`cpu` 或 `gpu`（不区分大小写）
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: String,

  /// GPU 设备编号
  #[arg(long = "device_id", default_value_t = 0, value_name = "ID")]
  pub device_id: u32,

  /// 是否使用 TensorRT，取值 True / False
  #[arg(
    long = "use_trt",
    default_value = "False",
    action = ArgAction::Set,
    value_parser = parse_bool_literal,
    value_name = "BOOL"
  )]
  pub use_trt: bool,
}

/// 模型仓库参数
#[derive(Args, Debug, Clone)]
pub struct HubArgs {
  /// 模型仓库地址
  #[arg(long = "hub_url", env = HUB_URL_ENV, value_name = "URL")]
  pub hub_url: Option<String>,

  /// 模型缓存目录，默认 ~/.lanshan
  #[arg(long = "cache_dir", env = CACHE_ENV, value_name = "DIR")]
  pub cache_dir: Option<PathBuf>,
}

impl HubArgs {
  /// 只在确实需要访问仓库时调用
  pub fn connect(&self) -> Result<HubClient, HubError> {
    HubClient::from_options(self.hub_url.as_deref(), self.cache_dir.as_deref())
  }
}

/// 可视化参数
#[derive(Args, Debug, Clone)]
pub struct VisualizeArgs {
  /// 标签字体文件（TTF/OTF），默认查找系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

/// 解析 `True` / `False` 形式的布尔字面量
pub fn parse_bool_literal(value: &str) -> Result<bool, String> {
  match value {
    "True" | "true" | "1" => Ok(true),
    "False" | "false" | "0" => Ok(false),
    other => Err(format!("无效的布尔值 '{}'，应为 True 或 False", other)),
  }
}

/// 由命令行参数构造运行时配置，`use_trt` 时为每个输入固定形状
pub fn build_option(args: &RuntimeArgs, trt_shapes: &[(&str, &[i64])]) -> RuntimeOption {
  let device = Device::from_flag(&args.device, args.device_id);
  let mut builder = RuntimeOption::builder().use_device(device);

  if args.use_trt {
    builder = builder.use_trt_backend();
    for (name, shape) in trt_shapes {
      builder = builder.set_trt_input_shape(name, shape);
    }
  }

  let option = builder.build();
  info!(
    "推理设备: {}，TensorRT: {}",
    option.device(),
    if args.use_trt { "开启" } else { "关闭" }
  );
  option
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runtime::{BackendKind, TrtShape};
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,
    #[command(flatten)]
    hub: HubArgs,
  }

  fn runtime_args(argv: &[&str]) -> RuntimeArgs {
    let mut full = vec!["test"];
    full.extend_from_slice(argv);
    Cli::try_parse_from(full).expect("args").runtime
  }

  const SHAPES: [(&str, &[i64]); 2] = [("image", &[1, 3, 640, 640]), ("scale_factor", &[1, 2])];

  #[test]
  fn defaults_are_cpu_without_trt() {
    let args = runtime_args(&[]);
    assert_eq!(args.device, "cpu");
    assert!(!args.use_trt);

    let option = build_option(&args, &SHAPES);
    assert_eq!(option.device(), Device::Cpu);
    assert_eq!(option.backend(), None);
    assert!(option.trt_input_shapes().is_empty());
  }

  #[test]
  fn gpu_any_case_selects_gpu() {
    for flag in ["GPU", "gpu", "Gpu"] {
      let args = runtime_args(&["--device", flag, "--device_id", "1"]);
      assert_eq!(build_option(&args, &SHAPES).device(), Device::Gpu(1));
    }
  }

  #[test]
  fn other_device_strings_fall_back_to_cpu() {
    for flag in ["cpu", "CPU", "cuda", "gpu0"] {
      let args = runtime_args(&["--device", flag]);
      assert_eq!(build_option(&args, &SHAPES).device(), Device::Cpu);
    }
  }

  #[test]
  fn use_trt_sets_exactly_the_given_shapes() {
    let args = runtime_args(&["--device", "gpu", "--use_trt", "True"]);
    let option = build_option(&args, &SHAPES);

    assert_eq!(option.backend(), Some(BackendKind::TensorRt));
    assert_eq!(option.trt_input_shapes().len(), 2);
    assert_eq!(
      option.trt_input_shape("image"),
      Some(&TrtShape::fixed(&[1, 3, 640, 640]))
    );
    assert_eq!(
      option.trt_input_shape("scale_factor"),
      Some(&TrtShape::fixed(&[1, 2]))
    );
  }

  #[test]
  fn bool_literals() {
    assert_eq!(parse_bool_literal("True"), Ok(true));
    assert_eq!(parse_bool_literal("false"), Ok(false));
    assert_eq!(parse_bool_literal("1"), Ok(true));
    assert!(parse_bool_literal("yes").is_err());

    assert!(Cli::try_parse_from(["test", "--use_trt", "maybe"]).is_err());
  }

  #[test]
  fn hub_args_are_the_only_source_of_hub_settings() {
    let cli = Cli::try_parse_from([
      "test",
      "--hub_url",
      "http://hub.example.com/api",
      "--cache_dir",
      "/tmp/lanshan-cache",
    ])
    .expect("args");
    let client = cli.hub.connect().expect("client");
    assert_eq!(client.base_url().as_str(), "http://hub.example.com/api/");
    assert_eq!(client.cache_dir(), std::path::Path::new("/tmp/lanshan-cache"));

    // 未给出地址时直接用默认地址，不再读环境变量
    let client = HubClient::from_options(None, Some(std::path::Path::new("/tmp/lanshan-cache")))
      .expect("client");
    assert_eq!(
      client.base_url().as_str(),
      format!("{}/", crate::hub::DEFAULT_HUB_URL)
    );
  }
}
