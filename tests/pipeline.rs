// 该文件是 Lanshan （岚山） 项目的一部分。
// tests/pipeline.rs - 端到端推理流程测试
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

use std::{
  cell::RefCell,
  path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};

use lanshan::{
  args::build_option,
  hub::{HubError, ModelHub, ModelSource},
  model::{
    Detector, ModelError, PPYOLOE_TRT_SHAPES, Ppyoloe, PpyoloeBundle, YOLOR_TRT_SHAPES, Yolor,
    YolorBundle,
  },
  output::{SaveImageFileOutput, VISUALIZED_RESULT},
  runtime::{
    Backend, BackendError, BackendFactory, BackendKind, BackendRegistry, ModelFiles, ModelFormat,
    RuntimeError, RuntimeOption, Tensor, TensorInfo,
  },
  task::{OneShotTask, Task},
};

const INFER_CFG: &str = r#"
arch: PPYOLOE
draw_threshold: 0.5
Preprocess:
- type: Resize
  interp: 2
  keep_ratio: false
  target_size: [640, 640]
- type: NormalizeImage
  is_scale: true
  mean: [0.485, 0.456, 0.406]
  std: [0.229, 0.224, 0.225]
- type: Permute
label_list:
- person
- bicycle
"#;

/// 模拟导出时带 NMS 的 PaddleDetection 模型
struct FakePpdet {
  inputs: Vec<TensorInfo>,
  outputs: Vec<TensorInfo>,
}

impl Backend for FakePpdet {
  fn inputs(&self) -> &[TensorInfo] {
    &self.inputs
  }

  fn outputs(&self) -> &[TensorInfo] {
    &self.outputs
  }

  fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BackendError> {
    if inputs[0].name != "image" || inputs[0].shape != vec![1, 3, 640, 640] {
      return Err(BackendError::Engine(format!("image 输入错误: {:?}", inputs[0].shape)));
    }
    let scale = &inputs[1];
    if scale.name != "scale_factor" || (scale.data[0] - 12.8).abs() > 1e-4 {
      return Err(BackendError::Engine(format!("scale_factor 错误: {:?}", scale.data)));
    }

    #[rustfmt::skip]
    let rows = vec![
      0.0, 0.9, 10.0, 10.0, 40.0, 30.0,
      1.0, 0.3, 50.0, 5.0, 90.0, 45.0,
      -1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ];
    Ok(vec![
      Tensor::new("multiclass_nms3_0.tmp_0", vec![3, 6], rows)?,
      Tensor::new("multiclass_nms3_0.tmp_2", vec![1], vec![2.0])?,
    ])
  }
}

/// 模拟 YOLOR 的原始输出
struct FakeYolorBackend {
  inputs: Vec<TensorInfo>,
  outputs: Vec<TensorInfo>,
}

impl Backend for FakeYolorBackend {
  fn inputs(&self) -> &[TensorInfo] {
    &self.inputs
  }

  fn outputs(&self) -> &[TensorInfo] {
    &self.outputs
  }

  fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BackendError> {
    let images = &inputs[0];
    if images.shape != vec![1, 3, 640, 640] {
      return Err(BackendError::Engine(format!("images 输入错误: {:?}", images.shape)));
    }
    // 填充区域为 114 / 255
    if (images.data[0] - 114.0 / 255.0).abs() > 1e-6 {
      return Err(BackendError::Engine("letterbox 填充值错误".into()));
    }

    let mut rows = Vec::new();
    for (cx, cy, w, h, obj, cls) in [
      (320.0, 320.0, 100.0, 50.0, 0.9, 0.9),
      (322.0, 321.0, 100.0, 50.0, 0.8, 0.9),
      (100.0, 300.0, 20.0, 20.0, 0.1, 0.9),
    ] {
      let mut row = vec![cx, cy, w, h, obj];
      let mut classes = vec![0.0f32; 80];
      classes[2] = cls;
      row.extend(classes);
      rows.extend(row);
    }
    Ok(vec![Tensor::new("output", vec![1, 3, 85], rows)?])
  }
}

enum Fake {
  Ppdet,
  Yolor,
}

impl BackendFactory for Fake {
  fn name(&self) -> &'static str {
    match self {
      Fake::Ppdet => "fake-ppdet",
      Fake::Yolor => "fake-yolor",
    }
  }

  fn supports(&self, backend: BackendKind, format: ModelFormat) -> bool {
    format == ModelFormat::Onnx && matches!(backend, BackendKind::Ort | BackendKind::TensorRt)
  }

  fn create(
    &self,
    _backend: BackendKind,
    files: &ModelFiles,
    _option: &RuntimeOption,
  ) -> Result<Box<dyn Backend>, BackendError> {
    if !files.model_file.is_file() {
      return Err(BackendError::ModelFile(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        files.model_file.display().to_string(),
      )));
    }
    let backend: Box<dyn Backend> = match self {
      Fake::Ppdet => Box::new(FakePpdet {
        inputs: vec![
          TensorInfo::new("image", &[-1, 3, 640, 640]),
          TensorInfo::new("scale_factor", &[-1, 2]),
        ],
        outputs: vec![
          TensorInfo::new("multiclass_nms3_0.tmp_0", &[-1, 6]),
          TensorInfo::new("multiclass_nms3_0.tmp_2", &[-1]),
        ],
      }),
      Fake::Yolor => Box::new(FakeYolorBackend {
        inputs: vec![TensorInfo::new("images", &[1, 3, 640, 640])],
        outputs: vec![TensorInfo::new("output", &[1, -1, 85])],
      }),
    };
    Ok(backend)
  }
}

/// 只能运行 Paddle 原生格式的引擎
struct FakePaddleEngine;

impl BackendFactory for FakePaddleEngine {
  fn name(&self) -> &'static str {
    "fake-paddle"
  }

  fn supports(&self, backend: BackendKind, format: ModelFormat) -> bool {
    format == ModelFormat::Paddle && backend == BackendKind::PaddleInference
  }

  fn create(
    &self,
    _backend: BackendKind,
    _files: &ModelFiles,
    _option: &RuntimeOption,
  ) -> Result<Box<dyn Backend>, BackendError> {
    Err(BackendError::Engine("not used".into()))
  }
}

/// 按请求的格式在本地目录中生成导出模型
struct ExportingHub {
  root: PathBuf,
  requests: RefCell<Vec<ModelFormat>>,
}

impl ModelHub for ExportingHub {
  fn download_model(&self, name: &str, format: ModelFormat) -> Result<PathBuf, HubError> {
    self.requests.borrow_mut().push(format);
    let dir = self.root.join(name);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("infer_cfg.yml"), INFER_CFG)?;
    match format {
      ModelFormat::Onnx => std::fs::write(dir.join("model.onnx"), b"onnx")?,
      ModelFormat::Paddle => {
        std::fs::write(dir.join("model.pdmodel"), b"graph")?;
        std::fs::write(dir.join("model.pdiparams"), b"params")?;
      }
    }
    Ok(dir)
  }
}

fn write_ppyoloe_dir(dir: &Path) {
  std::fs::write(dir.join("infer_cfg.yml"), INFER_CFG).expect("cfg");
  std::fs::write(dir.join("model.onnx"), b"onnx").expect("model");
}

#[test]
fn ppyoloe_end_to_end_writes_visualization() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_ppyoloe_dir(dir.path());

  let source = ModelSource::resolve(
    Some(dir.path().to_path_buf()),
    None,
    Ppyoloe::DEFAULT_HUB_NAME,
  );
  assert_eq!(source, ModelSource::Local(dir.path().to_path_buf()));

  let bundle = PpyoloeBundle::from_dir(dir.path()).expect("bundle");
  let registry = BackendRegistry::empty().with(Fake::Ppdet);
  let option = RuntimeOption::builder().build();
  let mut model = Ppyoloe::new(&bundle, option, &registry).expect("model");
  assert_eq!(model.runtime().backend_kind(), BackendKind::Ort);

  let image = RgbImage::from_pixel(100, 50, Rgb([200, 200, 200]));
  let target = dir.path().join(VISUALIZED_RESULT);
  let output = SaveImageFileOutput::default()
    .with_path(&target)
    .with_score_threshold(0.5)
    .with_labels(model.labels());

  let result = OneShotTask
    .run_task(&image, &mut model, &output)
    .expect("task");
  assert_eq!(result.len(), 2);
  assert_eq!(result.items[0].bbox, [10.0, 10.0, 40.0, 30.0]);
  assert_eq!(result.above(0.5).count(), 1);

  let saved = image::open(&target).expect("saved").to_rgb8();
  assert_eq!(saved.dimensions(), (100, 50));
}

#[test]
fn yolor_end_to_end_undoes_letterbox() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model_file = dir.path().join("yolor-w6-paper-555-640-640.onnx");
  std::fs::write(&model_file, b"onnx").expect("model");

  let bundle = YolorBundle::from_path(dir.path()).expect("bundle");
  let registry = BackendRegistry::empty().with(Fake::Yolor);
  let option = RuntimeOption::builder().build();
  let mut model = Yolor::new(&bundle, option, &registry).expect("model");
  assert_eq!(model.labels().map(|l| l.len()), Some(80));

  let image = RgbImage::from_pixel(1280, 640, Rgb([0, 0, 0]));
  let result = model.predict(&image).expect("predict");

  assert_eq!(result.len(), 1);
  let item = &result.items[0];
  assert_eq!(item.label_id, 2);
  assert!((item.score - 0.81).abs() < 1e-6);
  assert_eq!(item.bbox, [540.0, 270.0, 740.0, 370.0]);
}

#[test]
fn trt_option_reaches_the_runtime_on_gpu() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model_file = dir.path().join("yolor.onnx");
  std::fs::write(&model_file, b"onnx").expect("model");

  let args = lanshan::args::RuntimeArgs {
    device: "GPU".into(),
    device_id: 0,
    use_trt: true,
  };
  let option = build_option(&args, &YOLOR_TRT_SHAPES);
  let registry = BackendRegistry::empty().with(Fake::Yolor);
  let model = Yolor::new(&YolorBundle::from_path(&model_file).expect("bundle"), option, &registry)
    .expect("model");

  assert_eq!(model.runtime().backend_kind(), BackendKind::TensorRt);
  assert_eq!(model.runtime().option().trt_input_shapes().len(), 1);
}

#[test]
fn trt_on_cpu_is_rejected_at_construction() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_ppyoloe_dir(dir.path());

  let args = lanshan::args::RuntimeArgs {
    device: "cpu".into(),
    device_id: 0,
    use_trt: true,
  };
  let option = build_option(&args, &PPYOLOE_TRT_SHAPES);
  let bundle = PpyoloeBundle::from_dir(dir.path()).expect("bundle");
  let err = Ppyoloe::new(&bundle, option, &BackendRegistry::empty().with(Fake::Ppdet))
    .err()
    .expect("cpu + trt must fail");
  assert!(matches!(
    err,
    ModelError::Runtime(RuntimeError::UnsupportedDevice { .. })
  ));
}

#[test]
fn paddle_model_without_engine_reports_candidates() {
  let dir = tempfile::tempdir().expect("tempdir");
  std::fs::write(dir.path().join("infer_cfg.yml"), INFER_CFG).expect("cfg");
  std::fs::write(dir.path().join("model.pdmodel"), b"graph").expect("model");
  std::fs::write(dir.path().join("model.pdiparams"), b"params").expect("params");

  let bundle = PpyoloeBundle::from_dir(dir.path()).expect("bundle");
  assert_eq!(bundle.files.format, ModelFormat::Paddle);

  let err = Ppyoloe::new(
    &bundle,
    RuntimeOption::builder().build(),
    &BackendRegistry::empty().with(Fake::Ppdet),
  )
  .err()
  .expect("no paddle engine");
  match err {
    ModelError::Runtime(RuntimeError::NoBackend { candidates, .. }) => {
      assert_eq!(
        candidates,
        vec![
          BackendKind::PaddleInference,
          BackendKind::Lite,
          BackendKind::Ort,
          BackendKind::OpenVino
        ]
      );
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn ppyoloe_hub_format_follows_registered_engines() {
  let onnx_only = BackendRegistry::empty().with(Fake::Ppdet);
  assert_eq!(Ppyoloe::hub_format(&onnx_only), ModelFormat::Onnx);
  assert_eq!(Ppyoloe::hub_format(&BackendRegistry::empty()), ModelFormat::Onnx);

  let with_paddle = BackendRegistry::empty()
    .with(Fake::Ppdet)
    .with(FakePaddleEngine);
  assert_eq!(Ppyoloe::hub_format(&with_paddle), ModelFormat::Paddle);
}

#[test]
fn default_ppyoloe_model_from_hub_can_be_loaded() {
  let dir = tempfile::tempdir().expect("tempdir");
  let hub = ExportingHub {
    root: dir.path().to_path_buf(),
    requests: Default::default(),
  };
  let registry = BackendRegistry::empty().with(Fake::Ppdet);

  let source = ModelSource::resolve(None, None, Ppyoloe::DEFAULT_HUB_NAME);
  let model_dir = source
    .materialize(|| Ok(&hub), Ppyoloe::hub_format(&registry))
    .expect("download");
  assert_eq!(hub.requests.borrow().as_slice(), &[ModelFormat::Onnx]);

  let bundle = PpyoloeBundle::from_dir(&model_dir).expect("bundle");
  let model = Ppyoloe::new(&bundle, RuntimeOption::builder().build(), &registry).expect("model");
  assert_eq!(model.runtime().backend_kind(), BackendKind::Ort);
}
