// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/postprocess.rs - 检测后处理
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

use crate::model::DetectItem;

/// 计算两个 [x_min, y_min, x_max, y_max] 框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别的非极大值抑制，结果按分数降序
pub fn nms(mut detections: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  detections.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<DetectItem> = Vec::with_capacity(detections.len());
  for det in detections {
    let suppressed = result
      .iter()
      .any(|kept| kept.label_id == det.label_id && iou(&kept.bbox, &det.bbox) > iou_threshold);
    if !suppressed {
      result.push(det);
    }
  }
  result
}

/// 解码 YOLO 风格的输出行 `(cx, cy, w, h, obj, cls...)`，
/// 置信度为 obj 与最高类别分数之积，只保留高于阈值的行
pub fn decode_yolo_rows(data: &[f32], row_len: usize, conf_threshold: f32) -> Vec<DetectItem> {
  if row_len <= 5 {
    return Vec::new();
  }

  let mut items = Vec::new();
  for row in data.chunks_exact(row_len) {
    let objectness = row[4];
    if objectness <= conf_threshold {
      continue;
    }

    let (class_id, class_score) = row[5..]
      .iter()
      .enumerate()
      .fold((0usize, f32::MIN), |best, (i, s)| {
        if *s > best.1 { (i, *s) } else { best }
      });

    let confidence = objectness * class_score;
    if confidence <= conf_threshold {
      continue;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    items.push(DetectItem {
      label_id: class_id as i32,
      score: confidence,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  items
}

/// 解码 PaddleDetection 导出模型的输出行 `(label, score, x0, y0, x1, y1)`，
/// `count` 为有效行数，负类别为填充行
pub fn decode_ppdet_rows(data: &[f32], count: Option<usize>) -> Vec<DetectItem> {
  let rows = data.chunks_exact(6);
  let limit = count.unwrap_or(rows.len());

  rows
    .take(limit)
    .filter(|row| row[0] >= 0.0)
    .map(|row| DetectItem {
      label_id: row[0] as i32,
      score: row[1],
      bbox: [row[2], row[3], row[4], row[5]],
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(label_id: i32, score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      label_id,
      score,
      bbox,
    }
  }

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    assert!((iou(&a, &[5.0, 0.0, 15.0, 10.0]) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn nms_is_class_aware() {
    let kept = nms(
      vec![
        item(0, 0.6, [1.0, 1.0, 11.0, 11.0]),
        item(0, 0.9, [0.0, 0.0, 10.0, 10.0]),
        item(1, 0.5, [0.0, 0.0, 10.0, 10.0]),
        item(0, 0.4, [50.0, 50.0, 60.0, 60.0]),
      ],
      0.5,
    );

    let scores: Vec<f32> = kept.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.5, 0.4]);
  }

  #[test]
  fn yolo_rows_use_objectness_times_class_score() {
    #[rustfmt::skip]
    let data = [
      50.0, 50.0, 20.0, 10.0, 0.9, 0.1, 0.8,
      10.0, 10.0, 4.0, 4.0, 0.2, 0.9, 0.1,
      30.0, 30.0, 4.0, 4.0, 0.5, 0.4, 0.3,
    ];
    let items = decode_yolo_rows(&data, 7, 0.25);

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label_id, 1);
    assert!((items[0].score - 0.72).abs() < 1e-6);
    assert_eq!(items[0].bbox, [40.0, 45.0, 60.0, 55.0]);
  }

  #[test]
  fn ppdet_rows_respect_count_and_padding() {
    #[rustfmt::skip]
    let data = [
      0.0, 0.9, 1.0, 2.0, 3.0, 4.0,
      -1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
      2.0, 0.3, 5.0, 6.0, 7.0, 8.0,
    ];
    assert_eq!(decode_ppdet_rows(&data, None).len(), 2);

    let first = decode_ppdet_rows(&data, Some(1));
    assert_eq!(first, vec![item(0, 0.9, [1.0, 2.0, 3.0, 4.0])]);
  }
}
