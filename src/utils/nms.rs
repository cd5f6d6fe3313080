use crate::utils::bbox::BoundingBox;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Clone, Debug)]
struct Candidate<'a> {
    bbox: &'a BoundingBox,
    rank: f32,
    index: usize,
}

impl<'a> Candidate<'a> {
    pub fn new(bbox: &'a BoundingBox, rank: f32, index: usize) -> Self {
        Self { bbox, rank, index }
    }
}

/// NMS algorithm implementation
///
/// The suppression is class-agnostic: every box competes with every other box.
///
/// # Parameters
/// * `detections` - boxes with scores to filter out with NMS;
/// * `nms_threshold` - the box is excluded when its IoU with a better-ranked kept box is greater than the threshold;
/// * `score_threshold` - boxes with the score not greater than the threshold are excluded before suppression.
///   If `score_threshold` is `None`, then `f32::MIN` is used.
///
/// Returns the indices of kept detections in `detections`, ordered by the score decreasingly.
///
pub fn nms(
    detections: &[(BoundingBox, f32)],
    nms_threshold: f32,
    score_threshold: Option<f32>,
) -> Vec<usize> {
    let score_threshold = score_threshold.unwrap_or(f32::MIN);
    let nms_boxes = detections
        .iter()
        .enumerate()
        .filter(|(_, (b, score))| *score > score_threshold && b.is_valid())
        .map(|(index, (b, score))| Candidate::new(b, *score, index))
        .sorted_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(Ordering::Equal))
        .collect::<Vec<_>>();

    let mut excluded = HashSet::new();

    for (index, cb) in nms_boxes.iter().enumerate() {
        if excluded.contains(&cb.index) {
            continue;
        }

        for ob in &nms_boxes[index + 1..] {
            if excluded.contains(&ob.index) {
                continue;
            }

            if BoundingBox::iou(cb.bbox, ob.bbox) > nms_threshold {
                excluded.insert(ob.index);
            }
        }
    }

    nms_boxes
        .into_iter()
        .filter(|e| !excluded.contains(&e.index))
        .map(|e| e.index)
        .collect()
}
