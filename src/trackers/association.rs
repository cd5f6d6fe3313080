use crate::utils::bbox::BoundingBox;
use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;

const F32_I64_MULT: f32 = 1_000_000.0;

/// Decides whether a new detection is already covered by a tracked object
///
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AssociationPolicy {
    /// The detection is covered if it intersects any tracked box, however small the intersection is
    #[default]
    AnyOverlap,
    /// The detection is covered if its IoU with any tracked box is at least the threshold
    IoU(f32),
    /// Detections are assigned one-to-one to tracked boxes maximizing the total IoU; the detection is
    /// covered when it is assigned and the IoU of the pair is at least the threshold
    Hungarian(f32),
}

impl AssociationPolicy {
    /// Returns the coverage flag for every detection
    ///
    /// # Parameters
    /// * `detections` - boxes of the new detections;
    /// * `tracks` - current boxes of the tracked objects.
    ///
    pub fn covered(&self, detections: &[BoundingBox], tracks: &[BoundingBox]) -> Vec<bool> {
        match self {
            AssociationPolicy::AnyOverlap | AssociationPolicy::IoU(_) => detections
                .iter()
                .map(|d| tracks.iter().any(|t| self.overlaps(d, t)))
                .collect(),
            AssociationPolicy::Hungarian(threshold) => assign(detections, tracks, *threshold),
        }
    }

    /// Pairwise test of a detection against a single tracked box
    ///
    /// For [`AssociationPolicy::Hungarian`] only the IoU threshold is checked.
    ///
    pub fn overlaps(&self, detection: &BoundingBox, track: &BoundingBox) -> bool {
        match self {
            AssociationPolicy::AnyOverlap => BoundingBox::intersection(detection, track) > 0.0,
            AssociationPolicy::IoU(threshold) | AssociationPolicy::Hungarian(threshold) => {
                covers(detection, track, *threshold)
            }
        }
    }
}

fn covers(detection: &BoundingBox, track: &BoundingBox, threshold: f32) -> bool {
    let iou = BoundingBox::iou(detection, track);
    iou > 0.0 && iou >= threshold
}

/// Optimal assignment where every detection has a private fallback column weighted by the threshold
///
fn assign(detections: &[BoundingBox], tracks: &[BoundingBox], threshold: f32) -> Vec<bool> {
    if tracks.is_empty() || detections.is_empty() {
        return vec![false; detections.len()];
    }

    let det_num = detections.len();
    let track_num = tracks.len();
    let mut weights = Matrix::new(det_num, track_num + det_num, 0i64);

    for (i, d) in detections.iter().enumerate() {
        for (j, t) in tracks.iter().enumerate() {
            weights[(i, j)] = (BoundingBox::iou(d, t) * F32_I64_MULT) as i64;
        }
        weights[(i, track_num + i)] = (threshold * F32_I64_MULT) as i64;
    }

    let (_, solution) = kuhn_munkres(&weights);

    solution
        .into_iter()
        .enumerate()
        .map(|(i, col)| col < track_num && covers(&detections[i], &tracks[col], threshold))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::trackers::association::AssociationPolicy;
    use crate::utils::bbox::BoundingBox;

    fn tracks() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(0.0, 0.0, 10.0, 20.0),
            BoundingBox::new(100.0, 0.0, 10.0, 20.0),
        ]
    }

    #[test]
    fn any_overlap() {
        let detections = [
            // barely touches the first track
            BoundingBox::new(9.5, 19.5, 10.0, 20.0),
            // shares only the border with the first track
            BoundingBox::new(10.0, 0.0, 10.0, 20.0),
            BoundingBox::new(50.0, 50.0, 10.0, 20.0),
        ];
        assert_eq!(
            AssociationPolicy::AnyOverlap.covered(&detections, &tracks()),
            vec![true, false, false]
        );
        assert_eq!(
            AssociationPolicy::default().covered(&detections, &[]),
            vec![false, false, false]
        );
    }

    #[test]
    fn iou_threshold() {
        let detections = [
            BoundingBox::new(9.5, 19.5, 10.0, 20.0),
            BoundingBox::new(101.0, 1.0, 10.0, 20.0),
        ];
        assert_eq!(
            AssociationPolicy::IoU(0.3).covered(&detections, &tracks()),
            vec![false, true]
        );
    }

    #[test]
    fn hungarian_one_to_one() {
        // both detections overlap the first track, only one of them can be assigned to it
        let detections = [
            BoundingBox::new(1.0, 0.0, 10.0, 20.0),
            BoundingBox::new(0.5, 0.0, 10.0, 20.0),
            BoundingBox::new(100.0, 1.0, 10.0, 20.0),
        ];
        let covered = AssociationPolicy::Hungarian(0.3).covered(&detections, &tracks());
        assert_eq!(covered, vec![false, true, true]);

        let greedy = AssociationPolicy::IoU(0.3).covered(&detections, &tracks());
        assert_eq!(greedy, vec![true, true, true]);
    }

    #[test]
    fn hungarian_below_threshold() {
        let detections = [BoundingBox::new(5.0, 0.0, 10.0, 20.0)];
        let covered = AssociationPolicy::Hungarian(0.5).covered(&detections, &tracks());
        assert_eq!(covered, vec![false]);
        assert!(AssociationPolicy::Hungarian(0.5)
            .covered(&[], &tracks())
            .is_empty());
    }

    #[test]
    fn pairwise() {
        let t = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let d = BoundingBox::new(5.0, 0.0, 10.0, 20.0);
        assert!(AssociationPolicy::AnyOverlap.overlaps(&d, &t));
        assert!(AssociationPolicy::IoU(0.3).overlaps(&d, &t));
        assert!(!AssociationPolicy::Hungarian(0.5).overlaps(&d, &t));
    }
}
