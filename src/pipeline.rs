use crate::detector::onnx::OnnxNetwork;
use crate::detector::{DetectionNetwork, DetectorOptions, HumanDetector, ModelPaths};
use crate::trackers::association::AssociationPolicy;
use crate::trackers::template::TemplateTrackerOptions;
use crate::trackers::{TrackState, TrackedObject, TrackerFactory};
use crate::utils::bbox::BoundingBox;
use crate::utils::blob::validate_frame;
use crate::utils::camera::CameraIntrinsics;
use crate::utils::draw::{draw_box, NEW_DETECTION_COLOR, TRACKED_COLOR};
use crate::Errors;
use anyhow::Result;
use image::RgbImage;
use log::{debug, info};
use nalgebra::Point3;

/// Thickness of the annotation outlines
pub const ANNOTATION_THICKNESS: u32 = 2;

/// Class that is used to configure the detector-tracker
///
#[derive(Debug, Clone, Default)]
pub struct HumanDetectorTrackerOptions {
    intrinsics: CameraIntrinsics,
    association: AssociationPolicy,
    skip_annotation: bool,
    max_tracks: Option<usize>,
}

impl HumanDetectorTrackerOptions {
    /// Camera intrinsics used to estimate the locations
    ///
    pub fn intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// The policy deciding whether a detection is already tracked
    ///
    pub fn association(mut self, policy: AssociationPolicy) -> Self {
        self.association = policy;
        self
    }

    /// Draw tracked boxes (green) and new detections (blue) on the processed frame
    ///
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.skip_annotation = !annotate;
        self
    }

    /// The maximal number of simultaneously tracked objects, unlimited when not set
    ///
    pub fn max_tracks(mut self, n: usize) -> Self {
        assert!(n > 0, "The number of tracks must be a positive number");
        self.max_tracks = Some(n);
        self
    }
}

/// Tracked person reported for the frame
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedHuman {
    pub id: u64,
    pub bbox: BoundingBox,
    pub location: Point3<f32>,
    pub state: TrackState,
    /// Detector confidence for the objects that started being tracked in the frame
    pub confidence: Option<f32>,
}

/// Detects persons on every frame and follows them with visual trackers
///
/// The object owns the trackers exclusively. For every frame the trackers are updated first and
/// the lost ones are dropped, then detections that are not covered by the surviving trackers
/// spawn new trackers.
///
pub struct HumanDetectorTracker<N: DetectionNetwork = OnnxNetwork> {
    detector: HumanDetector<N>,
    tracker_factory: Box<dyn TrackerFactory>,
    tracks: Vec<TrackedObject>,
    options: HumanDetectorTrackerOptions,
    next_id: u64,
}

impl HumanDetectorTracker<OnnxNetwork> {
    /// Loads the detector from files and uses [`TemplateTracker`](crate::trackers::template::TemplateTracker)s
    ///
    pub fn new(
        paths: &ModelPaths,
        detector_options: DetectorOptions,
        options: HumanDetectorTrackerOptions,
    ) -> Result<Self> {
        let detector = HumanDetector::new(paths, detector_options)?;
        Ok(Self::with_detector(
            detector,
            TemplateTrackerOptions::default(),
            options,
        ))
    }
}

impl<N: DetectionNetwork> HumanDetectorTracker<N> {
    pub fn with_detector(
        detector: HumanDetector<N>,
        tracker_factory: impl TrackerFactory + 'static,
        options: HumanDetectorTrackerOptions,
    ) -> Self {
        Self {
            detector,
            tracker_factory: Box::new(tracker_factory),
            tracks: Vec::new(),
            options,
            next_id: 1,
        }
    }

    pub fn detector(&self) -> &HumanDetector<N> {
        &self.detector
    }

    pub fn options(&self) -> &HumanDetectorTrackerOptions {
        &self.options
    }

    /// Currently tracked objects in the order of their creation
    ///
    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    /// Estimated location of the box with the configured camera
    ///
    pub fn locate(&self, bbox: &BoundingBox) -> Result<Point3<f32>> {
        self.options.intrinsics.locate(bbox)
    }

    /// Detects and tracks persons on the frame
    ///
    /// When annotation is enabled, the boxes are drawn on the frame after the trackers and the
    /// detector are done with it.
    ///
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> Result<Vec<TrackedHuman>> {
        validate_frame(frame)?;
        let detections = self.detector.detect(frame)?;

        let mut index = 0;
        while index < self.tracks.len() {
            if self.tracks[index].update(frame)? {
                index += 1;
            } else {
                let lost = self.tracks.remove(index);
                debug!(
                    "Track {} is lost after {} frame(s)",
                    lost.id(),
                    lost.length()
                );
            }
        }

        let mut report = Vec::with_capacity(self.tracks.len() + detections.len());
        for t in &self.tracks {
            let location = self.locate(t.bbox())?;
            info!(
                "Tracked human at: ({:.3}, {:.3}, {:.3})",
                location.x, location.y, location.z
            );
            report.push(TrackedHuman {
                id: t.id(),
                bbox: *t.bbox(),
                location,
                state: TrackState::Active,
                confidence: None,
            });
        }

        let tracked_boxes = self.tracks.iter().map(|t| *t.bbox()).collect::<Vec<_>>();
        let detected_boxes = detections.iter().map(|d| d.bbox).collect::<Vec<_>>();
        let covered = self
            .options
            .association
            .covered(&detected_boxes, &tracked_boxes);

        let mut spawned: Vec<BoundingBox> = Vec::new();
        for (detection, covered) in detections.iter().zip(covered) {
            let bbox = detection.bbox;
            if covered
                || spawned
                    .iter()
                    .any(|s| self.options.association.overlaps(&bbox, s))
            {
                continue;
            }

            if let Some(max_tracks) = self.options.max_tracks {
                if self.tracks.len() >= max_tracks {
                    debug!(
                        "Detection {:?} is ignored, {} object(s) are tracked already",
                        bbox, max_tracks
                    );
                    continue;
                }
            }

            let mut tracker = self.tracker_factory.create();
            if let Err(e) = tracker.init(frame, &bbox) {
                if !matches!(e.downcast_ref::<Errors>(), Some(Errors::DegenerateBox(_))) {
                    return Err(e);
                }
                debug!("Detection {:?} cannot seed a tracker: {}", bbox, e);
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(TrackedObject::new(id, tracker, bbox));
            spawned.push(bbox);

            let location = self.locate(&bbox)?;
            info!(
                "New human detected at: ({:.3}, {:.3}, {:.3})",
                location.x, location.y, location.z
            );
            report.push(TrackedHuman {
                id,
                bbox,
                location,
                state: TrackState::New,
                confidence: Some(detection.confidence),
            });
        }

        if !self.options.skip_annotation {
            for r in &report {
                let color = match r.state {
                    TrackState::New => NEW_DETECTION_COLOR,
                    TrackState::Active => TRACKED_COLOR,
                };
                draw_box(frame, &r.bbox, color, ANNOTATION_THICKNESS);
            }
        }

        Ok(report)
    }

    /// Drops all the trackers
    ///
    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::detector::{DetectorOptions, HumanDetector};
    use crate::pipeline::{HumanDetectorTracker, HumanDetectorTrackerOptions};
    use crate::test_stuff::{
        coco_class_names, silhouette_frame, white_frame, FixedRowsNetwork, SilhouetteGen,
        SilhouetteNetwork, SilhouetteTracker,
    };
    use crate::trackers::association::AssociationPolicy;
    use crate::trackers::template::TemplateTrackerOptions;
    use crate::trackers::{TrackState, TrackerFactory, VisualTracker};
    use crate::utils::bbox::BoundingBox;
    use crate::utils::draw::{NEW_DETECTION_COLOR, TRACKED_COLOR};
    use crate::{EstimateClose, Errors};
    use anyhow::Result;
    use image::RgbImage;
    use ndarray::{arr1, s, Array2};
    use std::time::{Duration, Instant};

    fn pipeline(
        factory: impl TrackerFactory + 'static,
        options: HumanDetectorTrackerOptions,
    ) -> HumanDetectorTracker<SilhouetteNetwork> {
        let detector = HumanDetector::with_network(
            SilhouetteNetwork::default(),
            coco_class_names(),
            DetectorOptions::default(),
        )
        .unwrap();
        HumanDetectorTracker::with_detector(detector, factory, options)
    }

    fn person() -> BoundingBox {
        BoundingBox::new(200.0, 120.0, 80.0, 240.0)
    }

    /// Rows of a 640x480 frame: a person at (280, 120, 80, 240) and a 0.32 px sliver at the left edge
    fn person_and_sliver_rows() -> FixedRowsNetwork {
        let mut rows = Array2::<f32>::zeros((2, 85));
        rows.row_mut(0)
            .slice_mut(s![..6])
            .assign(&arr1(&[0.5, 0.5, 0.125, 0.5, 0.9, 0.9]));
        rows.row_mut(1)
            .slice_mut(s![..6])
            .assign(&arr1(&[0.0, 0.5, 0.001, 0.5, 0.9, 0.9]));
        FixedRowsNetwork::new(vec![rows.into_dyn()])
    }

    struct RejectingTracker;

    impl VisualTracker for RejectingTracker {
        fn init(&mut self, _frame: &RgbImage, bbox: &BoundingBox) -> Result<()> {
            Err(Errors::DegenerateBox(bbox.width()).into())
        }

        fn update(&mut self, _frame: &RgbImage) -> Result<Option<BoundingBox>> {
            Err(Errors::TrackerNotInitialized.into())
        }
    }

    #[test]
    fn blank_frame() {
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let report = p.process_frame(&mut white_frame(640, 480)).unwrap();
        assert!(report.is_empty());
        assert!(p.tracks().is_empty());
    }

    #[test]
    fn silhouette_frame_processed() {
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let mut frame = silhouette_frame(640, 480, &[person()]);
        let report = p.process_frame(&mut frame).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].state, TrackState::New);
        assert!(report[0].confidence.is_some());
        assert!(report[0].bbox.almost_same(&person(), 4.0));
        assert!(report[0].location.z > 0.0);
        assert_eq!(p.tracks().len(), 1);
    }

    #[test]
    fn empty_frame() {
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let err = p.process_frame(&mut image::RgbImage::new(0, 0)).unwrap_err();
        assert_eq!(err.downcast_ref::<Errors>(), Some(&Errors::InvalidFrame(0, 0)));
    }

    #[test]
    fn static_scene_single_track() {
        for factory in [
            Box::new(TemplateTrackerOptions::default()) as Box<dyn TrackerFactory>,
            Box::new(SilhouetteTracker::boxed as fn() -> _),
        ] {
            let mut p = pipeline(move || factory.create(), Default::default());
            let frame = silhouette_frame(640, 480, &[person()]);
            let mut ids = Vec::new();
            for i in 0..10 {
                let report = p.process_frame(&mut frame.clone()).unwrap();
                assert!(p.tracks().len() <= 1);
                assert_eq!(report.len(), 1);
                if i > 0 {
                    assert_eq!(report[0].state, TrackState::Active);
                }
                ids.push(report[0].id);
            }
            assert!(ids.iter().all(|id| *id == ids[0]));
            assert_eq!(p.tracks()[0].length(), 10);
        }
    }

    #[test]
    fn drifting_silhouette_single_track() {
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let gen = SilhouetteGen::new(person(), (640, 480), 4.0);
        for (mut frame, _) in gen.take(20) {
            p.process_frame(&mut frame).unwrap();
            assert_eq!(p.tracks().len(), 1);
        }
    }

    #[test]
    fn lost_track_removed() {
        let mut p = pipeline(SilhouetteTracker::boxed, Default::default());
        p.process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        assert_eq!(p.tracks().len(), 1);

        let report = p.process_frame(&mut white_frame(640, 480)).unwrap();
        assert!(report.is_empty());
        assert!(p.tracks().is_empty());

        let report = p
            .process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].state, TrackState::New);
        assert_eq!(report[0].id, 2);
    }

    #[test]
    fn separate_persons() {
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let persons = [person(), BoundingBox::new(450.0, 100.0, 60.0, 200.0)];
        let report = p
            .process_frame(&mut silhouette_frame(640, 480, &persons))
            .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(p.tracks().len(), 2);
        assert!(report[0].location.x < report[1].location.x);
    }

    #[test]
    fn max_tracks() {
        let mut p = pipeline(
            TemplateTrackerOptions::default(),
            HumanDetectorTrackerOptions::default().max_tracks(1),
        );
        let persons = [person(), BoundingBox::new(450.0, 100.0, 60.0, 200.0)];
        p.process_frame(&mut silhouette_frame(640, 480, &persons))
            .unwrap();
        assert_eq!(p.tracks().len(), 1);
    }

    #[test]
    fn association_policy_decides_duplicates() {
        // the tracker keeps the initial box while the silhouette slowly moves away from it
        let moved = person().shift(12.0, 0.0);

        let mut any = pipeline(SilhouetteTracker::boxed, Default::default());
        any.process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        any.process_frame(&mut silhouette_frame(640, 480, &[moved]))
            .unwrap();
        assert_eq!(any.tracks().len(), 1);

        let mut strict = pipeline(
            SilhouetteTracker::boxed,
            HumanDetectorTrackerOptions::default().association(AssociationPolicy::IoU(0.95)),
        );
        strict
            .process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        strict
            .process_frame(&mut silhouette_frame(640, 480, &[moved]))
            .unwrap();
        assert_eq!(strict.tracks().len(), 2);
    }

    #[test]
    fn annotation() {
        let mut p = pipeline(SilhouetteTracker::boxed, Default::default());

        let mut frame = silhouette_frame(640, 480, &[person()]);
        let report = p.process_frame(&mut frame).unwrap();
        let (x, y) = (
            report[0].bbox.x().round() as u32,
            report[0].bbox.y().round() as u32,
        );
        assert_eq!(*frame.get_pixel(x, y), NEW_DETECTION_COLOR);

        let mut frame = silhouette_frame(640, 480, &[person()]);
        p.process_frame(&mut frame).unwrap();
        assert_eq!(*frame.get_pixel(x, y), TRACKED_COLOR);

        let mut quiet = pipeline(
            SilhouetteTracker::boxed,
            HumanDetectorTrackerOptions::default().annotate(false),
        );
        let mut frame = silhouette_frame(640, 480, &[person()]);
        let clean = frame.clone();
        quiet.process_frame(&mut frame).unwrap();
        assert_eq!(frame, clean);
    }

    #[test]
    fn reset() {
        let mut p = pipeline(SilhouetteTracker::boxed, Default::default());
        p.process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        p.reset();
        assert!(p.tracks().is_empty());
    }

    #[test]
    fn sliver_detection_does_not_fail_frame() {
        let detector = HumanDetector::with_network(
            person_and_sliver_rows(),
            coco_class_names(),
            DetectorOptions::default(),
        )
        .unwrap();
        let mut p = HumanDetectorTracker::with_detector(
            detector,
            SilhouetteTracker::boxed,
            Default::default(),
        );
        let person = BoundingBox::new(280.0, 120.0, 80.0, 240.0);

        let report = p
            .process_frame(&mut silhouette_frame(640, 480, &[person]))
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].state, TrackState::New);

        let report = p
            .process_frame(&mut silhouette_frame(640, 480, &[person]))
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].state, TrackState::Active);
        assert!(report[0].bbox.almost_same(&person, 1e-3));
    }

    #[test]
    fn rejected_seed_box_skipped() {
        let mut p = pipeline(
            || Box::new(RejectingTracker) as Box<dyn VisualTracker>,
            Default::default(),
        );
        let report = p
            .process_frame(&mut silhouette_frame(640, 480, &[person()]))
            .unwrap();
        assert!(report.is_empty());
        assert!(p.tracks().is_empty());
    }

    #[test]
    fn frame_latency() {
        // a distant and a close-up person
        let persons = [person(), BoundingBox::new(400.0, 40.0, 200.0, 400.0)];
        let mut p = pipeline(TemplateTrackerOptions::default(), Default::default());
        let frame = silhouette_frame(640, 480, &persons);
        for _ in 0..5 {
            let started = Instant::now();
            let report = p.process_frame(&mut frame.clone()).unwrap();
            assert!(started.elapsed() < Duration::from_millis(1000));
            assert_eq!(report.len(), 2);
        }
    }
}
