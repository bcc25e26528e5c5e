//! Integration tests for full tracking sessions.
//!
//! Frames carry their index in the top-left pixel so a scripted motion
//! estimator can report the exact target displacement between any two
//! frames.

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tld_core::{Candidate, GrayImage, ProposalSource, Rect, TldError};
use tld_tracking::{MotionEstimator, Settings, TldTracker};

// ── Helpers ────────────────────────────────────────────────────

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const SIDE: i32 = 32;
const DEPTH: usize = 400;

fn origin(index: usize) -> (i32, i32) {
    (40 + 2 * index as i32, 30 + index as i32)
}

fn truth(index: usize) -> Rect {
    let (x, y) = origin(index);
    Rect::new(x, y, SIDE, SIDE)
}

struct Sequence {
    background: GrayImage,
}

impl Sequence {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(99);
        Self {
            background: GrayImage::from_fn(WIDTH, HEIGHT, |_, _| rng.gen_range(70..130)),
        }
    }

    fn frame(&self, index: usize) -> GrayImage {
        let target = truth(index);
        let mut frame = self.background.clone();
        for y in 0..SIDE {
            for x in 0..SIDE {
                let value = if (x / 8 + y / 8) % 2 == 0 { 230 } else { 20 };
                frame.set((target.x + x) as u32, (target.y + y) as u32, value);
            }
        }
        frame.set(0, 0, index as u8);
        frame
    }
}

/// Reports the true displacement between the frames' indices.
struct Scripted {
    lose_points: bool,
}

impl MotionEstimator for Scripted {
    fn select_points(&self, _frame: &GrayImage, region: Rect, max_points: usize) -> Vec<DVec2> {
        let mut points = Vec::new();
        for y in (region.y + 2..region.bottom()).step_by(4) {
            for x in (region.x + 2..region.right()).step_by(4) {
                points.push(DVec2::new(x as f64, y as f64));
            }
        }
        points.truncate(max_points);
        points
    }

    fn track_points(&self, from: &GrayImage, to: &GrayImage, points: &[DVec2]) -> Vec<Option<DVec2>> {
        if self.lose_points {
            return vec![None; points.len()];
        }
        let at = |image: &GrayImage| {
            let (x, y) = origin(image.data[0] as usize);
            DVec2::new(x as f64, y as f64)
        };
        let shift = at(to) - at(from);
        points.iter().map(|&p| Some(p + shift)).collect()
    }
}

/// Model pools deep enough that the initial templates are never evicted.
fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.model.sample_depth = DEPTH;
    settings
}

fn start(lose_points: bool) -> (TldTracker<Scripted>, Sequence) {
    let sequence = Sequence::new();
    let mut tld = TldTracker::with_estimator(settings(), Scripted { lose_points }).unwrap();
    tld.process_frame(&sequence.frame(0)).unwrap();
    tld.start_tracking(truth(0)).unwrap();
    (tld, sequence)
}

// ── Session lifecycle ──────────────────────────────────────────

#[test]
fn start_without_frame_fails() {
    let mut tld = TldTracker::with_estimator(Settings::default(), Scripted { lose_points: false }).unwrap();
    assert!(matches!(tld.start_tracking(truth(0)), Err(TldError::NoFrame)));
    assert!(!tld.is_processing());
}

#[test]
fn start_initializes_every_expert() {
    let (tld, _) = start(false);
    assert!(tld.is_processing());
    assert_eq!(tld.detector().ensemble_len(), 10);
    let (positive, negative) = tld.model_samples();
    assert_eq!(positive.len(), 100);
    assert!(!negative.is_empty() && negative.len() <= 100);
    assert_eq!(tld.current_prediction().strobe, truth(0));
}

#[test]
fn follows_a_moving_target() {
    let (mut tld, sequence) = start(false);
    for index in 1..6 {
        let out = tld.process_frame(&sequence.frame(index)).unwrap();
        assert_eq!(out.source, ProposalSource::Final);
        assert!(out.valid, "frame {index}: {}", tld.status());
        assert!(out.strobe.iou(truth(index)) > 0.8, "frame {index}: {:?}", out.strobe);

        let tracker = tld.tracker_proposal();
        assert_eq!(tracker.source, ProposalSource::Tracker);
        assert!(tracker.valid);
        assert_eq!(tracker.strobe, truth(index));

        let (positive, negative) = tld.model_samples();
        assert!(positive.len() >= 100 && positive.len() <= DEPTH);
        assert!(negative.len() <= DEPTH);
    }
    let status = tld.status();
    assert!(status.processing);
    assert!(status.valid);
    assert_eq!(status.detector_candidates, tld.detector_proposals().len());
    assert_eq!(status.detector_clusters, tld.clusters().len());
}

#[test]
fn lost_tracker_defers_to_detector_rules() {
    let (mut tld, sequence) = start(true);
    let out = tld.process_frame(&sequence.frame(1)).unwrap();
    assert_eq!(out.source, ProposalSource::Final);
    assert!(!tld.tracker_proposal().valid);
    let message = tld.status().message;
    assert!(
        [
            "No reliable results",
            "One detector cluster",
            "Most confident detector cluster",
            "No dominant detector cluster",
        ]
        .contains(&message),
        "{message}"
    );
}

#[test]
fn stop_freezes_the_prediction() {
    let (mut tld, sequence) = start(false);
    let tracked = tld.process_frame(&sequence.frame(1)).unwrap();
    tld.stop_tracking();
    assert!(!tld.is_processing());

    let out = tld.process_frame(&sequence.frame(2)).unwrap();
    assert_eq!(out, tracked);
    let status = tld.status();
    assert!(!status.processing);
    assert!(!status.training);
    assert!(!status.relocation);
}

#[test]
fn sessions_are_deterministic() {
    let run = || -> Vec<Candidate> {
        let (mut tld, sequence) = start(false);
        (1..4)
            .map(|i| tld.process_frame(&sequence.frame(i)).unwrap())
            .collect()
    };
    assert_eq!(run(), run());
}

#[test]
fn restart_reseeds_the_model() {
    let (mut tld, sequence) = start(false);
    for index in 1..3 {
        tld.process_frame(&sequence.frame(index)).unwrap();
    }
    tld.start_tracking(truth(2)).unwrap();
    let (positive, _) = tld.model_samples();
    assert_eq!(positive.len(), 100);
    assert_eq!(tld.current_prediction().strobe, truth(2));
    assert!(tld.detector_proposals().is_empty());
}
