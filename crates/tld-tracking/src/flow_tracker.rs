//! Short-term tracker: median flow with forward-backward filtering.

use crate::motion::{LucasKanade, MotionEstimator};
use crate::settings::FlowTrackerSettings;
use glam::DVec2;
use std::cmp::Ordering;
use tld_core::{Candidate, GrayImage, ProposalSource, Rect, Rect2d};
use tracing::debug;

/// Whether the tracker has a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    Tracking,
}

/// Frame-to-frame box tracker driven by a [`MotionEstimator`].
#[derive(Debug, Clone)]
pub struct FlowTracker<M: MotionEstimator = LucasKanade> {
    settings: FlowTrackerSettings,
    estimator: M,
    state: TrackerState,
    prev_frame: Option<GrayImage>,
    cur_frame: Option<GrayImage>,
    target: Option<Rect>,
    survivors: usize,
}

impl FlowTracker<LucasKanade> {
    /// Tracker using the built-in Lucas-Kanade estimator.
    pub fn with_settings(settings: FlowTrackerSettings) -> Self {
        let estimator = LucasKanade::new(settings.lucas_kanade.clone());
        Self::new(settings, estimator)
    }
}

impl<M: MotionEstimator> FlowTracker<M> {
    pub fn new(settings: FlowTrackerSettings, estimator: M) -> Self {
        Self {
            settings,
            estimator,
            state: TrackerState::Idle,
            prev_frame: None,
            cur_frame: None,
            target: None,
            survivors: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn target(&self) -> Option<Rect> {
        self.target
    }

    /// Points that passed the forward-backward check on the last `track`.
    pub fn survivors(&self) -> usize {
        self.survivors
    }

    pub fn estimator(&self) -> &M {
        &self.estimator
    }

    /// Push a new frame; the current one becomes the previous one.
    pub fn set_frame(&mut self, frame: GrayImage) {
        self.prev_frame = self.cur_frame.replace(frame);
    }

    /// Start (or move) tracking at `target`.
    pub fn set_target(&mut self, target: Rect) {
        self.target = Some(target);
        self.state = TrackerState::Tracking;
    }

    pub fn reset(&mut self) {
        self.target = None;
        self.state = TrackerState::Idle;
        self.survivors = 0;
    }

    /// Propagate the target from the previous frame into the current one.
    pub fn track(&mut self) -> Candidate {
        self.survivors = 0;
        let target = self.target.unwrap_or_default();
        let (Some(prev), Some(cur), TrackerState::Tracking) =
            (&self.prev_frame, &self.cur_frame, self.state)
        else {
            return Candidate::invalid(target, ProposalSource::Tracker);
        };

        let region = target.adjust_to_frame(prev.size());
        let points = self
            .estimator
            .select_points(prev, region, self.settings.max_points);
        let selected = points.len();

        let forward = self.estimator.track_points(prev, cur, &points);
        let (starts, ends): (Vec<DVec2>, Vec<DVec2>) = points
            .iter()
            .zip(&forward)
            .filter_map(|(&p, f)| f.map(|q| (p, q)))
            .unzip();
        let backward = self.estimator.track_points(cur, prev, &ends);

        let fb_limit = self.settings.fb_threshold;
        let (starts, ends): (Vec<DVec2>, Vec<DVec2>) = starts
            .iter()
            .zip(&ends)
            .zip(&backward)
            .filter_map(|((&p, &q), b)| match b {
                Some(back) if back.distance(p) <= fb_limit => Some((p, q)),
                _ => None,
            })
            .unzip();
        let survivors = starts.len();
        self.survivors = survivors;

        if survivors < self.settings.min_survivors {
            debug!(selected, survivors, "Flow tracker lost target");
            return Candidate::invalid(target, ProposalSource::Tracker);
        }

        let shift = mean_shift(&starts, &ends);
        let scale = median_scale(&starts, &ends);
        let old = Rect2d::from(target);
        let strobe = Rect::from(Rect2d::from_center_size(old.center() + shift, old.size() * scale));

        let valid = survivors >= self.settings.valid_survivors && selected > self.settings.valid_selected;
        debug!(selected, survivors, scale, valid, "Flow tracker step");
        Candidate {
            strobe,
            prob: survivors as f64 / selected as f64,
            aux_prob: 0.0,
            valid,
            source: ProposalSource::Tracker,
        }
    }
}

/// Mean displacement between corresponding points.
pub fn mean_shift(start: &[DVec2], stop: &[DVec2]) -> DVec2 {
    if start.is_empty() {
        return DVec2::ZERO;
    }
    let sum: DVec2 = start.iter().zip(stop).map(|(a, b)| *b - *a).sum();
    sum / start.len() as f64
}

/// Median ratio of pairwise distances after / before; 1 when no pair is
/// usable. Even counts take the upper median.
pub fn median_scale(start: &[DVec2], stop: &[DVec2]) -> f64 {
    let n = start.len().min(stop.len());
    let mut ratios = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let prev = start[i].distance(start[j]);
            if prev > 1e-8 {
                ratios.push(stop[i].distance(stop[j]) / prev);
            }
        }
    }
    if ratios.is_empty() {
        return 1.0;
    }
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    ratios[ratios.len() / 2]
}
