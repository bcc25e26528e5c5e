//! Object proposals exchanged between the tracker's experts.

use crate::geometry::Rect;
use crate::image::GrayImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which expert produced a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProposalSource {
    Tracker,
    Detector,
    /// Aggregate of several proposals, or an invalid decision.
    #[default]
    Mixed,
    /// Prediction returned to the caller.
    Final,
}

impl ProposalSource {
    /// Outline intensity used by [`draw_candidate`].
    pub fn draw_intensity(self) -> u8 {
        match self {
            ProposalSource::Tracker => 128,
            ProposalSource::Detector => 200,
            ProposalSource::Mixed => 180,
            ProposalSource::Final => 255,
        }
    }
}

/// A scored object location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Candidate {
    pub strobe: Rect,
    /// Confidence assigned by the producing expert.
    pub prob: f64,
    /// Verification score from the object model.
    pub aux_prob: f64,
    pub valid: bool,
    pub source: ProposalSource,
}

impl Candidate {
    /// A valid proposal with no verification score yet.
    pub fn new(strobe: Rect, prob: f64, source: ProposalSource) -> Self {
        Self {
            strobe,
            prob,
            aux_prob: 0.0,
            valid: true,
            source,
        }
    }

    /// A rejected proposal: zero confidence, `valid == false`.
    pub fn invalid(strobe: Rect, source: ProposalSource) -> Self {
        Self {
            strobe,
            prob: 0.0,
            aux_prob: 0.0,
            valid: false,
            source,
        }
    }

    pub fn with_aux_prob(mut self, aux_prob: f64) -> Self {
        self.aux_prob = aux_prob;
        self
    }

    pub fn with_source(mut self, source: ProposalSource) -> Self {
        self.source = source;
        self
    }
}

/// Mean box (components truncated) with the maximum `prob` and `aux_prob` of
/// the sample. The result is valid and sourced [`ProposalSource::Mixed`].
///
/// Returns `None` for an empty slice.
pub fn aggregate(sample: &[Candidate]) -> Option<Candidate> {
    if sample.is_empty() {
        return None;
    }
    let n = sample.len() as f64;
    let (mut x, mut y, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut prob = 0.0f64;
    let mut aux_prob = 0.0f64;
    for c in sample {
        x += c.strobe.x as f64;
        y += c.strobe.y as f64;
        w += c.strobe.width as f64;
        h += c.strobe.height as f64;
        prob = prob.max(c.prob);
        aux_prob = aux_prob.max(c.aux_prob);
    }
    let strobe = Rect::new(
        (x / n) as i32,
        (y / n) as i32,
        (w / n) as i32,
        (h / n) as i32,
    );
    Some(Candidate::new(strobe, prob, ProposalSource::Mixed).with_aux_prob(aux_prob))
}

/// Group proposals into complete-linkage clusters.
///
/// Proposals are visited in input order. Each unclustered proposal seeds a
/// cluster; every later unclustered proposal joins it iff its IoU with every
/// member is at least `iou_threshold`. Each cluster collapses to its
/// [`aggregate`], carrying the source of its seed.
pub fn clusterize(candidates: &[Candidate], iou_threshold: f64) -> Vec<Candidate> {
    let mut clustered = vec![false; candidates.len()];
    let mut clusters = Vec::new();
    let mut members: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for seed in 0..candidates.len() {
        if clustered[seed] {
            continue;
        }
        clustered[seed] = true;
        members.clear();
        members.push(candidates[seed]);

        for other in 0..candidates.len() {
            if clustered[other] {
                continue;
            }
            let strobe = candidates[other].strobe;
            if members.iter().all(|m| m.strobe.iou(strobe) >= iou_threshold) {
                clustered[other] = true;
                members.push(candidates[other]);
            }
        }

        if let Some(cluster) = aggregate(&members) {
            clusters.push(cluster.with_source(candidates[seed].source));
        }
    }
    clusters
}

/// Greedy non-maximum suppression.
///
/// Proposals are stably sorted by `prob` descending; a proposal is dropped if
/// its IoU with any already kept proposal exceeds `iou_threshold`.
pub fn non_max_suppression(candidates: &[Candidate], iou_threshold: f64) -> Vec<Candidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.prob.partial_cmp(&a.prob).unwrap_or(Ordering::Equal));

    let mut kept: Vec<Candidate> = Vec::with_capacity(sorted.len());
    for c in sorted {
        if kept.iter().all(|k| k.strobe.iou(c.strobe) <= iou_threshold) {
            kept.push(c);
        }
    }
    kept
}

/// Overlay a proposal outline for debugging.
///
/// Final predictions are drawn only when valid, with a thickness that grows
/// with confidence.
pub fn draw_candidate(image: &mut GrayImage, candidate: &Candidate) {
    let thickness = match candidate.source {
        ProposalSource::Final if !candidate.valid => return,
        ProposalSource::Final => ((4.0 * candidate.prob) as i32).max(1),
        _ => 1,
    };
    image.draw_rect(
        candidate.strobe,
        candidate.source.draw_intensity(),
        thickness,
    );
}
