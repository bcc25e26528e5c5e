//! Nearest-neighbour template model used to verify proposals.

use crate::augmentator::{Augmentator, ObjectClass, TransformPars};
use crate::integrator::CandidateVerifier;
use crate::settings::ModelSettings;
use rand::Rng;
use tld_core::{Candidate, GrayImage, Rect};
use tracing::{debug, warn};

/// Positive and negative template pools of canonical-size patches.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    settings: ModelSettings,
    target: Rect,
    positive: Vec<GrayImage>,
    negative: Vec<GrayImage>,
}

impl ObjectModel {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            target: Rect::default(),
            positive: Vec::new(),
            negative: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn positive_samples(&self) -> &[GrayImage] {
        &self.positive
    }

    pub fn negative_samples(&self) -> &[GrayImage] {
        &self.negative
    }

    pub fn reset(&mut self) {
        self.positive.clear();
        self.negative.clear();
    }

    /// Clear both pools and fill them from augmented samples of `target`.
    pub fn set_target<R: Rng + ?Sized>(&mut self, frame: &GrayImage, target: Rect, rng: &mut R) {
        self.reset();
        self.target = target;
        let s = &self.settings;
        let pars = TransformPars {
            angles: s.init_angles.clone(),
            scales: s.scales.clone(),
            translation_x: self.shifts(target.width),
            translation_y: self.shifts(target.height),
            overlap: s.init_overlap,
            disp_threshold: s.init_disp_threshold,
            positive_limit: s.init_positive_limit,
            negative_limit: s.init_negative_limit,
        };
        let mut aug = Augmentator::new(frame, target, pars);
        let positives = self.make_patches(&aug.sample(ObjectClass::Positive));
        let negatives = self.make_patches(&aug.sample(ObjectClass::Negative));
        if positives.is_empty() {
            warn!(target = ?target, "Model init produced no positive samples");
        }

        let depth = self.settings.sample_depth;
        for patch in positives {
            add_patch(&mut self.positive, patch, depth, rng);
        }
        for patch in negatives {
            add_patch(&mut self.negative, patch, depth, rng);
        }
        debug!(
            positive = self.positive.len(),
            negative = self.negative.len(),
            "Model pools initialized"
        );
    }

    /// Add templates the model does not yet explain around `candidate`.
    ///
    /// Positive patches join while scored below the positive ceiling,
    /// negatives while scored above the negative floor.
    pub fn train<R: Rng + ?Sized>(&mut self, frame: &GrayImage, candidate: &Candidate, rng: &mut R) {
        let s = &self.settings;
        let pars = TransformPars {
            angles: s.training_angles.clone(),
            scales: s.scales.clone(),
            translation_x: self.shifts(self.target.width),
            translation_y: self.shifts(self.target.height),
            overlap: s.overlap,
            disp_threshold: s.training_disp_threshold,
            positive_limit: s.training_positive_limit,
            negative_limit: s.training_negative_limit,
        };
        let (ceiling, floor, depth) = (s.positive_add_ceiling, s.negative_add_floor, s.sample_depth);
        let mut aug = Augmentator::new(frame, candidate.strobe, pars);

        let mut added_pos = 0usize;
        for patch in self.make_patches(&aug.sample(ObjectClass::Positive)) {
            if self.predict_patch(&patch) < ceiling {
                add_patch(&mut self.positive, patch, depth, rng);
                added_pos += 1;
            }
        }
        let mut added_neg = 0usize;
        for patch in self.make_patches(&aug.sample(ObjectClass::Negative)) {
            if self.predict_patch(&patch) > floor {
                add_patch(&mut self.negative, patch, depth, rng);
                added_neg += 1;
            }
        }
        debug!(added_pos, added_neg, "Model training");
    }

    /// Integer shifts of `±0.5 · init_overlap · dim` around the target.
    fn shifts(&self, dim: i32) -> Vec<f64> {
        let half = (0.5 * self.settings.init_overlap * dim as f64).trunc();
        vec![-half, 0.0, half]
    }

    /// Resize a subframe to the canonical patch size; `None` when empty.
    pub fn make_patch(&self, subframe: &GrayImage) -> Option<GrayImage> {
        (!subframe.is_empty()).then(|| subframe.resize(self.settings.patch_size))
    }

    /// Relative similarity of a canonical patch to the positive pool, in
    /// `[0, 1]`. An empty positive pool scores 0.
    pub fn predict_patch(&self, patch: &GrayImage) -> f64 {
        if self.positive.is_empty() {
            return 0.0;
        }
        let npm = dissimilarity(patch, &self.negative);
        let ppm = dissimilarity(patch, &self.positive);
        if (npm + ppm).abs() > 1e-9 {
            npm / (npm + ppm)
        } else {
            0.0
        }
    }

    fn make_patches(&self, subframes: &[GrayImage]) -> Vec<GrayImage> {
        subframes.iter().filter_map(|f| self.make_patch(f)).collect()
    }

    /// Score an arbitrary subframe.
    pub fn predict_subframe(&self, subframe: &GrayImage) -> f64 {
        self.make_patch(subframe)
            .map_or(0.0, |patch| self.predict_patch(&patch))
    }

    /// Score the region `rect` of `frame`, clipped to the frame.
    pub fn predict_candidate(&self, frame: &GrayImage, rect: Rect) -> f64 {
        let rect = rect.adjust_to_frame(frame.size());
        if rect.is_empty() {
            return 0.0;
        }
        self.predict_subframe(&frame.subframe(rect))
    }

    /// Verification view of the model over one frame.
    pub fn verifier<'a>(&'a self, frame: &'a GrayImage) -> ModelVerifier<'a> {
        ModelVerifier { model: self, frame }
    }
}

/// NCC mapped to `[0, 1]`.
fn similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    0.5 * (a.correlation(b) + 1.0)
}

/// `1 - max similarity` to any pool entry; 1 for an empty pool.
fn dissimilarity(patch: &GrayImage, pool: &[GrayImage]) -> f64 {
    let best = pool
        .iter()
        .map(|s| similarity(s, patch))
        .fold(0.0f64, f64::max);
    1.0 - best
}

/// Reservoir insertion: push below `depth`, otherwise overwrite a uniformly
/// chosen entry. Depth 0 disables the pool.
fn add_patch<R: Rng + ?Sized>(pool: &mut Vec<GrayImage>, patch: GrayImage, depth: usize, rng: &mut R) {
    if depth == 0 {
        return;
    }
    if pool.len() < depth {
        pool.push(patch);
    } else {
        let idx = rng.gen_range(0..pool.len());
        pool[idx] = patch;
    }
}

/// An [`ObjectModel`] bound to the frame its candidates come from.
#[derive(Debug, Clone, Copy)]
pub struct ModelVerifier<'a> {
    model: &'a ObjectModel,
    frame: &'a GrayImage,
}

impl CandidateVerifier for ModelVerifier<'_> {
    fn verify(&self, strobe: Rect) -> f64 {
        self.model.predict_candidate(self.frame, strobe)
    }
}
