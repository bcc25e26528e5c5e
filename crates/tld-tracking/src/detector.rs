//! Sliding-window object detector built on a fern ensemble.

use crate::augmentator::{Augmentator, ObjectClass, TransformPars};
use crate::classifier::ObjectClassifier;
use crate::feature_extractor::FernFeatureExtractor;
use crate::fern::Fern;
use crate::scanning_grid::{ScanPosition, ScanningGrid};
use crate::settings::DetectorSettings;
use rand::Rng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use tld_core::{Candidate, GrayImage, ProposalSource, Rect, Result, Size};
use tracing::{debug, info, warn};

/// One independent (fern, grid, classifier) voter.
#[derive(Debug, Clone)]
struct EnsembleMember {
    grid: ScanningGrid,
    classifier: ObjectClassifier,
}

impl EnsembleMember {
    fn extractor(&self) -> FernFeatureExtractor<'_> {
        FernFeatureExtractor::new(&self.grid)
    }
}

/// Ensemble detector scanning every window of every scale.
#[derive(Debug, Clone)]
pub struct ObjectDetector {
    settings: DetectorSettings,
    frame_size: Size,
    designation: Rect,
    members: Vec<EnsembleMember>,
}

impl ObjectDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            frame_size: Size::default(),
            designation: Rect::default(),
            members: Vec::new(),
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Current reference box of the grids.
    pub fn designation(&self) -> Rect {
        self.designation
    }

    pub fn ensemble_len(&self) -> usize {
        self.members.len()
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    /// Grid of the first ensemble member, if any.
    pub fn grid(&self) -> Option<&ScanningGrid> {
        self.members.first().map(|m| &m.grid)
    }

    /// Rebuild the ensemble around `target` and train it on augmented
    /// samples of `frame`.
    pub fn set_target<R: Rng + ?Sized>(
        &mut self,
        frame: &GrayImage,
        target: Rect,
        rng: &mut R,
    ) -> Result<()> {
        let s = &self.settings;
        let frame_size = frame.size();
        let mut members = Vec::with_capacity(s.ensemble_size);
        for _ in 0..s.ensemble_size {
            let fern = Arc::new(Fern::new(s.descriptor_width, rng)?);
            let grid = ScanningGrid::new(fern, frame_size, target.size(), s.overlap, &s.scales)?;
            members.push(EnsembleMember {
                grid,
                classifier: ObjectClassifier::new(s.descriptor_width),
            });
        }
        self.members = members;
        self.frame_size = frame_size;
        self.designation = target;

        let half_x = 0.5 * s.overlap * target.width as f64;
        let half_y = 0.5 * s.overlap * target.height as f64;
        let pars = TransformPars {
            angles: s.init_angles.clone(),
            scales: s.init_scales.clone(),
            translation_x: vec![-half_x, 0.0, half_x],
            translation_y: vec![-half_y, 0.0, half_y],
            overlap: s.overlap,
            disp_threshold: s.stddev_relative_threshold,
            positive_limit: None,
            negative_limit: None,
        };
        let mut aug = Augmentator::new(frame, target, pars);
        self.init_train(&mut aug);

        info!(
            target = ?target,
            members = self.members.len(),
            windows = self.grid().map_or(0, |g| g.window_count()),
            "Detector target set"
        );
        Ok(())
    }

    /// Every positive trains every member; negatives train a member only
    /// while its negative count for the descriptor stays below the
    /// saturation share of its largest positive count.
    fn init_train(&mut self, aug: &mut Augmentator<'_>) {
        let positives = aug.sample(ObjectClass::Positive);
        if positives.is_empty() {
            warn!(target = ?aug.target(), "Detector init produced no positive samples");
        }
        for patch in &positives {
            for member in &mut self.members {
                let d = member.extractor().descriptor(patch);
                member.classifier.train_positive(d);
            }
        }

        let saturation = self.settings.init_saturation;
        let negatives = aug.sample(ObjectClass::Negative);
        for patch in &negatives {
            for member in &mut self.members {
                let d = member.extractor().descriptor(patch);
                let cap = (member.classifier.max_positive() as f64 * saturation) as usize;
                if member.classifier.negative(d) < cap {
                    member.classifier.train_negative(d);
                }
            }
        }
        debug!(
            positives = positives.len(),
            negatives = negatives.len(),
            "Detector init training"
        );
    }

    /// Score every scan window and return the best ones, highest first.
    ///
    /// Windows must score strictly above the detection threshold. Equal
    /// scores keep scan order.
    pub fn detect(&self, frame: &GrayImage) -> Vec<Candidate> {
        let Some(reference) = self.members.first() else {
            return Vec::new();
        };
        if frame.size() != self.frame_size {
            warn!(
                frame = ?frame.size(),
                expected = ?self.frame_size,
                "Frame size differs from detector grid"
            );
            return Vec::new();
        }

        let threshold = self.settings.detection_probability_threshold;
        let rows: Vec<(usize, i32)> = reference
            .grid
            .levels()
            .iter()
            .enumerate()
            .flat_map(|(scale_id, level)| (0..level.positions.height).map(move |y| (scale_id, y)))
            .collect();

        let mut hits: Vec<Candidate> = rows
            .par_iter()
            .flat_map_iter(|&(scale_id, y)| {
                let columns = reference.grid.levels()[scale_id].positions.width;
                (0..columns).filter_map(move |x| {
                    let position = ScanPosition::new(x, y);
                    let prob = self.window_score(frame, position, scale_id);
                    (prob > threshold).then(|| {
                        Candidate::new(
                            reference.grid.window(position, scale_id),
                            prob,
                            ProposalSource::Detector,
                        )
                    })
                })
            })
            .collect();

        let above_threshold = hits.len();
        hits.sort_by(|a, b| b.prob.partial_cmp(&a.prob).unwrap_or(Ordering::Equal));
        hits.truncate(self.settings.max_candidates);
        debug!(above_threshold, returned = hits.len(), "Detector scan");
        hits
    }

    fn window_score(&self, frame: &GrayImage, position: ScanPosition, scale_id: usize) -> f64 {
        let sum: f64 = self
            .members
            .iter()
            .map(|m| {
                m.classifier
                    .predict(m.extractor().descriptor_at(frame, position, scale_id))
            })
            .sum();
        sum / self.members.len() as f64
    }

    /// Mean posterior of the ensemble for a whole patch; 0 without members.
    pub fn ensemble_prediction(&self, patch: &GrayImage) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .members
            .iter()
            .map(|m| m.classifier.predict(m.extractor().descriptor(patch)))
            .sum();
        sum / self.members.len() as f64
    }

    /// P-N learning step around a confirmed prediction.
    ///
    /// Positives are learned only when the ensemble scores them inside the
    /// positive window, negatives only inside the negative window.
    pub fn train(&mut self, frame: &GrayImage, prediction: &Candidate) {
        if self.members.is_empty() {
            return;
        }
        let s = &self.settings;
        let pars = TransformPars {
            angles: s.training_angles.clone(),
            scales: s.training_scales.clone(),
            translation_x: vec![0.0],
            translation_y: vec![0.0],
            overlap: s.overlap,
            disp_threshold: s.stddev_relative_threshold,
            positive_limit: None,
            negative_limit: None,
        };
        let (pos_window, neg_window) = (s.positive_window, s.negative_window);
        let mut aug = Augmentator::new(frame, prediction.strobe, pars);

        let mut learned_pos = 0usize;
        for patch in aug.sample(ObjectClass::Positive) {
            if pos_window.contains(self.ensemble_prediction(&patch)) {
                for member in &mut self.members {
                    let d = member.extractor().descriptor(&patch);
                    member.classifier.train_positive(d);
                }
                learned_pos += 1;
            }
        }

        let mut learned_neg = 0usize;
        for patch in aug.sample(ObjectClass::Negative) {
            if neg_window.contains(self.ensemble_prediction(&patch)) {
                for member in &mut self.members {
                    let d = member.extractor().descriptor(&patch);
                    member.classifier.train_negative(d);
                }
                learned_neg += 1;
            }
        }
        debug!(learned_pos, learned_neg, "Detector training");
    }

    /// Re-lay every grid around the prediction's size, keeping ferns and
    /// classifiers. Nothing changes unless every grid builds.
    pub fn update_grid(&mut self, reference: &Candidate) -> Result<()> {
        let base = reference.strobe.size();
        let grids = self
            .members
            .iter()
            .map(|m| m.grid.with_base(base))
            .collect::<Result<Vec<_>>>()?;
        for (member, grid) in self.members.iter_mut().zip(grids) {
            member.grid = grid;
        }
        self.designation = reference.strobe;
        info!(base = ?base, "Detector grids rebuilt");
        Ok(())
    }

    /// Classifier of ensemble member `index`.
    pub fn classifier(&self, index: usize) -> Option<&ObjectClassifier> {
        self.members.get(index).map(|m| &m.classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Noise background with a bright textured square.
    fn scene(target: Rect, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut frame = GrayImage::from_fn(160, 120, |_, _| rng.gen_range(60..90));
        for y in target.y..target.bottom() {
            for x in target.x..target.right() {
                let v = if ((x - target.x) / 4 + (y - target.y) / 4) % 2 == 0 { 250 } else { 10 };
                frame.set(x as u32, y as u32, v);
            }
        }
        frame
    }

    fn small_settings() -> DetectorSettings {
        DetectorSettings {
            ensemble_size: 4,
            ..DetectorSettings::default()
        }
    }

    #[test]
    fn test_set_target_builds_ensemble() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 1);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(det.ensemble_len(), 4);
        assert_eq!(det.designation(), target);
        assert!(det.classifier(0).unwrap().max_positive() > 0);
    }

    #[test]
    fn test_set_target_too_large_is_fatal() {
        let frame = GrayImage::new(100, 100);
        let mut det = ObjectDetector::new(small_settings());
        let err = det.set_target(&frame, Rect::new(0, 0, 90, 90), &mut StdRng::seed_from_u64(0));
        assert!(err.is_err());
    }

    #[test]
    fn test_detect_finds_trained_target() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 1);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(9)).unwrap();

        let proposals = det.detect(&frame);
        assert!(!proposals.is_empty());
        assert!(proposals.len() <= 16);
        assert!(proposals.windows(2).all(|w| w[0].prob >= w[1].prob));
        assert!(proposals.iter().all(|c| c.prob > 0.5 && c.source == ProposalSource::Detector));
        assert!(proposals.iter().any(|c| c.strobe.iou(target) > 0.5));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 2);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(det.detect(&frame), det.detect(&frame));
    }

    #[test]
    fn test_detect_rejects_other_frame_size() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 1);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(9)).unwrap();
        assert!(det.detect(&GrayImage::new(80, 60)).is_empty());
        assert!(ObjectDetector::new(small_settings()).detect(&frame).is_empty());
    }

    #[test]
    fn test_update_grid_keeps_classifiers() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 1);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(9)).unwrap();
        let before = det.classifier(0).unwrap().max_positive();

        let moved = Candidate::new(Rect::new(50, 30, 40, 30), 0.9, ProposalSource::Final);
        det.update_grid(&moved).unwrap();
        assert_eq!(det.designation(), moved.strobe);
        assert_eq!(det.grid().unwrap().base_bbox(), Size::new(40, 30));
        assert_eq!(det.classifier(0).unwrap().max_positive(), before);

        let huge = Candidate::new(Rect::new(0, 0, 150, 110), 0.9, ProposalSource::Final);
        assert!(det.update_grid(&huge).is_err());
        assert_eq!(det.designation(), moved.strobe);
    }

    #[test]
    fn test_train_keeps_target_recognized() {
        let target = Rect::new(60, 40, 32, 24);
        let frame = scene(target, 5);
        let mut det = ObjectDetector::new(small_settings());
        det.set_target(&frame, target, &mut StdRng::seed_from_u64(1)).unwrap();
        let patch = frame.subframe(target);
        assert!(det.ensemble_prediction(&patch) > 0.5);

        let prediction = Candidate::new(target, 0.9, ProposalSource::Final);
        det.train(&frame, &prediction);
        assert!(det.ensemble_prediction(&patch) > 0.5);
    }
}
