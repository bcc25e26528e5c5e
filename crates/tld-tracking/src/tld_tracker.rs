//! Tracking-Learning-Detection session: detector, model, flow tracker and
//! integrator driven frame by frame.

use crate::detector::ObjectDetector;
use crate::flow_tracker::FlowTracker;
use crate::integrator::Integrator;
use crate::model::ObjectModel;
use crate::motion::{LucasKanade, MotionEstimator};
use crate::settings::Settings;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use tld_core::{Candidate, GrayImage, ProposalSource, Rect, Result, TldError};
use tracing::{debug, info};

/// Snapshot of the session after the last processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TldStatus {
    pub processing: bool,
    pub valid: bool,
    pub training: bool,
    pub relocation: bool,
    pub detector_candidates: usize,
    pub detector_clusters: usize,
    pub message: &'static str,
    pub prediction: Candidate,
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "enable"
    } else {
        "disable"
    }
}

impl fmt::Display for TldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.prediction;
        writeln!(f, "<TLD tracker>")?;
        writeln!(f, "Processing:         {}", on_off(self.processing))?;
        writeln!(f, "Target:             {}", if self.valid { "valid" } else { "invalid" })?;
        writeln!(f, "Probability:        {:.6}", p.prob)?;
        writeln!(f, "Size (W/H):         {}/{}", p.strobe.width, p.strobe.height)?;
        writeln!(f, "Origin (X/Y):       {}/{}", p.strobe.x, p.strobe.y)?;
        writeln!(f, "Training status:    {}", on_off(self.training))?;
        writeln!(f, "Relocation flag:    {}", on_off(self.relocation))?;
        writeln!(f, "Detector proposals: {}", self.detector_candidates)?;
        writeln!(f, "Detector clusters:  {}", self.detector_clusters)?;
        write!(f, "Status:             {}", self.message)
    }
}

/// Single-object tracker fusing detection, verification and optical flow.
pub struct TldTracker<M: MotionEstimator = LucasKanade> {
    settings: Settings,
    rng: StdRng,
    detector: ObjectDetector,
    model: ObjectModel,
    tracker: FlowTracker<M>,
    integrator: Integrator,
    frame: Option<GrayImage>,
    blurred: Option<GrayImage>,
    active: bool,
    proposals: Vec<Candidate>,
    tracker_proposal: Candidate,
    prediction: Candidate,
    training: bool,
    relocation: bool,
}

impl TldTracker<LucasKanade> {
    /// Tracker with the built-in Lucas-Kanade motion estimator.
    pub fn new(settings: Settings) -> Result<Self> {
        let estimator = LucasKanade::new(settings.flow_tracker.lucas_kanade.clone());
        Self::with_estimator(settings, estimator)
    }
}

impl<M: MotionEstimator> TldTracker<M> {
    pub fn with_estimator(settings: Settings, estimator: M) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(settings.seed),
            detector: ObjectDetector::new(settings.detector.clone()),
            model: ObjectModel::new(settings.model.clone()),
            tracker: FlowTracker::new(settings.flow_tracker.clone(), estimator),
            integrator: Integrator::new(settings.integrator.clone()),
            settings,
            frame: None,
            blurred: None,
            active: false,
            proposals: Vec::new(),
            tracker_proposal: Candidate::default(),
            prediction: Candidate::default(),
            training: false,
            relocation: false,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_processing(&self) -> bool {
        self.active
    }

    /// Begin tracking `target` in the last processed frame.
    pub fn start_tracking(&mut self, target: Rect) -> Result<()> {
        let (Some(frame), Some(blurred)) = (&self.frame, &self.blurred) else {
            return Err(TldError::NoFrame);
        };
        if target.is_empty() {
            return Err(TldError::InvalidConfiguration(format!(
                "empty target {}x{}",
                target.width, target.height
            )));
        }
        self.detector.set_target(blurred, target, &mut self.rng)?;
        self.model.set_target(frame, target, &mut self.rng);
        self.tracker.set_target(target);
        self.integrator.reset();
        self.proposals.clear();
        self.tracker_proposal = Candidate::new(target, 1.0, ProposalSource::Tracker);
        self.prediction = Candidate::new(target, 1.0, ProposalSource::Final);
        self.training = false;
        self.relocation = false;
        self.active = true;
        info!(target = ?target, "Tracking started");
        Ok(())
    }

    pub fn stop_tracking(&mut self) {
        if self.active {
            info!("Tracking stopped");
        }
        self.active = false;
        self.tracker.reset();
        self.training = false;
        self.relocation = false;
    }

    /// Feed the next frame and return the current prediction.
    pub fn process_frame(&mut self, input: &GrayImage) -> Result<Candidate> {
        let frame = input.clone();
        let blurred = frame.box_blur(self.settings.blur_kernel);
        self.tracker.set_frame(frame.clone());
        self.frame = Some(frame);
        self.blurred = Some(blurred);

        if self.active {
            self.step()?;
        }
        self.prediction.source = ProposalSource::Final;
        Ok(self.prediction)
    }

    fn step(&mut self) -> Result<()> {
        let (Some(frame), Some(blurred)) = (&self.frame, &self.blurred) else {
            return Err(TldError::NoFrame);
        };
        self.proposals = self.detector.detect(blurred);
        self.tracker_proposal = self.tracker.track();

        let verifier = self.model.verifier(frame);
        let prediction = self
            .integrator
            .integrate(&self.proposals, &self.tracker_proposal, &verifier);
        self.training = self.integrator.training_enabled();
        self.relocation = self.integrator.relocation_enabled();

        if self.training {
            self.detector.train(blurred, &prediction);
            self.detector.update_grid(&prediction)?;
            self.model.train(frame, &prediction, &mut self.rng);
        }
        let next = if self.relocation {
            prediction.strobe
        } else {
            self.tracker_proposal.strobe
        };
        self.tracker.set_target(next);

        debug!(
            proposals = self.proposals.len(),
            survivors = self.tracker.survivors(),
            valid = prediction.valid,
            prob = prediction.prob,
            "Frame processed"
        );
        self.prediction = prediction;
        Ok(())
    }

    pub fn status(&self) -> TldStatus {
        TldStatus {
            processing: self.active,
            valid: self.prediction.valid,
            training: self.training,
            relocation: self.relocation,
            detector_candidates: self.proposals.len(),
            detector_clusters: self.integrator.clusters().len(),
            message: self.integrator.status_message(),
            prediction: self.prediction,
        }
    }

    /// Positive and negative model templates.
    pub fn model_samples(&self) -> (&[GrayImage], &[GrayImage]) {
        (self.model.positive_samples(), self.model.negative_samples())
    }

    pub fn detector_proposals(&self) -> &[Candidate] {
        &self.proposals
    }

    pub fn clusters(&self) -> &[Candidate] {
        self.integrator.clusters()
    }

    pub fn tracker_proposal(&self) -> Candidate {
        self.tracker_proposal
    }

    pub fn current_prediction(&self) -> Candidate {
        self.prediction
    }

    pub fn detector(&self) -> &ObjectDetector {
        &self.detector
    }

    pub fn model(&self) -> &ObjectModel {
        &self.model
    }
}
