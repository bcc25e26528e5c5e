//! Tracker configuration.
//!
//! Every policy constant of the tracker lives here. Settings are plain serde
//! structs: missing JSON fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use tld_core::{Result, Size, TldError};

/// Widest supported binary descriptor; descriptors are stored in a `u16`.
pub const MAX_DESCRIPTOR_WIDTH: usize = 16;

/// Default generator seed.
pub const DEFAULT_SEED: u64 = 2024;

/// Closed interval of ensemble scores that admits a training sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityWindow {
    pub min: f64,
    pub max: f64,
}

impl ProbabilityWindow {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, prob: f64) -> bool {
        prob >= self.min && prob <= self.max
    }
}

/// Top-level tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detector: DetectorSettings,
    pub model: ModelSettings,
    pub integrator: IntegratorSettings,
    pub flow_tracker: FlowTrackerSettings,
    /// Box filter size applied to frames before detection.
    pub blur_kernel: u32,
    /// Seed of the generator used for fern layout and pool replacement.
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detector: DetectorSettings::default(),
            model: ModelSettings::default(),
            integrator: IntegratorSettings::default(),
            flow_tracker: FlowTrackerSettings::default(),
            blur_kernel: 7,
            seed: DEFAULT_SEED,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| TldError::Serialization(format!("Invalid settings: {}", e)))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TldError::Serialization(format!("Failed to serialize settings: {}", e)))
    }

    /// Reject settings the tracker cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.ensemble_size == 0 {
            return Err(invalid("detector ensemble is empty"));
        }
        if d.descriptor_width == 0 || d.descriptor_width > MAX_DESCRIPTOR_WIDTH {
            return Err(invalid(format!(
                "descriptor width {} outside 1..={}",
                d.descriptor_width, MAX_DESCRIPTOR_WIDTH
            )));
        }
        if d.overlap <= 0.0 {
            return Err(invalid("detector overlap must be positive"));
        }
        if d.scales.is_empty() || d.scales.iter().any(|&s| s <= 0.0) {
            return Err(invalid("detector scales must be positive and non-empty"));
        }
        let m = &self.model;
        if m.patch_size.width <= 0 || m.patch_size.height <= 0 {
            return Err(invalid("model patch size must be positive"));
        }
        if m.scales.iter().any(|&s| s <= 0.0) {
            return Err(invalid("model scales must be positive"));
        }
        if m.init_overlap <= 0.0 || m.overlap <= 0.0 {
            return Err(invalid("model overlap must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> TldError {
    TldError::InvalidConfiguration(msg.into())
}

/// Sliding-window detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Number of (fern, grid, classifier) ensemble members.
    pub ensemble_size: usize,
    /// Bits per descriptor.
    pub descriptor_width: usize,
    pub overlap: f64,
    pub scales: Vec<f64>,
    /// Scan windows must score strictly above this.
    pub detection_probability_threshold: f64,
    pub max_candidates: usize,
    pub init_angles: Vec<f64>,
    pub init_scales: Vec<f64>,
    pub training_angles: Vec<f64>,
    pub training_scales: Vec<f64>,
    /// Negatives must exceed this fraction of the target's intensity spread.
    pub stddev_relative_threshold: f64,
    /// Cap on initial negative counts relative to the positive maximum.
    pub init_saturation: f64,
    pub positive_window: ProbabilityWindow,
    pub negative_window: ProbabilityWindow,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            ensemble_size: 10,
            descriptor_width: 11,
            overlap: 0.1,
            scales: vec![0.8, 1.0, 1.2],
            detection_probability_threshold: 0.5,
            max_candidates: 16,
            init_angles: vec![-20.0, -10.0, 0.0, 10.0, 20.0],
            init_scales: vec![0.9, 1.0, 1.1],
            training_angles: vec![-10.0, 0.0, 10.0],
            training_scales: vec![1.0],
            stddev_relative_threshold: 0.5,
            init_saturation: 0.5,
            positive_window: ProbabilityWindow::new(0.0, 0.8),
            negative_window: ProbabilityWindow::new(0.2, 1.0),
        }
    }
}

/// Template model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Canonical patch size every template is resized to.
    pub patch_size: Size,
    /// Capacity of each template pool; 0 disables insertion.
    pub sample_depth: usize,
    pub scales: Vec<f64>,
    pub init_overlap: f64,
    pub overlap: f64,
    pub init_angles: Vec<f64>,
    pub training_angles: Vec<f64>,
    pub init_positive_limit: Option<usize>,
    pub init_negative_limit: Option<usize>,
    pub init_disp_threshold: f64,
    pub training_positive_limit: Option<usize>,
    pub training_negative_limit: Option<usize>,
    pub training_disp_threshold: f64,
    /// Positive patches are only added while the model scores them below this.
    pub positive_add_ceiling: f64,
    /// Negative patches are only added while the model scores them above this.
    pub negative_add_floor: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            patch_size: Size::new(15, 15),
            sample_depth: 100,
            scales: vec![1.0],
            init_overlap: 0.5,
            overlap: 1.0,
            init_angles: (-6..=6).map(|i| i as f64 * 15.0).collect(),
            training_angles: vec![-15.0, 0.0, 15.0],
            init_positive_limit: Some(100),
            init_negative_limit: Some(100),
            init_disp_threshold: 0.1,
            training_positive_limit: Some(100),
            training_negative_limit: Some(24),
            training_disp_threshold: 0.25,
            positive_add_ceiling: 0.9,
            negative_add_floor: 0.1,
        }
    }
}

/// Thresholds of the expert integration rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub clusterization_iou_threshold: f64,
    /// Clusters and tracker proposals verified below this are discarded.
    pub model_prob_threshold: f64,
    /// Clusters overlapping the tracker above this are "close".
    pub close_iou_threshold: f64,
    pub tracker_accept_prob: f64,
    pub tracker_training_prob: f64,
    pub detector_relocation_prob: f64,
    pub single_detector_prob: f64,
    pub single_detector_aux_prob: f64,
    pub dominant_detector_prob: f64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            clusterization_iou_threshold: 0.5,
            model_prob_threshold: 0.3,
            close_iou_threshold: 0.75,
            tracker_accept_prob: 0.4,
            tracker_training_prob: 0.7,
            detector_relocation_prob: 0.65,
            single_detector_prob: 0.7,
            single_detector_aux_prob: 0.8,
            dominant_detector_prob: 0.95,
        }
    }
}

/// Optical-flow tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTrackerSettings {
    pub max_points: usize,
    /// Maximum forward-backward round-trip error in pixels.
    pub fb_threshold: f64,
    /// Below this many surviving points the proposal is rejected outright.
    pub min_survivors: usize,
    pub valid_survivors: usize,
    /// The proposal is valid only if more points than this were selected.
    pub valid_selected: usize,
    pub lucas_kanade: LucasKanadeSettings,
}

impl Default for FlowTrackerSettings {
    fn default() -> Self {
        Self {
            max_points: 100,
            fb_threshold: 1.0,
            min_survivors: 4,
            valid_survivors: 3,
            valid_selected: 10,
            lucas_kanade: LucasKanadeSettings::default(),
        }
    }
}

/// Corner selection and pyramidal Lucas-Kanade parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LucasKanadeSettings {
    /// Half-size of the square integration window.
    pub window_half_size: i32,
    pub pyramid_levels: u32,
    pub max_iterations: u32,
    pub epsilon: f64,
    /// Side of the structure-tensor block used for corner response.
    pub corner_block_size: i32,
    /// Corners weaker than this fraction of the best response are dropped.
    pub corner_quality: f64,
    pub corner_min_distance: f64,
}

impl Default for LucasKanadeSettings {
    fn default() -> Self {
        Self {
            window_half_size: 2,
            pyramid_levels: 4,
            max_iterations: 100,
            epsilon: 0.01,
            corner_block_size: 7,
            corner_quality: 0.01,
            corner_min_distance: 10.0,
        }
    }
}
