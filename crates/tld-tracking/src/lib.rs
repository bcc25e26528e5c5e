//! TLD Tracking - Learning, detection and short-term tracking
//!
//! The experts of the tracker and the session that drives them:
//! - Fern descriptors over a multi-scale scanning grid
//! - Ensemble classifier and sliding-window detector
//! - Template model for verification
//! - Optical-flow tracker and the rule-based integrator

pub mod augmentator;
pub mod classifier;
pub mod detector;
pub mod feature_extractor;
pub mod fern;
pub mod flow_tracker;
pub mod integrator;
pub mod model;
pub mod motion;
pub mod pyramid;
pub mod scanning_grid;
pub mod settings;
pub mod tld_tracker;

pub use augmentator::{Augmentator, ObjectClass, TransformPars};
pub use classifier::ObjectClassifier;
pub use detector::ObjectDetector;
pub use feature_extractor::{Descriptor, FernFeatureExtractor};
pub use fern::Fern;
pub use flow_tracker::{FlowTracker, TrackerState};
pub use integrator::{CandidateVerifier, IntegrationBranch, Integrator};
pub use model::{ModelVerifier, ObjectModel};
pub use motion::{LucasKanade, MotionEstimator};
pub use scanning_grid::{ScanPosition, ScanningGrid};
pub use settings::{
    DetectorSettings, FlowTrackerSettings, IntegratorSettings, LucasKanadeSettings, ModelSettings,
    ProbabilityWindow, Settings,
};
pub use tld_tracker::{TldStatus, TldTracker};
