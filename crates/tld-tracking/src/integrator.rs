//! Rule-based fusion of detector clusters and the tracker proposal.

use crate::settings::IntegratorSettings;
use std::cmp::Ordering;
use tld_core::{aggregate, clusterize, Candidate, ProposalSource, Rect};
use tracing::debug;

/// Scores a box against the appearance model, in `[0, 1]`.
pub trait CandidateVerifier {
    fn verify(&self, strobe: Rect) -> f64;
}

impl<F: Fn(Rect) -> f64> CandidateVerifier for F {
    fn verify(&self, strobe: Rect) -> f64 {
        self(strobe)
    }
}

/// Which rule produced the last decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationBranch {
    #[default]
    Idle,
    TrackerReliable,
    TrackerUnreliable,
    NoReliableProposals,
    DetectorBetterThanTracker,
    DetectorCloseToTracker,
    ClustersFarFromTracker,
    ClustersCloseToTracker,
    NoReliableResults,
    SingleDetectorCluster,
    DominantDetectorCluster,
    NoDominantCluster,
}

impl IntegrationBranch {
    pub fn message(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::TrackerReliable => "Only tracker's reliable result",
            Self::TrackerUnreliable => "Only tracker's unreliable result",
            Self::NoReliableProposals => "No reliable proposals",
            Self::DetectorBetterThanTracker => "One detector cluster better than tracker",
            Self::DetectorCloseToTracker => "One detector & tracker are close",
            Self::ClustersFarFromTracker => "Few detector clusters far from tracker",
            Self::ClustersCloseToTracker => "Few detector clusters & tracker are close",
            Self::NoReliableResults => "No reliable results",
            Self::SingleDetectorCluster => "One detector cluster",
            Self::DominantDetectorCluster => "Most confident detector cluster",
            Self::NoDominantCluster => "No dominant detector cluster",
        }
    }

    /// Whether the branch yields a valid prediction.
    pub fn is_valid(self) -> bool {
        !matches!(
            self,
            Self::Idle
                | Self::NoReliableProposals
                | Self::ClustersFarFromTracker
                | Self::NoReliableResults
                | Self::NoDominantCluster
        )
    }
}

/// Decision state of the last [`Integrator::integrate`] call.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    settings: IntegratorSettings,
    clusters: Vec<Candidate>,
    branch: IntegrationBranch,
    training_enable: bool,
    relocation_enable: bool,
}

impl Integrator {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    /// Verified detector clusters, most confident first.
    pub fn clusters(&self) -> &[Candidate] {
        &self.clusters
    }

    pub fn branch(&self) -> IntegrationBranch {
        self.branch
    }

    pub fn status_message(&self) -> &'static str {
        self.branch.message()
    }

    pub fn training_enabled(&self) -> bool {
        self.training_enable
    }

    pub fn relocation_enabled(&self) -> bool {
        self.relocation_enable
    }

    pub fn reset(&mut self) {
        self.clusters.clear();
        self.branch = IntegrationBranch::Idle;
        self.training_enable = false;
        self.relocation_enable = false;
    }

    /// Fuse one frame's proposals into a single prediction.
    pub fn integrate<V: CandidateVerifier + ?Sized>(
        &mut self,
        detections: &[Candidate],
        tracker: &Candidate,
        verifier: &V,
    ) -> Candidate {
        let s = &self.settings;
        let mut clusters: Vec<Candidate> = clusterize(detections, s.clusterization_iou_threshold)
            .into_iter()
            .map(|c| {
                let aux = verifier.verify(c.strobe);
                c.with_aux_prob(aux)
            })
            .filter(|c| c.aux_prob >= s.model_prob_threshold)
            .collect();
        clusters.sort_by(|a, b| b.aux_prob.partial_cmp(&a.aux_prob).unwrap_or(Ordering::Equal));

        let tracker = tracker.with_aux_prob(verifier.verify(tracker.strobe));
        let reliable = tracker.valid && tracker.aux_prob > s.model_prob_threshold;

        let (branch, prediction, training, relocation) = if reliable {
            self.decide_with_tracker(&clusters, &tracker)
        } else {
            self.decide_without_tracker(&clusters, &tracker)
        };

        debug!(
            clusters = clusters.len(),
            tracker_aux = tracker.aux_prob,
            branch = branch.message(),
            training,
            relocation,
            "Integration"
        );
        self.clusters = clusters;
        self.branch = branch;
        self.training_enable = training;
        self.relocation_enable = relocation;
        prediction
    }

    fn decide_with_tracker(
        &self,
        clusters: &[Candidate],
        tracker: &Candidate,
    ) -> (IntegrationBranch, Candidate, bool, bool) {
        let s = &self.settings;
        let confident: Vec<Candidate> = clusters
            .iter()
            .filter(|c| c.aux_prob > tracker.aux_prob)
            .copied()
            .collect();

        match confident.as_slice() {
            [] => {
                if tracker.aux_prob > s.tracker_accept_prob {
                    let out = Candidate::new(tracker.strobe, tracker.aux_prob, ProposalSource::Tracker)
                        .with_aux_prob(tracker.aux_prob);
                    if tracker.aux_prob > s.tracker_training_prob {
                        (IntegrationBranch::TrackerReliable, out, true, false)
                    } else {
                        (IntegrationBranch::TrackerUnreliable, out, false, false)
                    }
                } else {
                    (IntegrationBranch::NoReliableProposals, rejected(tracker), false, false)
                }
            }
            [cluster] => {
                if cluster.strobe.iou(tracker.strobe) < s.close_iou_threshold {
                    let out = Candidate::new(cluster.strobe, cluster.aux_prob, ProposalSource::Detector)
                        .with_aux_prob(cluster.aux_prob);
                    let relocation = cluster.aux_prob > s.detector_relocation_prob;
                    (IntegrationBranch::DetectorBetterThanTracker, out, false, relocation)
                } else {
                    let out = merged(&[*cluster, *tracker], tracker);
                    (IntegrationBranch::DetectorCloseToTracker, out, true, false)
                }
            }
            _ => {
                let mut close: Vec<Candidate> = confident
                    .iter()
                    .filter(|c| c.strobe.iou(tracker.strobe) > s.close_iou_threshold)
                    .copied()
                    .collect();
                if close.is_empty() {
                    (IntegrationBranch::ClustersFarFromTracker, rejected(tracker), false, false)
                } else {
                    close.push(*tracker);
                    let out = merged(&close, tracker);
                    (IntegrationBranch::ClustersCloseToTracker, out, true, false)
                }
            }
        }
    }

    fn decide_without_tracker(
        &self,
        clusters: &[Candidate],
        tracker: &Candidate,
    ) -> (IntegrationBranch, Candidate, bool, bool) {
        let s = &self.settings;
        match clusters {
            [] => (IntegrationBranch::NoReliableResults, rejected(tracker), false, false),
            [cluster] => {
                let stable = cluster.prob > s.single_detector_prob
                    || cluster.aux_prob > s.single_detector_aux_prob;
                let out = Candidate::new(cluster.strobe, cluster.aux_prob, ProposalSource::Detector)
                    .with_aux_prob(cluster.aux_prob);
                (IntegrationBranch::SingleDetectorCluster, out, true, stable)
            }
            [top, ..] => {
                if top.aux_prob > s.dominant_detector_prob {
                    let out = Candidate::new(top.strobe, top.aux_prob, ProposalSource::Detector)
                        .with_aux_prob(top.aux_prob);
                    (IntegrationBranch::DominantDetectorCluster, out, false, false)
                } else {
                    (IntegrationBranch::NoDominantCluster, rejected(tracker), false, false)
                }
            }
        }
    }
}

/// Invalid prediction kept at the tracker's box.
fn rejected(tracker: &Candidate) -> Candidate {
    Candidate::invalid(tracker.strobe, ProposalSource::Mixed)
}

/// Aggregate of agreeing proposals, scored by its best verification.
fn merged(members: &[Candidate], tracker: &Candidate) -> Candidate {
    match aggregate(members) {
        Some(agg) => Candidate {
            prob: agg.aux_prob,
            valid: true,
            source: ProposalSource::Mixed,
            ..agg
        },
        None => rejected(tracker),
    }
}
