//! Integration tests for the decision rules of the integrator.
//!
//! Verification scores come from closures keyed on the box origin, so every
//! branch can be reached without a trained model.

use tld_core::{Candidate, ProposalSource, Rect};
use tld_tracking::{IntegrationBranch, Integrator, IntegratorSettings};

// ── Helpers ────────────────────────────────────────────────────

const SIDE: i32 = 40;

fn boxed(x: i32) -> Rect {
    Rect::new(x, 10, SIDE, SIDE)
}

fn detection(x: i32, prob: f64) -> Candidate {
    Candidate::new(boxed(x), prob, ProposalSource::Detector)
}

fn tracker(valid: bool) -> Candidate {
    let c = Candidate::new(boxed(0), 0.9, ProposalSource::Tracker);
    if valid {
        c
    } else {
        Candidate::invalid(c.strobe, ProposalSource::Tracker)
    }
}

/// Verifier returning the score listed for a box origin, 0 otherwise.
fn scores(table: &[(i32, f64)]) -> impl Fn(Rect) -> f64 + '_ {
    move |r: Rect| {
        table
            .iter()
            .find(|(x, _)| *x == r.x)
            .map_or(0.0, |(_, s)| *s)
    }
}

fn integrator() -> Integrator {
    Integrator::new(IntegratorSettings::default())
}

fn assert_rejected(out: &Candidate, integrator: &Integrator) {
    assert!(!out.valid);
    assert_eq!(out.source, ProposalSource::Mixed);
    assert_eq!(out.prob, 0.0);
    assert_eq!(out.strobe, boxed(0));
    assert!(!integrator.training_enabled());
    assert!(!integrator.relocation_enabled());
}

// ── Reliable tracker ───────────────────────────────────────────

#[test]
fn reliable_tracker_without_detections_trains() {
    let mut it = integrator();
    let out = it.integrate(&[], &tracker(true), &scores(&[(0, 0.75)]));
    assert_eq!(it.branch(), IntegrationBranch::TrackerReliable);
    assert_eq!(it.status_message(), "Only tracker's reliable result");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Tracker);
    assert_eq!(out.strobe, boxed(0));
    assert!((out.prob - 0.75).abs() < 1e-12);
    assert!(it.training_enabled());
    assert!(!it.relocation_enabled());
}

#[test]
fn moderately_confident_tracker_does_not_train() {
    let mut it = integrator();
    let out = it.integrate(&[], &tracker(true), &scores(&[(0, 0.55)]));
    assert_eq!(it.branch(), IntegrationBranch::TrackerUnreliable);
    assert_eq!(it.status_message(), "Only tracker's unreliable result");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Tracker);
    assert!(!it.training_enabled());
    assert!(!it.relocation_enabled());
}

#[test]
fn weak_tracker_yields_no_proposal() {
    let mut it = integrator();
    let out = it.integrate(&[], &tracker(true), &scores(&[(0, 0.35)]));
    assert_eq!(it.branch(), IntegrationBranch::NoReliableProposals);
    assert_eq!(it.status_message(), "No reliable proposals");
    assert_rejected(&out, &it);
}

#[test]
fn less_confident_clusters_leave_tracker_in_charge() {
    let mut it = integrator();
    let dets = [detection(100, 0.9)];
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.8), (100, 0.6)]));
    assert_eq!(it.branch(), IntegrationBranch::TrackerReliable);
    assert_eq!(it.clusters().len(), 1);
    assert_eq!(out.source, ProposalSource::Tracker);
}

#[test]
fn one_distant_confident_cluster_wins_without_training() {
    // IoU(boxed(0), boxed(27)) is about 0.19.
    let dets = [detection(27, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.5), (27, 0.7)]));
    assert_eq!(it.branch(), IntegrationBranch::DetectorBetterThanTracker);
    assert_eq!(it.status_message(), "One detector cluster better than tracker");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Detector);
    assert_eq!(out.strobe, boxed(27));
    assert!((out.prob - 0.7).abs() < 1e-12);
    assert!(!it.training_enabled());
    assert!(it.relocation_enabled());

    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.5), (27, 0.6)]));
    assert_eq!(out.source, ProposalSource::Detector);
    assert!(!it.relocation_enabled());
}

#[test]
fn one_close_confident_cluster_merges_with_tracker() {
    let dets = [detection(2, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.5), (2, 0.8)]));
    assert_eq!(it.branch(), IntegrationBranch::DetectorCloseToTracker);
    assert_eq!(it.status_message(), "One detector & tracker are close");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Mixed);
    assert_eq!(out.strobe, boxed(1));
    assert!((out.prob - 0.8).abs() < 1e-12);
    assert!(it.training_enabled());
    assert!(!it.relocation_enabled());
}

#[test]
fn several_distant_clusters_are_rejected() {
    let dets = [detection(100, 0.9), detection(200, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.5), (100, 0.8), (200, 0.9)]));
    assert_eq!(it.branch(), IntegrationBranch::ClustersFarFromTracker);
    assert_eq!(it.status_message(), "Few detector clusters far from tracker");
    assert_rejected(&out, &it);
}

#[test]
fn several_clusters_merge_the_close_ones() {
    let dets = [detection(200, 0.9), detection(2, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.5), (2, 0.8), (200, 0.9)]));
    assert_eq!(it.branch(), IntegrationBranch::ClustersCloseToTracker);
    assert_eq!(it.status_message(), "Few detector clusters & tracker are close");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Mixed);
    // Only the close cluster joins the tracker box.
    assert_eq!(out.strobe, boxed(1));
    assert!((out.prob - 0.8).abs() < 1e-12);
    assert!(it.training_enabled());
}

// ── Unreliable tracker ─────────────────────────────────────────

#[test]
fn unreliable_tracker_without_clusters() {
    let mut it = integrator();
    let out = it.integrate(&[], &tracker(false), &scores(&[(0, 0.9)]));
    assert_eq!(it.branch(), IntegrationBranch::NoReliableResults);
    assert_eq!(it.status_message(), "No reliable results");
    assert_rejected(&out, &it);
}

#[test]
fn low_verification_makes_valid_tracker_unreliable() {
    let dets = [detection(100, 0.5)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(true), &scores(&[(0, 0.2), (100, 0.6)]));
    assert_eq!(it.branch(), IntegrationBranch::SingleDetectorCluster);
    assert_eq!(out.source, ProposalSource::Detector);
}

#[test]
fn single_cluster_trains_and_relocates_when_stable() {
    let mut it = integrator();
    let out = it.integrate(&[detection(100, 0.9)], &tracker(false), &scores(&[(100, 0.5)]));
    assert_eq!(it.branch(), IntegrationBranch::SingleDetectorCluster);
    assert_eq!(it.status_message(), "One detector cluster");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Detector);
    assert_eq!(out.strobe, boxed(100));
    assert!((out.prob - 0.5).abs() < 1e-12);
    assert!(it.training_enabled());
    assert!(it.relocation_enabled());

    it.integrate(&[detection(100, 0.6)], &tracker(false), &scores(&[(100, 0.5)]));
    assert!(it.training_enabled());
    assert!(!it.relocation_enabled());

    it.integrate(&[detection(100, 0.6)], &tracker(false), &scores(&[(100, 0.85)]));
    assert!(it.relocation_enabled());
}

#[test]
fn dominant_cluster_wins_without_training() {
    let dets = [detection(100, 0.9), detection(200, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(false), &scores(&[(100, 0.6), (200, 0.97)]));
    assert_eq!(it.branch(), IntegrationBranch::DominantDetectorCluster);
    assert_eq!(it.status_message(), "Most confident detector cluster");
    assert!(out.valid);
    assert_eq!(out.source, ProposalSource::Detector);
    assert_eq!(out.strobe, boxed(200));
    assert!((out.prob - 0.97).abs() < 1e-12);
    assert!(!it.training_enabled());
    assert!(!it.relocation_enabled());
}

#[test]
fn no_dominant_cluster_is_rejected() {
    let dets = [detection(100, 0.9), detection(200, 0.9)];
    let mut it = integrator();
    let out = it.integrate(&dets, &tracker(false), &scores(&[(100, 0.6), (200, 0.9)]));
    assert_eq!(it.branch(), IntegrationBranch::NoDominantCluster);
    assert_rejected(&out, &it);
}

// ── Clustering ─────────────────────────────────────────────────

#[test]
fn unverified_clusters_are_discarded() {
    let mut it = integrator();
    let out = it.integrate(&[detection(100, 0.99)], &tracker(false), &scores(&[(100, 0.25)]));
    assert!(it.clusters().is_empty());
    assert_eq!(it.branch(), IntegrationBranch::NoReliableResults);
    assert!(!out.valid);
}

#[test]
fn overlapping_detections_form_one_cluster() {
    let dets = [detection(100, 0.6), detection(102, 0.9), detection(200, 0.7)];
    let verify = |r: Rect| if r.x >= 200 { 0.5 } else { 0.8 };
    let mut it = integrator();
    it.integrate(&dets, &tracker(false), &verify);
    let clusters = it.clusters();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].strobe, boxed(101));
    assert!((clusters[0].prob - 0.9).abs() < 1e-12);
    assert_eq!(clusters[1].strobe, boxed(200));
}

#[test]
fn every_branch_is_consistent() {
    let cases: Vec<(Vec<Candidate>, bool, Vec<(i32, f64)>)> = vec![
        (vec![], true, vec![(0, 0.1)]),
        (vec![], true, vec![(0, 0.45)]),
        (vec![], true, vec![(0, 0.9)]),
        (vec![detection(2, 0.9)], true, vec![(0, 0.5), (2, 0.9)]),
        (vec![detection(60, 0.9)], true, vec![(0, 0.5), (60, 0.9)]),
        (vec![detection(2, 0.9), detection(150, 0.9)], true, vec![(0, 0.5), (2, 0.6), (150, 0.7)]),
        (vec![detection(80, 0.9), detection(150, 0.9)], true, vec![(0, 0.5), (80, 0.6), (150, 0.7)]),
        (vec![], false, vec![]),
        (vec![detection(80, 0.2)], false, vec![(80, 0.4)]),
        (vec![detection(80, 0.9), detection(150, 0.9)], false, vec![(80, 0.99), (150, 0.7)]),
        (vec![detection(80, 0.9), detection(150, 0.9)], false, vec![(80, 0.5), (150, 0.7)]),
    ];
    let mut it = integrator();
    for (dets, valid, table) in &cases {
        let out = it.integrate(dets, &tracker(*valid), &scores(table));
        let branch = it.branch();
        assert_ne!(branch, IntegrationBranch::Idle);
        assert_eq!(out.valid, branch.is_valid(), "{:?}", branch);
        assert_eq!(it.status_message(), branch.message());
        if !out.valid {
            assert_rejected(&out, &it);
        }
        if it.relocation_enabled() {
            assert!(out.valid);
        }
    }
}
