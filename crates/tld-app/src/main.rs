//! TLD Demo - runs the tracker over a generated sequence.
//!
//! Usage: tld-demo [settings.json] [frames] [overlay.pgm]

mod scene;

use anyhow::{Context, Result};
use scene::Scene;
use std::path::{Path, PathBuf};
use tld_core::{draw_candidate, GrayImage};
use tld_tracking::{Settings, TldTracker};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_FRAMES: usize = 60;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let settings = match args.next().filter(|a| a != "-") {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from {path}"))?;
            Settings::from_json(&text)?
        }
        None => Settings::default(),
    };
    let frames = match args.next() {
        Some(n) => n.parse().context("frame count")?,
        None => DEFAULT_FRAMES,
    };
    let overlay_path = args.next().map(PathBuf::from);

    info!("TLD demo starting...");
    let scene = Scene::new(settings.seed);
    let mut tracker = TldTracker::new(settings)?;

    let first = scene.frame(0);
    tracker.process_frame(&first)?;
    tracker.start_tracking(scene.target(0))?;

    let mut hits = 0usize;
    let mut last = first;
    for index in 1..frames {
        let frame = scene.frame(index);
        let prediction = tracker.process_frame(&frame)?;
        let truth = scene.target(index);
        let iou = prediction.strobe.iou(truth);
        if prediction.valid && iou > 0.5 {
            hits += 1;
        }
        let status = tracker.status();
        info!(
            frame = index,
            valid = prediction.valid,
            prob = prediction.prob,
            iou,
            message = status.message,
            "Frame"
        );
        last = frame;
    }

    let status = tracker.status();
    println!("{status}");
    let (positive, negative) = tracker.model_samples();
    info!(
        hits,
        frames = frames.saturating_sub(1),
        positive = positive.len(),
        negative = negative.len(),
        "TLD demo finished"
    );

    if let Some(path) = overlay_path {
        for candidate in tracker.detector_proposals() {
            draw_candidate(&mut last, candidate);
        }
        draw_candidate(&mut last, &tracker.current_prediction());
        if let Err(e) = write_pgm(&path, &last) {
            warn!(path = %path.display(), error = %e, "Failed to write overlay");
        }
    }
    tracker.stop_tracking();
    Ok(())
}

/// Binary PGM (P5) dump of a frame.
fn write_pgm(path: &Path, image: &GrayImage) -> Result<()> {
    let mut bytes = format!("P5\n{} {}\n255\n", image.width, image.height).into_bytes();
    bytes.extend_from_slice(&image.data);
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
