//! Synthetic training samples around a target.
//!
//! Positive samples are warped copies of the target; negative samples are
//! textured windows of the frame that barely overlap it.

use tld_core::{scan_position_count, GrayImage, Rect, Size};

/// Minimum overlap above which a window cannot be a negative sample.
const NEGATIVE_IOU_LIMIT: f64 = 0.1;

/// Which kind of sample to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Positive,
    Negative,
}

/// Augmentation parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformPars {
    pub angles: Vec<f64>,
    pub scales: Vec<f64>,
    pub translation_x: Vec<f64>,
    pub translation_y: Vec<f64>,
    /// Scan overlap for negative windows.
    pub overlap: f64,
    /// Negative windows must have an intensity spread above
    /// `disp_threshold * target_stddev`.
    pub disp_threshold: f64,
    /// `None` or `Some(0)` means unlimited.
    pub positive_limit: Option<usize>,
    pub negative_limit: Option<usize>,
}

fn limit_reached(count: usize, limit: Option<usize>) -> bool {
    matches!(limit, Some(l) if l > 0 && count >= l)
}

/// Sample generator bound to one frame and target.
#[derive(Debug)]
pub struct Augmentator<'a> {
    frame: &'a GrayImage,
    target: Rect,
    pars: TransformPars,
    target_stddev: f64,
}

impl<'a> Augmentator<'a> {
    pub fn new(frame: &'a GrayImage, target: Rect, pars: TransformPars) -> Self {
        Self {
            frame,
            target,
            pars,
            target_stddev: 0.0,
        }
    }

    pub fn target(&self) -> Rect {
        self.target
    }

    pub fn pars(&self) -> &TransformPars {
        &self.pars
    }

    /// Last computed intensity spread of the target.
    pub fn target_stddev(&self) -> f64 {
        self.target_stddev
    }

    pub fn sample(&mut self, class: ObjectClass) -> Vec<GrayImage> {
        match class {
            ObjectClass::Positive => self.make_positive_sample(),
            ObjectClass::Negative => self.make_negative_sample(),
        }
    }

    /// One warped patch per angle × scale × x-shift × y-shift, in that order.
    pub fn make_positive_sample(&self) -> Vec<GrayImage> {
        let p = &self.pars;
        let mut out = Vec::new();
        for &angle in &p.angles {
            for &scale in &p.scales {
                for &dx in &p.translation_x {
                    for &dy in &p.translation_y {
                        out.push(self.frame.linear_transform(self.target, angle, scale, dx, dy));
                        if limit_reached(out.len(), p.positive_limit) {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Textured scan windows overlapping the target by less than 0.1 IoU.
    pub fn make_negative_sample(&mut self) -> Vec<GrayImage> {
        let target_stddev = self.update_target_stddev();
        let frame_size = self.frame.size();
        let base = self.target.size();
        let min_stddev = target_stddev * self.pars.disp_threshold;

        let mut out = Vec::new();
        for &scale in &self.pars.scales {
            let bbox = base.scaled(scale);
            let step = bbox.scan_step(self.pars.overlap);
            let positions: Size = scan_position_count(frame_size, base, scale, step);
            for xi in 0..positions.width {
                for yi in 0..positions.height {
                    let window = Rect::new(xi * step.width, yi * step.height, bbox.width, bbox.height);
                    if window.iou(self.target) < NEGATIVE_IOU_LIMIT
                        && self.frame.std_dev(window) > min_stddev
                    {
                        out.push(self.frame.subframe(window));
                        if limit_reached(out.len(), self.pars.negative_limit) {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Recompute the target's intensity spread, keeping the cached value
    /// while the target is outside the frame.
    pub fn update_target_stddev(&mut self) -> f64 {
        if !self.target.is_outside(self.frame.size()) {
            self.target_stddev = self.frame.std_dev(self.target);
        }
        self.target_stddev
    }
}
