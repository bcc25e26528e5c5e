//! Point selection and sparse optical flow.

use crate::pyramid::{compute_gradients, FloatImage, ImagePyramid};
use crate::settings::LucasKanadeSettings;
use glam::DVec2;
use std::cmp::Ordering;
use tld_core::{GrayImage, Rect};

/// Source of trackable points and their frame-to-frame motion.
pub trait MotionEstimator {
    /// Up to `max_points` well-textured points inside `region` of `frame`.
    fn select_points(&self, frame: &GrayImage, region: Rect, max_points: usize) -> Vec<DVec2>;

    /// Locations of `points` from `from` in `to`; `None` for lost points.
    /// The output has one entry per input point.
    fn track_points(&self, from: &GrayImage, to: &GrayImage, points: &[DVec2]) -> Vec<Option<DVec2>>;
}

/// Shi-Tomasi corners and pyramidal Lucas-Kanade flow.
#[derive(Debug, Clone, Default)]
pub struct LucasKanade {
    pub settings: LucasKanadeSettings,
}

impl LucasKanade {
    pub fn new(settings: LucasKanadeSettings) -> Self {
        Self { settings }
    }

    /// Minimum eigenvalue of the structure tensor summed over a block.
    fn corner_response(&self, ix: &[f32], iy: &[f32], width: u32, height: u32, x: i32, y: i32) -> f32 {
        let r = self.settings.corner_block_size / 2;
        let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
        for wy in (y - r)..=(y + r) {
            for wx in (x - r)..=(x + r) {
                let px = wx.clamp(0, width as i32 - 1) as u32;
                let py = wy.clamp(0, height as i32 - 1) as u32;
                let idx = (py * width + px) as usize;
                a += ix[idx] * ix[idx];
                b += ix[idx] * iy[idx];
                c += iy[idx] * iy[idx];
            }
        }
        0.5 * ((a + c) - ((a - c) * (a - c) + 4.0 * b * b).sqrt())
    }

    fn track_point_pyramidal(
        &self,
        prev_pyr: &ImagePyramid,
        curr_pyr: &ImagePyramid,
        position: DVec2,
    ) -> Option<DVec2> {
        let s = &self.settings;
        let hw = s.window_half_size;
        let epsilon = s.epsilon as f32;
        let levels = prev_pyr.levels.len().min(curr_pyr.levels.len());
        let mut guess = [0.0f32, 0.0];

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let px = position.x as f32 * scale;
            let py = position.y as f32 * scale;
            let prev_img = &prev_pyr.levels[level];
            let curr_img = &curr_pyr.levels[level];

            let mut g11 = 0.0f32;
            let mut g12 = 0.0f32;
            let mut g22 = 0.0f32;
            for wy in -hw..=hw {
                for wx in -hw..=hw {
                    let (ix, iy) = prev_img.gradient(px + wx as f32, py + wy as f32);
                    g11 += ix * ix;
                    g12 += ix * iy;
                    g22 += iy * iy;
                }
            }

            let det = g11 * g22 - g12 * g12;
            if det.abs() < 1e-6 {
                if level == 0 {
                    return None;
                }
                continue;
            }
            let inv_det = 1.0 / det;

            let mut dx = guess[0] * scale;
            let mut dy = guess[1] * scale;

            for _ in 0..s.max_iterations {
                let mut bx = 0.0f32;
                let mut by = 0.0f32;
                for wy in -hw..=hw {
                    for wx in -hw..=hw {
                        let (sx, sy) = (px + wx as f32, py + wy as f32);
                        let (ix, iy) = prev_img.gradient(sx, sy);
                        let it = curr_img.sample(sx + dx, sy + dy) - prev_img.sample(sx, sy);
                        bx += ix * it;
                        by += iy * it;
                    }
                }
                let ddx = inv_det * (g22 * bx - g12 * by);
                let ddy = inv_det * (-g12 * bx + g11 * by);
                dx -= ddx;
                dy -= ddy;
                if ddx * ddx + ddy * ddy < epsilon * epsilon {
                    break;
                }
            }
            guess = [dx / scale, dy / scale];
        }

        let tracked = DVec2::new(
            position.x + guess[0] as f64,
            position.y + guess[1] as f64,
        );
        tracked.is_finite().then_some(tracked)
    }
}

impl MotionEstimator for LucasKanade {
    fn select_points(&self, frame: &GrayImage, region: Rect, max_points: usize) -> Vec<DVec2> {
        let region = region.adjust_to_frame(frame.size());
        if region.is_empty() || max_points == 0 {
            return Vec::new();
        }
        let img = FloatImage::from_gray(frame);
        let (ix, iy) = compute_gradients(&img);

        let w = region.width as usize;
        let mut response = vec![0.0f32; w * region.height as usize];
        let mut best = 0.0f32;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let r = self.corner_response(&ix, &iy, img.width, img.height, x, y);
                response[(y - region.y) as usize * w + (x - region.x) as usize] = r;
                best = best.max(r);
            }
        }
        if best <= 0.0 {
            return Vec::new();
        }

        // Local maxima above the quality floor.
        let floor = best * self.settings.corner_quality as f32;
        let at = |x: i32, y: i32| -> f32 {
            if x < region.x || y < region.y || x >= region.right() || y >= region.bottom() {
                0.0
            } else {
                response[(y - region.y) as usize * w + (x - region.x) as usize]
            }
        };
        let mut corners: Vec<(f32, i32, i32)> = Vec::new();
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let r = at(x, y);
                if r < floor {
                    continue;
                }
                let is_max = (-1..=1)
                    .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                    .all(|(dx, dy)| at(x + dx, y + dy) <= r);
                if is_max {
                    corners.push((r, x, y));
                }
            }
        }
        corners.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let min_dist_sq = self.settings.corner_min_distance * self.settings.corner_min_distance;
        let mut selected: Vec<DVec2> = Vec::with_capacity(max_points);
        for (_, x, y) in corners {
            let p = DVec2::new(x as f64, y as f64);
            if selected.iter().all(|q| q.distance_squared(p) >= min_dist_sq) {
                selected.push(p);
                if selected.len() >= max_points {
                    break;
                }
            }
        }
        selected
    }

    fn track_points(&self, from: &GrayImage, to: &GrayImage, points: &[DVec2]) -> Vec<Option<DVec2>> {
        if from.is_empty() || to.is_empty() {
            return vec![None; points.len()];
        }
        let levels = self.settings.pyramid_levels.max(1);
        let prev_pyr = ImagePyramid::from_gray(from, levels);
        let curr_pyr = ImagePyramid::from_gray(to, levels);
        let (max_x, max_y) = ((to.width - 1) as f64, (to.height - 1) as f64);

        points
            .iter()
            .map(|&p| {
                self.track_point_pyramidal(&prev_pyr, &curr_pyr, p)
                    .filter(|q| q.x >= 0.0 && q.y >= 0.0 && q.x <= max_x && q.y <= max_y)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth texture shifted by `(sx, sy)`.
    fn texture(sx: f64, sy: f64) -> GrayImage {
        GrayImage::from_fn(96, 96, |x, y| {
            let (x, y) = (x as f64 - sx, y as f64 - sy);
            (128.0 + 50.0 * (x / 6.0).sin() + 50.0 * (y / 7.0).cos()) as u8
        })
    }

    #[test]
    fn test_select_points_respects_region_and_spacing() {
        let lk = LucasKanade::default();
        let frame = texture(0.0, 0.0);
        let region = Rect::new(20, 20, 50, 50);
        let points = lk.select_points(&frame, region, 100);
        assert!(!points.is_empty());
        for (i, p) in points.iter().enumerate() {
            assert!(p.x >= 20.0 && p.x < 70.0 && p.y >= 20.0 && p.y < 70.0);
            for q in &points[i + 1..] {
                assert!(p.distance(*q) >= 10.0);
            }
        }
        assert!(lk.select_points(&frame, region, 3).len() <= 3);
    }

    #[test]
    fn test_select_points_on_flat_image() {
        let lk = LucasKanade::default();
        let flat = GrayImage::from_fn(40, 40, |_, _| 90);
        assert!(lk.select_points(&flat, Rect::new(0, 0, 40, 40), 10).is_empty());
        assert!(lk.select_points(&flat, Rect::new(100, 100, 10, 10), 10).is_empty());
    }

    #[test]
    fn test_stationary_points() {
        let lk = LucasKanade::default();
        let frame = texture(0.0, 0.0);
        let points = [DVec2::new(48.0, 48.0), DVec2::new(30.0, 60.0)];
        let tracked = lk.track_points(&frame, &frame, &points);
        for (p, t) in points.iter().zip(&tracked) {
            let t = t.expect("point lost");
            assert!(p.distance(t) < 0.1);
        }
    }

    #[test]
    fn test_translated_points() {
        let lk = LucasKanade::default();
        let prev = texture(0.0, 0.0);
        let curr = texture(3.0, -2.0);
        let points = [DVec2::new(48.0, 48.0), DVec2::new(40.0, 55.0)];
        let tracked = lk.track_points(&prev, &curr, &points);
        for (p, t) in points.iter().zip(&tracked) {
            let t = t.expect("point lost");
            assert!((t.x - p.x - 3.0).abs() < 0.5, "dx {}", t.x - p.x);
            assert!((t.y - p.y + 2.0).abs() < 0.5, "dy {}", t.y - p.y);
        }
    }

    #[test]
    fn test_flat_image_loses_points() {
        let lk = LucasKanade::default();
        let flat = GrayImage::from_fn(40, 40, |_, _| 90);
        let tracked = lk.track_points(&flat, &flat, &[DVec2::new(20.0, 20.0)]);
        assert_eq!(tracked, vec![None]);
    }
}
