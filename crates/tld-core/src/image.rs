//! Single-channel 8-bit image buffers and the pixel-level operations the
//! tracker needs: cropping, statistics, correlation and resampling.

use crate::error::{Result, TldError};
use crate::geometry::{Rect, Size};
use rand::Rng;

/// A grayscale image stored row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrayImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    /// Create a black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Wrap an existing buffer; the length must be `width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(TldError::InvalidImage(format!(
                "buffer of {} bytes does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut img = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.data[(y * width + x) as usize] = f(x, y);
            }
        }
        img
    }

    /// Uniform noise image.
    pub fn random<R: Rng + ?Sized>(width: u32, height: u32, rng: &mut R) -> Self {
        let mut img = Self::new(width, height);
        rng.fill(img.data.as_mut_slice());
        img
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width as i32, self.height as i32)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel value with coordinates clamped to the image border.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: u8) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Copy of the region `roi`; pixels falling outside the image are black.
    pub fn subframe(&self, roi: Rect) -> GrayImage {
        let width = roi.width.max(0) as u32;
        let height = roi.height.max(0) as u32;
        GrayImage::from_fn(width, height, |x, y| {
            let sx = roi.x + x as i32;
            let sy = roi.y + y as i32;
            if sx >= 0 && sy >= 0 && (sx as u32) < self.width && (sy as u32) < self.height {
                self.data[(sy as u32 * self.width + sx as u32) as usize]
            } else {
                0
            }
        })
    }

    /// Intensity standard deviation inside `roi`, clipped to the image.
    /// Returns 0 for an empty region.
    pub fn std_dev(&self, roi: Rect) -> f64 {
        let roi = roi.adjust_to_frame(self.size());
        if roi.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0f64;
        let mut sq_sum = 0.0f64;
        for y in roi.y..roi.bottom() {
            let row = y as usize * self.width as usize;
            for x in roi.x..roi.right() {
                let v = self.data[row + x as usize] as f64;
                sum += v;
                sq_sum += v * v;
            }
        }
        let count = roi.area() as f64;
        let mean = sum / count;
        (sq_sum / count - mean * mean).max(0.0).sqrt()
    }

    /// Normalized cross-correlation with another image of the same size,
    /// in `[-1, 1]`. Flat images correlate to 0.
    pub fn correlation(&self, other: &GrayImage) -> f64 {
        debug_assert_eq!(self.data.len(), other.data.len());
        let n = self.data.len().min(other.data.len());
        if n == 0 {
            return 0.0;
        }
        let (mut sum_a, mut sum_b, mut sq_a, mut sq_b) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (&a, &b) in self.data.iter().zip(&other.data) {
            let (a, b) = (a as f64, b as f64);
            sum_a += a;
            sum_b += b;
            sq_a += a * a;
            sq_b += b * b;
        }
        let nf = n as f64;
        let mean_a = sum_a / nf;
        let mean_b = sum_b / nf;
        let std_a = (sq_a / nf - mean_a * mean_a).max(0.0).sqrt();
        let std_b = (sq_b / nf - mean_b * mean_b).max(0.0).sqrt();
        let covar = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| (a as f64 - mean_a) * (b as f64 - mean_b))
            .sum::<f64>()
            / nf;
        covar / (std_a * std_b + 1e-12)
    }

    /// Bilinear interpolation at a real-valued location. Coordinates are
    /// clamped into the image.
    pub fn bilinear(&self, x: f64, y: f64) -> u8 {
        if self.is_empty() {
            return 0;
        }
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x1 = x.floor() as u32;
        let y1 = y.floor() as u32;
        let x2 = (x1 + 1).min(self.width - 1);
        let y2 = (y1 + 1).min(self.height - 1);
        let px = |px: u32, py: u32| self.data[(py * self.width + px) as usize] as f64;
        let dx = x - x1 as f64;
        let dy = y - y1 as f64;
        let top = px(x1, y1) + dx * (px(x2, y1) - px(x1, y1));
        let bottom = px(x1, y2) + dx * (px(x2, y2) - px(x1, y2));
        (top + dy * (bottom - top)).round().clamp(0.0, 255.0) as u8
    }

    /// Resample the region `strobe` after scaling by `scale` and rotating by
    /// `angle_deg` about its center, then shifting by `(offset_x, offset_y)`.
    ///
    /// The strobe is clipped to the image first and the output has the clipped
    /// size. Scale 1, angle 0 and zero offset reproduce the source pixels.
    pub fn linear_transform(
        &self,
        strobe: Rect,
        angle_deg: f64,
        scale: f64,
        offset_x: f64,
        offset_y: f64,
    ) -> GrayImage {
        let strobe = strobe.adjust_to_frame(self.size());
        if strobe.is_empty() || scale <= 0.0 {
            return GrayImage::default();
        }
        let cx = (strobe.x + strobe.width / 2) as f64;
        let cy = (strobe.y + strobe.height / 2) as f64;
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let rotate = angle_deg.abs() > 1e-9;

        GrayImage::from_fn(strobe.width as u32, strobe.height as u32, |i, j| {
            let xs = (strobe.x + i as i32) as f64 - cx;
            let ys = (strobe.y + j as i32) as f64 - cy;
            let (xs, ys) = (xs / scale, ys / scale);
            let (xr, yr) = if rotate {
                (xs * cos + ys * sin, -xs * sin + ys * cos)
            } else {
                (xs, ys)
            };
            self.bilinear(xr + cx - offset_x, yr + cy - offset_y)
        })
    }

    /// Bilinear resize to `size` using pixel-center alignment.
    pub fn resize(&self, size: Size) -> GrayImage {
        if self.is_empty() || size.width <= 0 || size.height <= 0 {
            return GrayImage::default();
        }
        let fx = self.width as f64 / size.width as f64;
        let fy = self.height as f64 / size.height as f64;
        GrayImage::from_fn(size.width as u32, size.height as u32, |x, y| {
            let sx = (x as f64 + 0.5) * fx - 0.5;
            let sy = (y as f64 + 0.5) * fy - 0.5;
            self.bilinear(sx, sy)
        })
    }

    /// Normalized `kernel × kernel` box filter with replicated borders.
    pub fn box_blur(&self, kernel: u32) -> GrayImage {
        if kernel <= 1 || self.is_empty() {
            return self.clone();
        }
        let radius = (kernel / 2) as i32;
        let taps = (2 * radius + 1) as u32;
        let w = self.width as i32;
        let h = self.height as i32;

        // Horizontal pass into a u32 accumulator, vertical pass back to u8.
        let mut horizontal = vec![0u32; self.data.len()];
        for y in 0..h {
            for x in 0..w {
                let mut sum = 0u32;
                for k in -radius..=radius {
                    sum += self.get(x + k, y) as u32;
                }
                horizontal[(y * w + x) as usize] = sum;
            }
        }
        let norm = taps * taps;
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let mut sum = 0u32;
            for k in -radius..=radius {
                let yy = (y as i32 + k).clamp(0, h - 1);
                sum += horizontal[(yy * w + x as i32) as usize];
            }
            ((sum + norm / 2) / norm) as u8
        })
    }

    /// Draw a rectangle outline of the given intensity and thickness.
    pub fn draw_rect(&mut self, rect: Rect, value: u8, thickness: i32) {
        let (x1, y1) = (rect.x, rect.y);
        let (x2, y2) = (rect.right() - 1, rect.bottom() - 1);
        let mut put = |x: i32, y: i32| {
            if x >= 0 && y >= 0 {
                self.set(x as u32, y as u32, value);
            }
        };
        for t in 0..thickness.max(1) {
            for x in (x1 + t)..=(x2 - t) {
                put(x, y1 + t);
                put(x, y2 - t);
            }
            for y in (y1 + t)..=(y2 - t) {
                put(x1 + t, y);
                put(x2 - t, y);
            }
        }
    }
}
