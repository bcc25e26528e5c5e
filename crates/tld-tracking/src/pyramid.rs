//! Floating-point image pyramid for multi-scale optical flow.

use tld_core::GrayImage;

/// A single-channel image stored as f32 intensities in `[0, 255]`.
#[derive(Debug, Clone)]
pub struct FloatImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl FloatImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            data: gray.data.iter().map(|&v| v as f32).collect(),
            width: gray.width,
            height: gray.height,
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Bilinear sample with border replication.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as i32, y0 as i32);
        let top = self.get(xi, yi) * (1.0 - fx) + self.get(xi + 1, yi) * fx;
        let bottom = self.get(xi, yi + 1) * (1.0 - fx) + self.get(xi + 1, yi + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Central-difference gradient at a real-valued location.
    #[inline]
    pub fn gradient(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (self.sample(x + 1.0, y) - self.sample(x - 1.0, y)) * 0.5,
            (self.sample(x, y + 1.0) - self.sample(x, y - 1.0)) * 0.5,
        )
    }
}

/// Multi-scale image pyramid; level 0 is full resolution.
pub struct ImagePyramid {
    pub levels: Vec<FloatImage>,
}

impl ImagePyramid {
    /// Halve the image `num_levels - 1` times with 2×2 averaging. Stops early
    /// once a level would shrink below 2 pixels.
    pub fn build(image: &FloatImage, num_levels: u32) -> Self {
        let mut levels = vec![image.clone()];
        for _ in 1..num_levels {
            let Some(prev) = levels.last() else { break };
            if prev.width < 4 || prev.height < 4 {
                break;
            }
            let nw = prev.width.div_ceil(2);
            let nh = prev.height.div_ceil(2);
            let mut level = FloatImage::new(nw, nh);
            for y in 0..nh {
                for x in 0..nw {
                    let sx = (x * 2) as i32;
                    let sy = (y * 2) as i32;
                    let avg = (prev.get(sx, sy)
                        + prev.get(sx + 1, sy)
                        + prev.get(sx, sy + 1)
                        + prev.get(sx + 1, sy + 1))
                        * 0.25;
                    level.set(x, y, avg);
                }
            }
            levels.push(level);
        }
        Self { levels }
    }

    pub fn from_gray(gray: &GrayImage, num_levels: u32) -> Self {
        Self::build(&FloatImage::from_gray(gray), num_levels)
    }
}

/// Spatial gradients (Ix, Iy) by central differences; zero on the border.
pub fn compute_gradients(img: &FloatImage) -> (Vec<f32>, Vec<f32>) {
    let size = (img.width * img.height) as usize;
    let mut ix = vec![0.0f32; size];
    let mut iy = vec![0.0f32; size];
    for y in 1..(img.height as i32 - 1) {
        for x in 1..(img.width as i32 - 1) {
            let idx = (y as u32 * img.width + x as u32) as usize;
            ix[idx] = (img.get(x + 1, y) - img.get(x - 1, y)) * 0.5;
            iy[idx] = (img.get(x, y + 1) - img.get(x, y - 1)) * 0.5;
        }
    }
    (ix, iy)
}
