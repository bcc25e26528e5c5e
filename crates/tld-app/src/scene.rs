//! Generated test sequence: a textured target moving over a static
//! noise background.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tld_core::{GrayImage, Rect};

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;
pub const TARGET_SIZE: i32 = 40;

pub struct Scene {
    background: GrayImage,
}

impl Scene {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        // Low-contrast noise so the target dominates the texture.
        let background =
            GrayImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |_, _| rng.gen_range(60..140));
        Self {
            background: background.box_blur(3),
        }
    }

    /// Target location at frame `index`.
    pub fn target(&self, index: usize) -> Rect {
        let t = index as f64;
        let x = 60.0 + 2.0 * t;
        let y = 90.0 + 30.0 * (t / 12.0).sin();
        Rect::new(x as i32, y as i32, TARGET_SIZE, TARGET_SIZE)
    }

    pub fn frame(&self, index: usize) -> GrayImage {
        let target = self.target(index);
        let mut frame = self.background.clone();
        for y in 0..target.height {
            for x in 0..target.width {
                let on = (x / 8 + y / 8) % 2 == 0;
                let ring = (x - 20).pow(2) + (y - 20).pow(2) < 64;
                let value = match (on, ring) {
                    (_, true) => 128,
                    (true, false) => 235,
                    (false, false) => 15,
                };
                frame.set((target.x + x) as u32, (target.y + y) as u32, value);
            }
        }
        frame
    }
}
