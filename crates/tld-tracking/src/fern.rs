//! Random pixel-comparison layouts.

use crate::settings::MAX_DESCRIPTOR_WIDTH;
use glam::DVec2;
use rand::Rng;
use tld_core::{Result, TldError};

/// A pair of normalized points; the descriptor bit compares `first > second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormPair {
    pub first: DVec2,
    pub second: DVec2,
}

/// A pair of integer pixel coordinates relative to a window origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsPair {
    pub first: (i32, i32),
    pub second: (i32, i32),
}

/// Ordered set of comparison pairs in the unit square.
///
/// The two points of every pair share either their x or their y value, so
/// each test measures contrast along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Fern {
    pairs: Vec<NormPair>,
}

impl Fern {
    /// Draw `width` random pairs; `width` must be in `1..=16`.
    pub fn new<R: Rng + ?Sized>(width: usize, rng: &mut R) -> Result<Self> {
        if width == 0 || width > MAX_DESCRIPTOR_WIDTH {
            return Err(TldError::InvalidConfiguration(format!(
                "fern width {} outside 1..={}",
                width, MAX_DESCRIPTOR_WIDTH
            )));
        }
        let pairs = (0..width)
            .map(|_| {
                let first = DVec2::new(rng.gen::<f64>(), rng.gen::<f64>());
                let aux = rng.gen::<f64>();
                let second = if rng.gen_bool(0.5) {
                    DVec2::new(first.x, aux)
                } else {
                    DVec2::new(aux, first.y)
                };
                NormPair { first, second }
            })
            .collect();
        Ok(Self { pairs })
    }

    /// Build from explicit pairs.
    pub fn from_pairs(pairs: Vec<NormPair>) -> Result<Self> {
        if pairs.is_empty() || pairs.len() > MAX_DESCRIPTOR_WIDTH {
            return Err(TldError::InvalidConfiguration(format!(
                "fern of {} pairs outside 1..={}",
                pairs.len(),
                MAX_DESCRIPTOR_WIDTH
            )));
        }
        Ok(Self { pairs })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[NormPair] {
        &self.pairs
    }

    /// Map the pairs into a `width × height` window.
    pub fn transform(&self, width: i32, height: i32) -> Vec<AbsPair> {
        let (w, h) = (width as f64, height as f64);
        self.pairs
            .iter()
            .map(|p| AbsPair {
                first: ((p.first.x * w) as i32, (p.first.y * h) as i32),
                second: ((p.second.x * w) as i32, (p.second.y * h) as i32),
            })
            .collect()
    }
}
