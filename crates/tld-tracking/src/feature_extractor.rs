//! Binary descriptors from fern comparisons.

use crate::scanning_grid::{ScanPosition, ScanningGrid};
use tld_core::{GrayImage, Rect};

/// Fern descriptor: bit `i` is set iff pair `i` compares `first > second`.
pub type Descriptor = u16;

/// Descriptor extraction through a scanning grid's fern.
#[derive(Debug, Clone, Copy)]
pub struct FernFeatureExtractor<'a> {
    grid: &'a ScanningGrid,
}

impl<'a> FernFeatureExtractor<'a> {
    pub fn new(grid: &'a ScanningGrid) -> Self {
        Self { grid }
    }

    /// Descriptor of the scan window at `position`. The frame must have the
    /// grid's frame size.
    pub fn descriptor_at(&self, frame: &GrayImage, position: ScanPosition, scale_id: usize) -> Descriptor {
        let px = |i: usize| frame.data.get(i).copied().unwrap_or(0);
        pack_bits(
            self.grid
                .pixel_pairs(position, scale_id)
                .map(|(a, b)| px(a) > px(b)),
        )
    }

    /// Descriptor of an arbitrary box; the box is clipped to the frame first.
    pub fn descriptor_in(&self, frame: &GrayImage, bbox: Rect) -> Descriptor {
        let bbox = bbox.adjust_to_frame(frame.size());
        if bbox.is_empty() {
            return 0;
        }
        pack_bits(
            self.grid
                .fern()
                .transform(bbox.width, bbox.height)
                .into_iter()
                .map(|p| {
                    frame.get(bbox.x + p.first.0, bbox.y + p.first.1)
                        > frame.get(bbox.x + p.second.0, bbox.y + p.second.1)
                }),
        )
    }

    /// Descriptor of a whole image, used for training patches.
    pub fn descriptor(&self, patch: &GrayImage) -> Descriptor {
        if patch.is_empty() {
            return 0;
        }
        self.descriptor_in(patch, Rect::from_size(patch.size()))
    }
}

fn pack_bits(bits: impl Iterator<Item = bool>) -> Descriptor {
    bits.enumerate()
        .fold(0, |desc, (i, bit)| if bit { desc | (1 << i) } else { desc })
}
