//! Exhaustive multi-scale sliding-window layout.

use crate::fern::Fern;
use crate::settings::MAX_DESCRIPTOR_WIDTH;
use smallvec::SmallVec;
use std::sync::Arc;
use tld_core::{scan_position_count, Rect, Result, Size, TldError};

/// Linear pixel offsets of one fern pair, relative to a window origin.
pub type OffsetPairs = SmallVec<[(usize, usize); MAX_DESCRIPTOR_WIDTH]>;

/// Index of a scan window along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScanPosition {
    pub x: i32,
    pub y: i32,
}

impl ScanPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Geometry of the scan at one scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleLevel {
    pub scale: f64,
    /// Window size at this scale.
    pub bbox: Size,
    pub step: Size,
    /// Number of windows along each axis.
    pub positions: Size,
    pub offsets: OffsetPairs,
}

/// Scan lattice for one fern over frames of a fixed size.
#[derive(Debug, Clone)]
pub struct ScanningGrid {
    fern: Arc<Fern>,
    frame_size: Size,
    base_bbox: Size,
    overlap: f64,
    levels: Vec<ScaleLevel>,
}

impl ScanningGrid {
    /// Lay out windows of `base_bbox × scale` for every scale.
    ///
    /// Zero-area boxes, non-positive overlap or scales, and scaled boxes that
    /// do not fit the frame are configuration errors.
    pub fn new(
        fern: Arc<Fern>,
        frame_size: Size,
        base_bbox: Size,
        overlap: f64,
        scales: &[f64],
    ) -> Result<Self> {
        if base_bbox.width <= 0 || base_bbox.height <= 0 {
            return Err(TldError::InvalidConfiguration(format!(
                "scanning grid received zero area base box {}x{}",
                base_bbox.width, base_bbox.height
            )));
        }
        if overlap <= 0.0 {
            return Err(TldError::InvalidConfiguration(format!(
                "scanning grid received non-positive overlap {}",
                overlap
            )));
        }
        if scales.is_empty() {
            return Err(TldError::InvalidConfiguration(
                "scanning grid received no scales".into(),
            ));
        }

        let mut levels = Vec::with_capacity(scales.len());
        for &scale in scales {
            if scale <= 0.0 {
                return Err(TldError::InvalidConfiguration(format!(
                    "scanning grid received non-positive scale {}",
                    scale
                )));
            }
            let bbox = base_bbox.scaled(scale);
            if !bbox.fits_in(frame_size) {
                return Err(TldError::InvalidConfiguration(format!(
                    "scaled box {}x{} larger than frame {}x{}",
                    bbox.width, bbox.height, frame_size.width, frame_size.height
                )));
            }
            let row = frame_size.width as usize;
            let offsets = fern
                .transform(bbox.width, bbox.height)
                .into_iter()
                .map(|p| {
                    (
                        p.first.0 as usize + p.first.1 as usize * row,
                        p.second.0 as usize + p.second.1 as usize * row,
                    )
                })
                .collect();
            let step = bbox.scan_step(overlap);
            levels.push(ScaleLevel {
                scale,
                bbox,
                step,
                positions: scan_position_count(frame_size, base_bbox, scale, step),
                offsets,
            });
        }

        Ok(Self {
            fern,
            frame_size,
            base_bbox,
            overlap,
            levels,
        })
    }

    /// A grid with the same fern, frame, overlap and scales around a new base
    /// box.
    pub fn with_base(&self, base_bbox: Size) -> Result<Self> {
        let scales: SmallVec<[f64; 8]> = self.levels.iter().map(|l| l.scale).collect();
        Self::new(
            Arc::clone(&self.fern),
            self.frame_size,
            base_bbox,
            self.overlap,
            &scales,
        )
    }

    pub fn fern(&self) -> &Arc<Fern> {
        &self.fern
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn base_bbox(&self) -> Size {
        self.base_bbox
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    pub fn levels(&self) -> &[ScaleLevel] {
        &self.levels
    }

    /// Window counts along each axis, per scale.
    pub fn positions_count(&self) -> Vec<Size> {
        self.levels.iter().map(|l| l.positions).collect()
    }

    /// Total number of windows over all scales.
    pub fn window_count(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.positions.area().max(0) as usize)
            .sum()
    }

    /// Frame rectangle covered by the window at `position` and `scale_id`.
    pub fn window(&self, position: ScanPosition, scale_id: usize) -> Rect {
        let level = &self.levels[scale_id];
        Rect::new(
            position.x * level.step.width,
            position.y * level.step.height,
            level.bbox.width,
            level.bbox.height,
        )
    }

    /// Absolute pixel index pairs for the window at `position`.
    pub fn pixel_pairs(
        &self,
        position: ScanPosition,
        scale_id: usize,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        let level = &self.levels[scale_id];
        let origin = (position.x * level.step.width) as usize
            + (position.y * level.step.height) as usize * self.frame_size.width as usize;
        level
            .offsets
            .iter()
            .map(move |&(a, b)| (a + origin, b + origin))
    }
}
