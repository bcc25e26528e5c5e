//! TLD Core - Foundation types for the TLD tracker
//!
//! This crate provides the leaf types shared by every expert:
//! - Grayscale frame buffers and pixel-level utilities
//! - Integer and real rectangles, overlap metrics
//! - Object proposals and their aggregation

pub mod candidate;
pub mod error;
pub mod geometry;
pub mod image;

pub use candidate::{
    aggregate, clusterize, draw_candidate, non_max_suppression, Candidate, ProposalSource,
};
pub use error::{Result, TldError};
pub use geometry::{scan_position_count, Rect, Rect2d, Size, MIN_SCAN_STEP};
pub use image::GrayImage;
