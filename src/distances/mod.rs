//! Scoring functions used to compare candidates with the tracked target.
//!
//! This module provides:
//! - spatial overlap (`iou`) between boxes
//! - appearance similarity (`cosine_similarity`) between embeddings
//! - exponential motion coherence against a predicted position
//! - deterministic first-index argmax/argmin used for tie-breaking

mod functions;

pub use functions::*;
