//! Appearance memory of the tracked athlete.
//!
//! Two variants:
//! - [`CentroidReference`]: FIFO of recent embeddings compared through their
//!   normalized mean. New embeddings only enter when they already resemble
//!   the centroid, so an occluder cannot poison the memory in one frame.
//! - [`DualAnchorReference`]: a short anchor (last accepted embedding) and a
//!   long anchor (exponential moving average of accepted embeddings).

use std::collections::VecDeque;

use log::trace;

use crate::perception::Embedding;

/// FIFO buffer of recent embeddings.
#[derive(Debug, Clone)]
pub struct CentroidReference {
    history: VecDeque<Embedding>,
    capacity: usize,
    update_min: f64,
}

impl CentroidReference {
    /// # Arguments
    /// * `capacity` - Number of embeddings kept
    /// * `update_min` - Minimum similarity to the centroid for a new embedding to be kept
    pub fn new(capacity: usize, update_min: f64) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            update_min,
        }
    }

    /// L2-normalized mean of the buffered embeddings.
    pub fn centroid(&self) -> Option<Embedding> {
        let first = self.history.front()?;
        let dim = first.dim();
        let mut mean = vec![0.0; dim];
        for e in self.history.iter().filter(|e| e.dim() == dim) {
            for (m, v) in mean.iter_mut().zip(e.as_slice()) {
                *m += v;
            }
        }
        // Opposite embeddings can cancel out completely
        Embedding::new(mean).ok()
    }

    /// Offer the embedding of an accepted match.
    ///
    /// Returns whether it was stored.
    pub fn observe(&mut self, embedding: &Embedding) -> bool {
        if let Some(centroid) = self.centroid() {
            let sim = centroid.similarity(embedding.as_slice()).unwrap_or(-1.0);
            if sim < self.update_min {
                trace!("embedding rejected from reference (similarity {sim:.3})");
                return false;
            }
        }
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(embedding.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Short and long appearance anchors.
#[derive(Debug, Clone)]
pub struct DualAnchorReference {
    short: Option<Embedding>,
    long: Option<Vec<f64>>,
    momentum: f64,
}

impl DualAnchorReference {
    /// `momentum` is the weight kept on the long anchor's history at each update.
    pub fn new(momentum: f64) -> Self {
        Self {
            short: None,
            long: None,
            momentum,
        }
    }

    pub fn short(&self) -> Option<&Embedding> {
        self.short.as_ref()
    }

    /// Long anchor, normalized for comparison.
    pub fn long(&self) -> Option<Embedding> {
        self.long.clone().and_then(|v| Embedding::new(v).ok())
    }

    /// Similarity to the short anchor, 0 without an anchor or embedding.
    pub fn short_similarity(&self, embedding: Option<&Embedding>) -> f64 {
        match (self.short.as_ref(), embedding) {
            (Some(anchor), Some(e)) => anchor.similarity(e.as_slice()).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Similarity to the long anchor, 0 without an anchor or embedding.
    pub fn long_similarity(&self, embedding: Option<&Embedding>) -> f64 {
        match (self.long.as_ref(), embedding) {
            (Some(anchor), Some(e)) => e.similarity(anchor).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Replace the short anchor and fold the embedding into the long one.
    pub fn observe(&mut self, embedding: &Embedding) {
        let m = self.momentum;
        self.long = match self.long.take() {
            Some(long) if long.len() == embedding.dim() => Some(
                long.iter()
                    .zip(embedding.as_slice())
                    .map(|(l, e)| m * l + (1.0 - m) * e)
                    .collect(),
            ),
            _ => Some(embedding.as_slice().to_vec()),
        };
        self.short = Some(embedding.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.short.is_none() && self.long.is_none()
    }
}

/// Appearance memory kept by the track, in the form its selector expects.
#[derive(Debug, Clone)]
pub enum EmbeddingReference {
    Centroid(CentroidReference),
    DualAnchor(DualAnchorReference),
}

impl EmbeddingReference {
    pub fn observe(&mut self, embedding: &Embedding) {
        match self {
            EmbeddingReference::Centroid(r) => {
                r.observe(embedding);
            }
            EmbeddingReference::DualAnchor(r) => r.observe(embedding),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EmbeddingReference::Centroid(r) => r.is_empty(),
            EmbeddingReference::DualAnchor(r) => r.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn emb(v: &[f64]) -> Embedding {
        Embedding::new(v.to_vec()).unwrap()
    }

    // ===== Centroid tests =====

    #[test]
    fn test_centroid_first_embedding_always_kept() {
        let mut r = CentroidReference::new(10, 0.4);
        assert!(r.centroid().is_none());
        assert!(r.observe(&emb(&[1.0, 0.0])));
        assert_eq!(r.centroid().unwrap(), emb(&[1.0, 0.0]));
    }

    #[test]
    fn test_centroid_gates_dissimilar_embeddings() {
        let mut r = CentroidReference::new(10, 0.4);
        r.observe(&emb(&[1.0, 0.0]));
        // cos = 0.0 < 0.4
        assert!(!r.observe(&emb(&[0.0, 1.0])));
        // cos ~ 0.707
        assert!(r.observe(&emb(&[1.0, 1.0])));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_centroid_fifo_capacity() {
        let mut r = CentroidReference::new(3, -1.0);
        for i in 0..5 {
            r.observe(&emb(&[1.0, i as f64]));
        }
        assert_eq!(r.len(), 3);

        // Mean of the last three: (1,2), (1,3), (1,4) normalized
        let c = r.centroid().unwrap();
        let expected: f64 = [2.0f64, 3.0, 4.0]
            .iter()
            .map(|y| 1.0 / (1.0 + y * y).sqrt())
            .sum::<f64>();
        let expected_y: f64 = [2.0f64, 3.0, 4.0]
            .iter()
            .map(|y| y / (1.0 + y * y).sqrt())
            .sum::<f64>();
        let norm = (expected * expected + expected_y * expected_y).sqrt();
        assert_relative_eq!(c.as_slice()[0], expected / norm, epsilon = 1e-12);
    }

    #[test]
    fn test_centroid_skips_embeddings_of_other_dimension() {
        let mut r = CentroidReference::new(10, 0.0);
        r.observe(&emb(&[1.0, 0.0]));
        // Similarity is undefined across dimensions, so the gate rejects it
        assert!(!r.observe(&emb(&[0.0, 1.0, 0.0])));
        r.history.push_back(emb(&[0.0, 0.0, 1.0]));
        r.observe(&emb(&[0.0, 1.0]));

        let c = r.centroid().unwrap();
        assert_eq!(c.dim(), 2);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(c.as_slice()[0], s, epsilon = 1e-12);
        assert_relative_eq!(c.as_slice()[1], s, epsilon = 1e-12);
    }

    // ===== Dual anchor tests =====

    #[test]
    fn test_dual_anchor_ema() {
        let mut r = DualAnchorReference::new(0.85);
        assert!(r.is_empty());
        r.observe(&emb(&[1.0, 0.0]));
        r.observe(&emb(&[0.0, 1.0]));

        assert_eq!(r.short().unwrap(), &emb(&[0.0, 1.0]));
        let long = r.long().unwrap();
        let norm = (0.85f64.powi(2) + 0.15f64.powi(2)).sqrt();
        assert_relative_eq!(long.as_slice()[0], 0.85 / norm, epsilon = 1e-12);
        assert_relative_eq!(long.as_slice()[1], 0.15 / norm, epsilon = 1e-12);
    }

    #[test]
    fn test_dual_anchor_similarities_default_to_zero() {
        let r = DualAnchorReference::new(0.85);
        let e = emb(&[1.0, 0.0]);
        assert_relative_eq!(r.short_similarity(Some(&e)), 0.0);
        assert_relative_eq!(r.long_similarity(None), 0.0);
    }

    #[test]
    fn test_reference_enum_dispatch() {
        let mut r = EmbeddingReference::DualAnchor(DualAnchorReference::new(0.5));
        assert!(r.is_empty());
        r.observe(&emb(&[0.0, 2.0]));
        assert!(!r.is_empty());
    }
}
