//! Target selection: which candidate in a frame is the tracked athlete.
//!
//! Two interchangeable policies behind [`TargetSelector`]:
//! - [`CascadeSelector`]: strict priority rules, first satisfied rule wins
//!   (strong overlap, re-identification, reference point, detection score).
//! - [`WeightedFusionSelector`]: weighted sum of appearance, motion and
//!   overlap scores, accepted only with a clear margin over the runner-up.

use log::trace;
use serde::Serialize;

use crate::detection::Candidate;
use crate::distances::{first_argmax, first_argmin, iou, motion_coherence};
use crate::geometry::{BBox, Point};
use crate::perception::EmbeddingLookup;
use crate::reid::{CentroidReference, DualAnchorReference, EmbeddingReference};
use crate::tracker::{SelectorKind, TrackerConfig};

/// What the selector knows about the current track.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext<'a> {
    /// Last accepted detection box of the current track.
    pub previous_bbox: Option<BBox>,
    /// Box predicted by the track's motion model for this frame.
    pub predicted_bbox: Option<BBox>,
    /// Appearance memory of the current track.
    pub reference: Option<&'a EmbeddingReference>,
    /// Where to look for the athlete when no track exists.
    pub anchor: Option<Point>,
}

impl SelectionContext<'_> {
    pub fn has_track(&self) -> bool {
        self.previous_bbox.is_some() || self.predicted_bbox.is_some()
    }

    fn expected_center(&self) -> Option<Point> {
        self.predicted_bbox.or(self.previous_bbox).map(|b| b.center())
    }
}

/// Rule that produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    Continuity,
    ReIdentification,
    ReferencePoint,
    Fallback,
    Fusion,
}

/// An accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub rule: SelectionRule,
    /// Value the deciding rule compared (IOU, similarity, distance, score).
    pub score: f64,
}

/// How often each rule decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub continuity: usize,
    pub reid: usize,
    pub reference_point: usize,
    pub fallback: usize,
    pub fusion: usize,
    /// Frames with candidates where nothing was accepted.
    pub rejected: usize,
}

impl SelectionStats {
    fn record(&mut self, rule: SelectionRule) {
        match rule {
            SelectionRule::Continuity => self.continuity += 1,
            SelectionRule::ReIdentification => self.reid += 1,
            SelectionRule::ReferencePoint => self.reference_point += 1,
            SelectionRule::Fallback => self.fallback += 1,
            SelectionRule::Fusion => self.fusion += 1,
        }
    }
}

/// Chooses at most one candidate per frame.
pub trait TargetSelector: Send {
    /// Pick the athlete among `candidates`, or `None` for "no match".
    ///
    /// `embeddings` is only queried for the candidates whose appearance the
    /// policy actually needs.
    fn select(
        &mut self,
        candidates: &[Candidate],
        ctx: &SelectionContext<'_>,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> Option<Selection>;

    /// Empty appearance memory in the form this selector reads.
    fn new_reference(&self) -> EmbeddingReference;

    fn stats(&self) -> &SelectionStats;
}

/// Build the selector named by the configuration.
pub fn selector_from_config(config: &TrackerConfig) -> Box<dyn TargetSelector> {
    match config.selector {
        SelectorKind::Cascade => Box::new(CascadeSelector::new(config)),
        SelectorKind::WeightedFusion => Box::new(WeightedFusionSelector::new(config)),
    }
}

fn nearest_to(candidates: &[Candidate], target: Point) -> Option<(usize, f64)> {
    first_argmin(candidates.iter().map(|c| c.center().distance(&target)))
}

/// Priority-cascade selector.
#[derive(Debug, Clone)]
pub struct CascadeSelector {
    strong_iou: f64,
    reid_threshold: f64,
    history: usize,
    update_min: f64,
    stats: SelectionStats,
}

impl CascadeSelector {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            strong_iou: config.strong_iou,
            reid_threshold: config.reid_threshold,
            history: config.embedding_history,
            update_min: config.reid_update_min,
            stats: SelectionStats::default(),
        }
    }

    fn accept(&mut self, index: usize, rule: SelectionRule, score: f64) -> Option<Selection> {
        trace!("cascade selected candidate {index} by {rule:?} ({score:.3})");
        self.stats.record(rule);
        Some(Selection { index, rule, score })
    }
}

impl TargetSelector for CascadeSelector {
    fn select(
        &mut self,
        candidates: &[Candidate],
        ctx: &SelectionContext<'_>,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        // 1. Spatial continuity
        if let Some(prev) = ctx.previous_bbox {
            if let Some((i, best)) = first_argmax(candidates.iter().map(|c| iou(&c.bbox, &prev))) {
                if best >= self.strong_iou {
                    return self.accept(i, SelectionRule::Continuity, best);
                }
            }
        }

        // 2. Re-identification against the centroid
        if let Some(EmbeddingReference::Centroid(reference)) = ctx.reference {
            if let Some(centroid) = reference.centroid() {
                let sims: Vec<f64> = (0..candidates.len())
                    .map(|i| {
                        embeddings
                            .embedding(i)
                            .and_then(|e| e.similarity(centroid.as_slice()))
                            .unwrap_or(f64::NAN)
                    })
                    .collect();
                if let Some((i, best)) = first_argmax(sims) {
                    if best >= self.reid_threshold {
                        return self.accept(i, SelectionRule::ReIdentification, best);
                    }
                }
            }
        }

        // 3. Reference point, only to acquire a new track
        if !ctx.has_track() {
            if let Some((i, d)) = ctx.anchor.and_then(|a| nearest_to(candidates, a)) {
                return self.accept(i, SelectionRule::ReferencePoint, d);
            }
        }

        // 4. Detection confidence
        let (i, score) = first_argmax(candidates.iter().map(|c| c.score))?;
        self.accept(i, SelectionRule::Fallback, score)
    }

    fn new_reference(&self) -> EmbeddingReference {
        EmbeddingReference::Centroid(CentroidReference::new(self.history, self.update_min))
    }

    fn stats(&self) -> &SelectionStats {
        &self.stats
    }
}

/// Weighted multi-signal selector with margin-based acceptance.
#[derive(Debug, Clone)]
pub struct WeightedFusionSelector {
    short_weight: f64,
    long_weight: f64,
    motion_weight: f64,
    iou_weight: f64,
    threshold: f64,
    margin: f64,
    motion_scale: f64,
    momentum: f64,
    stats: SelectionStats,
}

impl WeightedFusionSelector {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            short_weight: config.short_weight,
            long_weight: config.long_weight,
            motion_weight: config.motion_weight,
            iou_weight: config.iou_weight,
            threshold: config.fusion_threshold,
            margin: config.fusion_margin,
            motion_scale: config.motion_scale_px,
            momentum: config.ema_momentum,
            stats: SelectionStats::default(),
        }
    }

    /// Acquisition without appearance memory: nearest to `target` if known,
    /// otherwise the largest box.
    fn acquire(&mut self, candidates: &[Candidate], target: Option<Point>) -> Option<Selection> {
        let (index, rule, score) = match target {
            Some(t) => {
                let (i, d) = nearest_to(candidates, t)?;
                (i, SelectionRule::ReferencePoint, d)
            }
            None => {
                let (i, a) = first_argmax(candidates.iter().map(|c| c.bbox.area()))?;
                (i, SelectionRule::Fallback, a)
            }
        };
        trace!("fusion acquired candidate {index} by {rule:?}");
        self.stats.record(rule);
        Some(Selection { index, rule, score })
    }

    fn fused_scores(
        &self,
        candidates: &[Candidate],
        ctx: &SelectionContext<'_>,
        anchors: &DualAnchorReference,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> Vec<f64> {
        let expected = ctx.expected_center();
        let predicted = ctx.predicted_bbox.or(ctx.previous_bbox);

        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let emb = embeddings.embedding(i);
                let short_sim = anchors.short_similarity(emb);
                let long_sim = anchors.long_similarity(emb);
                let motion = expected
                    .map(|p| motion_coherence(&c.center(), &p, self.motion_scale))
                    .unwrap_or(0.0);
                let overlap = predicted.map(|b| iou(&c.bbox, &b)).unwrap_or(0.0);

                self.short_weight * short_sim
                    + self.long_weight * long_sim
                    + self.motion_weight * motion
                    + self.iou_weight * overlap
            })
            .collect()
    }
}

impl TargetSelector for WeightedFusionSelector {
    fn select(
        &mut self,
        candidates: &[Candidate],
        ctx: &SelectionContext<'_>,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let anchors = match ctx.reference {
            Some(EmbeddingReference::DualAnchor(r)) if !r.is_empty() => r,
            _ => {
                let target = if ctx.has_track() { ctx.expected_center() } else { ctx.anchor };
                return self.acquire(candidates, target);
            }
        };

        let scores = self.fused_scores(candidates, ctx, anchors, embeddings);
        let (best_idx, best) = first_argmax(scores.iter().copied())?;
        let second = scores
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != best_idx)
            .map(|(_, &s)| s)
            .fold(-1.0, f64::max);

        if best < self.threshold || best - second < self.margin {
            trace!("fusion rejected frame: best {best:.3}, second {second:.3}");
            self.stats.rejected += 1;
            return None;
        }

        trace!("fusion selected candidate {best_idx} ({best:.3}, second {second:.3})");
        self.stats.record(SelectionRule::Fusion);
        Some(Selection {
            index: best_idx,
            rule: SelectionRule::Fusion,
            score: best,
        })
    }

    fn new_reference(&self) -> EmbeddingReference {
        EmbeddingReference::DualAnchor(DualAnchorReference::new(self.momentum))
    }

    fn stats(&self) -> &SelectionStats {
        &self.stats
    }
}
