//! Structured observability hooks for the plan/validate lifecycle.
//!
//! This module provides:
//! - Walk-scoped tracing spans via the `WalkSpan` RAII guard
//! - Emission functions for key lifecycle events: plan built, batch
//!   validated, gap retrieval, walk finished
//!
//! Events are emitted at `info!` level and respect `RUST_LOG`.

use tracing::info;

/// RAII guard that enters a walk-scoped tracing span for the duration
/// of a plan/validate/deploy cycle.
pub struct WalkSpan {
    _span: tracing::span::EnteredSpan,
}

impl WalkSpan {
    /// Create and enter a span tagged with the walk id.
    pub fn enter(walk_id: &str) -> Self {
        let span = tracing::info_span!("shipwright.walk", walk_id = %walk_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a deploy plan was built.
pub fn emit_plan_built(batch_count: usize, item_count: usize, warning_count: usize) {
    info!(
        event = "plan.built",
        batches = batch_count,
        items = item_count,
        warnings = warning_count,
    );
}

/// Emit event: one batch submission finished.
pub fn emit_batch_submitted(walk_id: &str, batch: usize, attempts: u32, success: bool) {
    info!(
        event = "walk.batch_submitted",
        walk_id = %walk_id,
        batch = batch,
        attempts = attempts,
        success = success,
    );
}

/// Emit event: a recoverable gap is being retrieved from the target.
pub fn emit_gap_retrieval(walk_id: &str, batch: usize, gap: &str) {
    info!(
        event = "walk.gap_retrieval",
        walk_id = %walk_id,
        batch = batch,
        gap = %gap,
    );
}

/// Emit event: the walk reached a terminal state.
pub fn emit_walk_finished(walk_id: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "walk.finished",
        walk_id = %walk_id,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}
