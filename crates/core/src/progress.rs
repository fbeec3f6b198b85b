//! Progress arithmetic shared by the coordinator and the observer.
//!
//! Both sides compute percentages and ETAs through these helpers so a value
//! shown by an observer is always the value the coordinator would report.

use crate::types::EpochMillis;

// ---------------------------------------------------------------------------
// Percentages
// ---------------------------------------------------------------------------

/// Rounded completion percentage `round(100 * done / total)`, clamped to 100.
///
/// A zero `total` yields `0`.
pub fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(done) * 100.0 / f64::from(total)).round();
    pct.clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// ETA
// ---------------------------------------------------------------------------

/// Estimated remaining time `round((elapsed_ms / done) * remaining)`.
///
/// `elapsed_ms` must be the server-reported value frozen at the last
/// settlement, never a locally ticking clock. Returns `None` until at least
/// one unit of work has settled.
pub fn estimate_remaining_ms(elapsed_ms: u64, done: u32, remaining: u32) -> Option<u64> {
    if done == 0 {
        return None;
    }
    let per_unit = elapsed_ms as f64 / f64::from(done);
    Some((per_unit * f64::from(remaining)).round() as u64)
}

/// Cosmetic "elapsed so far" for display only.
///
/// Ticks from the server-assigned `started_at`; must never feed
/// [`estimate_remaining_ms`].
pub fn elapsed_since(started_at: EpochMillis, now: EpochMillis) -> u64 {
    u64::try_from(now.saturating_sub(started_at)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// JobSession
// ---------------------------------------------------------------------------

/// Common view over the per-kind session types.
///
/// The coordinator store and the observer's snapshot comparator only need
/// identity, progress and how much work has been touched.
pub trait JobSession: Clone + Send + Sync + 'static {
    /// Session id of this run.
    fn session_id(&self) -> &str;

    /// Current 0-100 progress.
    fn progress(&self) -> u8;

    /// Units of work that have left the initial state
    /// (in flight + settled).
    fn touched(&self) -> u32;

    /// Whether the run is still executing.
    fn is_running(&self) -> bool;

    /// Whether the run reached a terminal status.
    fn is_terminal(&self) -> bool;

    /// Ordering key for work that happens after every unit settled.
    ///
    /// Compared lexicographically; it never decreases within a session.
    fn stage(&self) -> (u8, u8, u8) {
        (0, 0, 0)
    }
}
