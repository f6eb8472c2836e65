//! Quality Search - size-targeted bisection over encoder quality
//!
//! Finds a quality in `[lo, hi]` whose encoded size lands in the corridor
//! `[floor(max_size * accuracy), max_size]`. Every size comes from an injected
//! evaluator, which is expected to be expensive (one real encode per call), so
//! the search keeps the number of calls low:
//!
//! - a fixed range (`lo == hi`) costs zero evaluations
//! - after the first midpoint, one shortcut probe of the original range bound
//!   may end the search when the midpoint is far off target (x5 / ÷5)
//! - bisection stops once the bracket is no wider than [`STOP_WIDTH`]
//!
//! Size is treated as roughly increasing with quality, not strictly. When no
//! trial hits the corridor, the answer falls back to the biggest trial that
//! still fits under `max_size`, or the smallest trial if none fits.
//!
//! # Examples
//!
//! ```
//! use export_utils::quality_search::search_quality;
//!
//! // size(q) = round(q * 10000): 0.5 => 5000 (too big), 0.3 => 3000 (fits)
//! let quality = search_quality(3100, 0.8, 0.1..=0.9, |q| (q * 10000.0).round() as u64);
//! assert_eq!(quality, 0.3);
//! ```

use serde::Serialize;
use std::convert::Infallible;
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Bisection stops once `max_q - min_q` is at or below this width.
pub const STOP_WIDTH: f64 = 0.015;

/// Midpoint size this many times off target triggers the shortcut probe.
pub const SHORTCUT_FACTOR: u64 = 5;

// ═══════════════════════════════════════════════════════════════
// Trial / SearchOutcome
// ═══════════════════════════════════════════════════════════════

/// One evaluation: quality and the size it produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trial {
    pub quality: f64,
    pub size: u64,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStop {
    /// `lo == hi`, nothing evaluated
    FixedQuality,
    /// Midpoint far too big, lowest quality already reaches the corridor floor
    ShortcutLowest,
    /// Midpoint far too small, highest quality still fits
    ShortcutHighest,
    /// A trial landed in the corridor
    Corridor,
    /// Bracket exhausted, picked from the recorded trials
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Chosen quality, always inside the input range
    pub quality: f64,
    /// Index into `trials` of the trial at `quality`; `None` only for a fixed range
    pub trial: Option<usize>,
    /// Every evaluation in call order
    pub trials: Vec<Trial>,
    pub stop: SearchStop,
}

impl SearchOutcome {
    #[inline]
    pub fn evaluations(&self) -> usize {
        self.trials.len()
    }

    /// The trial whose artifact should become the output.
    pub fn chosen(&self) -> Option<&Trial> {
        self.trial.and_then(|idx| self.trials.get(idx))
    }
}

// ═══════════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════════

/// Infallible form: returns only the chosen quality.
///
/// # Panics
/// On `max_size == 0`, accuracy outside `[0, 1]`, or a range not inside `[0, 1]`.
pub fn search_quality<F>(
    max_size: u64,
    accuracy: f64,
    range: RangeInclusive<f64>,
    mut size_of: F,
) -> f64
where
    F: FnMut(f64) -> u64,
{
    let outcome: Result<SearchOutcome, Infallible> =
        try_search_quality(max_size, accuracy, range, |q| Ok(size_of(q)));
    match outcome {
        Ok(outcome) => outcome.quality,
        Err(never) => match never {},
    }
}

/// Runs the search with a fallible evaluator.
///
/// The first evaluator error ends the search and is returned as is; no
/// quality is chosen in that case.
///
/// # Panics
/// On `max_size == 0`, accuracy outside `[0, 1]`, or a range not inside `[0, 1]`.
/// These are caller bugs; validate user input with
/// [`TargetSpec`](crate::types::TargetSpec) and
/// [`QualityRange`](crate::types::QualityRange) first.
pub fn try_search_quality<F, E>(
    max_size: u64,
    accuracy: f64,
    range: RangeInclusive<f64>,
    mut evaluate: F,
) -> Result<SearchOutcome, E>
where
    F: FnMut(f64) -> Result<u64, E>,
{
    let (range_lo, range_hi) = range.into_inner();
    assert!(max_size >= 1, "Invalid argument: max_size >= 1 is not met");
    assert!(
        (0.0..=1.0).contains(&accuracy),
        "Invalid argument: 0 <= accuracy <= 1 is not met"
    );
    assert!(
        0.0 <= range_lo && range_lo <= range_hi && range_hi <= 1.0,
        "Invalid argument: 0 <= lo <= hi <= 1 is not met"
    );

    if range_lo == range_hi {
        debug!(quality = range_lo, "Fixed quality range, nothing to search");
        return Ok(SearchOutcome {
            quality: range_lo,
            trial: None,
            trials: Vec::new(),
            stop: SearchStop::FixedQuality,
        });
    }

    let min_size = (max_size as f64 * accuracy) as u64;
    let mut trials: Vec<Trial> = Vec::new();
    let mut min_q = range_lo;
    let mut max_q = range_hi;

    let mut curr = record_trial(&mut trials, &mut evaluate, (min_q + max_q) / 2.0)?;

    // One shot, original bounds only.
    let first_size = trials[curr].size;
    if first_size > max_size.saturating_mul(SHORTCUT_FACTOR) {
        let lowest = record_trial(&mut trials, &mut evaluate, range_lo)?;
        if trials[lowest].size >= min_size {
            return Ok(finish(trials, lowest, SearchStop::ShortcutLowest));
        }
    } else if first_size < min_size / SHORTCUT_FACTOR {
        let highest = record_trial(&mut trials, &mut evaluate, range_hi)?;
        if trials[highest].size <= max_size {
            return Ok(finish(trials, highest, SearchStop::ShortcutHighest));
        }
    }

    loop {
        let Trial { quality, size } = trials[curr];
        if min_size <= size && size <= max_size {
            return Ok(finish(trials, curr, SearchStop::Corridor));
        } else if size < min_size {
            min_q = quality;
        } else {
            max_q = quality;
        }

        debug_assert!(max_q >= min_q);
        if max_q - min_q <= STOP_WIDTH {
            break;
        }

        curr = record_trial(&mut trials, &mut evaluate, (min_q + max_q) / 2.0)?;
    }

    let chosen = fallback_trial(&trials, max_size);
    Ok(finish(trials, chosen, SearchStop::Fallback))
}

fn record_trial<F, E>(trials: &mut Vec<Trial>, evaluate: &mut F, quality: f64) -> Result<usize, E>
where
    F: FnMut(f64) -> Result<u64, E>,
{
    let size = evaluate(quality)?;
    debug!(trial = trials.len(), quality, size, "Quality trial");
    trials.push(Trial { quality, size });
    Ok(trials.len() - 1)
}

fn finish(trials: Vec<Trial>, chosen: usize, stop: SearchStop) -> SearchOutcome {
    let quality = trials[chosen].quality;
    info!(
        quality,
        size = trials[chosen].size,
        evaluations = trials.len(),
        stop = ?stop,
        "Quality search finished"
    );
    SearchOutcome {
        quality,
        trial: Some(chosen),
        trials,
        stop,
    }
}

/// Largest size not above `max_size`; if every trial is above it, the
/// smallest size. Ties go to the earliest trial.
fn fallback_trial(trials: &[Trial], max_size: u64) -> usize {
    debug_assert!(!trials.is_empty());

    let mut best_fitting: Option<usize> = None;
    for (idx, trial) in trials.iter().enumerate() {
        if trial.size > max_size {
            continue;
        }
        match best_fitting {
            Some(best) if trials[best].size >= trial.size => {}
            _ => best_fitting = Some(idx),
        }
    }

    best_fitting.unwrap_or_else(|| {
        trials
            .iter()
            .enumerate()
            .fold(0, |best, (idx, trial)| {
                if trial.size < trials[best].size {
                    idx
                } else {
                    best
                }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn linear_size(quality: f64) -> u64 {
        (quality * 10000.0).round() as u64
    }

    /// Runs the infallible search and returns (quality, evaluator calls).
    fn run(max_size: u64, accuracy: f64, range: RangeInclusive<f64>) -> (f64, usize) {
        let calls = Cell::new(0);
        let quality = search_quality(max_size, accuracy, range, |q| {
            calls.set(calls.get() + 1);
            linear_size(q)
        });
        (quality, calls.get())
    }

    #[test]
    fn test_basic() {
        // 0.5 => 5000, 0.3 => 3000
        assert_eq!(run(3100, 0.8, 0.1..=0.9), (0.3, 2));
    }

    #[test]
    fn test_same_min_max_quality() {
        assert_eq!(run(10, 1.0, 0.5..=0.5), (0.5, 0));
    }

    #[test]
    fn test_target_very_small() {
        // 0.5 => 5000, lowest bound 0.1 => 1000 >= 10
        assert_eq!(run(10, 1.0, 0.1..=0.9), (0.1, 2));
    }

    #[test]
    fn test_target_very_small_but_not_below_lowest_quality() {
        // 0.5005, 0.001, 0.25075, 0.125875, 0.0634375 => 634
        assert_eq!(run(900, 0.5, 0.001..=1.0), (0.0634375, 5));
    }

    #[test]
    fn test_target_very_big() {
        // 0.5 => 5000, highest bound 1 => 10000 <= 100000
        assert_eq!(run(100000, 1.0, 0.0..=1.0), (1.0, 2));
    }

    #[test]
    fn test_loose_size_accuracy() {
        assert_eq!(run(10000, 0.1, 0.0..=1.0), (0.5, 1));
    }

    #[test]
    fn test_strict_accuracy_cannot_reach_target() {
        // 0.4096, 0, 0.2048, 0.1024, 0.0512, 0.0256, 0.0128; only q=0 fits
        assert_eq!(run(10, 1.0, 0.0..=0.8192), (0.0, 7));
    }

    #[test]
    fn test_strict_accuracy_reaches_target_through_fallback() {
        // Same trials as above, 128 <= 129 is the biggest fitting size
        assert_eq!(run(129, 1.0, 0.0..=0.8192), (0.0128, 7));
    }

    #[test]
    fn test_outcome_records_trials_in_call_order() {
        let outcome: Result<_, Infallible> =
            try_search_quality(10, 1.0, 0.1..=0.9, |q| Ok(linear_size(q)));
        let outcome = outcome.unwrap();
        assert_eq!(
            outcome.trials,
            vec![
                Trial { quality: 0.5, size: 5000 },
                Trial { quality: 0.1, size: 1000 },
            ]
        );
        assert_eq!(outcome.trial, Some(1));
        assert_eq!(outcome.stop, SearchStop::ShortcutLowest);
        assert_eq!(outcome.chosen().unwrap().quality, outcome.quality);
    }

    #[test]
    fn test_shortcut_miss_continues_from_midpoint() {
        // 0.5 => 5000 > 5 * 100, so q=0 is probed; its 50 bytes miss the floor of 100.
        let outcome: Result<_, Infallible> = try_search_quality(100, 1.0, 0.0..=1.0, |q| {
            Ok(if q == 0.0 { 50 } else { linear_size(q) })
        });
        let outcome = outcome.unwrap();
        assert_eq!(outcome.trials[1], Trial { quality: 0.0, size: 50 });
        // bisection resumes from the midpoint's bracket
        assert_eq!(outcome.trials[2].quality, 0.25);
        assert_eq!(outcome.stop, SearchStop::Fallback);
        // 0.0078125 => 78 beats the probe's 50
        assert_eq!(outcome.quality, 0.0078125);
        assert_eq!(outcome.chosen().unwrap().size, 78);
    }

    #[test]
    fn test_fallback_prefers_earliest_of_equal_fitting_sizes() {
        // Flat encoder below target: every trial is 50 bytes, min size 100.
        let outcome: Result<_, Infallible> = try_search_quality(100, 1.0, 0.0..=1.0, |_| Ok(50));
        let outcome = outcome.unwrap();
        assert_eq!(outcome.stop, SearchStop::Fallback);
        assert_eq!(outcome.trial, Some(0));
        assert_eq!(outcome.quality, 0.5);
        assert_eq!(outcome.evaluations(), 7);
    }

    #[test]
    fn test_fallback_picks_smallest_when_nothing_fits() {
        // 300 + q*100 never fits under 100 and never triggers the x5 shortcut.
        let outcome: Result<_, Infallible> =
            try_search_quality(100, 0.5, 0.0..=1.0, |q| Ok(300 + (q * 100.0).round() as u64));
        let outcome = outcome.unwrap();
        assert_eq!(outcome.stop, SearchStop::Fallback);
        assert_eq!(outcome.evaluations(), 7);
        assert_eq!(outcome.quality, 0.0078125);
        assert_eq!(outcome.chosen().unwrap().size, 301);
    }

    #[test]
    fn test_fallback_smallest_ties_go_to_earliest() {
        let outcome: Result<_, Infallible> = try_search_quality(100, 1.0, 0.0..=1.0, |_| Ok(200));
        let outcome = outcome.unwrap();
        assert_eq!(outcome.trial, Some(0));
        assert_eq!(outcome.quality, 0.5);
    }

    #[test]
    fn test_non_monotonic_encoder_still_answers_in_range() {
        // Size drops again near the top of the range.
        let size = |q: f64| if q > 0.7 { 10 } else { linear_size(q) };
        let quality = search_quality(2000, 0.9, 0.2..=1.0, size);
        assert!((0.2..=1.0).contains(&quality));
    }

    #[test]
    fn test_evaluator_error_aborts_search() {
        let mut calls = 0;
        let result = try_search_quality(3100, 0.8, 0.0..=1.0, |q| {
            calls += 1;
            if calls == 2 {
                Err(format!("encoder crashed at {}", q))
            } else {
                Ok(linear_size(q))
            }
        });
        assert_eq!(result, Err("encoder crashed at 0.25".to_string()));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_zero_accuracy_accepts_any_fitting_size() {
        // min size 0: first midpoint that fits ends the search
        assert_eq!(run(6000, 0.0, 0.0..=1.0), (0.5, 1));
    }

    #[test]
    #[should_panic(expected = "max_size >= 1")]
    fn test_zero_max_size_panics() {
        search_quality(0, 0.8, 0.0..=1.0, linear_size);
    }

    #[test]
    #[should_panic(expected = "0 <= accuracy <= 1")]
    fn test_bad_accuracy_panics() {
        search_quality(100, 1.5, 0.0..=1.0, linear_size);
    }

    #[test]
    #[should_panic(expected = "0 <= lo <= hi <= 1")]
    fn test_inverted_range_panics() {
        search_quality(100, 0.8, 0.9..=0.1, linear_size);
    }

    #[test]
    #[should_panic(expected = "0 <= lo <= hi <= 1")]
    fn test_range_above_one_panics() {
        search_quality(100, 0.8, 0.5..=1.5, linear_size);
    }
}
