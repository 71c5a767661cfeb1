//! Shared helpers for pattern detection.
//!
//! Bar series are addressed the way the scoring rules are written: by
//! negative offset from the latest bar (offset -1 = latest) and by
//! half-open offset windows. Rolling centered extrema mirror a 3-bar
//! centered rolling window with the incomplete edges dropped.

use crate::OHLCV;

/// Lookback horizon for staleness checks; [`bars_since_high`] returns
/// [`STALENESS_SENTINEL`] when no bar in the horizon matches.
pub const STALENESS_LOOKBACK: usize = 10;
pub const STALENESS_SENTINEL: usize = 11;

/// Bar at a signed offset: negative offsets count back from the end
/// (-1 = latest), non-negative offsets index from the start.
#[inline]
pub fn at<T: OHLCV>(bars: &[T], offset: isize) -> Option<&T> {
    let n = bars.len() as isize;
    let idx = if offset < 0 { n + offset } else { offset };
    if (0..n).contains(&idx) {
        Some(&bars[idx as usize])
    } else {
        None
    }
}

/// Half-open window `[start, end)` of signed offsets. Out-of-range bounds
/// clamp to the series; an inverted window is empty.
pub fn window<T: OHLCV>(bars: &[T], start: isize, end: isize) -> &[T] {
    let n = bars.len() as isize;
    let resolve = |offset: isize| -> isize {
        let idx = if offset < 0 { n + offset } else { offset };
        idx.clamp(0, n)
    };
    let s = resolve(start) as usize;
    let e = resolve(end) as usize;
    if s >= e {
        &bars[0..0]
    } else {
        &bars[s..e]
    }
}

/// Trailing `k` bars (the whole series when shorter).
#[inline]
pub fn tail<T: OHLCV>(bars: &[T], k: usize) -> &[T] {
    &bars[bars.len().saturating_sub(k)..]
}

/// Mean volume over a window; `None` when the window is empty.
pub fn mean_volume<T: OHLCV>(bars: &[T]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let sum: f64 = bars.iter().map(|b| b.volume()).sum();
    Some(sum / bars.len() as f64)
}

/// Highest high over a window; `None` when the window is empty.
pub fn max_high<T: OHLCV>(bars: &[T]) -> Option<f64> {
    bars.iter().map(|b| b.high()).reduce(f64::max)
}

/// Lowest low over a window; `None` when the window is empty.
pub fn min_low<T: OHLCV>(bars: &[T]) -> Option<f64> {
    bars.iter().map(|b| b.low()).reduce(f64::min)
}

/// Centered rolling maximum with the given odd window, incomplete edge
/// windows dropped. A series shorter than the window yields nothing.
pub fn rolling_max_centered(values: &[f64], window: usize) -> Vec<f64> {
    rolling_centered(values, window, f64::max)
}

/// Centered rolling minimum, same edge semantics as [`rolling_max_centered`].
pub fn rolling_min_centered(values: &[f64], window: usize) -> Vec<f64> {
    rolling_centered(values, window, f64::min)
}

fn rolling_centered(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let half = window / 2;
    let n = values.len();
    if window == 0 || n < window {
        return Vec::new();
    }

    (half..n - half)
        .map(|i| {
            values[i - half..=i + half]
                .iter()
                .copied()
                .reduce(pick)
                .unwrap_or(values[i])
        })
        .collect()
}

/// Number of bars since the most recent high satisfying `pred`, scanning
/// offsets -1..-10. Returns [`STALENESS_SENTINEL`] when none match.
pub fn bars_since_high<T: OHLCV, F: Fn(f64) -> bool>(bars: &[T], pred: F) -> usize {
    for i in 1..=STALENESS_LOOKBACK {
        if let Some(bar) = at(bars, -(i as isize)) {
            if pred(bar.high()) {
                return i;
            }
        }
    }
    STALENESS_SENTINEL
}
