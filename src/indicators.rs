//! Momentum indicator engine.
//!
//! Computes the MACD triple (line, signal, histogram) shared by all pattern
//! detectors. Every series has the same length as the input close series:
//! the EMA is seeded from the first sample instead of truncating a warm-up
//! window, so there are no missing values to align.

/// Fast EMA span for the MACD line.
pub const MACD_FAST_SPAN: usize = 12;
/// Slow EMA span for the MACD line.
pub const MACD_SLOW_SPAN: usize = 26;
/// EMA span for the signal line.
pub const MACD_SIGNAL_SPAN: usize = 9;

/// MACD line, signal line, and histogram, aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTriple {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl IndicatorTriple {
    #[inline]
    pub fn len(&self) -> usize {
        self.macd.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.macd.is_empty()
    }

    /// MACD line above signal line on the latest bar.
    #[inline]
    pub fn momentum_bullish(&self) -> bool {
        match (self.macd.last(), self.signal.last()) {
            (Some(m), Some(s)) => m > s,
            _ => false,
        }
    }

    /// Latest histogram value above the value three bars back.
    #[inline]
    pub fn histogram_rising(&self) -> bool {
        let n = self.histogram.len();
        n >= 3 && self.histogram[n - 1] > self.histogram[n - 3]
    }
}

/// Span-based exponential moving average, alpha = 2 / (span + 1).
///
/// Seeded from the first sample; output length equals input length.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = first;
    out.push(prev);

    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }

    out
}

/// Compute the MACD triple from a close-price series.
///
/// Line = EMA(12) - EMA(26), Signal = EMA(Line, 9), Histogram = Line - Signal.
/// Pure and deterministic; an empty input yields three empty series.
pub fn macd_triple(closes: &[f64]) -> IndicatorTriple {
    let fast = ema(closes, MACD_FAST_SPAN);
    let slow = ema(closes, MACD_SLOW_SPAN);

    let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&macd, MACD_SIGNAL_SPAN);
    let histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

    IndicatorTriple {
        macd,
        signal,
        histogram,
    }
}
