//! # chartpat - Chart Pattern Confidence Scoring
//!
//! Rule-based detection of multi-bar chart patterns over OHLCV series, each
//! scored with a 0-100 confidence instead of a bare yes/no. Four detectors
//! ship by default: Inside Bar, Bull Flag, Cup & Handle, and Flat Top
//! Breakout. Every detection carries a fact map explaining which structural,
//! momentum, and volume criteria contributed to the score.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartpat::prelude::*;
//!
//! // Any bar type works via the OHLCV trait; BarData is the bundled one
//! let bars: Vec<BarData> = (0..60)
//!     .map(|i| BarData {
//!         open: 100.0 + i as f64 * 0.1,
//!         high: 101.0 + i as f64 * 0.1,
//!         low: 99.0 + i as f64 * 0.1,
//!         close: 100.5 + i as f64 * 0.1,
//!         volume: 1_000.0,
//!     })
//!     .collect();
//!
//! let scanner = PatternScanner::with_defaults();
//! let results = scanner
//!     .scan(&bars, &MarketContext::default(), Timeframe::Daily)
//!     .unwrap();
//!
//! for (kind, detection) in &results {
//!     println!("{}: {:.1} (detected: {})", kind.name(), detection.confidence, detection.detected);
//! }
//! ```

pub mod config;
pub mod detectors;
pub mod indicators;
pub mod volume;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::DetectorConfig,
        // Detectors
        detectors::*,
        // Indicators
        indicators::{ema, macd_triple, IndicatorTriple},
        // Parallel
        scan_parallel,
        // Volume
        volume::{analyze_volume, volume_confirmed, VolumeStats},
        // Types
        BarData,
        Detection,
        FactValue,
        MarketContext,
        // Errors
        PatternError,
        PatternInfo,
        PatternKind,
        PatternScanner,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        Timeframe,
        Trend,
        OHLCVExt,
        OHLCV,
    };
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::detectors::{
    BullFlagDetector, ChartPatternDetector, CupHandleDetector, FlatTopDetector, InsideBarDetector,
};
use crate::indicators::macd_triple;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur while building a scanner or validating input
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn midpoint(&self) -> f64 {
        (self.high() + self.low()) / 2.0
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
            || self.volume().is_nan()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
            || self.volume().is_infinite()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.volume() < 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Owned OHLCV bar for callers without their own bar type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OHLCV for BarData {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Broad market trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trend {
    StrongUp,
    WeakUp,
    #[default]
    Sideways,
    WeakDown,
    StrongDown,
}

/// Ambient market state threaded through every detection call.
///
/// The built-in detectors score a single instrument's series and do not read
/// this today; it is part of the detector contract so context-aware scoring
/// stages can be added without changing signatures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketContext {
    pub trend: Trend,
    pub volatility: f64,
    pub avg_volume: f64,
}

// ============================================================
// PATTERN KINDS AND TIMEFRAMES
// ============================================================

/// Bar aggregation period for timeframe-sensitive detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
}

/// The chart patterns this crate can score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    #[serde(rename = "Inside Bar")]
    InsideBar,
    #[serde(rename = "Bull Flag")]
    BullFlag,
    #[serde(rename = "Cup Handle")]
    CupHandle,
    #[serde(rename = "Flat Top Breakout")]
    FlatTopBreakout,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::InsideBar,
        PatternKind::BullFlag,
        PatternKind::CupHandle,
        PatternKind::FlatTopBreakout,
    ];

    /// Human-readable pattern name
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::InsideBar => "Inside Bar",
            PatternKind::BullFlag => "Bull Flag",
            PatternKind::CupHandle => "Cup Handle",
            PatternKind::FlatTopBreakout => "Flat Top Breakout",
        }
    }

    /// Minimum series length the pattern's detector requires
    #[inline]
    pub fn min_bars(&self) -> usize {
        match self {
            PatternKind::InsideBar => 5,
            PatternKind::BullFlag | PatternKind::CupHandle => 30,
            PatternKind::FlatTopBreakout => 50,
        }
    }

    /// Historical-reliability scaling applied by the scanner to the raw
    /// detector confidence
    #[inline]
    pub fn scale(&self) -> f64 {
        match self {
            PatternKind::BullFlag => 1.05,
            PatternKind::CupHandle => 1.10,
            PatternKind::InsideBar | PatternKind::FlatTopBreakout => 1.0,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================
// FACT MAP
// ============================================================

/// One entry in a detection's fact map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Flag(bool),
    Num(f64),
    Text(String),
    Series(Vec<f64>),
}

/// Ordered map of named facts explaining a detection's score.
///
/// Keys are static strings owned by the detectors; ordering is deterministic
/// so two runs over the same data serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternInfo(BTreeMap<&'static str, FactValue>);

impl PatternInfo {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set_flag(&mut self, name: &'static str) {
        self.0.insert(name, FactValue::Flag(true));
    }

    pub fn set_num(&mut self, name: &'static str, value: f64) {
        self.0.insert(name, FactValue::Num(value));
    }

    pub fn set_text(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, FactValue::Text(value.into()));
    }

    pub fn set_series(&mut self, name: &'static str, values: Vec<f64>) {
        self.0.insert(name, FactValue::Series(values));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.0.get(name)
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// True when the named fact is a flag set to true
    #[inline]
    pub fn flagged(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(FactValue::Flag(true)))
    }

    #[inline]
    pub fn num(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(FactValue::Num(v)) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FactValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Merge another fact map into this one; colliding keys are overwritten
    pub fn extend(&mut self, other: PatternInfo) {
        self.0.extend(other.0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FactValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

// ============================================================
// SCANNER
// ============================================================

/// Final confidence at or above this counts as a detection
pub const DETECTION_THRESHOLD: f64 = 55.0;

/// Series shorter than this are not scanned at all
pub const DISPATCH_MIN_BARS: usize = 10;

/// Outcome of scoring one pattern over one series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detection {
    pub detected: bool,
    /// Scaled and clamped to [0, 100]
    pub confidence: f64,
    pub info: PatternInfo,
}

/// Pattern scanner: a validated configuration plus the built-in detectors.
///
/// Construction validates the configuration once; scanning is then read-only
/// and freely shareable across threads.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    config: DetectorConfig,
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternScanner {
    /// Build a scanner from a configuration, validating it
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Scanner with the default thresholds
    pub fn with_defaults() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Score one pattern over one series.
    ///
    /// Series shorter than [`DISPATCH_MIN_BARS`] yield an empty
    /// non-detection. Otherwise the raw detector confidence is scaled by the
    /// pattern's reliability factor, clamped to [0, 100], and the MACD
    /// indicator series are attached to the fact map.
    pub fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        kind: PatternKind,
        ctx: &MarketContext,
        timeframe: Timeframe,
    ) -> Detection {
        if bars.len() < DISPATCH_MIN_BARS {
            return Detection::default();
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let indicators = macd_triple(&closes);

        let (raw, mut info) = match kind {
            PatternKind::InsideBar => {
                InsideBarDetector::new(timeframe).detect(bars, &indicators, ctx, &self.config)
            }
            PatternKind::BullFlag => {
                BullFlagDetector::new().detect(bars, &indicators, ctx, &self.config)
            }
            PatternKind::CupHandle => {
                CupHandleDetector::new().detect(bars, &indicators, ctx, &self.config)
            }
            PatternKind::FlatTopBreakout => {
                FlatTopDetector::new().detect(bars, &indicators, ctx, &self.config)
            }
        };

        let confidence = (raw * kind.scale()).clamp(0.0, 100.0);
        let detected = confidence >= DETECTION_THRESHOLD;
        tracing::debug!(
            pattern = kind.name(),
            confidence,
            detected,
            "pattern scored"
        );

        info.set_series("macd_line", indicators.macd);
        info.set_series("signal_line", indicators.signal);
        info.set_series("histogram", indicators.histogram);

        Detection {
            detected,
            confidence,
            info,
        }
    }

    /// Score every built-in pattern over one series, validating the bars
    /// first
    pub fn scan<T: OHLCV>(
        &self,
        bars: &[T],
        ctx: &MarketContext,
        timeframe: Timeframe,
    ) -> Result<Vec<(PatternKind, Detection)>> {
        validate_bars(bars)?;
        Ok(PatternKind::ALL
            .iter()
            .map(|&kind| (kind, self.detect(bars, kind, ctx, timeframe)))
            .collect())
    }
}

/// Validate every bar in a series, reporting the index of the first bad one
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (index, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            PatternError::InvalidOHLCV { reason, .. } => {
                PatternError::InvalidOHLCV { index, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub detections: Vec<(PatternKind, Detection)>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments
pub fn scan_parallel<'a, T, I>(
    scanner: &PatternScanner,
    instruments: I,
    ctx: &MarketContext,
    timeframe: Timeframe,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            scanner
                .scan(bars, ctx, timeframe)
                .map(|detections| ScanResult {
                    symbol: symbol.to_string(),
                    detections,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
