//! Threshold configuration for pattern scoring.
//!
//! All thresholds are data, never hard-coded in the detectors. A
//! [`DetectorConfig`] is validated once when a scanner is built and then
//! shared read-only across every detection call. Configurations round-trip
//! through serde so deployments can load them from JSON.

use serde::{Deserialize, Serialize};

use crate::{PatternError, PatternKind, Period, Ratio, Result, Timeframe};

/// Complete threshold set consumed by the detectors and volume analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub volume: VolumeConfig,
    pub inside_bar: InsideBarConfig,
    pub bull_flag: BullFlagConfig,
    pub cup_handle: CupHandleConfig,
    pub flat_top: FlatTopConfig,
    /// Confidence ceiling applied when no good/strong/exceptional volume
    /// flag was produced by the volume analyzer.
    pub max_confidence_without_volume: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            volume: VolumeConfig::default(),
            inside_bar: InsideBarConfig::default(),
            bull_flag: BullFlagConfig::default(),
            cup_handle: CupHandleConfig::default(),
            flat_top: FlatTopConfig::default(),
            max_confidence_without_volume: 70.0,
        }
    }
}

impl DetectorConfig {
    /// Validate threshold consistency.
    ///
    /// Checks tier ordering and band ordering; a scanner refuses to build
    /// from an inconsistent configuration.
    pub fn validate(&self) -> Result<()> {
        self.volume.validate()?;
        self.inside_bar.validate()?;
        self.bull_flag.validate()?;
        self.cup_handle.validate()?;
        self.flat_top.validate()?;

        if !(0.0..=100.0).contains(&self.max_confidence_without_volume)
            || self.max_confidence_without_volume == 0.0
        {
            return Err(PatternError::InvalidConfig(format!(
                "max_confidence_without_volume = {} must be in (0, 100]",
                self.max_confidence_without_volume
            )));
        }

        Ok(())
    }
}

/// Volume tier multipliers, tier points, and per-pattern volume bonuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Current/avg20 multiplier for the exceptional tier (inclusive).
    pub exceptional_multiplier: f64,
    pub strong_multiplier: f64,
    pub good_multiplier: f64,
    pub exceptional_points: f64,
    pub strong_points: f64,
    pub good_points: f64,
    pub inside_bar_bonus: f64,
    pub bull_flag_bonus: f64,
    pub cup_handle_bonus: f64,
    pub flat_top_bonus: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            exceptional_multiplier: 2.0,
            strong_multiplier: 1.5,
            good_multiplier: 1.2,
            exceptional_points: 25.0,
            strong_points: 15.0,
            good_points: 10.0,
            inside_bar_bonus: 10.0,
            bull_flag_bonus: 10.0,
            cup_handle_bonus: 12.0,
            flat_top_bonus: 12.0,
        }
    }
}

impl VolumeConfig {
    /// Pattern-specific volume bonus magnitude.
    #[inline]
    pub fn bonus_for(&self, kind: PatternKind) -> f64 {
        match kind {
            PatternKind::InsideBar => self.inside_bar_bonus,
            PatternKind::BullFlag => self.bull_flag_bonus,
            PatternKind::CupHandle => self.cup_handle_bonus,
            PatternKind::FlatTopBreakout => self.flat_top_bonus,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.good_multiplier > 0.0
            && self.good_multiplier <= self.strong_multiplier
            && self.strong_multiplier <= self.exceptional_multiplier)
        {
            return Err(PatternError::InvalidConfig(format!(
                "volume tier multipliers must satisfy 0 < good <= strong <= exceptional \
                 (got {}, {}, {})",
                self.good_multiplier, self.strong_multiplier, self.exceptional_multiplier
            )));
        }

        for (name, points) in [
            ("exceptional_points", self.exceptional_points),
            ("strong_points", self.strong_points),
            ("good_points", self.good_points),
            ("inside_bar_bonus", self.inside_bar_bonus),
            ("bull_flag_bonus", self.bull_flag_bonus),
            ("cup_handle_bonus", self.cup_handle_bonus),
            ("flat_top_bonus", self.flat_top_bonus),
        ] {
            if !points.is_finite() || points < 0.0 {
                return Err(PatternError::InvalidConfig(format!(
                    "{name} = {points} must be finite and >= 0"
                )));
            }
        }

        Ok(())
    }
}

/// Size-ratio consolidation thresholds for the Inside Bar detector,
/// per timeframe. A tighter inside bar relative to the mother bar scores
/// higher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsideBarConfig {
    pub tight_consolidation: f64,
    pub good_consolidation: f64,
    pub moderate_consolidation: f64,
    pub tight_consolidation_weekly: f64,
    pub good_consolidation_weekly: f64,
    pub moderate_consolidation_weekly: f64,
}

impl Default for InsideBarConfig {
    fn default() -> Self {
        Self {
            tight_consolidation: 0.4,
            good_consolidation: 0.6,
            moderate_consolidation: 0.8,
            tight_consolidation_weekly: 0.5,
            good_consolidation_weekly: 0.7,
            moderate_consolidation_weekly: 0.85,
        }
    }
}

impl InsideBarConfig {
    /// (tight, good, moderate) thresholds for a timeframe.
    #[inline]
    pub fn thresholds(&self, timeframe: Timeframe) -> (f64, f64, f64) {
        match timeframe {
            Timeframe::Weekly => (
                self.tight_consolidation_weekly,
                self.good_consolidation_weekly,
                self.moderate_consolidation_weekly,
            ),
            Timeframe::Daily => (
                self.tight_consolidation,
                self.good_consolidation,
                self.moderate_consolidation,
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        for (label, (tight, good, moderate)) in [
            (
                "daily",
                (
                    self.tight_consolidation,
                    self.good_consolidation,
                    self.moderate_consolidation,
                ),
            ),
            (
                "weekly",
                (
                    self.tight_consolidation_weekly,
                    self.good_consolidation_weekly,
                    self.moderate_consolidation_weekly,
                ),
            ),
        ] {
            if !(tight > 0.0 && tight < good && good < moderate) {
                return Err(PatternError::InvalidConfig(format!(
                    "{label} inside-bar thresholds must satisfy 0 < tight < good < moderate \
                     (got {tight}, {good}, {moderate})"
                )));
            }
        }
        Ok(())
    }
}

/// Bull Flag thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BullFlagConfig {
    /// Minimum flagpole gain (fraction) to consider the pattern at all.
    pub min_flagpole_gain: f64,
    /// Healthy pullback band, as fractional change from the flag start close.
    pub pullback_low: f64,
    pub pullback_high: f64,
    /// Fraction of the flag low below which the pattern is structurally broken.
    pub flag_tolerance: Ratio,
    /// Maximum bars since the flag high before the pattern goes stale.
    pub max_age_days: Period,
}

impl Default for BullFlagConfig {
    fn default() -> Self {
        Self {
            min_flagpole_gain: 0.10,
            pullback_low: -0.10,
            pullback_high: 0.02,
            flag_tolerance: Ratio::new_const(0.98),
            max_age_days: Period::new_const(5),
        }
    }
}

impl BullFlagConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_flagpole_gain.is_finite() && self.min_flagpole_gain > 0.0) {
            return Err(PatternError::InvalidConfig(format!(
                "min_flagpole_gain = {} must be > 0",
                self.min_flagpole_gain
            )));
        }
        if self.pullback_low > self.pullback_high {
            return Err(PatternError::InvalidConfig(format!(
                "pullback band inverted: [{}, {}]",
                self.pullback_low, self.pullback_high
            )));
        }
        Ok(())
    }
}

/// Cup & Handle thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CupHandleConfig {
    pub min_cup_depth: f64,
    pub max_cup_depth: f64,
    /// Handle depth beyond which the handle counts as deep rather than clean.
    pub max_handle_depth: f64,
}

impl Default for CupHandleConfig {
    fn default() -> Self {
        Self {
            min_cup_depth: 0.12,
            max_cup_depth: 0.35,
            max_handle_depth: 0.25,
        }
    }
}

impl CupHandleConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_cup_depth > 0.0 && self.min_cup_depth < self.max_cup_depth) {
            return Err(PatternError::InvalidConfig(format!(
                "cup depth band must satisfy 0 < min < max (got {}, {})",
                self.min_cup_depth, self.max_cup_depth
            )));
        }
        if !(self.max_handle_depth > 0.0 && self.max_handle_depth < 1.0) {
            return Err(PatternError::InvalidConfig(format!(
                "max_handle_depth = {} must be in (0, 1)",
                self.max_handle_depth
            )));
        }
        Ok(())
    }
}

/// Flat Top Breakout thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatTopConfig {
    pub min_initial_gain: f64,
    pub min_pullback: f64,
    /// Fractional proximity to the peak counted as a resistance touch.
    pub resistance_tolerance: Ratio,
    pub max_age_days: Period,
}

impl Default for FlatTopConfig {
    fn default() -> Self {
        Self {
            min_initial_gain: 0.10,
            min_pullback: 0.05,
            resistance_tolerance: Ratio::new_const(0.98),
            max_age_days: Period::new_const(5),
        }
    }
}

impl FlatTopConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_initial_gain.is_finite() && self.min_initial_gain > 0.0) {
            return Err(PatternError::InvalidConfig(format!(
                "min_initial_gain = {} must be > 0",
                self.min_initial_gain
            )));
        }
        if !(self.min_pullback.is_finite() && self.min_pullback > 0.0) {
            return Err(PatternError::InvalidConfig(format!(
                "min_pullback = {} must be > 0",
                self.min_pullback
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_volume_tiers_rejected() {
        let mut config = DetectorConfig::default();
        config.volume.good_multiplier = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_pullback_band_rejected() {
        let mut config = DetectorConfig::default();
        config.bull_flag.pullback_low = 0.5;
        config.bull_flag.pullback_high = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_cup_band_rejected() {
        let mut config = DetectorConfig::default();
        config.cup_handle.min_cup_depth = 0.5;
        config.cup_handle.max_cup_depth = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut config = DetectorConfig::default();
        config.max_confidence_without_volume = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bonus_for_routing() {
        let volume = VolumeConfig::default();
        assert_eq!(volume.bonus_for(PatternKind::InsideBar), 10.0);
        assert_eq!(volume.bonus_for(PatternKind::CupHandle), 12.0);
    }

    #[test]
    fn test_thresholds_by_timeframe() {
        let inside = InsideBarConfig::default();
        assert_eq!(inside.thresholds(Timeframe::Daily), (0.4, 0.6, 0.8));
        assert_eq!(inside.thresholds(Timeframe::Weekly), (0.5, 0.7, 0.85));
    }
}
