//! Volume analyzer.
//!
//! Scores the volume signature of an in-progress pattern detection: a tiered
//! base score from the current-bar volume multiplier, a pattern-specific
//! bonus, and a flat volume-trend bonus. Never fails: a sub-branch that
//! cannot be computed simply contributes zero for that branch.

use crate::config::DetectorConfig;
use crate::detectors::helpers;
use crate::{FactValue, PatternInfo, PatternKind, OHLCV};

/// Minimum series length for any volume scoring.
pub const VOLUME_MIN_BARS: usize = 20;
/// Flat points for a rising or falling recent-volume trend.
pub const TREND_BONUS: f64 = 5.0;

/// Score the volume signature for one pattern detection call.
///
/// `pattern_info` is the detector's in-progress fact map, read only for
/// pattern-specific facts (e.g. a recorded flagpole gain). Returns the volume
/// score and the volume facts to merge into the detector's map. Series
/// shorter than [`VOLUME_MIN_BARS`] yield `(0.0, {})`.
pub fn analyze_volume<T: OHLCV>(
    bars: &[T],
    kind: PatternKind,
    pattern_info: &PatternInfo,
    config: &DetectorConfig,
) -> (f64, PatternInfo) {
    let mut info = PatternInfo::new();
    let n = bars.len();
    if n < VOLUME_MIN_BARS {
        return (0.0, info);
    }

    let Some(avg_20) = helpers::mean_volume(helpers::tail(bars, 20)) else {
        return (0.0, info);
    };
    if avg_20 <= 0.0 {
        return (0.0, info);
    }

    let current = bars[n - 1].volume();
    let recent_5 = helpers::mean_volume(helpers::tail(bars, 5)).unwrap_or(current);
    let multiplier = current / avg_20;
    let recent_multiplier = recent_5 / avg_20;

    info.set_num("avg_volume_20", avg_20);
    info.set_num("current_volume", current);
    info.set_num("volume_multiplier", multiplier);
    info.set_num("recent_multiplier", recent_multiplier);

    let mut score = tier_score(multiplier, &mut info, config);
    score += pattern_bonus(bars, kind, pattern_info, multiplier, &mut info, config);

    // Volume trend, independent of the pattern branch
    if recent_multiplier > 1.1 {
        score += TREND_BONUS;
        info.set_flag("increasing_volume_trend");
    } else if recent_multiplier < 0.9 {
        score += TREND_BONUS;
        info.set_flag("decreasing_volume_trend");
    }

    (score, info)
}

/// Cap confidence at the configured ceiling when no good/strong/exceptional
/// volume flag is present, recording the reason. Returns the capped value.
pub(crate) fn apply_confirmation_cap(
    confidence: f64,
    info: &mut PatternInfo,
    config: &DetectorConfig,
) -> f64 {
    if volume_confirmed(info) {
        return confidence;
    }
    info.set_text("confidence_capped", "No volume confirmation");
    confidence.min(config.max_confidence_without_volume)
}

/// True when the fact map carries at least a good-tier volume flag.
pub fn volume_confirmed(info: &PatternInfo) -> bool {
    info.flagged("good_volume") || info.flagged("strong_volume") || info.flagged("exceptional_volume")
}

/// Tiered base score. Thresholds are inclusive: a multiplier exactly on a
/// boundary classifies into the higher tier.
fn tier_score(multiplier: f64, info: &mut PatternInfo, config: &DetectorConfig) -> f64 {
    let v = &config.volume;
    if multiplier >= v.exceptional_multiplier {
        info.set_flag("exceptional_volume");
        info.set_text(
            "volume_status",
            format!("Exceptional Volume ({multiplier:.1}x)"),
        );
        v.exceptional_points
    } else if multiplier >= v.strong_multiplier {
        info.set_flag("strong_volume");
        info.set_text("volume_status", format!("Strong Volume ({multiplier:.1}x)"));
        v.strong_points
    } else if multiplier >= v.good_multiplier {
        info.set_flag("good_volume");
        info.set_text("volume_status", format!("Good Volume ({multiplier:.1}x)"));
        v.good_points
    } else {
        info.set_flag("weak_volume");
        info.set_text("volume_status", format!("Weak Volume ({multiplier:.1}x)"));
        0.0
    }
}

/// Pattern-specific bonus; exactly one branch is active per call. Each branch
/// is an isolated fallible step that contributes zero when its preconditions
/// do not hold.
fn pattern_bonus<T: OHLCV>(
    bars: &[T],
    kind: PatternKind,
    pattern_info: &PatternInfo,
    multiplier: f64,
    info: &mut PatternInfo,
    config: &DetectorConfig,
) -> f64 {
    let bonus = config.volume.bonus_for(kind);
    match kind {
        PatternKind::BullFlag => {
            // Only once a flagpole gain has been established by the detector
            if !pattern_info.has("flagpole_gain") {
                return 0.0;
            }
            let Some(ratio) = flagpole_flag_ratio(bars) else {
                return 0.0;
            };
            if ratio > 1.2 {
                info.set_flag("flagpole_volume_pattern");
                info.set_num("flagpole_vol_ratio", ratio);
                bonus
            } else if ratio > 1.1 {
                info.set_flag("moderate_flagpole_volume");
                info.set_num("flagpole_vol_ratio", ratio);
                bonus / 2.0
            } else {
                0.0
            }
        }
        PatternKind::CupHandle => {
            let Some(ratio) = handle_cup_ratio(bars) else {
                return 0.0;
            };
            if ratio < 0.80 {
                info.set_flag("significant_volume_dryup");
                info.set_num("handle_vol_ratio", ratio);
                bonus
            } else if ratio < 0.90 {
                info.set_flag("moderate_volume_dryup");
                info.set_num("handle_vol_ratio", ratio);
                bonus * 0.75
            } else {
                0.0
            }
        }
        PatternKind::FlatTopBreakout => {
            let current = bars[bars.len() - 1].volume();
            let Some(avg_resistance) = helpers::mean_volume(helpers::tail(bars, 20)) else {
                return 0.0;
            };
            if avg_resistance <= 0.0 {
                return 0.0;
            }
            if current > avg_resistance * 1.4 {
                info.set_flag("breakout_volume_surge");
                info.set_num("resistance_vol_ratio", current / avg_resistance);
                bonus
            } else if current > avg_resistance * 1.2 {
                info.set_flag("moderate_breakout_volume");
                info.set_num("resistance_vol_ratio", current / avg_resistance);
                bonus * 0.75
            } else {
                0.0
            }
        }
        PatternKind::InsideBar => {
            // Quiet consolidation and breakout expansion are independently
            // additive when both hold
            let mut score = 0.0;
            if multiplier < 0.8 {
                score += bonus;
                info.set_flag("consolidation_volume");
            } else if multiplier < 1.0 {
                score += bonus * 0.67;
                info.set_flag("quiet_consolidation");
            }
            if multiplier >= 1.5 {
                score += bonus;
                info.set_flag("breakout_volume_expansion");
            }
            score
        }
    }
}

/// Mean flagpole volume over offsets [-min(25, len-10), -15) divided by mean
/// volume over the trailing-15 flag window.
fn flagpole_flag_ratio<T: OHLCV>(bars: &[T]) -> Option<f64> {
    let n = bars.len();
    let pole_start = 25.min(n.saturating_sub(10));
    if pole_start <= 15 {
        return None;
    }
    let pole_vol = helpers::mean_volume(helpers::window(bars, -(pole_start as isize), -15))?;
    let flag_vol = helpers::mean_volume(helpers::tail(bars, 15))?;
    if flag_vol > 0.0 {
        Some(pole_vol / flag_vol)
    } else {
        None
    }
}

/// Mean handle volume divided by mean cup volume; only defined when the
/// handle spans more than 5 bars and the cup portion more than 10.
fn handle_cup_ratio<T: OHLCV>(bars: &[T]) -> Option<f64> {
    let n = bars.len();
    let handle_days = 30.min(n / 3);
    if handle_days <= 5 || n - handle_days <= 10 {
        return None;
    }
    let cup_vol = helpers::mean_volume(&bars[..n - handle_days])?;
    let handle_vol = helpers::mean_volume(helpers::tail(bars, handle_days))?;
    if cup_vol > 0.0 {
        Some(handle_vol / cup_vol)
    } else {
        None
    }
}

/// Serde-friendly snapshot of the rolling volume statistics recorded into
/// every volume fact map.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct VolumeStats {
    pub avg_20: f64,
    pub current: f64,
    pub recent_5: f64,
    pub multiplier: f64,
    pub recent_multiplier: f64,
}

impl VolumeStats {
    /// Extract the recorded statistics from a fact map produced by
    /// [`analyze_volume`], if present.
    pub fn from_info(info: &PatternInfo) -> Option<Self> {
        let num = |name: &str| match info.get(name) {
            Some(FactValue::Num(v)) => Some(*v),
            _ => None,
        };
        let avg_20 = num("avg_volume_20")?;
        let current = num("current_volume")?;
        let multiplier = num("volume_multiplier")?;
        let recent_multiplier = num("recent_multiplier")?;
        Some(Self {
            avg_20,
            current,
            recent_5: recent_multiplier * avg_20,
            multiplier,
            recent_multiplier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BarData;

    fn bars_with_volumes(volumes: &[f64]) -> Vec<BarData> {
        volumes
            .iter()
            .map(|&v| BarData {
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: v,
            })
            .collect()
    }

    #[test]
    fn test_short_series_scores_zero() {
        let bars = bars_with_volumes(&[100.0; 19]);
        let (score, info) = analyze_volume(
            &bars,
            PatternKind::InsideBar,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert_eq!(score, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_tier_boundary_is_inclusive() {
        // 19 bars at 900 then one at 1900: avg20 = 950, multiplier = 2.0 exactly
        let mut volumes = vec![900.0; 19];
        volumes.push(1900.0);
        let bars = bars_with_volumes(&volumes);
        let (_, info) = analyze_volume(
            &bars,
            PatternKind::FlatTopBreakout,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(info.flagged("exceptional_volume"));
        assert!(!info.flagged("strong_volume"));
    }

    #[test]
    fn test_weak_volume_scores_zero_base() {
        let bars = bars_with_volumes(&[100.0; 20]);
        let (score, info) = analyze_volume(
            &bars,
            PatternKind::FlatTopBreakout,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(info.flagged("weak_volume"));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_inside_bar_bonuses_are_additive_when_exclusive() {
        // Flat volume (multiplier 1.0): neither consolidation nor expansion
        let bars = bars_with_volumes(&[100.0; 20]);
        let (score, info) = analyze_volume(
            &bars,
            PatternKind::InsideBar,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert_eq!(score, 0.0);
        assert!(!info.flagged("consolidation_volume"));
        assert!(!info.flagged("breakout_volume_expansion"));
    }

    #[test]
    fn test_inside_bar_quiet_consolidation() {
        // Last bar volume well below average
        let mut volumes = vec![100.0; 19];
        volumes.push(20.0);
        let bars = bars_with_volumes(&volumes);
        let (score, info) = analyze_volume(
            &bars,
            PatternKind::InsideBar,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(info.flagged("consolidation_volume"));
        // weak tier (0) + full bonus (10) + decreasing trend (5)
        assert_eq!(score, 15.0);
        assert!(info.flagged("decreasing_volume_trend"));
    }

    #[test]
    fn test_bull_flag_bonus_requires_flagpole_fact() {
        let mut volumes = vec![500.0; 25];
        volumes.extend(vec![100.0; 15]);
        let bars = bars_with_volumes(&volumes);

        let (_, info) = analyze_volume(
            &bars,
            PatternKind::BullFlag,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(!info.has("flagpole_vol_ratio"));

        let mut with_fact = PatternInfo::new();
        with_fact.set_text("flagpole_gain", "12.0%");
        let (_, info) = analyze_volume(
            &bars,
            PatternKind::BullFlag,
            &with_fact,
            &DetectorConfig::default(),
        );
        assert!(info.flagged("flagpole_volume_pattern"));
    }

    #[test]
    fn test_cup_handle_volume_dryup() {
        // 30 cup bars at heavy volume, 15 handle bars dried up
        let mut volumes = vec![1000.0; 30];
        volumes.extend(vec![200.0; 15]);
        let bars = bars_with_volumes(&volumes);
        let (_, info) = analyze_volume(
            &bars,
            PatternKind::CupHandle,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(info.flagged("significant_volume_dryup"));
    }

    #[test]
    fn test_increasing_trend_bonus() {
        let mut volumes = vec![100.0; 15];
        volumes.extend(vec![200.0; 5]);
        let bars = bars_with_volumes(&volumes);
        let (_, info) = analyze_volume(
            &bars,
            PatternKind::FlatTopBreakout,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        assert!(info.flagged("increasing_volume_trend"));
    }

    #[test]
    fn test_volume_stats_roundtrip() {
        let bars = bars_with_volumes(&[100.0; 20]);
        let (_, info) = analyze_volume(
            &bars,
            PatternKind::InsideBar,
            &PatternInfo::new(),
            &DetectorConfig::default(),
        );
        let stats = VolumeStats::from_info(&info).unwrap();
        assert_eq!(stats.avg_20, 100.0);
        assert_eq!(stats.multiplier, 1.0);
    }
}
