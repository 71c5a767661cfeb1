//! Flat Top Breakout detector.
//!
//! An initial ascent, a meaningful pullback, then an ascending-triangle
//! squeeze: descending highs into a flat resistance with higher lows. An
//! insufficient pullback soft-stops with the ascent points only; a resistance
//! level that has not been touched recently halves the score and returns
//! before the support break check.

use crate::config::DetectorConfig;
use crate::indicators::IndicatorTriple;
use crate::volume::{analyze_volume, apply_confirmation_cap};
use crate::{MarketContext, PatternInfo, PatternKind, OHLCV};

use super::{age_stage, hard_reject, helpers, ChartPatternDetector, Outcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTopDetector;

impl FlatTopDetector {
    pub fn new() -> Self {
        Self
    }
}

/// Pullback stage: the retreat from the peak must be deep enough to form a
/// base worth breaking out of.
fn pullback_stage(peak: f64, descent_low: f64, min_pullback: f64) -> Outcome {
    let pullback = (peak - descent_low) / peak;
    if pullback < min_pullback {
        Outcome::SoftStop
    } else {
        Outcome::Continue
    }
}

impl ChartPatternDetector for FlatTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::FlatTopBreakout
    }

    fn min_bars(&self) -> usize {
        50
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        indicators: &IndicatorTriple,
        _ctx: &MarketContext,
        config: &DetectorConfig,
    ) -> (f64, PatternInfo) {
        let n = bars.len();
        if n < self.min_bars() {
            return (0.0, PatternInfo::new());
        }

        let cfg = &config.flat_top;
        let mut confidence = 0.0;
        let mut info = PatternInfo::new();

        // Initial ascent: offsets [-min(45, len-15), -25)
        let ascent_start = 45.min(n - 15) as isize;
        let Some(start_price) = helpers::at(bars, -ascent_start).map(|b| b.close()) else {
            return (0.0, info);
        };
        if start_price <= 0.0 {
            return (0.0, info);
        }
        let ascent = helpers::window(bars, -ascent_start, -25);
        let Some(peak) = helpers::max_high(ascent) else {
            return (0.0, info);
        };

        let initial_gain = (peak - start_price) / start_price;
        if initial_gain < cfg.min_initial_gain {
            return (0.0, info);
        }
        confidence += 25.0;
        info.set_text("initial_ascension", format!("{:.1}%", initial_gain * 100.0));

        let descent = helpers::window(bars, -25, -10);
        let Some(descent_low) = helpers::min_low(descent) else {
            return (confidence, info);
        };
        if pullback_stage(peak, descent_low, cfg.min_pullback) == Outcome::SoftStop {
            return (confidence, info);
        }

        // Descending highs through the pullback
        let descent_highs: Vec<f64> = descent.iter().map(|b| b.high()).collect();
        let smoothed = helpers::rolling_max_centered(&descent_highs, 3);
        if smoothed.len() >= 2 && smoothed[smoothed.len() - 1] < smoothed[0] * 0.97 {
            confidence += 20.0;
            info.set_flag("descending_highs");
        }

        // Higher lows squeezing into resistance
        let recent_lows: Vec<f64> = helpers::tail(bars, 15).iter().map(|b| b.low()).collect();
        let smoothed_lows = helpers::rolling_min_centered(&recent_lows, 3);
        if smoothed_lows.len() >= 3
            && smoothed_lows[smoothed_lows.len() - 1] > smoothed_lows[0] * 1.01
        {
            confidence += 25.0;
            info.set_flag("higher_lows");
        }

        let resistance = peak * cfg.resistance_tolerance.get();
        let touches = helpers::tail(bars, 20)
            .iter()
            .filter(|b| b.high() >= resistance)
            .count();
        if touches >= 2 {
            confidence += 15.0;
            info.set_num("resistance_level", peak);
            info.set_num("resistance_touches", touches as f64);
        }

        // Staleness of the resistance test pre-empts the break check
        let days_old = helpers::bars_since_high(bars, |h| h >= resistance);
        if let Outcome::Stale { age } = age_stage(days_old, cfg.max_age_days.get()) {
            confidence *= 0.5;
            info.set_flag("pattern_stale");
            info.set_num("days_old", age as f64);
            return (confidence, info);
        }

        let current = bars[n - 1].close();
        if current < descent_low * 0.95 {
            return hard_reject("Below support");
        }

        if indicators.momentum_bullish() {
            confidence += 10.0;
            info.set_flag("macd_bullish");
        }

        let (volume_score, volume_info) =
            analyze_volume(bars, PatternKind::FlatTopBreakout, &info, config);
        confidence += volume_score;
        info.extend(volume_info);

        confidence = apply_confirmation_cap(confidence, &mut info, config);
        (confidence, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::macd_triple;
    use crate::BarData;

    fn bar(close: f64) -> BarData {
        BarData {
            open: close - 0.3,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        }
    }

    fn detect(bars: &[BarData]) -> (f64, PatternInfo) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let triple = macd_triple(&closes);
        FlatTopDetector::new().detect(
            bars,
            &triple,
            &MarketContext::default(),
            &DetectorConfig::default(),
        )
    }

    /// 60 bars: flat base, a 20-bar ascent to a 130.5 peak, a 10-bar descent,
    /// then 15 bars of higher lows squeezing back into resistance.
    fn squeeze_bars() -> Vec<BarData> {
        let mut bars: Vec<BarData> = (0..15).map(|_| bar(100.0)).collect();
        for i in 0..20 {
            bars.push(bar(100.0 + (i as f64 + 1.0) * 1.5));
        }
        for j in 0..10 {
            bars.push(bar(128.0 - j as f64 * 1.5));
        }
        for j in 0..15 {
            bars.push(bar(115.0 + j as f64));
        }
        bars
    }

    #[test]
    fn test_short_series_is_empty() {
        let bars: Vec<BarData> = (0..49).map(|_| bar(100.0)).collect();
        let (confidence, info) = detect(&bars);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_insufficient_gain_is_empty() {
        let bars: Vec<BarData> = (0..60).map(|_| bar(100.0)).collect();
        let (confidence, info) = detect(&bars);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_insufficient_pullback_soft_stops_with_ascent_only() {
        // Ascent to 130.5, then price pins at 129.5 with no real retreat
        let mut bars: Vec<BarData> = (0..15).map(|_| bar(100.0)).collect();
        for i in 0..20 {
            bars.push(bar(100.0 + (i as f64 + 1.0) * 1.5));
        }
        for _ in 0..25 {
            bars.push(bar(129.5));
        }
        let (confidence, info) = detect(&bars);
        assert_eq!(confidence, 25.0);
        assert!(info.has("initial_ascension"));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn test_full_squeeze_scores_all_structure_points() {
        let (confidence, info) = detect(&squeeze_bars());
        assert!(info.flagged("descending_highs"));
        assert!(info.flagged("higher_lows"));
        assert_eq!(info.num("resistance_touches"), Some(2.0));
        assert!(!info.flagged("pattern_stale"));
        // Flat volume gives no confirmation, so the 70-point ceiling binds
        assert!(info.text("confidence_capped").is_some());
        assert!((confidence - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_resistance_halves_and_skips_break_check() {
        let mut bars = squeeze_bars();
        // Flatten the squeeze so no recent high reaches resistance
        for (j, b) in bars[45..].iter_mut().enumerate() {
            *b = bar(115.0 + j as f64 * 0.6);
        }
        let (confidence, info) = detect(&bars);
        assert!(info.flagged("pattern_stale"));
        assert_eq!(info.num("days_old"), Some(11.0));
        // Ascent 25 + descending highs 20 + higher lows 25, halved; no
        // resistance touches and no momentum or volume facts
        assert!((confidence - 35.0).abs() < 1e-9);
        assert!(!info.has("macd_bullish"));
        assert!(!info.flagged("pattern_broken"));
    }

    #[test]
    fn test_close_below_support_hard_rejects() {
        let mut bars = squeeze_bars();
        // Keep the recent resistance touch so staleness passes, but crash
        // the close through the descent low
        let last = bars.len() - 1;
        bars[last].close = 100.0;
        let (confidence, info) = detect(&bars);
        assert_eq!(confidence, 0.0);
        assert!(info.flagged("pattern_broken"));
        assert_eq!(info.text("break_reason"), Some("Below support"));
    }

    #[test]
    fn test_pullback_stage() {
        assert_eq!(pullback_stage(100.0, 98.0, 0.05), Outcome::SoftStop);
        assert_eq!(pullback_stage(100.0, 90.0, 0.05), Outcome::Continue);
    }
}
