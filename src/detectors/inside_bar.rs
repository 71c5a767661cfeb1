//! Inside Bar detector (buy-only).
//!
//! Scans backward from the latest bar for one or two consecutive inside bars
//! strictly contained in a bullish mother bar, each inside bar closing
//! bearish. Scoring rewards tight, centered consolidation, momentum
//! confirmation, and quiet volume; setups without volume confirmation are
//! capped, and aged mother bars take a multiplicative penalty.

use crate::config::DetectorConfig;
use crate::indicators::IndicatorTriple;
use crate::volume::{analyze_volume, apply_confirmation_cap};
use crate::{MarketContext, OHLCVExt, PatternInfo, PatternKind, Timeframe, OHLCV};

use super::{helpers, ChartPatternDetector};

/// Per-timeframe scan parameters: lookback depth, aging threshold (mother-bar
/// offset), base confidence, aging penalty.
#[derive(Debug, Clone, Copy)]
struct ScanParams {
    max_lookback: usize,
    aging_offset: isize,
    base_confidence: f64,
    aging_penalty: f64,
    label: &'static str,
}

impl ScanParams {
    fn for_timeframe(timeframe: Timeframe) -> Self {
        match timeframe {
            Timeframe::Weekly => Self {
                max_lookback: 6,
                aging_offset: -8,
                base_confidence: 35.0,
                aging_penalty: 0.7,
                label: "Weekly",
            },
            Timeframe::Daily => Self {
                max_lookback: 4,
                aging_offset: -6,
                base_confidence: 30.0,
                aging_penalty: 0.8,
                label: "Daily",
            },
        }
    }
}

/// Inside Bar pattern detector. The timeframe selects lookback depth,
/// consolidation thresholds, base confidence, and aging behavior.
#[derive(Debug, Clone, Copy)]
pub struct InsideBarDetector {
    pub timeframe: Timeframe,
}

impl Default for InsideBarDetector {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::Daily,
        }
    }
}

impl InsideBarDetector {
    pub fn new(timeframe: Timeframe) -> Self {
        Self { timeframe }
    }
}

impl ChartPatternDetector for InsideBarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::InsideBar
    }

    fn min_bars(&self) -> usize {
        5
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

        let params = ScanParams::for_timeframe(self.timeframe);

        // Backward scan: the streak must start at the latest bar, at most
        // two consecutive qualifying inside bars
        let mut mother_offset: isize = 0;
        let mut first_inside: isize = 0;
        let mut count = 0usize;

        for k in 1..=params.max_lookback {
            let i = -(k as isize);
            let (Some(cur), Some(prev)) = (helpers::at(bars, i), helpers::at(bars, i - 1)) else {
                break;
            };

            let strictly_inside = cur.high() < prev.high() && cur.low() > prev.low();
            if !(strictly_inside && prev.is_bullish() && cur.is_bearish()) {
                break;
            }

            if count == 0 {
                mother_offset = i - 1;
                first_inside = i;
                count = 1;
            } else if count == 1 && i == first_inside - 1 {
                count = 2;
                break;
            } else {
                break;
            }
        }

        if count == 0 {
            return (0.0, PatternInfo::new());
        }

        let (Some(mother), Some(inside)) = (
            helpers::at(bars, mother_offset),
            helpers::at(bars, first_inside),
        ) else {
            return (0.0, PatternInfo::new());
        };
        if !(mother.is_bullish() && inside.is_bearish()) {
            return (0.0, PatternInfo::new());
        }

        let mut confidence = params.base_confidence;
        let mut info = PatternInfo::new();

        info.set_text("timeframe", params.label);
        info.set_num("mother_bar_high", mother.high());
        info.set_num("mother_bar_low", mother.low());
        info.set_num("inside_bar_high", inside.high());
        info.set_num("inside_bar_low", inside.low());
        info.set_num("inside_bars_count", count as f64);
        info.set_flag("color_validated");
        info.set_text("mother_bar_color", "Green");
        info.set_text("inside_bar_color", "Red");

        confidence += 15.0;
        info.set_flag("proper_color_combo");

        // Single inside bar is the cleaner setup
        if count == 1 {
            confidence += 15.0;
            info.set_flag("single_inside_bar");
        } else {
            confidence += 10.0;
            info.set_flag("double_inside_bar");
        }

        let mother_range = mother.range();
        if mother_range > 0.0 {
            let size_ratio = inside.range() / mother_range;
            info.set_text("size_ratio", format!("{:.1}%", size_ratio * 100.0));

            let (tight, good, moderate) = config.inside_bar.thresholds(self.timeframe);
            if size_ratio < tight {
                confidence += 20.0;
                info.set_flag("tight_consolidation");
            } else if size_ratio < good {
                confidence += 15.0;
                info.set_flag("good_consolidation");
            } else if size_ratio < moderate {
                confidence += 10.0;
                info.set_flag("moderate_consolidation");
            } else {
                confidence += 5.0;
            }

            // Middle positioning within the mother bar is preferred
            let distance = (inside.midpoint() - mother.midpoint()).abs() / mother_range;
            if distance < 0.25 {
                confidence += 10.0;
                info.set_flag("centered_inside_bar");
            } else if distance < 0.35 {
                confidence += 5.0;
                info.set_flag("well_positioned");
            }
        }

        if indicators.momentum_bullish() {
            confidence += 15.0;
            info.set_flag("macd_bullish");
        }
        if indicators.histogram_rising() {
            confidence += 10.0;
            info.set_flag("momentum_improving");
        }

        // Current price must still be near the inside bar range
        let current = bars[n - 1].close();
        if current >= inside.low() * 0.98 {
            confidence += 10.0;
            info.set_flag("price_in_range");
        }

        let (volume_score, volume_info) =
            analyze_volume(bars, PatternKind::InsideBar, &info, config);
        confidence += volume_score;
        info.extend(volume_info);

        confidence = apply_confirmation_cap(confidence, &mut info, config);

        // Aging applies after the cap
        if mother_offset <= params.aging_offset {
            confidence *= params.aging_penalty;
            info.set_flag("pattern_aging");
            info.set_num("age_periods", mother_offset.unsigned_abs() as f64);
        }

        (confidence, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::macd_triple;
    use crate::BarData;

    fn flat_bar() -> BarData {
        BarData {
            open: 10.0,
            high: 10.2,
            low: 9.8,
            close: 10.0,
            volume: 1000.0,
        }
    }

    fn closes(bars: &[BarData]) -> Vec<f64> {
        bars.iter().map(|b| b.close).collect()
    }

    fn detect(bars: &[BarData], timeframe: Timeframe) -> (f64, PatternInfo) {
        let triple = macd_triple(&closes(bars));
        InsideBarDetector::new(timeframe).detect(
            bars,
            &triple,
            &MarketContext::default(),
            &DetectorConfig::default(),
        )
    }

    fn setup_bars() -> Vec<BarData> {
        let mut bars = vec![flat_bar(); 25];
        // Green mother bar
        bars.push(BarData {
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            volume: 1000.0,
        });
        // Red inside bar, strictly contained
        bars.push(BarData {
            open: 10.5,
            high: 11.5,
            low: 9.5,
            close: 10.0,
            volume: 1000.0,
        });
        bars
    }

    #[test]
    fn test_short_series_is_empty() {
        let bars = vec![flat_bar(); 4];
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_single_inside_bar_detected() {
        let bars = setup_bars();
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        assert_eq!(info.num("inside_bars_count"), Some(1.0));
        assert!(info.flagged("color_validated"));
        assert!(info.flagged("single_inside_bar"));
        assert!(confidence >= 60.0);
    }

    #[test]
    fn test_green_inside_bar_not_counted() {
        let mut bars = setup_bars();
        // Same containment, but closing green disqualifies the bar
        let last = bars.len() - 1;
        bars[last].close = 11.2;
        bars[last].open = 10.5;
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_bearish_mother_bar_rejected() {
        let mut bars = setup_bars();
        let mother = bars.len() - 2;
        bars[mother].open = 12.0;
        bars[mother].close = 9.5;
        bars[mother].high = 12.0;
        bars[mother].low = 9.0;
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_scan_stops_when_streak_does_not_start_at_latest_bar() {
        let mut bars = setup_bars();
        // A trailing non-qualifying bar means the backward scan finds
        // nothing, even though a valid setup sits one bar back
        bars.push(BarData {
            open: 9.0,
            high: 13.0,
            low: 8.0,
            close: 12.5,
            volume: 1000.0,
        });
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        assert_eq!(confidence, 0.0);
        assert!(info.is_empty());
    }

    #[test]
    fn test_weekly_base_higher_than_daily() {
        let bars = setup_bars();
        let (_, daily) = detect(&bars, Timeframe::Daily);
        let (_, weekly) = detect(&bars, Timeframe::Weekly);
        assert_eq!(daily.text("timeframe"), Some("Daily"));
        assert_eq!(weekly.text("timeframe"), Some("Weekly"));
    }

    #[test]
    fn test_no_volume_confirmation_caps_confidence() {
        let bars = setup_bars();
        let (confidence, info) = detect(&bars, Timeframe::Daily);
        // Flat volume: weak tier, so the ceiling applies
        assert!(info.text("confidence_capped").is_some());
        assert!(confidence <= 70.0);
    }
}
