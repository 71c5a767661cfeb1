//! Bull Flag detector.
//!
//! A sharp flagpole ascent followed by a shallow trailing-15-bar flag.
//! Price falling below the flag support or the flagpole start structurally
//! breaks the pattern (hard reject); a flag high that is too old halves the
//! accrued confidence and returns early.

use crate::config::DetectorConfig;
use crate::indicators::IndicatorTriple;
use crate::volume::{analyze_volume, apply_confirmation_cap};
use crate::{MarketContext, PatternInfo, PatternKind, OHLCV};

use super::{age_stage, hard_reject, helpers, ChartPatternDetector, Outcome};

/// Length of the trailing flag window in bars.
const FLAG_LEN: usize = 15;

#[derive(Debug, Clone, Copy, Default)]
pub struct BullFlagDetector;

impl BullFlagDetector {
    pub fn new() -> Self {
        Self
    }
}

/// Structural support stage: both violations force confidence to exactly 0,
/// in this order.
fn support_stage(current: f64, flag_low: f64, flagpole_start: f64, tolerance: f64) -> Outcome {
    if current < flag_low * tolerance {
        return Outcome::HardReject {
            reason: "Below flag support",
        };
    }
    if current < flagpole_start {
        return Outcome::HardReject {
            reason: "Below flagpole start",
        };
    }
    Outcome::Continue
}

impl ChartPatternDetector for BullFlagDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BullFlag
    }

    fn min_bars(&self) -> usize {
        30
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

        let cfg = &config.bull_flag;
        let mut confidence = 0.0;
        let mut info = PatternInfo::new();

        // Flagpole: offsets [-min(25, len-10), -15)
        let pole_start = 25.min(n - 10) as isize;
        let Some(start_price) = helpers::at(bars, -pole_start).map(|b| b.close()) else {
            return (0.0, info);
        };
        if start_price <= 0.0 {
            return (0.0, info);
        }
        let pole = helpers::window(bars, -pole_start, -(FLAG_LEN as isize));
        let Some(peak) = helpers::max_high(pole) else {
            return (0.0, info);
        };

        let flagpole_gain = (peak - start_price) / start_price;
        if flagpole_gain < cfg.min_flagpole_gain {
            return (0.0, info);
        }
        confidence += 25.0;
        info.set_text("flagpole_gain", format!("{:.1}%", flagpole_gain * 100.0));

        let flag = helpers::tail(bars, FLAG_LEN);
        let current = bars[n - 1].close();
        if let Some(flag_start) = helpers::at(bars, -(FLAG_LEN as isize)).map(|b| b.close()) {
            if flag_start > 0.0 {
                let pullback = (current - flag_start) / flag_start;
                if cfg.pullback_low <= pullback && pullback <= cfg.pullback_high {
                    confidence += 20.0;
                    info.set_text("flag_pullback", format!("{:.1}%", pullback * 100.0));
                    info.set_flag("healthy_pullback");
                }
            }
        }

        let Some(flag_low) = helpers::min_low(flag) else {
            return (0.0, info);
        };
        if let Outcome::HardReject { reason } =
            support_stage(current, flag_low, start_price, cfg.flag_tolerance.get())
        {
            return hard_reject(reason);
        }

        // Staleness: bars since the flag high, sentinel 11 when not found
        let Some(flag_high) = helpers::max_high(flag) else {
            return (0.0, info);
        };
        let days_old = helpers::bars_since_high(bars, |h| h == flag_high);
        if let Outcome::Stale { age } = age_stage(days_old, cfg.max_age_days.get()) {
            confidence *= 0.5;
            info.set_flag("pattern_stale");
            info.set_num("days_old", age as f64);
            return (confidence, info);
        }
        info.set_num("days_since_high", days_old as f64);

        if indicators.momentum_bullish() {
            confidence += 15.0;
            info.set_flag("macd_bullish");
        }
        if indicators.histogram_rising() {
            confidence += 10.0;
            info.set_flag("momentum_recovering");
        }

        let (volume_score, volume_info) = analyze_volume(bars, PatternKind::BullFlag, &info, config);
        confidence += volume_score;
        info.extend(volume_info);

        if current >= flag_high * 0.95 {
            confidence += 10.0;
            info.set_flag("near_breakout");
        }

        confidence = apply_confirmation_cap(confidence, &mut info, config);
        (confidence, info)
    }
}
