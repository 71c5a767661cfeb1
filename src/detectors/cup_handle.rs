//! Cup & Handle detector.
//!
//! A rounded base (the cup) capped by a shallow trailing consolidation (the
//! handle). Depth gates reject outright; handle geometry and rim proximity
//! shape the score. A running confidence below 35 after volume analysis
//! returns as-is, deliberately skipping the volume-confirmation cap the
//! other detectors apply.

use crate::config::DetectorConfig;
use crate::indicators::IndicatorTriple;
use crate::volume::{analyze_volume, apply_confirmation_cap};
use crate::{MarketContext, PatternInfo, PatternKind, OHLCV};

use super::{helpers, ChartPatternDetector};

/// Running confidence below this after volume scoring returns immediately,
/// without the volume-confirmation cap.
const CAP_EXEMPT_BELOW: f64 = 35.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct CupHandleDetector;

impl CupHandleDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ChartPatternDetector for CupHandleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::CupHandle
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

        let cfg = &config.cup_handle;
        let mut confidence = 0.0;
        let mut info = PatternInfo::new();

        let window_len = 100.min(n - 3);
        let handle_days = 30.min(window_len / 3);

        let cup = if handle_days > 0 {
            helpers::window(bars, -(window_len as isize), -(handle_days as isize))
        } else {
            helpers::window(bars, -(window_len as isize), n as isize)
        };
        let handle = if handle_days > 0 {
            helpers::tail(bars, handle_days)
        } else {
            helpers::tail(bars, 5)
        };

        if cup.len() < 15 {
            return (0.0, info);
        }

        let cup_start = cup[0].close();
        let cup_right = cup[cup.len() - 1].close();
        if cup_start <= 0.0 {
            return (0.0, info);
        }
        let Some(cup_bottom) = helpers::min_low(cup) else {
            return (0.0, info);
        };

        let rim = cup_start.max(cup_right);
        let cup_depth = (rim - cup_bottom) / rim;
        if cup_depth < cfg.min_cup_depth || cup_depth > cfg.max_cup_depth {
            return (0.0, info);
        }
        if cup_right < cup_start * 0.75 {
            return (0.0, info);
        }

        confidence += 25.0;
        info.set_text("cup_depth", format!("{:.1}%", cup_depth * 100.0));

        let current = bars[n - 1].close();
        let handle_low = helpers::min_low(handle);

        if handle_days > 0 {
            if let Some(handle_low) = handle_low {
                let handle_depth = (cup_right - handle_low) / cup_right;
                let pct = format!("{:.1}%", handle_depth * 100.0);
                if handle_depth > cfg.max_handle_depth {
                    confidence += 10.0;
                    info.set_text("deep_handle", pct);
                } else if handle_depth <= 0.08 {
                    confidence += 20.0;
                    info.set_text("perfect_handle", pct);
                } else if handle_depth <= 0.15 {
                    confidence += 15.0;
                    info.set_text("good_handle", pct);
                } else {
                    confidence += 10.0;
                    info.set_text("acceptable_handle", pct);
                }
            }

            if handle_days > 25 {
                confidence *= 0.8;
                info.set_text("long_handle", format!("{handle_days} days"));
            } else if handle_days <= 10 {
                confidence += 10.0;
                info.set_text("short_handle", format!("{handle_days} days"));
            } else if handle_days <= 20 {
                confidence += 5.0;
                info.set_text("medium_handle", format!("{handle_days} days"));
            }
        } else {
            confidence += 10.0;
            info.set_text("forming_handle", "Handle forming");
        }

        // Proximity to the breakout level (the higher rim)
        let breakout_level = cup_start.max(cup_right);
        if current < breakout_level * 0.70 {
            confidence *= 0.7;
            info.set_flag("far_from_rim");
        } else {
            confidence += 5.0;
        }

        if handle_days > 0 {
            if let Some(handle_low) = handle_low {
                if current < handle_low * 0.90 {
                    confidence *= 0.8;
                    info.set_flag("below_handle");
                }
            }
        }

        if indicators.momentum_bullish() {
            confidence += 10.0;
            info.set_flag("macd_bullish");
        }

        let (volume_score, volume_info) =
            analyze_volume(bars, PatternKind::CupHandle, &info, config);
        confidence += volume_score;
        info.extend(volume_info);

        // Weak cups return as-is; the confirmation cap only applies to
        // setups that cleared 35
        if confidence < CAP_EXEMPT_BELOW {
            return (confidence, info);
        }

        confidence = apply_confirmation_cap(confidence, &mut info, config);
        (confidence, info)
    }
}
