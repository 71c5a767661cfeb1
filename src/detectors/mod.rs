//! Chart pattern detectors.
//!
//! Four independent rule-based detectors, each scanning one bar series for
//! its geometric signature and returning an unclamped confidence plus a fact
//! map. Ordering of rejection, penalty, and bonus stages is part of each
//! detector's contract; stages that can end a detection early are modeled as
//! explicit [`Outcome`] variants rather than ad hoc early returns.

pub mod helpers;

pub mod bull_flag;
pub mod cup_handle;
pub mod flat_top;
pub mod inside_bar;

pub use bull_flag::BullFlagDetector;
pub use cup_handle::CupHandleDetector;
pub use flat_top::FlatTopDetector;
pub use inside_bar::InsideBarDetector;

use crate::config::DetectorConfig;
use crate::indicators::IndicatorTriple;
use crate::{MarketContext, PatternInfo, PatternKind, OHLCV};

/// Terminal disposition of an ordered detector stage.
///
/// - `Continue`: the stage passed, scoring proceeds.
/// - `HardReject`: structural violation; confidence is forced to exactly 0
///   with a reason fact, discarding any partial score.
/// - `SoftStop`: a secondary condition failed; the confidence accrued so far
///   is returned unchanged.
/// - `Stale`: the setup aged out; a multiplicative penalty applies and the
///   detector returns early, skipping any later stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    HardReject { reason: &'static str },
    SoftStop,
    Stale { age: usize },
}

/// Common detector contract: pure, deterministic, never panics, never
/// mutates its inputs. The market context is threaded through untouched for
/// the downstream timing-adjustment stage.
pub trait ChartPatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;

    /// Minimum series length; shorter input yields `(0.0, {})`.
    fn min_bars(&self) -> usize;

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        indicators: &IndicatorTriple,
        ctx: &MarketContext,
        config: &DetectorConfig,
    ) -> (f64, PatternInfo);
}

/// Build the hard-reject result: exactly zero confidence with a reason fact.
pub(crate) fn hard_reject(reason: &'static str) -> (f64, PatternInfo) {
    tracing::debug!(reason, "pattern hard-rejected");
    let mut info = PatternInfo::new();
    info.set_flag("pattern_broken");
    info.set_text("break_reason", reason);
    (0.0, info)
}

/// Staleness stage: `Stale` when the age exceeds the configured limit.
pub(crate) fn age_stage(age: usize, limit: usize) -> Outcome {
    if age > limit {
        Outcome::Stale { age }
    } else {
        Outcome::Continue
    }
}
