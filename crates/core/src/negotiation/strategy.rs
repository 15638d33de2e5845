//! Fair-value evaluation of a single offer against a negotiation's target.
//!
//! The strategy is a pure function of the target PMPM, the offered PMPM and
//! the risk appetite. Missing or non-positive targets are treated as "no
//! anchor" and every offer is acceptable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::negotiation::RiskAppetite;

/// Weight given to the target when proposing a counter price.
const COUNTER_TARGET_WEIGHT: Decimal = Decimal::from_parts(6, 0, 0, false, 1); // 0.6

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Accept,
    Counter,
    WalkAway,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Counter => "counter",
            Self::WalkAway => "walk_away",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl FairBand {
    pub fn contains(&self, price: Decimal) -> bool {
        self.min <= price && price <= self.max
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairValueEvaluation {
    pub target_pmpm: Option<Decimal>,
    pub offer_pmpm: Decimal,
    /// Signed `(offer - target) / target`; `None` without an anchor.
    pub deviation_from_target: Option<Decimal>,
    pub fair_band: Option<FairBand>,
    pub is_acceptable: bool,
    pub recommended_action: RecommendedAction,
    pub suggested_counter_pmpm: Option<Decimal>,
}

impl FairValueEvaluation {
    pub fn deviation_percent(&self) -> Option<Decimal> {
        self.deviation_from_target.and_then(|deviation| deviation.checked_mul(Decimal::new(100, 0)))
    }

    fn unanchored(offer_pmpm: Decimal) -> Self {
        Self {
            target_pmpm: None,
            offer_pmpm,
            deviation_from_target: None,
            fair_band: None,
            is_acceptable: true,
            recommended_action: RecommendedAction::Accept,
            suggested_counter_pmpm: None,
        }
    }

    /// Prices too large to compare against each other are never acceptable.
    fn out_of_range(target: Decimal, offer_pmpm: Decimal) -> Self {
        Self {
            target_pmpm: Some(target),
            offer_pmpm,
            deviation_from_target: None,
            fair_band: None,
            is_acceptable: false,
            recommended_action: RecommendedAction::WalkAway,
            suggested_counter_pmpm: None,
        }
    }
}

pub fn evaluate_offer(
    target_pmpm: Option<Decimal>,
    offer_pmpm: Decimal,
    appetite: RiskAppetite,
) -> FairValueEvaluation {
    let target = match target_pmpm {
        Some(target) if target > Decimal::ZERO => target,
        _ => return FairValueEvaluation::unanchored(offer_pmpm),
    };

    evaluate_anchored(target, offer_pmpm, appetite.fair_band())
        .unwrap_or_else(|| FairValueEvaluation::out_of_range(target, offer_pmpm))
}

/// `None` when any intermediate value leaves the `Decimal` range.
fn evaluate_anchored(
    target: Decimal,
    offer_pmpm: Decimal,
    band: Decimal,
) -> Option<FairValueEvaluation> {
    let fair_band = FairBand {
        min: target.checked_mul(Decimal::ONE - band)?,
        max: target.checked_mul(Decimal::ONE + band)?,
    };
    let deviation = offer_pmpm.checked_sub(target)?.checked_div(target)?;

    let (recommended_action, suggested_counter_pmpm) = if fair_band.contains(offer_pmpm) {
        (RecommendedAction::Accept, None)
    } else if deviation.abs() <= band * Decimal::new(2, 0) {
        let mut counter = target
            .checked_mul(COUNTER_TARGET_WEIGHT)?
            .checked_add(offer_pmpm.checked_mul(Decimal::ONE - COUNTER_TARGET_WEIGHT)?)?;
        // Never counter above an offer that already undercuts the target.
        if offer_pmpm < target {
            counter = counter.min(offer_pmpm);
        }
        (RecommendedAction::Counter, Some(counter))
    } else {
        (RecommendedAction::WalkAway, None)
    };

    Some(FairValueEvaluation {
        target_pmpm: Some(target),
        offer_pmpm,
        deviation_from_target: Some(deviation),
        fair_band: Some(fair_band),
        is_acceptable: recommended_action == RecommendedAction::Accept,
        recommended_action,
        suggested_counter_pmpm,
    })
}
