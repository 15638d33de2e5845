//! Collective risk scoring from member demographics and survey data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::collective::{chronic_condition_count, AgeBracket, MemberProfile};

pub const MIN_RISK_MULTIPLIER: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
pub const MAX_RISK_MULTIPLIER: Decimal = Decimal::from_parts(25, 0, 0, false, 1);

const CHRONIC_CONDITION_LOADING: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
const RX_SPEND_CAP: Decimal = Decimal::from_parts(400, 0, 0, false, 0);
const RX_MAX_LOADING: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Per-member inputs after normalization of the raw directory fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRiskInputs {
    pub age_bracket: AgeBracket,
    pub chronic_conditions: u32,
    /// Survey-reported monthly prescription spend, when a survey is on file.
    pub monthly_rx_spend: Option<Decimal>,
}

impl MemberRiskInputs {
    pub fn from_profile(profile: &MemberProfile, monthly_rx_spend: Option<Decimal>) -> Self {
        Self {
            age_bracket: AgeBracket::parse(profile.age_range.as_deref()),
            chronic_conditions: chronic_condition_count(profile.chronic_conditions.as_deref()),
            monthly_rx_spend,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveRiskProfile {
    pub member_count: u32,
    /// Always within `[MIN_RISK_MULTIPLIER, MAX_RISK_MULTIPLIER]`.
    pub risk_multiplier: Decimal,
    pub avg_monthly_rx_spend: Option<Decimal>,
    pub avg_chronic_conditions: Decimal,
}

impl CollectiveRiskProfile {
    pub fn neutral() -> Self {
        Self {
            member_count: 0,
            risk_multiplier: Decimal::ONE,
            avg_monthly_rx_spend: None,
            avg_chronic_conditions: Decimal::ZERO,
        }
    }
}

pub fn age_factor(bracket: AgeBracket) -> Decimal {
    match bracket {
        AgeBracket::From18To24 => Decimal::new(8, 1),
        AgeBracket::From25To34 => Decimal::new(9, 1),
        AgeBracket::From35To44 => Decimal::ONE,
        AgeBracket::From45To54 => Decimal::new(11, 1),
        AgeBracket::From55To64 => Decimal::new(13, 1),
        AgeBracket::SixtyFivePlus => Decimal::new(16, 1),
        AgeBracket::Unknown => Decimal::ONE,
    }
}

/// Loading in `[0, 0.20]`, linear in spend up to the cap.
pub fn rx_loading(avg_monthly_rx_spend: Decimal) -> Decimal {
    let ratio = (avg_monthly_rx_spend / RX_SPEND_CAP).min(Decimal::ONE).max(Decimal::ZERO);
    ratio * RX_MAX_LOADING
}

pub fn score_collective(members: &[MemberRiskInputs]) -> CollectiveRiskProfile {
    if members.is_empty() {
        return CollectiveRiskProfile::neutral();
    }

    let count = Decimal::from(members.len() as u64);
    let avg_age_factor =
        members.iter().map(|member| age_factor(member.age_bracket)).sum::<Decimal>() / count;
    let avg_chronic_conditions = members
        .iter()
        .map(|member| Decimal::from(member.chronic_conditions))
        .sum::<Decimal>()
        / count;

    let spends: Vec<Decimal> = members.iter().filter_map(|member| member.monthly_rx_spend).collect();
    let avg_monthly_rx_spend = (!spends.is_empty())
        .then(|| spends.iter().copied().sum::<Decimal>() / Decimal::from(spends.len() as u64));

    let mut multiplier = avg_age_factor + CHRONIC_CONDITION_LOADING * avg_chronic_conditions;
    if let Some(spend) = avg_monthly_rx_spend {
        multiplier += rx_loading(spend);
    }

    CollectiveRiskProfile {
        member_count: members.len() as u32,
        risk_multiplier: multiplier.clamp(MIN_RISK_MULTIPLIER, MAX_RISK_MULTIPLIER),
        avg_monthly_rx_spend,
        avg_chronic_conditions,
    }
}
