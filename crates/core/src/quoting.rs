//! Deterministic supplier quote simulation for a collective.
//!
//! Each eligible insurer receives one quote derived from the collective's
//! risk multiplier, a size-discount tier and a fixed per-supplier spread
//! keyed by supplier id. No randomness is involved: the same supplier set
//! and risk profile always produce the same prices.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::QuotingConfig;
use crate::domain::collective::CollectiveId;
use crate::domain::supplier::{BidKind, NewSupplierBid, Supplier, SupplierId, SupplierType};
use crate::risk::CollectiveRiskProfile;

pub const MAX_EFFECTIVE_DISCOUNT: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

const SIMULATED_BID_NOTE: &str = "Simulated via quote-bidding engine";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub supplier_type: SupplierType,
    pub bid_type: BidKind,
    pub collective_id: CollectiveId,
    pub member_count: u32,
    pub risk_multiplier: Decimal,
    pub base_pmpm: Decimal,
    pub size_discount: Decimal,
    pub supplier_variation: Decimal,
    pub effective_discount: Decimal,
    pub final_pmpm: Decimal,
    pub estimated_savings_percent: Decimal,
}

impl SupplierQuote {
    pub fn to_bid(&self) -> NewSupplierBid {
        NewSupplierBid {
            supplier_id: self.supplier_id,
            collective_id: self.collective_id,
            bid_type: self.bid_type,
            monthly_premium: self.final_pmpm,
            discount_percent: round(self.effective_discount * Decimal::new(100, 0), 2),
            notes: Some(SIMULATED_BID_NOTE.to_string()),
        }
    }
}

/// Size-discount tier by member count.
pub fn size_discount(member_count: u32) -> Decimal {
    match member_count {
        200.. => Decimal::new(15, 2),
        50..=199 => Decimal::new(10, 2),
        10..=49 => Decimal::new(5, 2),
        _ => Decimal::ZERO,
    }
}

/// Five-way spread from `-0.04` to `+0.04` keyed by `supplier_id mod 5`.
pub fn supplier_variation(supplier_id: SupplierId) -> Decimal {
    let bucket = supplier_id.0.rem_euclid(5) - 2;
    Decimal::from(bucket) * Decimal::new(2, 2)
}

/// Percentage saved against `baseline`, saturating when the ratio is not
/// representable.
fn savings_percent(baseline: Decimal, final_pmpm: Decimal) -> Decimal {
    let gap = baseline.saturating_sub(final_pmpm);
    gap.checked_div(baseline)
        .and_then(|ratio| ratio.checked_mul(Decimal::new(100, 0)))
        .unwrap_or(if gap.is_sign_negative() { Decimal::MIN } else { Decimal::MAX })
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Debug, Default)]
pub struct QuoteEngine {
    config: QuotingConfig,
}

impl QuoteEngine {
    pub fn new(config: QuotingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuotingConfig {
        &self.config
    }

    pub fn base_pmpm(&self, profile: &CollectiveRiskProfile) -> Decimal {
        self.config.base_group_pmpm.saturating_mul(profile.risk_multiplier)
    }

    pub fn quote(
        &self,
        collective_id: CollectiveId,
        profile: &CollectiveRiskProfile,
        supplier: &Supplier,
    ) -> SupplierQuote {
        let base_pmpm = self.base_pmpm(profile);
        let size_discount = size_discount(profile.member_count);
        let supplier_variation = supplier_variation(supplier.id);
        let effective_discount =
            (size_discount + supplier_variation).clamp(Decimal::ZERO, MAX_EFFECTIVE_DISCOUNT);
        let final_pmpm = base_pmpm.saturating_mul(Decimal::ONE - effective_discount);
        let savings = savings_percent(self.config.baseline_individual_pmpm, final_pmpm);

        SupplierQuote {
            supplier_id: supplier.id,
            supplier_name: supplier.name.clone(),
            supplier_type: supplier.supplier_type,
            bid_type: self.config.bid_kind,
            collective_id,
            member_count: profile.member_count,
            risk_multiplier: round(profile.risk_multiplier, 3),
            base_pmpm: round(base_pmpm, 2),
            size_discount: round(size_discount, 3),
            supplier_variation: round(supplier_variation, 3),
            effective_discount,
            final_pmpm: round(final_pmpm, 2),
            estimated_savings_percent: round(savings, 1),
        }
    }

    /// Quotes every insurer in `suppliers`, cheapest first. Ties keep
    /// supplier-id order.
    pub fn simulate(
        &self,
        collective_id: CollectiveId,
        profile: &CollectiveRiskProfile,
        suppliers: &[Supplier],
    ) -> Vec<SupplierQuote> {
        let mut quotes: Vec<SupplierQuote> = suppliers
            .iter()
            .filter(|supplier| supplier.supplier_type == SupplierType::Insurer)
            .map(|supplier| self.quote(collective_id, profile, supplier))
            .collect();
        quotes.sort_by(|left, right| {
            left.final_pmpm.cmp(&right.final_pmpm).then(left.supplier_id.cmp(&right.supplier_id))
        });
        quotes
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{size_discount, supplier_variation, QuoteEngine, MAX_EFFECTIVE_DISCOUNT};
    use crate::config::QuotingConfig;
    use crate::domain::collective::CollectiveId;
    use crate::domain::supplier::{BidKind, Supplier, SupplierId, SupplierType};
    use crate::risk::CollectiveRiskProfile;

    fn profile(member_count: u32, multiplier: Decimal) -> CollectiveRiskProfile {
        CollectiveRiskProfile {
            member_count,
            risk_multiplier: multiplier,
            avg_monthly_rx_spend: None,
            avg_chronic_conditions: Decimal::ZERO,
        }
    }

    fn insurer(id: i64) -> Supplier {
        Supplier {
            id: SupplierId(id),
            name: format!("Insurer {id}"),
            supplier_type: SupplierType::Insurer,
        }
    }

    #[test]
    fn mid_size_collective_with_neutral_supplier() {
        let engine = QuoteEngine::default();
        let quote = engine.quote(CollectiveId(3), &profile(120, Decimal::ONE), &insurer(7));

        assert_eq!(quote.base_pmpm, Decimal::new(500, 0));
        assert_eq!(quote.size_discount, Decimal::new(10, 2));
        assert_eq!(quote.supplier_variation, Decimal::ZERO);
        assert_eq!(quote.effective_discount, Decimal::new(10, 2));
        assert_eq!(quote.final_pmpm, Decimal::new(450, 0));
        assert_eq!(quote.estimated_savings_percent, Decimal::new(308, 1));
        assert_eq!(quote.bid_type, BidKind::InsurancePremium);
    }

    #[test]
    fn size_tiers_match_member_counts() {
        assert_eq!(size_discount(0), Decimal::ZERO);
        assert_eq!(size_discount(9), Decimal::ZERO);
        assert_eq!(size_discount(10), Decimal::new(5, 2));
        assert_eq!(size_discount(50), Decimal::new(10, 2));
        assert_eq!(size_discount(199), Decimal::new(10, 2));
        assert_eq!(size_discount(200), Decimal::new(15, 2));
    }

    #[test]
    fn supplier_variation_spreads_across_five_buckets() {
        let spread: Vec<Decimal> = (10..15).map(|id| supplier_variation(SupplierId(id))).collect();
        assert_eq!(
            spread,
            vec![
                Decimal::new(-4, 2),
                Decimal::new(-2, 2),
                Decimal::ZERO,
                Decimal::new(2, 2),
                Decimal::new(4, 2),
            ]
        );
    }

    #[test]
    fn effective_discount_is_clamped() {
        let engine = QuoteEngine::default();

        let small = engine.quote(CollectiveId(1), &profile(3, Decimal::ONE), &insurer(5));
        assert_eq!(small.effective_discount, Decimal::ZERO);
        assert_eq!(small.final_pmpm, Decimal::new(500, 0));

        let large = engine.quote(CollectiveId(1), &profile(500, Decimal::ONE), &insurer(9));
        assert_eq!(large.effective_discount, Decimal::new(19, 2));
        assert!(large.effective_discount <= MAX_EFFECTIVE_DISCOUNT);
    }

    #[test]
    fn simulation_is_sorted_deterministic_and_insurer_only() {
        let engine = QuoteEngine::default();
        let mut suppliers: Vec<Supplier> = (1..=9).map(insurer).collect();
        suppliers.push(Supplier {
            id: SupplierId(40),
            name: "Corner Pharmacy".to_string(),
            supplier_type: SupplierType::Pharmacy,
        });
        let profile = profile(60, Decimal::new(1233, 3));

        let first = engine.simulate(CollectiveId(2), &profile, &suppliers);
        let second = engine.simulate(CollectiveId(2), &profile, &suppliers);

        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
        assert!(first.windows(2).all(|pair| pair[0].final_pmpm <= pair[1].final_pmpm));
        assert!(first.iter().all(|quote| quote.supplier_type == SupplierType::Insurer));
        assert!(first
            .iter()
            .all(|quote| quote.effective_discount >= Decimal::ZERO
                && quote.effective_discount <= MAX_EFFECTIVE_DISCOUNT));
    }

    #[test]
    fn quote_converts_into_bid_record() {
        let engine = QuoteEngine::default();
        let bid = engine.quote(CollectiveId(3), &profile(120, Decimal::ONE), &insurer(8)).to_bid();

        assert_eq!(bid.supplier_id, SupplierId(8));
        assert_eq!(bid.monthly_premium, Decimal::new(440, 0));
        assert_eq!(bid.discount_percent, Decimal::new(12, 0));
        assert!(bid.notes.is_some());
    }

    #[test]
    fn unvalidated_extreme_config_saturates_instead_of_overflowing() {
        let engine = QuoteEngine::new(QuotingConfig {
            baseline_individual_pmpm: Decimal::new(1, 2),
            base_group_pmpm: Decimal::MAX,
            ..QuotingConfig::default()
        });
        let quote = engine.quote(CollectiveId(1), &profile(120, Decimal::new(125, 2)), &insurer(7));

        assert_eq!(quote.base_pmpm, Decimal::MAX);
        assert!(quote.final_pmpm < quote.base_pmpm);
        assert_eq!(quote.estimated_savings_percent, Decimal::MIN);
    }
}
