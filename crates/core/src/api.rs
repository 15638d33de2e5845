//! Request and response shapes for the operations exposed to callers.
//!
//! Transport framing is left to the embedding layer; these types only carry
//! the fields each operation needs and serialize to plain JSON.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::collective::CollectiveId;
use crate::domain::negotiation::{
    Negotiation, NegotiationId, NegotiationRound, NegotiationStatus, NegotiationTerms,
    NewNegotiation, NewNegotiationMessage, RiskAppetite, RoundActor, SenderKind,
};
use crate::domain::supplier::{BidKind, NewSupplierBid, SupplierBid, SupplierId};
use crate::domain::MAX_PMPM;
use crate::errors::DomainError;
use crate::negotiation::{FairValueEvaluation, Offer, OfferOutcome};
use crate::quoting::SupplierQuote;
use crate::risk::CollectiveRiskProfile;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNegotiationRequest {
    pub collective_id: CollectiveId,
    pub supplier_id: SupplierId,
    pub target_pmpm: Option<Decimal>,
    pub target_population_size: Option<u32>,
    /// Free text; anything other than `low` or `high` is read as `medium`.
    pub risk_appetite: Option<String>,
    pub target_start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl StartNegotiationRequest {
    /// Non-positive targets stay valid and mean "no anchor"; only prices the
    /// strategy cannot represent are refused.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.target_pmpm {
            Some(target) => check_pmpm("target_pmpm", target),
            None => Ok(()),
        }
    }

    pub fn into_new_negotiation(self) -> NewNegotiation {
        NewNegotiation {
            collective_id: self.collective_id,
            supplier_id: self.supplier_id,
            terms: NegotiationTerms {
                target_pmpm: self.target_pmpm,
                target_population_size: self.target_population_size,
                risk_appetite: RiskAppetite::normalize(self.risk_appetite.as_deref()),
                target_start_date: self.target_start_date,
                notes: self.notes,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOfferRequest {
    pub negotiation_id: NegotiationId,
    pub actor: RoundActor,
    pub proposed_pmpm: Decimal,
    pub proposed_mlr: Option<Decimal>,
    pub notes: Option<String>,
    #[serde(default)]
    pub accept: bool,
}

impl SubmitOfferRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_pmpm("proposed_pmpm", self.proposed_pmpm)
    }

    pub fn offer(&self) -> Offer {
        Offer {
            actor: self.actor,
            proposed_pmpm: self.proposed_pmpm,
            proposed_mlr: self.proposed_mlr,
            notes: self.notes.clone(),
            accept: self.accept,
        }
    }
}

fn check_pmpm(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value.abs() > MAX_PMPM {
        return Err(DomainError::InvalidInput(format!(
            "{field} {value} is outside the accepted range of +/-{MAX_PMPM}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferResponse {
    pub negotiation_id: NegotiationId,
    pub status: NegotiationStatus,
    pub final_agreed_pmpm: Option<Decimal>,
    pub round: NegotiationRound,
    pub evaluation: FairValueEvaluation,
}

impl OfferResponse {
    pub fn from_outcome(outcome: OfferOutcome) -> Self {
        let final_agreed_pmpm = outcome.closed_deal().then_some(outcome.round.proposed_pmpm);
        Self {
            negotiation_id: outcome.round.negotiation_id,
            status: outcome.status,
            final_agreed_pmpm,
            round: outcome.round,
            evaluation: outcome.evaluation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub negotiation_id: NegotiationId,
    pub status: NegotiationStatus,
    pub final_agreed_pmpm: Decimal,
    pub final_expected_mlr: Option<Decimal>,
    pub accepted_round: u32,
}

impl AcceptResponse {
    pub fn from_round(round: &NegotiationRound) -> Self {
        Self {
            negotiation_id: round.negotiation_id,
            status: NegotiationStatus::Agreed,
            final_agreed_pmpm: round.proposed_pmpm,
            final_expected_mlr: round.proposed_mlr,
            accepted_round: round.round_number,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub negotiation_id: NegotiationId,
    pub sender_type: SenderKind,
    pub sender_name: Option<String>,
    pub body: String,
}

impl PostMessageRequest {
    pub fn message(&self) -> NewNegotiationMessage {
        NewNegotiationMessage {
            sender_type: self.sender_type,
            sender_name: self.sender_name.clone(),
            body: self.body.clone(),
        }
    }
}

/// Whose negotiations a portfolio lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PortfolioScope {
    Collective(CollectiveId),
    Supplier(SupplierId),
}

impl PortfolioScope {
    pub fn includes(&self, negotiation: &Negotiation) -> bool {
        match self {
            Self::Collective(id) => negotiation.collective_id == *id,
            Self::Supplier(id) => negotiation.supplier_id == *id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationSummary {
    pub id: NegotiationId,
    pub collective_id: CollectiveId,
    pub supplier_id: SupplierId,
    pub status: NegotiationStatus,
    pub target_pmpm: Option<Decimal>,
    pub final_agreed_pmpm: Option<Decimal>,
    pub round_count: u32,
    pub latest_actor: Option<RoundActor>,
    pub latest_pmpm: Option<Decimal>,
    pub latest_mlr: Option<Decimal>,
    pub last_round_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl NegotiationSummary {
    pub fn of(negotiation: &Negotiation) -> Self {
        let latest = negotiation.latest_round();
        Self {
            id: negotiation.id,
            collective_id: negotiation.collective_id,
            supplier_id: negotiation.supplier_id,
            status: negotiation.status,
            target_pmpm: negotiation.terms.target_pmpm,
            final_agreed_pmpm: negotiation.final_agreed_pmpm,
            round_count: u32::try_from(negotiation.round_count()).unwrap_or(u32::MAX),
            latest_actor: latest.map(|round| round.actor),
            latest_pmpm: latest.map(|round| round.proposed_pmpm),
            latest_mlr: latest.and_then(|round| round.proposed_mlr),
            last_round_at: latest.map(|round| round.created_at),
            updated_at: negotiation.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationPortfolio {
    pub scope: PortfolioScope,
    pub open: Vec<NegotiationSummary>,
    pub closed: Vec<NegotiationSummary>,
}

impl NegotiationPortfolio {
    /// Splits live from terminal negotiations, most recently touched first.
    pub fn build(scope: PortfolioScope, negotiations: &[Negotiation]) -> Self {
        let mut summaries: Vec<NegotiationSummary> = negotiations
            .iter()
            .filter(|negotiation| scope.includes(negotiation))
            .map(NegotiationSummary::of)
            .collect();
        summaries.sort_by(|left, right| {
            right.updated_at.cmp(&left.updated_at).then_with(|| right.id.cmp(&left.id))
        });

        let (closed, open) =
            summaries.into_iter().partition(|summary| summary.status.is_terminal());
        Self { scope, open, closed }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveQuotes {
    pub collective_id: CollectiveId,
    pub collective_name: String,
    pub profile: CollectiveRiskProfile,
    pub quotes: Vec<SupplierQuote>,
}

/// A bid a supplier places directly, outside quote simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSupplierBidRequest {
    pub supplier_id: SupplierId,
    pub collective_id: CollectiveId,
    /// Defaults to `insurance_premium`.
    #[serde(default)]
    pub bid_type: Option<BidKind>,
    pub monthly_premium: Decimal,
    /// Percentage in `0..=100`; defaults to zero.
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    pub notes: Option<String>,
}

impl SubmitSupplierBidRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.monthly_premium <= Decimal::ZERO {
            return Err(DomainError::InvalidInput(
                "monthly_premium must be greater than zero".to_string(),
            ));
        }
        check_pmpm("monthly_premium", self.monthly_premium)?;
        let discount = self.discount_percent.unwrap_or(Decimal::ZERO);
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(DomainError::InvalidInput(format!(
                "discount_percent {discount} must be between 0 and 100"
            )));
        }
        Ok(())
    }

    pub fn into_new_bid(self) -> NewSupplierBid {
        NewSupplierBid {
            supplier_id: self.supplier_id,
            collective_id: self.collective_id,
            bid_type: self.bid_type.unwrap_or(BidKind::InsurancePremium),
            monthly_premium: self.monthly_premium,
            discount_percent: self.discount_percent.unwrap_or(Decimal::ZERO),
            notes: self.notes,
        }
    }
}

/// Everything a supplier has bid, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierBids {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub bids: Vec<SupplierBid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedBid {
    pub rank: u32,
    pub supplier_name: String,
    pub bid: SupplierBid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteComparison {
    pub collective_id: CollectiveId,
    pub bids: Vec<RankedBid>,
}

impl QuoteComparison {
    /// Ranks from 1, cheapest monthly premium first. Ties keep the earlier bid ahead.
    pub fn rank(collective_id: CollectiveId, mut bids: Vec<(SupplierBid, String)>) -> Self {
        bids.sort_by(|(left, _), (right, _)| compare_bids(left, right));
        let bids = bids
            .into_iter()
            .zip(1u32..)
            .map(|((bid, supplier_name), rank)| RankedBid { rank, supplier_name, bid })
            .collect();
        Self { collective_id, bids }
    }

    pub fn cheapest(&self) -> Option<&RankedBid> {
        self.bids.first()
    }
}

/// Keeps each supplier's most recent bid, returned in supplier-id order.
pub fn latest_per_supplier(bids: Vec<SupplierBid>) -> Vec<SupplierBid> {
    let mut latest: HashMap<SupplierId, SupplierBid> = HashMap::new();
    for bid in bids {
        let newer = latest.get(&bid.supplier_id).map_or(true, |current| {
            (bid.created_at, bid.id) > (current.created_at, current.id)
        });
        if newer {
            latest.insert(bid.supplier_id, bid);
        }
    }
    let mut kept: Vec<SupplierBid> = latest.into_values().collect();
    kept.sort_by_key(|bid| bid.supplier_id);
    kept
}

fn compare_bids(left: &SupplierBid, right: &SupplierBid) -> Ordering {
    left.monthly_premium
        .cmp(&right.monthly_premium)
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        latest_per_supplier, NegotiationPortfolio, PortfolioScope, QuoteComparison,
        StartNegotiationRequest, SubmitOfferRequest, SubmitSupplierBidRequest,
    };
    use crate::domain::collective::CollectiveId;
    use crate::domain::negotiation::{
        Negotiation, NegotiationId, NegotiationStatus, NewNegotiation, RiskAppetite, RoundActor,
    };
    use crate::domain::supplier::{BidId, BidKind, SupplierBid, SupplierId};
    use crate::domain::MAX_PMPM;
    use crate::errors::DomainError;
    use crate::negotiation::Offer;

    fn supplier_bid(id: i64, supplier: i64, premium: i64, minutes: i64) -> SupplierBid {
        SupplierBid {
            id: BidId(id),
            supplier_id: SupplierId(supplier),
            collective_id: CollectiveId(1),
            bid_type: BidKind::InsurancePremium,
            monthly_premium: Decimal::new(premium, 0),
            discount_percent: Decimal::new(10, 0),
            notes: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid timestamp")
                + Duration::minutes(minutes),
        }
    }

    fn start(collective: i64, supplier: i64) -> StartNegotiationRequest {
        StartNegotiationRequest {
            collective_id: CollectiveId(collective),
            supplier_id: SupplierId(supplier),
            target_pmpm: Some(Decimal::new(500, 0)),
            target_population_size: Some(120),
            risk_appetite: Some("aggressive".to_string()),
            target_start_date: None,
            notes: None,
        }
    }

    fn opened(id: i64, request: NewNegotiation, minutes: i64) -> Negotiation {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid timestamp")
            + Duration::minutes(minutes);
        Negotiation::open(NegotiationId(id), request, at)
    }

    #[test]
    fn unknown_appetite_is_normalized_to_medium() {
        let request = start(1, 2).into_new_negotiation();
        assert_eq!(request.terms.risk_appetite, RiskAppetite::Medium);

        let mut low = start(1, 2);
        low.risk_appetite = Some(" LOW ".to_string());
        assert_eq!(low.into_new_negotiation().terms.risk_appetite, RiskAppetite::Low);
    }

    #[test]
    fn portfolio_splits_by_status_and_orders_by_recency() {
        let mut first = opened(1, start(1, 10).into_new_negotiation(), 0);
        let second = opened(2, start(1, 11).into_new_negotiation(), 5);
        let foreign = opened(3, start(2, 10).into_new_negotiation(), 10);
        let offer_at = first.created_at + Duration::minutes(30);
        first
            .record_offer(
                Offer {
                    actor: RoundActor::Supplier,
                    proposed_pmpm: Decimal::new(505, 0),
                    proposed_mlr: Some(Decimal::new(80, 0)),
                    notes: None,
                    accept: true,
                },
                offer_at,
            )
            .expect("acceptable offer");

        let portfolio = NegotiationPortfolio::build(
            PortfolioScope::Collective(CollectiveId(1)),
            &[second.clone(), first, foreign],
        );

        assert_eq!(portfolio.open.len(), 1);
        assert_eq!(portfolio.open[0].id, second.id);
        assert_eq!(portfolio.closed.len(), 1);
        let agreed = &portfolio.closed[0];
        assert_eq!(agreed.status, NegotiationStatus::Agreed);
        assert_eq!(agreed.latest_actor, Some(RoundActor::Supplier));
        assert_eq!(agreed.latest_mlr, Some(Decimal::new(80, 2)));
        assert_eq!(agreed.last_round_at, Some(offer_at));
    }

    #[test]
    fn supplier_scope_serializes_as_tagged_variant() {
        let json = serde_json::to_value(PortfolioScope::Supplier(SupplierId(4)))
            .expect("scope serializes");
        assert_eq!(json, serde_json::json!({"kind": "supplier", "id": 4}));
    }

    #[test]
    fn comparison_ranks_cheapest_first() {
        let at = Utc::now();
        let bid = |id: i64, premium: i64| SupplierBid {
            id: BidId(id),
            supplier_id: SupplierId(id),
            collective_id: CollectiveId(1),
            bid_type: BidKind::InsurancePremium,
            monthly_premium: Decimal::new(premium, 0),
            discount_percent: Decimal::new(10, 0),
            notes: None,
            created_at: at,
        };

        let comparison = QuoteComparison::rank(
            CollectiveId(1),
            vec![
                (bid(1, 470), "Harbor Mutual".to_string()),
                (bid(2, 440), "Keystone Health".to_string()),
                (bid(3, 455), "Lakeside Benefit".to_string()),
            ],
        );

        let ranked: Vec<(u32, &str)> = comparison
            .bids
            .iter()
            .map(|entry| (entry.rank, entry.supplier_name.as_str()))
            .collect();
        assert_eq!(
            ranked,
            vec![(1, "Keystone Health"), (2, "Lakeside Benefit"), (3, "Harbor Mutual")]
        );
        assert_eq!(comparison.cheapest().map(|entry| entry.bid.id), Some(BidId(2)));
    }

    #[test]
    fn prices_beyond_the_ceiling_are_invalid_input() {
        let mut request = start(1, 2);
        assert_eq!(request.validate(), Ok(()));

        request.target_pmpm = Some(Decimal::ZERO);
        assert_eq!(request.validate(), Ok(()));

        request.target_pmpm = Some(Decimal::MAX);
        assert!(matches!(
            request.validate(),
            Err(DomainError::InvalidInput(ref message)) if message.contains("target_pmpm")
        ));

        let offer = SubmitOfferRequest {
            negotiation_id: NegotiationId(1),
            actor: RoundActor::Supplier,
            proposed_pmpm: -(MAX_PMPM + Decimal::ONE),
            proposed_mlr: None,
            notes: None,
            accept: false,
        };
        assert!(matches!(offer.validate(), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn direct_bid_defaults_and_bounds() {
        let request = SubmitSupplierBidRequest {
            supplier_id: SupplierId(7),
            collective_id: CollectiveId(1),
            bid_type: None,
            monthly_premium: Decimal::new(455, 0),
            discount_percent: None,
            notes: Some("renewal".to_string()),
        };
        assert_eq!(request.validate(), Ok(()));
        let bid = request.clone().into_new_bid();
        assert_eq!(bid.bid_type, BidKind::InsurancePremium);
        assert_eq!(bid.discount_percent, Decimal::ZERO);

        let free = SubmitSupplierBidRequest { monthly_premium: Decimal::ZERO, ..request.clone() };
        assert!(matches!(free.validate(), Err(DomainError::InvalidInput(_))));

        let generous =
            SubmitSupplierBidRequest { discount_percent: Some(Decimal::new(101, 0)), ..request };
        assert!(matches!(
            generous.validate(),
            Err(DomainError::InvalidInput(ref message)) if message.contains("discount_percent")
        ));
    }

    #[test]
    fn only_the_newest_bid_per_supplier_is_kept() {
        let kept = latest_per_supplier(vec![
            supplier_bid(1, 8, 440, 0),
            supplier_bid(2, 7, 450, 0),
            supplier_bid(3, 8, 430, 10),
            supplier_bid(4, 7, 460, 10),
            supplier_bid(5, 7, 455, 10),
        ]);

        let ids: Vec<(i64, i64)> = kept.iter().map(|bid| (bid.supplier_id.0, bid.id.0)).collect();
        assert_eq!(ids, vec![(7, 5), (8, 3)]);
    }
}
