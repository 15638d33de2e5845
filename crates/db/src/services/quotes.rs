use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use groupbid_core::api::{
    latest_per_supplier, CollectiveQuotes, QuoteComparison, SubmitSupplierBidRequest, SupplierBids,
};
use groupbid_core::domain::collective::{Collective, CollectiveId};
use groupbid_core::domain::supplier::{Supplier, SupplierBid, SupplierId, SupplierType};
use groupbid_core::errors::ApplicationError;
use groupbid_core::quoting::QuoteEngine;
use groupbid_core::risk::{score_collective, CollectiveRiskProfile, MemberRiskInputs};

use crate::repositories::{BidRepository, CollectiveDirectory, SupplierDirectory};

pub struct QuoteSimulationService {
    collectives: Arc<dyn CollectiveDirectory>,
    suppliers: Arc<dyn SupplierDirectory>,
    bids: Arc<dyn BidRepository>,
    engine: QuoteEngine,
}

impl QuoteSimulationService {
    pub fn new(
        collectives: Arc<dyn CollectiveDirectory>,
        suppliers: Arc<dyn SupplierDirectory>,
        bids: Arc<dyn BidRepository>,
        engine: QuoteEngine,
    ) -> Self {
        Self { collectives, suppliers, bids, engine }
    }

    async fn collective(&self, id: CollectiveId) -> Result<Collective, ApplicationError> {
        self.collectives.find_collective(id).await?.ok_or_else(|| ApplicationError::NotFound {
            entity: "collective",
            id: id.to_string(),
        })
    }

    async fn supplier(&self, id: SupplierId) -> Result<Supplier, ApplicationError> {
        self.suppliers.find_by_id(id).await?.ok_or_else(|| ApplicationError::NotFound {
            entity: "supplier",
            id: id.to_string(),
        })
    }

    pub async fn risk_profile(
        &self,
        collective_id: CollectiveId,
    ) -> Result<CollectiveRiskProfile, ApplicationError> {
        self.collective(collective_id).await?;
        let members = self.collectives.members_of(collective_id).await?;
        let mut inputs = Vec::with_capacity(members.len());
        for member in &members {
            let spend = self.collectives.monthly_rx_spend(member.id).await?;
            inputs.push(MemberRiskInputs::from_profile(member, spend));
        }
        Ok(score_collective(&inputs))
    }

    /// Quotes every insurer for the collective and records the batch as bids.
    /// Nothing is recorded if any bid fails to persist.
    pub async fn simulate(
        &self,
        collective_id: CollectiveId,
        correlation_id: &str,
    ) -> Result<CollectiveQuotes, ApplicationError> {
        let collective = self.collective(collective_id).await?;
        let profile = self.risk_profile(collective.id).await?;
        let insurers = self.suppliers.list_by_type(SupplierType::Insurer).await?;

        let quotes = self.engine.simulate(collective_id, &profile, &insurers);
        let bids = quotes.iter().map(|quote| quote.to_bid()).collect();
        let recorded = self.bids.record_batch(bids, Utc::now()).await?;

        info!(
            event_name = "quotes.simulated",
            correlation_id = %correlation_id,
            collective_id = %collective_id,
            member_count = profile.member_count,
            risk_multiplier = %profile.risk_multiplier,
            quote_count = quotes.len(),
            bids_recorded = recorded.len(),
            "supplier quotes simulated"
        );

        Ok(CollectiveQuotes {
            collective_id,
            collective_name: collective.name,
            profile,
            quotes,
        })
    }

    /// Records one bid placed directly by a supplier.
    pub async fn submit_bid(
        &self,
        request: SubmitSupplierBidRequest,
        correlation_id: &str,
    ) -> Result<SupplierBid, ApplicationError> {
        request.validate()?;
        let supplier = self.supplier(request.supplier_id).await?;
        self.collective(request.collective_id).await?;

        let recorded = self.bids.record_batch(vec![request.into_new_bid()], Utc::now()).await?;
        let bid = recorded.into_iter().next().ok_or_else(|| {
            ApplicationError::Persistence("bid insert returned no row".to_string())
        })?;

        info!(
            event_name = "quotes.bid_submitted",
            correlation_id = %correlation_id,
            bid_id = bid.id.0,
            supplier_id = %supplier.id,
            collective_id = %bid.collective_id,
            bid_type = bid.bid_type.as_str(),
            monthly_premium = %bid.monthly_premium,
            "supplier bid recorded"
        );
        Ok(bid)
    }

    pub async fn list_for_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<SupplierBids, ApplicationError> {
        let supplier = self.supplier(supplier_id).await?;
        let bids = self.bids.list_for_supplier(supplier_id).await?;
        Ok(SupplierBids { supplier_id, supplier_name: supplier.name, bids })
    }

    /// Ranks each supplier's most recent bid for the collective.
    pub async fn compare(
        &self,
        collective_id: CollectiveId,
    ) -> Result<QuoteComparison, ApplicationError> {
        self.collective(collective_id).await?;
        let bids = latest_per_supplier(self.bids.list_for_collective(collective_id).await?);

        let mut names: HashMap<SupplierId, String> = HashMap::new();
        let mut named = Vec::with_capacity(bids.len());
        for bid in bids {
            let name = match names.get(&bid.supplier_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .suppliers
                        .find_by_id(bid.supplier_id)
                        .await?
                        .map(|supplier| supplier.name)
                        .unwrap_or_else(|| format!("supplier {}", bid.supplier_id));
                    names.insert(bid.supplier_id, name.clone());
                    name
                }
            };
            named.push((bid, name));
        }

        Ok(QuoteComparison::rank(collective_id, named))
    }
}
