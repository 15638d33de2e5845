use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use groupbid_core::api::PortfolioScope;
use groupbid_core::domain::collective::{Collective, CollectiveId, MemberId, MemberProfile};
use groupbid_core::domain::negotiation::{
    MessageId, Negotiation, NegotiationId, NegotiationMessage, NegotiationRound, NewNegotiation,
    NewNegotiationMessage,
};
use groupbid_core::domain::supplier::{
    BidId, NewSupplierBid, Supplier, SupplierBid, SupplierId, SupplierType,
};
use groupbid_core::negotiation::{Offer, OfferOutcome};

use super::{
    BidRepository, CollectiveDirectory, NegotiationRepository, RepositoryError, SupplierDirectory,
};

#[derive(Default)]
struct NegotiationStore {
    last_negotiation_id: i64,
    last_message_id: i64,
    negotiations: BTreeMap<NegotiationId, Negotiation>,
}

impl NegotiationStore {
    /// Runs `apply` against a copy and keeps it only on success.
    fn mutate<T>(
        &mut self,
        id: NegotiationId,
        apply: impl FnOnce(&mut Negotiation) -> Result<T, RepositoryError>,
    ) -> Result<(T, Negotiation), RepositoryError> {
        let stored =
            self.negotiations.get(&id).ok_or_else(|| RepositoryError::negotiation_not_found(id))?;
        let mut working = stored.clone();
        let value = apply(&mut working)?;
        self.negotiations.insert(id, working.clone());
        Ok((value, working))
    }
}

/// Negotiation store serialized behind one async mutex.
#[derive(Default)]
pub struct InMemoryNegotiationRepository {
    store: Mutex<NegotiationStore>,
}

#[async_trait::async_trait]
impl NegotiationRepository for InMemoryNegotiationRepository {
    async fn create(
        &self,
        request: NewNegotiation,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        let mut store = self.store.lock().await;
        store.last_negotiation_id += 1;
        let negotiation = Negotiation::open(NegotiationId(store.last_negotiation_id), request, at);
        store.negotiations.insert(negotiation.id, negotiation.clone());
        Ok(negotiation)
    }

    async fn find_by_id(&self, id: NegotiationId) -> Result<Option<Negotiation>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.negotiations.get(&id).cloned())
    }

    async fn list_for_scope(
        &self,
        scope: PortfolioScope,
    ) -> Result<Vec<Negotiation>, RepositoryError> {
        let store = self.store.lock().await;
        let mut negotiations: Vec<Negotiation> = store
            .negotiations
            .values()
            .filter(|negotiation| scope.includes(negotiation))
            .cloned()
            .collect();
        negotiations.sort_by(|left, right| {
            right.updated_at.cmp(&left.updated_at).then_with(|| right.id.cmp(&left.id))
        });
        Ok(negotiations)
    }

    async fn submit_offer(
        &self,
        id: NegotiationId,
        offer: Offer,
        at: DateTime<Utc>,
    ) -> Result<OfferOutcome, RepositoryError> {
        let mut store = self.store.lock().await;
        let (outcome, _) =
            store.mutate(id, |negotiation| Ok(negotiation.record_offer(offer, at)?))?;
        Ok(outcome)
    }

    async fn accept_latest(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<NegotiationRound, RepositoryError> {
        let mut store = self.store.lock().await;
        let (round, _) = store.mutate(id, |negotiation| Ok(negotiation.accept_latest(at)?))?;
        Ok(round)
    }

    async fn cancel(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        let mut store = self.store.lock().await;
        let ((), negotiation) = store.mutate(id, |negotiation| Ok(negotiation.cancel(at)?))?;
        Ok(negotiation)
    }

    async fn close(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        let mut store = self.store.lock().await;
        let ((), negotiation) = store.mutate(id, |negotiation| Ok(negotiation.close(at)?))?;
        Ok(negotiation)
    }

    async fn post_message(
        &self,
        id: NegotiationId,
        message: NewNegotiationMessage,
        at: DateTime<Utc>,
    ) -> Result<NegotiationMessage, RepositoryError> {
        let mut store = self.store.lock().await;
        let message_id = MessageId(store.last_message_id + 1);
        let (posted, _) = store
            .mutate(id, |negotiation| Ok(negotiation.post_message(message_id, message, at)?))?;
        store.last_message_id = message_id.0;
        Ok(posted)
    }
}

#[derive(Default)]
struct CollectiveData {
    collectives: HashMap<CollectiveId, Collective>,
    members: Vec<MemberProfile>,
    rx_spend: HashMap<MemberId, Decimal>,
}

#[derive(Default)]
pub struct InMemoryCollectiveDirectory {
    data: RwLock<CollectiveData>,
}

impl InMemoryCollectiveDirectory {
    pub async fn insert_collective(&self, collective: Collective) {
        let mut data = self.data.write().await;
        data.collectives.insert(collective.id, collective);
    }

    pub async fn insert_member(&self, member: MemberProfile, monthly_rx_spend: Option<Decimal>) {
        let mut data = self.data.write().await;
        if let Some(spend) = monthly_rx_spend {
            data.rx_spend.insert(member.id, spend);
        }
        data.members.push(member);
    }
}

#[async_trait::async_trait]
impl CollectiveDirectory for InMemoryCollectiveDirectory {
    async fn find_collective(
        &self,
        id: CollectiveId,
    ) -> Result<Option<Collective>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data.collectives.get(&id).cloned())
    }

    async fn members_of(&self, id: CollectiveId) -> Result<Vec<MemberProfile>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data.members.iter().filter(|member| member.collective_id == id).cloned().collect())
    }

    async fn monthly_rx_spend(&self, member: MemberId) -> Result<Option<Decimal>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data.rx_spend.get(&member).copied())
    }
}

#[derive(Default)]
pub struct InMemorySupplierDirectory {
    suppliers: RwLock<BTreeMap<SupplierId, Supplier>>,
}

impl InMemorySupplierDirectory {
    pub async fn insert(&self, supplier: Supplier) {
        let mut suppliers = self.suppliers.write().await;
        suppliers.insert(supplier.id, supplier);
    }
}

#[async_trait::async_trait]
impl SupplierDirectory for InMemorySupplierDirectory {
    async fn find_by_id(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let suppliers = self.suppliers.read().await;
        Ok(suppliers.get(&id).cloned())
    }

    async fn list_by_type(
        &self,
        supplier_type: SupplierType,
    ) -> Result<Vec<Supplier>, RepositoryError> {
        let suppliers = self.suppliers.read().await;
        Ok(suppliers
            .values()
            .filter(|supplier| supplier.supplier_type == supplier_type)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBidRepository {
    bids: Mutex<Vec<SupplierBid>>,
}

#[async_trait::async_trait]
impl BidRepository for InMemoryBidRepository {
    async fn record_batch(
        &self,
        bids: Vec<NewSupplierBid>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let mut stored = self.bids.lock().await;
        let first_id = stored.last().map(|bid| bid.id.0).unwrap_or(0) + 1;
        let recorded: Vec<SupplierBid> = bids
            .into_iter()
            .zip(first_id..)
            .map(|(bid, id)| SupplierBid::from_new(BidId(id), bid, at))
            .collect();
        stored.extend(recorded.iter().cloned());
        Ok(recorded)
    }

    async fn list_for_collective(
        &self,
        collective_id: CollectiveId,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let stored = self.bids.lock().await;
        Ok(stored.iter().filter(|bid| bid.collective_id == collective_id).cloned().collect())
    }

    async fn list_for_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let stored = self.bids.lock().await;
        let mut bids: Vec<SupplierBid> =
            stored.iter().filter(|bid| bid.supplier_id == supplier_id).cloned().collect();
        bids.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.cmp(&left.id))
        });
        Ok(bids)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use groupbid_core::domain::collective::CollectiveId;
    use groupbid_core::domain::negotiation::{
        NegotiationId, NegotiationStatus, NegotiationTerms, NewNegotiation, RoundActor,
    };
    use groupbid_core::domain::supplier::{Supplier, SupplierId, SupplierType};
    use groupbid_core::negotiation::{NegotiationError, Offer};

    use crate::repositories::{
        InMemoryNegotiationRepository, InMemorySupplierDirectory, NegotiationRepository,
        RepositoryError, SupplierDirectory,
    };

    fn request() -> NewNegotiation {
        NewNegotiation {
            collective_id: CollectiveId(1),
            supplier_id: SupplierId(7),
            terms: NegotiationTerms {
                target_pmpm: Some(Decimal::new(500, 0)),
                ..NegotiationTerms::default()
            },
        }
    }

    #[tokio::test]
    async fn in_memory_negotiation_round_trip() {
        let repo = InMemoryNegotiationRepository::default();
        let created = repo.create(request(), Utc::now()).await.expect("create");
        assert_eq!(created.id, NegotiationId(1));

        let outcome = repo
            .submit_offer(
                created.id,
                Offer {
                    actor: RoundActor::Supplier,
                    proposed_pmpm: Decimal::new(700, 0),
                    proposed_mlr: None,
                    notes: None,
                    accept: true,
                },
                Utc::now(),
            )
            .await
            .expect("offer");
        assert_eq!(outcome.status, NegotiationStatus::InProgress);

        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(found.rounds.len(), 1);
        assert_eq!(found.final_agreed_pmpm, None);
    }

    #[tokio::test]
    async fn rejected_transition_leaves_store_untouched() {
        let repo = InMemoryNegotiationRepository::default();
        let created = repo.create(request(), Utc::now()).await.expect("create");
        repo.cancel(created.id, Utc::now()).await.expect("cancel");

        let error = repo.accept_latest(created.id, Utc::now()).await.expect_err("terminal");
        assert!(matches!(error, RepositoryError::Rejected(NegotiationError::InvalidState { .. })));

        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(found.status, NegotiationStatus::Cancelled);
    }

    #[tokio::test]
    async fn in_memory_supplier_directory_filters_by_type() {
        let directory = InMemorySupplierDirectory::default();
        for (id, name, supplier_type) in [
            (9, "Summit Life", SupplierType::Insurer),
            (4, "Northside Rx", SupplierType::Pharmacy),
            (6, "Harbor Mutual", SupplierType::Insurer),
        ] {
            directory
                .insert(Supplier { id: SupplierId(id), name: name.to_string(), supplier_type })
                .await;
        }

        let insurers = directory.list_by_type(SupplierType::Insurer).await.expect("list");
        let names: Vec<&str> = insurers.iter().map(|supplier| supplier.name.as_str()).collect();
        assert_eq!(names, vec!["Harbor Mutual", "Summit Life"]);
    }
}
