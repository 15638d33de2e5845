use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use groupbid_core::api::{
    AcceptResponse, NegotiationPortfolio, OfferResponse, PortfolioScope, PostMessageRequest,
    StartNegotiationRequest, SubmitOfferRequest,
};
use groupbid_core::domain::negotiation::{Negotiation, NegotiationId, NegotiationMessage};
use groupbid_core::errors::ApplicationError;

use crate::repositories::{
    CollectiveDirectory, NegotiationRepository, RepositoryError, SupplierDirectory,
};

type LockMap = Arc<StdMutex<HashMap<NegotiationId, Arc<Mutex<()>>>>>;

/// One async mutex per negotiation id. Writers to the same negotiation queue
/// here before reaching the store; different negotiations never contend.
/// The store's transactional append still decides round numbers; this only
/// keeps same-process writers from racing each other into rejections.
#[derive(Default)]
struct NegotiationLocks {
    locks: LockMap,
}

impl NegotiationLocks {
    async fn acquire(&self, id: NegotiationId) -> NegotiationLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;
        NegotiationLease { id, guard: Some(guard), lock, locks: self.locks.clone() }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Held for the duration of one write. Dropping the last lease for an id
/// removes its entry from the map.
struct NegotiationLease {
    id: NegotiationId,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    locks: LockMap,
}

impl Drop for NegotiationLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this lease still reference the mutex.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}

pub struct NegotiationService {
    negotiations: Arc<dyn NegotiationRepository>,
    collectives: Arc<dyn CollectiveDirectory>,
    suppliers: Arc<dyn SupplierDirectory>,
    locks: NegotiationLocks,
}

impl NegotiationService {
    pub fn new(
        negotiations: Arc<dyn NegotiationRepository>,
        collectives: Arc<dyn CollectiveDirectory>,
        suppliers: Arc<dyn SupplierDirectory>,
    ) -> Self {
        Self { negotiations, collectives, suppliers, locks: NegotiationLocks::default() }
    }

    pub async fn start(
        &self,
        request: StartNegotiationRequest,
        correlation_id: &str,
    ) -> Result<Negotiation, ApplicationError> {
        request.validate()?;
        if self.collectives.find_collective(request.collective_id).await?.is_none() {
            return Err(ApplicationError::NotFound {
                entity: "collective",
                id: request.collective_id.to_string(),
            });
        }
        if self.suppliers.find_by_id(request.supplier_id).await?.is_none() {
            return Err(ApplicationError::NotFound {
                entity: "supplier",
                id: request.supplier_id.to_string(),
            });
        }

        let negotiation =
            self.negotiations.create(request.into_new_negotiation(), Utc::now()).await?;
        info!(
            event_name = "negotiation.started",
            correlation_id = %correlation_id,
            negotiation_id = %negotiation.id,
            collective_id = %negotiation.collective_id,
            supplier_id = %negotiation.supplier_id,
            risk_appetite = negotiation.terms.risk_appetite.as_str(),
            "negotiation opened"
        );
        Ok(negotiation)
    }

    pub async fn submit_offer(
        &self,
        request: SubmitOfferRequest,
        correlation_id: &str,
    ) -> Result<OfferResponse, ApplicationError> {
        request.validate()?;
        let id = request.negotiation_id;
        let _guard = self.locks.acquire(id).await;

        let outcome = match self.negotiations.submit_offer(id, request.offer(), Utc::now()).await {
            Ok(outcome) => outcome,
            Err(error) => {
                if let RepositoryError::Rejected(reason) = &error {
                    warn!(
                        event_name = "negotiation.offer_rejected",
                        correlation_id = %correlation_id,
                        negotiation_id = %id,
                        reason = %reason,
                        "offer refused by negotiation state"
                    );
                }
                return Err(error.into());
            }
        };

        info!(
            event_name = "negotiation.offer_recorded",
            correlation_id = %correlation_id,
            negotiation_id = %id,
            round_number = outcome.round.round_number,
            actor = outcome.round.actor.as_str(),
            recommended_action = outcome.evaluation.recommended_action.as_str(),
            status = outcome.status.as_str(),
            "negotiation round recorded"
        );
        if outcome.closed_deal() {
            info!(
                event_name = "negotiation.agreed",
                correlation_id = %correlation_id,
                negotiation_id = %id,
                final_agreed_pmpm = %outcome.round.proposed_pmpm,
                "negotiation agreed on an acceptable offer"
            );
        }
        Ok(OfferResponse::from_outcome(outcome))
    }

    pub async fn accept_latest(
        &self,
        id: NegotiationId,
        correlation_id: &str,
    ) -> Result<AcceptResponse, ApplicationError> {
        let _guard = self.locks.acquire(id).await;
        let round = self.negotiations.accept_latest(id, Utc::now()).await?;

        info!(
            event_name = "negotiation.agreed",
            correlation_id = %correlation_id,
            negotiation_id = %id,
            round_number = round.round_number,
            final_agreed_pmpm = %round.proposed_pmpm,
            "negotiation agreed on the latest round"
        );
        Ok(AcceptResponse::from_round(&round))
    }

    pub async fn cancel(
        &self,
        id: NegotiationId,
        correlation_id: &str,
    ) -> Result<Negotiation, ApplicationError> {
        let _guard = self.locks.acquire(id).await;
        let negotiation = self.negotiations.cancel(id, Utc::now()).await?;
        info!(
            event_name = "negotiation.cancelled",
            correlation_id = %correlation_id,
            negotiation_id = %id,
            "negotiation cancelled"
        );
        Ok(negotiation)
    }

    pub async fn close(
        &self,
        id: NegotiationId,
        correlation_id: &str,
    ) -> Result<Negotiation, ApplicationError> {
        let _guard = self.locks.acquire(id).await;
        let negotiation = self.negotiations.close(id, Utc::now()).await?;
        info!(
            event_name = "negotiation.closed",
            correlation_id = %correlation_id,
            negotiation_id = %id,
            "negotiation closed without agreement"
        );
        Ok(negotiation)
    }

    pub async fn post_message(
        &self,
        request: PostMessageRequest,
        correlation_id: &str,
    ) -> Result<NegotiationMessage, ApplicationError> {
        let id = request.negotiation_id;
        let _guard = self.locks.acquire(id).await;
        let message = self.negotiations.post_message(id, request.message(), Utc::now()).await?;
        info!(
            event_name = "negotiation.message_posted",
            correlation_id = %correlation_id,
            negotiation_id = %id,
            sender_type = message.sender_type.as_str(),
            "negotiation message posted"
        );
        Ok(message)
    }

    pub async fn get(&self, id: NegotiationId) -> Result<Negotiation, ApplicationError> {
        self.negotiations.find_by_id(id).await?.ok_or_else(|| ApplicationError::NotFound {
            entity: "negotiation",
            id: id.to_string(),
        })
    }

    pub async fn list(
        &self,
        scope: PortfolioScope,
    ) -> Result<NegotiationPortfolio, ApplicationError> {
        let negotiations = self.negotiations.list_for_scope(scope).await?;
        Ok(NegotiationPortfolio::build(scope, &negotiations))
    }
}
