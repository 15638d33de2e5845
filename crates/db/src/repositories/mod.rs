use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use groupbid_core::api::PortfolioScope;
use groupbid_core::domain::collective::{Collective, CollectiveId, MemberId, MemberProfile};
use groupbid_core::domain::negotiation::{
    Negotiation, NegotiationId, NegotiationMessage, NegotiationRound, NewNegotiation,
    NewNegotiationMessage,
};
use groupbid_core::domain::supplier::{
    NewSupplierBid, Supplier, SupplierBid, SupplierId, SupplierType,
};
use groupbid_core::errors::ApplicationError;
use groupbid_core::negotiation::{NegotiationError, Offer, OfferOutcome};

pub mod bid;
pub mod collective;
mod decode;
pub mod memory;
pub mod negotiation;
pub mod supplier;

pub use bid::SqlBidRepository;
pub use collective::SqlCollectiveDirectory;
pub use memory::{
    InMemoryBidRepository, InMemoryCollectiveDirectory, InMemoryNegotiationRepository,
    InMemorySupplierDirectory,
};
pub use negotiation::SqlNegotiationRepository;
pub use supplier::SqlSupplierDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Rejected(#[from] NegotiationError),
}

impl RepositoryError {
    pub fn negotiation_not_found(id: NegotiationId) -> Self {
        Self::NotFound { entity: "negotiation", id: id.to_string() }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Rejected(error) => Self::from(error),
            RepositoryError::Database(error) => Self::Persistence(error.to_string()),
            RepositoryError::Decode(message) => Self::Persistence(message),
        }
    }
}

/// Negotiation aggregate storage. Every mutation runs the state machine
/// against the ledger as stored and persists the result atomically, so two
/// writers can never derive the same round number.
#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    async fn create(
        &self,
        negotiation: NewNegotiation,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError>;

    async fn find_by_id(&self, id: NegotiationId) -> Result<Option<Negotiation>, RepositoryError>;

    async fn list_for_scope(
        &self,
        scope: PortfolioScope,
    ) -> Result<Vec<Negotiation>, RepositoryError>;

    async fn submit_offer(
        &self,
        id: NegotiationId,
        offer: Offer,
        at: DateTime<Utc>,
    ) -> Result<OfferOutcome, RepositoryError>;

    async fn accept_latest(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<NegotiationRound, RepositoryError>;

    async fn cancel(&self, id: NegotiationId, at: DateTime<Utc>)
        -> Result<Negotiation, RepositoryError>;

    async fn close(&self, id: NegotiationId, at: DateTime<Utc>)
        -> Result<Negotiation, RepositoryError>;

    async fn post_message(
        &self,
        id: NegotiationId,
        message: NewNegotiationMessage,
        at: DateTime<Utc>,
    ) -> Result<NegotiationMessage, RepositoryError>;
}

/// Membership and survey lookups owned by the surrounding system.
#[async_trait]
pub trait CollectiveDirectory: Send + Sync {
    async fn find_collective(
        &self,
        id: CollectiveId,
    ) -> Result<Option<Collective>, RepositoryError>;

    async fn members_of(&self, id: CollectiveId) -> Result<Vec<MemberProfile>, RepositoryError>;

    async fn monthly_rx_spend(&self, member: MemberId) -> Result<Option<Decimal>, RepositoryError>;
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn find_by_id(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError>;

    async fn list_by_type(
        &self,
        supplier_type: SupplierType,
    ) -> Result<Vec<Supplier>, RepositoryError>;
}

#[async_trait]
pub trait BidRepository: Send + Sync {
    /// Records every bid or none.
    async fn record_batch(
        &self,
        bids: Vec<NewSupplierBid>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SupplierBid>, RepositoryError>;

    async fn list_for_collective(
        &self,
        collective_id: CollectiveId,
    ) -> Result<Vec<SupplierBid>, RepositoryError>;

    /// Newest first.
    async fn list_for_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Vec<SupplierBid>, RepositoryError>;
}
