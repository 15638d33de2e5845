pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod negotiation;
pub mod quoting;
pub mod risk;

pub use api::{
    AcceptResponse, CollectiveQuotes, NegotiationPortfolio, NegotiationSummary, OfferResponse,
    PortfolioScope, PostMessageRequest, QuoteComparison, RankedBid, StartNegotiationRequest,
    SubmitOfferRequest,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, QuotingConfig};
pub use domain::collective::{AgeBracket, Collective, CollectiveId, MemberId, MemberProfile};
pub use domain::negotiation::{
    MessageId, Negotiation, NegotiationId, NegotiationMessage, NegotiationRound,
    NegotiationStatus, NegotiationTerms, NewNegotiation, NewNegotiationMessage, RiskAppetite,
    RoundActor, SenderKind,
};
pub use domain::supplier::{
    BidId, BidKind, NewSupplierBid, Supplier, SupplierBid, SupplierId, SupplierType,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use negotiation::{
    evaluate_offer, FairValueEvaluation, NegotiationError, Offer, OfferOutcome, RecommendedAction,
};
pub use quoting::{QuoteEngine, SupplierQuote};
pub use risk::{score_collective, CollectiveRiskProfile, MemberRiskInputs};
