pub mod engine;
pub mod strategy;

pub use engine::{
    normalize_loss_ratio, validate_message, NegotiationError, NegotiationOperation, Offer,
    OfferOutcome,
};
pub use strategy::{evaluate_offer, FairBand, FairValueEvaluation, RecommendedAction};
