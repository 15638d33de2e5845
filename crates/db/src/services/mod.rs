pub mod negotiation;
pub mod quotes;

pub use negotiation::NegotiationService;
pub use quotes::QuoteSimulationService;
