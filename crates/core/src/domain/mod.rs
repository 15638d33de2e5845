use rust_decimal::Decimal;

pub mod collective;
pub mod negotiation;
pub mod supplier;

/// Largest price per member per month accepted from callers or config.
pub const MAX_PMPM: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
