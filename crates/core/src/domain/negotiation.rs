use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::collective::CollectiveId;
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NegotiationId(pub i64);

impl fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Open,
    InProgress,
    Agreed,
    Closed,
    Cancelled,
}

impl NegotiationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Agreed => "agreed",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "agreed" => Some(Self::Agreed),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Offers, counters and acceptance are only legal before a terminal state.
    pub fn accepts_offers(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.accepts_offers()
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized risk appetite. Unknown or missing values fall back to `Medium`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAppetite {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskAppetite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn normalize(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            _ => Self::Medium,
        }
    }

    /// Half-width of the fair band around the target, as a fraction.
    pub fn fair_band(&self) -> Decimal {
        match self {
            Self::Low => Decimal::new(3, 2),
            Self::Medium => Decimal::new(5, 2),
            Self::High => Decimal::new(8, 2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundActor {
    Supplier,
    Collective,
}

impl RoundActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supplier => "supplier",
            Self::Collective => "collective",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supplier" => Some(Self::Supplier),
            "collective" => Some(Self::Collective),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Collective,
    Supplier,
    System,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collective => "collective",
            Self::Supplier => "supplier",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collective" => Some(Self::Collective),
            "supplier" => Some(Self::Supplier),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Deal parameters captured when a negotiation is opened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationTerms {
    pub target_pmpm: Option<Decimal>,
    pub target_population_size: Option<u32>,
    pub risk_appetite: RiskAppetite,
    pub target_start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNegotiation {
    pub collective_id: CollectiveId,
    pub supplier_id: SupplierId,
    pub terms: NegotiationTerms,
}

/// One offer in the append-only round ledger. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRound {
    pub negotiation_id: NegotiationId,
    pub round_number: u32,
    pub actor: RoundActor,
    pub proposed_pmpm: Decimal,
    pub proposed_mlr: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNegotiationMessage {
    pub sender_type: SenderKind,
    pub sender_name: Option<String>,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationMessage {
    pub id: MessageId,
    pub negotiation_id: NegotiationId,
    pub sender_type: SenderKind,
    pub sender_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationId,
    pub collective_id: CollectiveId,
    pub supplier_id: SupplierId,
    pub status: NegotiationStatus,
    pub terms: NegotiationTerms,
    pub final_agreed_pmpm: Option<Decimal>,
    pub final_expected_mlr: Option<Decimal>,
    pub rounds: Vec<NegotiationRound>,
    pub messages: Vec<NegotiationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Negotiation {
    pub fn open(id: NegotiationId, request: NewNegotiation, at: DateTime<Utc>) -> Self {
        Self {
            id,
            collective_id: request.collective_id,
            supplier_id: request.supplier_id,
            status: NegotiationStatus::Open,
            terms: request.terms,
            final_agreed_pmpm: None,
            final_expected_mlr: None,
            rounds: Vec::new(),
            messages: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn latest_round(&self) -> Option<&NegotiationRound> {
        self.rounds.iter().max_by_key(|round| round.round_number)
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Verifies the invariants a loaded aggregate must satisfy: final price
    /// present exactly when agreed, and round numbers forming `1..=N`.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let agreed = self.status == NegotiationStatus::Agreed;
        if agreed != self.final_agreed_pmpm.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "negotiation {} has status {} but final_agreed_pmpm is {}",
                self.id,
                self.status,
                if self.final_agreed_pmpm.is_some() { "set" } else { "unset" }
            )));
        }

        for (index, round) in self.rounds.iter().enumerate() {
            let expected = index as u32 + 1;
            if round.round_number != expected {
                return Err(DomainError::InvariantViolation(format!(
                    "negotiation {} round ledger is not contiguous: expected {expected}, found {}",
                    self.id, round.round_number
                )));
            }
        }

        Ok(())
    }
}
