use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::negotiation::{
    MessageId, Negotiation, NegotiationId, NegotiationMessage, NegotiationRound,
    NegotiationStatus, NewNegotiationMessage, RoundActor,
};
use crate::negotiation::strategy::{evaluate_offer, FairValueEvaluation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOperation {
    Offer,
    Accept,
    Cancel,
    Close,
}

impl fmt::Display for NegotiationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offer => "offer",
            Self::Accept => "accept",
            Self::Cancel => "cancel",
            Self::Close => "close",
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("negotiation {id} cannot {operation} while {status}")]
    InvalidState { id: NegotiationId, status: NegotiationStatus, operation: NegotiationOperation },
    #[error("negotiation {id} has no rounds to accept")]
    NoRounds { id: NegotiationId },
    #[error("negotiation message body cannot be empty")]
    EmptyMessage,
}

/// An offer or counter-offer as submitted by either party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub actor: RoundActor,
    pub proposed_pmpm: Decimal,
    /// Either a fraction (`0.82`) or a percentage (`82`).
    pub proposed_mlr: Option<Decimal>,
    pub notes: Option<String>,
    /// Close the deal if the strategy judges this offer acceptable.
    pub accept: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferOutcome {
    pub round: NegotiationRound,
    pub evaluation: FairValueEvaluation,
    pub previous_status: NegotiationStatus,
    pub status: NegotiationStatus,
}

impl OfferOutcome {
    pub fn closed_deal(&self) -> bool {
        self.status == NegotiationStatus::Agreed
    }
}

/// Values above `1.0` are read as percentages. A caller meaning a fraction
/// slightly above one cannot be distinguished and is divided as well.
pub fn normalize_loss_ratio(raw: Option<Decimal>) -> Option<Decimal> {
    raw.map(|value| if value > Decimal::ONE { value / Decimal::new(100, 0) } else { value })
}

impl Negotiation {
    pub fn next_round_number(&self) -> u32 {
        self.latest_round().map(|round| round.round_number + 1).unwrap_or(1)
    }

    fn ensure_accepts(&self, operation: NegotiationOperation) -> Result<(), NegotiationError> {
        if self.status.accepts_offers() {
            return Ok(());
        }
        Err(NegotiationError::InvalidState { id: self.id, status: self.status, operation })
    }

    fn agree(&mut self, pmpm: Decimal, mlr: Option<Decimal>, at: DateTime<Utc>) {
        self.status = NegotiationStatus::Agreed;
        self.final_agreed_pmpm = Some(pmpm);
        self.final_expected_mlr = mlr;
        self.updated_at = at;
    }

    /// Appends a round for `offer` and advances the status. The round number
    /// is derived from the ledger held by this aggregate, so callers must
    /// load it under the same write lock they persist with.
    pub fn record_offer(
        &mut self,
        offer: Offer,
        at: DateTime<Utc>,
    ) -> Result<OfferOutcome, NegotiationError> {
        self.ensure_accepts(NegotiationOperation::Offer)?;

        let previous_status = self.status;
        let proposed_mlr = normalize_loss_ratio(offer.proposed_mlr);
        let round = NegotiationRound {
            negotiation_id: self.id,
            round_number: self.next_round_number(),
            actor: offer.actor,
            proposed_pmpm: offer.proposed_pmpm,
            proposed_mlr,
            notes: offer.notes,
            created_at: at,
        };
        self.rounds.push(round.clone());

        let evaluation =
            evaluate_offer(self.terms.target_pmpm, offer.proposed_pmpm, self.terms.risk_appetite);

        if offer.accept && evaluation.is_acceptable {
            self.agree(offer.proposed_pmpm, proposed_mlr, at);
        } else {
            if self.status == NegotiationStatus::Open {
                self.status = NegotiationStatus::InProgress;
            }
            self.updated_at = at;
        }

        Ok(OfferOutcome { round, evaluation, previous_status, status: self.status })
    }

    /// Closes the deal on the most recent round's terms without re-running
    /// the strategy.
    pub fn accept_latest(&mut self, at: DateTime<Utc>) -> Result<NegotiationRound, NegotiationError> {
        self.ensure_accepts(NegotiationOperation::Accept)?;
        let latest = self.latest_round().cloned().ok_or(NegotiationError::NoRounds { id: self.id })?;
        self.agree(latest.proposed_pmpm, latest.proposed_mlr, at);
        Ok(latest)
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), NegotiationError> {
        self.ensure_accepts(NegotiationOperation::Cancel)?;
        self.status = NegotiationStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> Result<(), NegotiationError> {
        self.ensure_accepts(NegotiationOperation::Close)?;
        self.status = NegotiationStatus::Closed;
        self.updated_at = at;
        Ok(())
    }

    /// Appends to the commentary thread. Allowed in every status and never
    /// moves the state machine.
    pub fn post_message(
        &mut self,
        id: MessageId,
        message: NewNegotiationMessage,
        at: DateTime<Utc>,
    ) -> Result<NegotiationMessage, NegotiationError> {
        let message = validate_message(message)?;
        let posted = NegotiationMessage {
            id,
            negotiation_id: self.id,
            sender_type: message.sender_type,
            sender_name: message.sender_name,
            body: message.body,
            created_at: at,
        };
        self.messages.push(posted.clone());
        Ok(posted)
    }
}

/// Trims the body and sender name; blank sender names become `None`.
pub fn validate_message(
    message: NewNegotiationMessage,
) -> Result<NewNegotiationMessage, NegotiationError> {
    let body = message.body.trim();
    if body.is_empty() {
        return Err(NegotiationError::EmptyMessage);
    }
    let sender_name = message
        .sender_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    Ok(NewNegotiationMessage { sender_type: message.sender_type, sender_name, body: body.to_string() })
}
