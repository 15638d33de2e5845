use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction};

use groupbid_core::api::PortfolioScope;
use groupbid_core::domain::collective::CollectiveId;
use groupbid_core::domain::negotiation::{
    MessageId, Negotiation, NegotiationId, NegotiationMessage, NegotiationRound,
    NegotiationStatus, NegotiationTerms, NewNegotiation, NewNegotiationMessage, RiskAppetite,
    RoundActor, SenderKind,
};
use groupbid_core::domain::supplier::SupplierId;
use groupbid_core::negotiation::{validate_message, Offer, OfferOutcome};

use super::decode::{
    format_date, format_timestamp, parse_enum, parse_optional_date, parse_optional_decimal,
    parse_optional_u32, parse_decimal, parse_timestamp, parse_u32,
};
use super::{NegotiationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNegotiationRepository {
    pool: DbPool,
}

impl SqlNegotiationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens a write transaction that already holds the database writer lock
    /// and returns the negotiation as stored under that lock.
    async fn begin_locked(
        &self,
        id: NegotiationId,
    ) -> Result<(Transaction<'static, Sqlite>, Negotiation), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query("UPDATE negotiation SET updated_at = updated_at WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        if claimed.rows_affected() == 0 {
            return Err(RepositoryError::negotiation_not_found(id));
        }

        let negotiation = load_negotiation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::negotiation_not_found(id))?;
        Ok((tx, negotiation))
    }

    async fn transition(
        &self,
        id: NegotiationId,
        apply: impl FnOnce(&mut Negotiation) -> Result<(), RepositoryError> + Send,
    ) -> Result<Negotiation, RepositoryError> {
        let (mut tx, mut negotiation) = self.begin_locked(id).await?;
        apply(&mut negotiation)?;
        write_state(&mut tx, &negotiation).await?;
        tx.commit().await?;
        Ok(negotiation)
    }
}

#[async_trait::async_trait]
impl NegotiationRepository for SqlNegotiationRepository {
    async fn create(
        &self,
        request: NewNegotiation,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        let terms = &request.terms;
        let result = sqlx::query(
            "INSERT INTO negotiation (
                collective_id,
                supplier_id,
                status,
                target_pmpm,
                target_population_size,
                risk_appetite,
                target_start_date,
                notes,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.collective_id.0)
        .bind(request.supplier_id.0)
        .bind(NegotiationStatus::Open.as_str())
        .bind(terms.target_pmpm.map(|value| value.to_string()))
        .bind(terms.target_population_size.map(i64::from))
        .bind(terms.risk_appetite.as_str())
        .bind(terms.target_start_date.map(format_date))
        .bind(terms.notes.as_deref())
        .bind(format_timestamp(at))
        .bind(format_timestamp(at))
        .execute(&self.pool)
        .await?;

        let id = NegotiationId(result.last_insert_rowid());
        let mut conn = self.pool.acquire().await?;
        load_negotiation(&mut conn, id).await?.ok_or_else(|| RepositoryError::negotiation_not_found(id))
    }

    async fn find_by_id(&self, id: NegotiationId) -> Result<Option<Negotiation>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_negotiation(&mut conn, id).await
    }

    async fn list_for_scope(
        &self,
        scope: PortfolioScope,
    ) -> Result<Vec<Negotiation>, RepositoryError> {
        let (column, key) = match scope {
            PortfolioScope::Collective(id) => ("collective_id", id.0),
            PortfolioScope::Supplier(id) => ("supplier_id", id.0),
        };
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!(
            "SELECT {NEGOTIATION_COLUMNS}
             FROM negotiation
             WHERE {column} = ?
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(key)
        .fetch_all(&mut *conn)
        .await?;

        let mut negotiations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut negotiation = negotiation_from_row(row)?;
            negotiation.rounds = load_rounds(&mut conn, negotiation.id).await?;
            negotiation.messages = load_messages(&mut conn, negotiation.id).await?;
            negotiations.push(negotiation);
        }
        Ok(negotiations)
    }

    async fn submit_offer(
        &self,
        id: NegotiationId,
        offer: Offer,
        at: DateTime<Utc>,
    ) -> Result<OfferOutcome, RepositoryError> {
        let (mut tx, mut negotiation) = self.begin_locked(id).await?;
        let outcome = negotiation.record_offer(offer, at)?;

        insert_round(&mut tx, &outcome.round).await?;
        write_state(&mut tx, &negotiation).await?;
        tx.commit().await?;

        Ok(outcome)
    }

    async fn accept_latest(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<NegotiationRound, RepositoryError> {
        let (mut tx, mut negotiation) = self.begin_locked(id).await?;
        let accepted = negotiation.accept_latest(at)?;

        write_state(&mut tx, &negotiation).await?;
        tx.commit().await?;

        Ok(accepted)
    }

    async fn cancel(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        self.transition(id, |negotiation| Ok(negotiation.cancel(at)?)).await
    }

    async fn close(
        &self,
        id: NegotiationId,
        at: DateTime<Utc>,
    ) -> Result<Negotiation, RepositoryError> {
        self.transition(id, |negotiation| Ok(negotiation.close(at)?)).await
    }

    async fn post_message(
        &self,
        id: NegotiationId,
        message: NewNegotiationMessage,
        at: DateTime<Utc>,
    ) -> Result<NegotiationMessage, RepositoryError> {
        let message = validate_message(message)?;
        let (mut tx, _) = self.begin_locked(id).await?;

        let result = sqlx::query(
            "INSERT INTO negotiation_message (
                negotiation_id, sender_type, sender_name, body, created_at
             ) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(message.sender_type.as_str())
        .bind(message.sender_name.as_deref())
        .bind(&message.body)
        .bind(format_timestamp(at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(NegotiationMessage {
            id: MessageId(result.last_insert_rowid()),
            negotiation_id: id,
            sender_type: message.sender_type,
            sender_name: message.sender_name,
            body: message.body,
            created_at: at,
        })
    }
}

const NEGOTIATION_COLUMNS: &str = "id, collective_id, supplier_id, status, target_pmpm,
    target_population_size, risk_appetite, target_start_date, notes, final_agreed_pmpm,
    final_expected_mlr, created_at, updated_at";

async fn load_negotiation(
    conn: &mut SqliteConnection,
    id: NegotiationId,
) -> Result<Option<Negotiation>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {NEGOTIATION_COLUMNS} FROM negotiation WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut negotiation = negotiation_from_row(row)?;
    negotiation.rounds = load_rounds(conn, id).await?;
    negotiation.messages = load_messages(conn, id).await?;
    Ok(Some(negotiation))
}

async fn load_rounds(
    conn: &mut SqliteConnection,
    id: NegotiationId,
) -> Result<Vec<NegotiationRound>, RepositoryError> {
    sqlx::query(
        "SELECT negotiation_id, round_number, actor, proposed_pmpm, proposed_mlr, notes, created_at
         FROM negotiation_round
         WHERE negotiation_id = ?
         ORDER BY round_number ASC",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(round_from_row)
    .collect()
}

async fn load_messages(
    conn: &mut SqliteConnection,
    id: NegotiationId,
) -> Result<Vec<NegotiationMessage>, RepositoryError> {
    sqlx::query(
        "SELECT id, negotiation_id, sender_type, sender_name, body, created_at
         FROM negotiation_message
         WHERE negotiation_id = ?
         ORDER BY created_at ASC, id ASC",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(message_from_row)
    .collect()
}

async fn insert_round(
    conn: &mut SqliteConnection,
    round: &NegotiationRound,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO negotiation_round (
            negotiation_id, round_number, actor, proposed_pmpm, proposed_mlr, notes, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(round.negotiation_id.0)
    .bind(i64::from(round.round_number))
    .bind(round.actor.as_str())
    .bind(round.proposed_pmpm.to_string())
    .bind(round.proposed_mlr.map(|value| value.to_string()))
    .bind(round.notes.as_deref())
    .bind(format_timestamp(round.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_state(
    conn: &mut SqliteConnection,
    negotiation: &Negotiation,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE negotiation
         SET status = ?, final_agreed_pmpm = ?, final_expected_mlr = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(negotiation.status.as_str())
    .bind(negotiation.final_agreed_pmpm.map(|value| value.to_string()))
    .bind(negotiation.final_expected_mlr.map(|value| value.to_string()))
    .bind(format_timestamp(negotiation.updated_at))
    .bind(negotiation.id.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn negotiation_from_row(row: SqliteRow) -> Result<Negotiation, RepositoryError> {
    let status = parse_enum("status", row.try_get("status")?, NegotiationStatus::parse)?;
    let risk_appetite: String = row.try_get("risk_appetite")?;

    Ok(Negotiation {
        id: NegotiationId(row.try_get("id")?),
        collective_id: CollectiveId(row.try_get("collective_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        status,
        terms: NegotiationTerms {
            target_pmpm: parse_optional_decimal("target_pmpm", row.try_get("target_pmpm")?)?,
            target_population_size: parse_optional_u32(
                "target_population_size",
                row.try_get("target_population_size")?,
            )?,
            risk_appetite: RiskAppetite::normalize(Some(&risk_appetite)),
            target_start_date: parse_optional_date(
                "target_start_date",
                row.try_get("target_start_date")?,
            )?,
            notes: row.try_get("notes")?,
        },
        final_agreed_pmpm: parse_optional_decimal(
            "final_agreed_pmpm",
            row.try_get("final_agreed_pmpm")?,
        )?,
        final_expected_mlr: parse_optional_decimal(
            "final_expected_mlr",
            row.try_get("final_expected_mlr")?,
        )?,
        rounds: Vec::new(),
        messages: Vec::new(),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn round_from_row(row: SqliteRow) -> Result<NegotiationRound, RepositoryError> {
    Ok(NegotiationRound {
        negotiation_id: NegotiationId(row.try_get("negotiation_id")?),
        round_number: parse_u32("round_number", row.try_get("round_number")?)?,
        actor: parse_enum("actor", row.try_get("actor")?, RoundActor::parse)?,
        proposed_pmpm: parse_decimal("proposed_pmpm", row.try_get("proposed_pmpm")?)?,
        proposed_mlr: parse_optional_decimal("proposed_mlr", row.try_get("proposed_mlr")?)?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn message_from_row(row: SqliteRow) -> Result<NegotiationMessage, RepositoryError> {
    Ok(NegotiationMessage {
        id: MessageId(row.try_get("id")?),
        negotiation_id: NegotiationId(row.try_get("negotiation_id")?),
        sender_type: parse_enum("sender_type", row.try_get("sender_type")?, SenderKind::parse)?,
        sender_name: row.try_get("sender_name")?,
        body: row.try_get("body")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
