use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use groupbid_core::domain::collective::{Collective, CollectiveId, MemberId, MemberProfile};

use super::decode::{parse_optional_decimal, parse_timestamp};
use super::{CollectiveDirectory, RepositoryError};
use crate::DbPool;

pub struct SqlCollectiveDirectory {
    pool: DbPool,
}

impl SqlCollectiveDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CollectiveDirectory for SqlCollectiveDirectory {
    async fn find_collective(
        &self,
        id: CollectiveId,
    ) -> Result<Option<Collective>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM collective WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(collective_from_row).transpose()
    }

    async fn members_of(&self, id: CollectiveId) -> Result<Vec<MemberProfile>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, collective_id, age_range, chronic_conditions, industry, state
             FROM collective_member
             WHERE collective_id = ?
             ORDER BY id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(member_from_row).collect()
    }

    async fn monthly_rx_spend(&self, member: MemberId) -> Result<Option<Decimal>, RepositoryError> {
        let spend: Option<Option<String>> =
            sqlx::query_scalar("SELECT monthly_rx_spend FROM survey_response WHERE member_id = ?")
                .bind(member.0)
                .fetch_optional(&self.pool)
                .await?;

        parse_optional_decimal("monthly_rx_spend", spend.flatten())
    }
}

fn collective_from_row(row: SqliteRow) -> Result<Collective, RepositoryError> {
    Ok(Collective {
        id: CollectiveId(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn member_from_row(row: SqliteRow) -> Result<MemberProfile, RepositoryError> {
    Ok(MemberProfile {
        id: MemberId(row.try_get("id")?),
        collective_id: CollectiveId(row.try_get("collective_id")?),
        age_range: row.try_get("age_range")?,
        chronic_conditions: row.try_get("chronic_conditions")?,
        industry: row.try_get("industry")?,
        state: row.try_get("state")?,
    })
}
