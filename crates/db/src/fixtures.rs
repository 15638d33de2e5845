use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Collectives in the demo dataset and the member counts they must carry.
const SEED_COLLECTIVES: &[SeedCollectiveContract] = &[
    SeedCollectiveContract {
        id: 1,
        slug: "riverside-freelancers",
        member_count: 3,
        description: "Three mixed-age freelancers with chronic conditions, no surveys",
    },
    SeedCollectiveContract {
        id: 2,
        slug: "makers-guild",
        member_count: 120,
        description: "120 members aged 35-44, neutral risk, mid-size discount tier",
    },
];

const SEED_SUPPLIER_IDS: &[i64] = &[5, 6, 7, 8, 9, 10];
const SEED_NEGOTIATION_ID: i64 = 1;

/// Deterministic demo data for local runs and end-to-end tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Idempotent: rows that already exist are left alone.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let collectives_seeded = SEED_COLLECTIVES
            .iter()
            .map(|collective| CollectiveSeedInfo {
                id: collective.id,
                slug: collective.slug,
                member_count: collective.member_count,
                description: collective.description,
            })
            .collect();

        Ok(SeedResult {
            collectives_seeded,
            supplier_count: SEED_SUPPLIER_IDS.len(),
            negotiation_id: SEED_NEGOTIATION_ID,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for collective in SEED_COLLECTIVES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM collective WHERE id = ?1 AND slug = ?2)",
            )
            .bind(collective.id)
            .bind(collective.slug)
            .fetch_one(pool)
            .await?;
            checks.push((collective.slug, exists == 1));

            let members: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM collective_member WHERE collective_id = ?1")
                    .bind(collective.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((collective.member_label(), members == collective.member_count));
        }

        let supplier_ids = sql_array_from_ids(SEED_SUPPLIER_IDS);
        let suppliers: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(1) FROM supplier WHERE id IN {supplier_ids}"))
                .fetch_one(pool)
                .await?;
        checks.push(("suppliers", suppliers == SEED_SUPPLIER_IDS.len() as i64));

        let negotiation: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM negotiation WHERE id = ?1)",
        )
        .bind(SEED_NEGOTIATION_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("negotiation", negotiation == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows. Cascades take members, surveys, bids, rounds and messages.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM negotiation WHERE id = ?1")
            .bind(SEED_NEGOTIATION_ID)
            .execute(&mut *tx)
            .await?;
        let supplier_ids = sql_array_from_ids(SEED_SUPPLIER_IDS);
        sqlx::query(&format!("DELETE FROM supplier WHERE id IN {supplier_ids}"))
            .execute(&mut *tx)
            .await?;
        let collective_ids: Vec<i64> =
            SEED_COLLECTIVES.iter().map(|collective| collective.id).collect();
        let collective_ids = sql_array_from_ids(&collective_ids);
        sqlx::query(&format!("DELETE FROM collective WHERE id IN {collective_ids}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedCollectiveContract {
    id: i64,
    slug: &'static str,
    member_count: i64,
    description: &'static str,
}

impl SeedCollectiveContract {
    fn member_label(&self) -> &'static str {
        match self.id {
            1 => "riverside-freelancers-members",
            _ => "makers-guild-members",
        }
    }
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub collectives_seeded: Vec<CollectiveSeedInfo>,
    pub supplier_count: usize,
    pub negotiation_id: i64,
}

#[derive(Debug)]
pub struct CollectiveSeedInfo {
    pub id: i64,
    pub slug: &'static str,
    pub member_count: i64,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
