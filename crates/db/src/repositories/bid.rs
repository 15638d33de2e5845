use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use groupbid_core::domain::collective::CollectiveId;
use groupbid_core::domain::supplier::{BidId, BidKind, NewSupplierBid, SupplierBid, SupplierId};

use super::decode::{format_timestamp, parse_decimal, parse_enum, parse_timestamp};
use super::{BidRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBidRepository {
    pool: DbPool,
}

impl SqlBidRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BidRepository for SqlBidRepository {
    async fn record_batch(
        &self,
        bids: Vec<NewSupplierBid>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(bids.len());

        for bid in bids {
            let result = sqlx::query(
                "INSERT INTO supplier_bid (
                    supplier_id,
                    collective_id,
                    bid_type,
                    monthly_premium,
                    discount_percent,
                    notes,
                    created_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(bid.supplier_id.0)
            .bind(bid.collective_id.0)
            .bind(bid.bid_type.as_str())
            .bind(bid.monthly_premium.to_string())
            .bind(bid.discount_percent.to_string())
            .bind(bid.notes.as_deref())
            .bind(format_timestamp(at))
            .execute(&mut *tx)
            .await?;

            recorded.push(SupplierBid::from_new(BidId(result.last_insert_rowid()), bid, at));
        }

        tx.commit().await?;
        Ok(recorded)
    }

    async fn list_for_collective(
        &self,
        collective_id: CollectiveId,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, supplier_id, collective_id, bid_type, monthly_premium, discount_percent,
                    notes, created_at
             FROM supplier_bid
             WHERE collective_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(collective_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bid_from_row).collect()
    }

    async fn list_for_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Vec<SupplierBid>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, supplier_id, collective_id, bid_type, monthly_premium, discount_percent,
                    notes, created_at
             FROM supplier_bid
             WHERE supplier_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(supplier_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bid_from_row).collect()
    }
}

fn bid_from_row(row: SqliteRow) -> Result<SupplierBid, RepositoryError> {
    Ok(SupplierBid {
        id: BidId(row.try_get("id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        collective_id: CollectiveId(row.try_get("collective_id")?),
        bid_type: parse_enum("bid_type", row.try_get("bid_type")?, BidKind::parse)?,
        monthly_premium: parse_decimal("monthly_premium", row.try_get("monthly_premium")?)?,
        discount_percent: parse_decimal("discount_percent", row.try_get("discount_percent")?)?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use groupbid_core::domain::collective::CollectiveId;
    use groupbid_core::domain::supplier::{BidKind, NewSupplierBid, SupplierId};

    use super::SqlBidRepository;
    use crate::repositories::{BidRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query(
            "INSERT INTO collective (id, name, slug, created_at)
             VALUES (1, 'Makers Guild', 'makers', '2026-01-01T00:00:00.000000Z');
             INSERT INTO supplier (id, name, supplier_type, created_at) VALUES
                (7, 'Harbor Mutual', 'insurer', '2026-01-01T00:00:00.000000Z'),
                (8, 'Keystone Health', 'insurer', '2026-01-01T00:00:00.000000Z');",
        )
        .execute(&pool)
        .await
        .expect("seed directory");
        pool
    }

    fn bid(supplier: i64, premium: i64) -> NewSupplierBid {
        NewSupplierBid {
            supplier_id: SupplierId(supplier),
            collective_id: CollectiveId(1),
            bid_type: BidKind::InsurancePremium,
            monthly_premium: Decimal::new(premium, 0),
            discount_percent: Decimal::new(10, 0),
            notes: Some("simulated".to_string()),
        }
    }

    #[tokio::test]
    async fn batch_is_recorded_and_listed() {
        let repo = SqlBidRepository::new(setup_pool().await);

        let recorded =
            repo.record_batch(vec![bid(7, 450), bid(8, 440)], Utc::now()).await.expect("record");
        assert_eq!(recorded.len(), 2);

        let listed = repo.list_for_collective(CollectiveId(1)).await.expect("list");
        let summary: Vec<(i64, Decimal)> =
            listed.iter().map(|bid| (bid.supplier_id.0, bid.monthly_premium)).collect();
        assert_eq!(summary, vec![(7, Decimal::new(450, 0)), (8, Decimal::new(440, 0))]);
        assert_eq!(listed[0].id, recorded[0].id);
    }

    #[tokio::test]
    async fn batch_with_unknown_supplier_records_nothing() {
        let repo = SqlBidRepository::new(setup_pool().await);

        let error = repo
            .record_batch(vec![bid(7, 450), bid(99, 430)], Utc::now())
            .await
            .expect_err("foreign key violation");
        assert!(matches!(error, RepositoryError::Database(_)));

        let listed = repo.list_for_collective(CollectiveId(1)).await.expect("list");
        assert!(listed.is_empty(), "partial batch must roll back");
    }

    #[tokio::test]
    async fn supplier_listing_is_newest_first_and_scoped() {
        let repo = SqlBidRepository::new(setup_pool().await);
        let earlier = Utc::now() - Duration::hours(1);

        repo.record_batch(vec![bid(7, 460), bid(8, 445)], earlier).await.expect("first batch");
        repo.record_batch(vec![bid(7, 450)], Utc::now()).await.expect("second batch");
        let same_instant = Utc::now();
        let pair = repo
            .record_batch(vec![bid(7, 455), bid(7, 448)], same_instant)
            .await
            .expect("same-instant batch");

        let listed = repo.list_for_supplier(SupplierId(7)).await.expect("list");
        let premiums: Vec<Decimal> = listed.iter().map(|bid| bid.monthly_premium).collect();
        assert_eq!(
            premiums,
            vec![
                Decimal::new(448, 0),
                Decimal::new(455, 0),
                Decimal::new(450, 0),
                Decimal::new(460, 0),
            ]
        );
        assert_eq!(listed[0].id, pair[1].id);
        assert!(listed.iter().all(|bid| bid.supplier_id == SupplierId(7)));

        let none = repo.list_for_supplier(SupplierId(99)).await.expect("unknown supplier");
        assert!(none.is_empty());
    }
}
