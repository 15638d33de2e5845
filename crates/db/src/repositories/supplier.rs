use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use groupbid_core::domain::supplier::{Supplier, SupplierId, SupplierType};

use super::decode::parse_enum;
use super::{RepositoryError, SupplierDirectory};
use crate::DbPool;

pub struct SqlSupplierDirectory {
    pool: DbPool,
}

impl SqlSupplierDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SupplierDirectory for SqlSupplierDirectory {
    async fn find_by_id(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, supplier_type FROM supplier WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(supplier_from_row).transpose()
    }

    async fn list_by_type(
        &self,
        supplier_type: SupplierType,
    ) -> Result<Vec<Supplier>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, supplier_type FROM supplier WHERE supplier_type = ? ORDER BY id ASC",
        )
        .bind(supplier_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(supplier_from_row).collect()
    }
}

fn supplier_from_row(row: SqliteRow) -> Result<Supplier, RepositoryError> {
    Ok(Supplier {
        id: SupplierId(row.try_get("id")?),
        name: row.try_get("name")?,
        supplier_type: parse_enum(
            "supplier_type",
            row.try_get("supplier_type")?,
            SupplierType::parse,
        )?,
    })
}
