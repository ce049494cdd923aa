//! # Inventory Repository
//!
//! Read-only access to per-vendor inventory. Rows are owned by an external
//! inventory system; the pipeline only reads them when assembling
//! suggestion context.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::error::RepositoryError;
use crate::models::inventory_item::{self, Entity as InventoryItem, Model};

/// Repository for inventory reads
pub struct InventoryRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new InventoryRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Current inventory snapshot for one vendor, ordered by SKU.
    pub async fn list_for_vendor(&self, vendor_id: &str) -> Result<Vec<Model>, RepositoryError> {
        InventoryItem::find()
            .filter(inventory_item::Column::VendorId.eq(vendor_id))
            .order_by_asc(inventory_item::Column::Sku)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Look up one item by vendor and SKU.
    pub async fn find_by_sku(
        &self,
        vendor_id: &str,
        sku: &str,
    ) -> Result<Option<Model>, RepositoryError> {
        InventoryItem::find()
            .filter(inventory_item::Column::VendorId.eq(vendor_id))
            .filter(inventory_item::Column::Sku.eq(sku))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, Set};

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    async fn insert_item(db: &DatabaseConnection, vendor_id: &str, sku: &str, price: f64) {
        let now = Utc::now();
        inventory_item::ActiveModel {
            vendor_id: Set(vendor_id.to_string()),
            sku: Set(sku.to_string()),
            product_name: Set(format!("Product {}", sku)),
            description: Set("test item".to_string()),
            price: Set(price),
            quantity_on_hand: Set(5),
            category: Set("Misc".to_string()),
            supplier: Set("Acme".to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn lists_only_the_requested_vendor() {
        let db = setup_db().await;
        insert_item(&db, "vendor-1", "B", 10.0).await;
        insert_item(&db, "vendor-1", "A", 20.0).await;
        insert_item(&db, "vendor-2", "A", 30.0).await;

        let repo = InventoryRepository::new(&db);
        let items = repo.list_for_vendor("vendor-1").await.unwrap();

        assert_eq!(items.len(), 2);
        // Ordered by SKU
        assert_eq!(items[0].sku, "A");
        assert_eq!(items[1].sku, "B");
    }

    #[tokio::test]
    async fn find_by_sku_scopes_to_vendor() {
        let db = setup_db().await;
        insert_item(&db, "vendor-1", "A", 20.0).await;

        let repo = InventoryRepository::new(&db);
        assert!(repo.find_by_sku("vendor-1", "A").await.unwrap().is_some());
        assert!(repo.find_by_sku("vendor-2", "A").await.unwrap().is_none());
    }
}
