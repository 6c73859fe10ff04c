use crate::{
    entities::{product, Product, ProductCategory, ProductModel},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Public storefront catalog. Only approved products are visible here;
/// unapproved ones 404 even when fetched by id.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists approved products, newest first, optionally filtered by category.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        category: Option<ProductCategory>,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        let mut query = Product::find().filter(product::Column::IsApproved.eq(true));

        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }

        let products = query
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(products)
    }

    /// Fetches a single approved product.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .filter(product::Column::IsApproved.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }
}
