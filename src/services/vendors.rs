use crate::{
    entities::{
        product, profile, vendor, Product, ProductCategory, ProductModel, Profile, Vendor,
        VendorModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Vendor onboarding and vendor-side product management.
///
/// Registration always starts unapproved; until staff approve the vendor,
/// product creation is refused. Vendor edits can never flip a product's
/// approval flag, that stays a staff-only moderation control.
#[derive(Clone)]
pub struct VendorService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Vendor registration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVendorInput {
    pub bank_details: String,
    pub nid_number: String,
}

/// New product parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Product update parameters; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Vendor row plus their products, as shown on the vendor dashboard
#[derive(Debug, Clone, Serialize)]
pub struct VendorDashboard {
    pub vendor: VendorModel,
    pub products: Vec<ProductModel>,
}

impl VendorService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn vendor_for_user(&self, user_id: Uuid) -> Result<VendorModel, ServiceError> {
        Vendor::find()
            .filter(vendor::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Forbidden("Not a registered vendor".to_string()))
    }

    /// Registers the user as a vendor, pending staff approval.
    #[instrument(skip(self, input))]
    pub async fn register_vendor(
        &self,
        user_id: Uuid,
        input: RegisterVendorInput,
    ) -> Result<VendorModel, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = Vendor::find()
            .filter(vendor::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "User is already registered as a vendor".to_string(),
            ));
        }

        let vendor_id = Uuid::new_v4();
        let vendor_row = vendor::ActiveModel {
            id: Set(vendor_id),
            user_id: Set(user_id),
            bank_details: Set(input.bank_details),
            nid_number: Set(input.nid_number),
            is_approved: Set(false),
            created_at: Set(Utc::now()),
        };
        let vendor_row = vendor_row.insert(&txn).await?;

        let profile = Profile::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Profile for user {} not found", user_id))
            })?;
        let mut profile: profile::ActiveModel = profile.into();
        profile.is_vendor = Set(true);
        profile.updated_at = Set(Utc::now());
        profile.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::VendorRegistered(vendor_id))
            .await;

        info!("Registered vendor {} for user {}", vendor_id, user_id);
        Ok(vendor_row)
    }

    /// Vendor dashboard: the vendor row plus their products. The product
    /// list stays empty until the vendor is approved.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, user_id: Uuid) -> Result<VendorDashboard, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        let products = if vendor.is_approved {
            self.products_of(vendor.id).await?
        } else {
            Vec::new()
        };

        Ok(VendorDashboard { vendor, products })
    }

    /// Lists the vendor's own products, approved or not.
    #[instrument(skip(self))]
    pub async fn list_own_products(&self, user_id: Uuid) -> Result<Vec<ProductModel>, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;
        self.products_of(vendor.id).await
    }

    async fn products_of(&self, vendor_id: Uuid) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(Product::find()
            .filter(product::Column::VendorId.eq(vendor_id))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Creates a product for an approved vendor. New products are live
    /// immediately; staff moderation can disable them later.
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        user_id: Uuid,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        if !vendor.is_approved {
            return Err(ServiceError::Forbidden(
                "Vendor is pending approval".to_string(),
            ));
        }

        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            category: Set(input.category),
            price: Set(input.price),
            vendor_id: Set(Some(vendor.id)),
            description: Set(input.description),
            image_url: Set(input.image_url),
            is_approved: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Vendor {} created product {}", vendor.id, product.id);
        Ok(product)
    }

    /// Updates one of the vendor's own products. Approval is untouchable
    /// from this path.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        let product = Product::find_by_id(product_id)
            .filter(product::Column::VendorId.eq(vendor.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be positive".to_string(),
                ));
            }
        }

        let mut product: product::ActiveModel = product.into();
        if let Some(name) = input.name {
            product.name = Set(name);
        }
        if let Some(category) = input.category {
            product.category = Set(category);
        }
        if let Some(price) = input.price {
            product.price = Set(price);
        }
        if let Some(description) = input.description {
            product.description = Set(Some(description));
        }
        if let Some(image_url) = input.image_url {
            product.image_url = Set(Some(image_url));
        }
        product.updated_at = Set(Utc::now());
        let product = product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product.id))
            .await;

        Ok(product)
    }

    /// Deletes one of the vendor's own products.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        let product = Product::find_by_id(product_id)
            .filter(product::Column::VendorId.eq(vendor.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        product.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Vendor {} deleted product {}", vendor.id, product_id);
        Ok(())
    }
}
