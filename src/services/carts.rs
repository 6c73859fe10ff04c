use crate::{
    entities::{
        cart, cart_item, product, Cart, CartItem, CartItemModel, CartModel, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-line cap on quantity; requests beyond it are clamped, not rejected.
pub const MAX_ITEM_QUANTITY: i32 = 15;

/// Shopping cart service.
///
/// Every user owns at most one cart, created lazily on first access. A
/// product appears at most once per cart; repeated adds bump the quantity
/// and re-clamp it at [`MAX_ITEM_QUANTITY`].
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Cart line joined with its product, plus the extended price
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item: CartItemModel,
    pub product: ProductModel,
    pub line_total: Decimal,
}

/// Cart with resolved lines and grand total
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart: CartModel,
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

fn clamp_quantity(quantity: i32) -> i32 {
    quantity.clamp(1, MAX_ITEM_QUANTITY)
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart, creating it on first use.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> Result<CartModel, ServiceError> {
        self.get_or_create_cart_on(&*self.db, user_id).await
    }

    async fn get_or_create_cart_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let cart_id = Uuid::new_v4();
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(cart_id),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let cart = cart.insert(conn).await?;

        self.event_sender.send_or_log(Event::CartCreated(cart_id)).await;

        info!("Created cart {} for user {}", cart_id, user_id);
        Ok(cart)
    }

    /// Returns the cart with its lines resolved against the catalog.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(user_id).await?;
        self.build_view(cart).await
    }

    async fn build_view(&self, cart: CartModel) -> Result<CartView, ServiceError> {
        let rows: Vec<(CartItemModel, Option<ProductModel>)> = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError("Cart line references a missing product".to_string())
            })?;
            let line_total = product.price * Decimal::from(item.quantity);
            total += line_total;
            items.push(CartLine {
                item,
                product,
                line_total,
            });
        }

        Ok(CartView { cart, items, total })
    }

    /// Adds a product to the user's cart. Existing lines for the same product
    /// are incremented instead of duplicated; quantities clamp to [1, 15].
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let quantity = clamp_quantity(quantity);

        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart_on(&txn, user_id).await?;

        // Only approved products can be carted
        let product = Product::find_by_id(product_id)
            .filter(product::Column::IsApproved.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing {
            let merged = clamp_quantity(item.quantity.saturating_add(quantity));
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(merged);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let now = Utc::now();
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id,
            })
            .await;

        info!(
            "Added product {} x{} to cart {}",
            product.id, quantity, cart.id
        );
        self.build_view(cart).await
    }

    /// Sets a line's quantity. Zero or negative removes the line; anything
    /// above the cap clamps down to it.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart_on(&txn, user_id).await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if quantity <= 0 {
            item.delete(&txn).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: cart.id,
                    item_id,
                })
                .await;
        } else {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(clamp_quantity(quantity));
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemUpdated {
                    cart_id: cart.id,
                    item_id,
                })
                .await;
        }

        self.build_view(cart).await
    }

    /// Removes a line from the caller's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(user_id).await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.build_view(cart).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_clamp_to_line_cap() {
        assert_eq!(clamp_quantity(0), 1);
        assert_eq!(clamp_quantity(-3), 1);
        assert_eq!(clamp_quantity(1), 1);
        assert_eq!(clamp_quantity(15), 15);
        assert_eq!(clamp_quantity(99), 15);
    }
}
