use crate::{
    entities::{
        order, order_item, vendor, Order, OrderItem, OrderItemModel, OrderStatus, Vendor,
        VendorModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Vendor-side order fulfilment.
///
/// Order items only exist for paid orders, so a vendor marking their last
/// incomplete item finished moves the whole order to `completed`.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Resolves the vendor record behind a user account.
    pub async fn vendor_for_user(&self, user_id: Uuid) -> Result<VendorModel, ServiceError> {
        Vendor::find()
            .filter(vendor::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Forbidden("Not a registered vendor".to_string()))
    }

    /// Lists the vendor's order items, newest order first.
    #[instrument(skip(self))]
    pub async fn list_vendor_order_items(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        let items = OrderItem::find()
            .filter(order_item::Column::VendorId.eq(vendor.id))
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .order_by_desc(order::Column::CreatedAt)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(items)
    }

    /// Marks one of the vendor's order items complete. When no incomplete
    /// items remain on the parent order it transitions to `completed`.
    #[instrument(skip(self))]
    pub async fn complete_order_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderItemModel, ServiceError> {
        let vendor = self.vendor_for_user(user_id).await?;

        let txn = self.db.begin().await?;

        let item = OrderItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order item {} not found", item_id)))?;

        if item.vendor_id != vendor.id {
            return Err(ServiceError::Forbidden(
                "Order item belongs to another vendor".to_string(),
            ));
        }

        if item.is_completed {
            return Err(ServiceError::InvalidOperation(
                "Order item is already completed".to_string(),
            ));
        }

        let order_id = item.order_id;
        let mut item: order_item::ActiveModel = item.into();
        item.is_completed = Set(true);
        let item = item.update(&txn).await?;

        let remaining = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::IsCompleted.eq(false))
            .count(&txn)
            .await?;

        let mut order_completed = false;
        if remaining == 0 {
            let parent = Order::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            if parent.status.can_transition_to(OrderStatus::Completed) {
                let mut parent: order::ActiveModel = parent.into();
                parent.status = Set(OrderStatus::Completed);
                parent.updated_at = Set(Utc::now());
                parent.update(&txn).await?;
                order_completed = true;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderItemCompleted {
                order_id,
                item_id: item.id,
            })
            .await;
        if order_completed {
            self.event_sender
                .send_or_log(Event::OrderCompleted(order_id))
                .await;
        }

        info!(
            "Vendor {} completed order item {} (order {})",
            vendor.id, item.id, order_id
        );
        Ok(item)
    }
}
