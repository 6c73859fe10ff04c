use crate::{
    entities::{
        activity_log, order, payment, product, user, vendor, ActivityLog, ActivityLogModel, Order,
        OrderModel, OrderStatus, Payment, PaymentModel, Product, ProductModel, User, UserModel,
        Vendor, VendorModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Back-office moderation service. Staff only; every mutation appends an
/// activity_logs row inside the same transaction as the change itself.
#[derive(Clone)]
pub struct AdminService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Aggregate figures for the staff dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub active_users: u64,
    pub products: u64,
    pub orders: u64,
    pub pending_orders: u64,
    pub orders_today: u64,
    /// Sum of order totals over paid and completed orders
    pub revenue: Decimal,
    pub status_distribution: StatusDistribution,
    pub recent_orders: Vec<OrderModel>,
    pub recent_activity: Vec<ActivityLogModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusDistribution {
    pub pending: u64,
    pub paid: u64,
    pub completed: u64,
}

impl AdminService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn log_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        staff_id: Uuid,
        action: String,
    ) -> Result<(), ServiceError> {
        let entry = activity_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(staff_id)),
            action: Set(action),
            created_at: Set(Utc::now()),
        };
        entry.insert(conn).await?;
        Ok(())
    }

    /// Aggregates the staff dashboard figures.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        let db = &*self.db;

        let active_users = User::find()
            .filter(user::Column::IsActive.eq(true))
            .count(db)
            .await?;
        let products = Product::find().count(db).await?;
        let orders = Order::find().count(db).await?;

        let pending = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;
        let paid = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Paid))
            .count(db)
            .await?;
        let completed = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed))
            .count(db)
            .await?;

        let midnight = Utc::now()
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let orders_today = Order::find()
            .filter(order::Column::CreatedAt.gte(midnight))
            .count(db)
            .await?;

        let revenue: Decimal = Order::find()
            .filter(
                order::Column::Status.is_in([OrderStatus::Paid, OrderStatus::Completed]),
            )
            .select_only()
            .column(order::Column::TotalAmount)
            .into_tuple::<Decimal>()
            .all(db)
            .await?
            .into_iter()
            .sum();

        let recent_orders = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(10)
            .all(db)
            .await?;

        let recent_activity = ActivityLog::find()
            .order_by_desc(activity_log::Column::CreatedAt)
            .limit(10)
            .all(db)
            .await?;

        Ok(DashboardStats {
            active_users,
            products,
            orders,
            pending_orders: pending,
            orders_today,
            revenue,
            status_distribution: StatusDistribution {
                pending,
                paid,
                completed,
            },
            recent_orders,
            recent_activity,
        })
    }

    /// Lists all orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<Page<OrderModel>, ServiceError> {
        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page).await?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Lists all user accounts, newest first.
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<Page<UserModel>, ServiceError> {
        let paginator = User::find()
            .order_by_desc(user::Column::DateJoined)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page).await?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Lists all payments, newest first.
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<Page<PaymentModel>, ServiceError> {
        let paginator = Payment::find()
            .order_by_desc(payment::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page).await?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Approves a vendor, unlocking product creation for them.
    #[instrument(skip(self))]
    pub async fn approve_vendor(
        &self,
        staff_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<VendorModel, ServiceError> {
        let txn = self.db.begin().await?;

        let vendor_row = Vendor::find_by_id(vendor_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        let mut vendor_row: vendor::ActiveModel = vendor_row.into();
        vendor_row.is_approved = Set(true);
        let vendor_row = vendor_row.update(&txn).await?;

        self.log_action(&txn, staff_id, format!("approved vendor {}", vendor_id))
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::VendorApproved(vendor_id))
            .await;

        info!("Staff {} approved vendor {}", staff_id, vendor_id);
        Ok(vendor_row)
    }

    /// Rejects a vendor application, resetting it to pending.
    #[instrument(skip(self))]
    pub async fn reject_vendor(
        &self,
        staff_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<VendorModel, ServiceError> {
        let txn = self.db.begin().await?;

        let vendor_row = Vendor::find_by_id(vendor_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        let mut vendor_row: vendor::ActiveModel = vendor_row.into();
        vendor_row.is_approved = Set(false);
        let vendor_row = vendor_row.update(&txn).await?;

        self.log_action(&txn, staff_id, format!("rejected vendor {}", vendor_id))
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::VendorRejected(vendor_id))
            .await;

        info!("Staff {} rejected vendor {}", staff_id, vendor_id);
        Ok(vendor_row)
    }

    /// Makes a product visible in the storefront.
    #[instrument(skip(self))]
    pub async fn approve_product(
        &self,
        staff_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductModel, ServiceError> {
        self.set_product_approval(staff_id, product_id, true).await
    }

    /// Hides a product from the storefront.
    #[instrument(skip(self))]
    pub async fn disable_product(
        &self,
        staff_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductModel, ServiceError> {
        self.set_product_approval(staff_id, product_id, false).await
    }

    async fn set_product_approval(
        &self,
        staff_id: Uuid,
        product_id: Uuid,
        approved: bool,
    ) -> Result<ProductModel, ServiceError> {
        let txn = self.db.begin().await?;

        let product_row = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut product_row: product::ActiveModel = product_row.into();
        product_row.is_approved = Set(approved);
        product_row.updated_at = Set(Utc::now());
        let product_row = product_row.update(&txn).await?;

        let verb = if approved { "approved" } else { "disabled" };
        self.log_action(&txn, staff_id, format!("{} product {}", verb, product_id))
            .await?;

        txn.commit().await?;

        let event = if approved {
            Event::ProductApproved(product_id)
        } else {
            Event::ProductDisabled(product_id)
        };
        self.event_sender.send_or_log(event).await;

        info!("Staff {} {} product {}", staff_id, verb, product_id);
        Ok(product_row)
    }

    /// Staff override of an order's status. Honors the forward-only
    /// `pending -> paid -> completed` ordering.
    #[instrument(skip(self))]
    pub async fn set_order_status(
        &self,
        staff_id: Uuid,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order_row = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order_row.status.can_transition_to(status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot move order from {:?} to {:?}",
                order_row.status, status
            )));
        }

        let mut order_row: order::ActiveModel = order_row.into();
        order_row.status = Set(status);
        order_row.updated_at = Set(Utc::now());
        let order_row = order_row.update(&txn).await?;

        self.log_action(
            &txn,
            staff_id,
            format!("set order {} status to {:?}", order_id, status),
        )
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                new_status: format!("{:?}", status).to_lowercase(),
            })
            .await;

        Ok(order_row)
    }

    /// Activates or deactivates a user account.
    #[instrument(skip(self))]
    pub async fn toggle_user_active(
        &self,
        staff_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserModel, ServiceError> {
        let txn = self.db.begin().await?;

        let account = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let next = !account.is_active;
        let mut account: user::ActiveModel = account.into();
        account.is_active = Set(next);
        let account = account.update(&txn).await?;

        let verb = if next { "activated" } else { "deactivated" };
        self.log_action(&txn, staff_id, format!("{} user {}", verb, user_id))
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::UserActiveToggled {
                user_id,
                is_active: next,
            })
            .await;

        info!("Staff {} {} user {}", staff_id, verb, user_id);
        Ok(account)
    }

    /// Deletes an order. Items and the payment row cascade via foreign keys.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, staff_id: Uuid, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let order_row = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        order_row.delete(&txn).await?;

        self.log_action(&txn, staff_id, format!("deleted order {}", order_id))
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderDeleted(order_id))
            .await;

        info!("Staff {} deleted order {}", staff_id, order_id);
        Ok(())
    }
}
