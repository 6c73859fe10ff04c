use crate::{
    entities::{
        cart, cart_item, order, order_item, payment, Cart, CartItem, CartItemModel, Order,
        OrderModel, OrderStatus, Payment, PaymentMethod, PaymentModel, PaymentStatus, Product,
        ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::PaymentGateway,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Checkout and payment confirmation service.
///
/// `create_order` freezes the cart total into a pending order without touching
/// the cart. `confirm_payment` is the only path that marks an order paid; it
/// runs as a single transaction guarded by a conditional status flip, so two
/// racing confirmations cannot both succeed. Gateway verification happens
/// before the transaction ever starts.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    esewa: Arc<dyn PaymentGateway>,
    khalti: Arc<dyn PaymentGateway>,
}

/// Result of a checkout request. COD orders come back already paid; gateway
/// orders stay pending until the callback confirms them.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderModel,
    pub payment: Option<PaymentModel>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        esewa: Arc<dyn PaymentGateway>,
        khalti: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            event_sender,
            esewa,
            khalti,
        }
    }

    /// Creates a pending order from the buyer's cart.
    ///
    /// The total is computed from current catalog prices and frozen on the
    /// order row. No order items are written and the cart is left untouched;
    /// both happen at confirmation.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        buyer_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<OrderModel, ServiceError> {
        let lines = self.cart_lines(buyer_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let total: Decimal = lines
            .iter()
            .map(|(item, product)| product.price * Decimal::from(item.quantity))
            .sum();

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            buyer_id: Set(buyer_id),
            total_amount: Set(total),
            payment_method: Set(payment_method),
            status: Set(OrderStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;

        info!("Created order {} for {} ({})", order.id, buyer_id, total);
        Ok(order)
    }

    /// Checks out the buyer's cart. COD confirms inline; gateway methods
    /// return the pending order for the client-side redirect.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        buyer_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let order = self.create_order(buyer_id, payment_method).await?;

        match payment_method {
            PaymentMethod::Cod => {
                let (order, payment) = self
                    .confirm_payment(buyer_id, order.id, None, None)
                    .await?;
                Ok(CheckoutOutcome {
                    order,
                    payment: Some(payment),
                })
            }
            PaymentMethod::Esewa | PaymentMethod::Khalti => Ok(CheckoutOutcome {
                order,
                payment: None,
            }),
        }
    }

    /// Confirms an eSewa payment: verify the reference with the gateway,
    /// then run the confirmation transaction.
    #[instrument(skip(self))]
    pub async fn confirm_esewa(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
        ref_id: &str,
        amount: Decimal,
    ) -> Result<(OrderModel, PaymentModel), ServiceError> {
        let order = self.pending_gateway_order(buyer_id, order_id, PaymentMethod::Esewa).await?;

        let verification = self.esewa.verify(ref_id, order.total_amount).await;
        self.require_verified(order_id, verification, "eSewa").await?;

        self.confirm_payment(buyer_id, order_id, Some(ref_id.to_string()), Some(amount))
            .await
    }

    /// Confirms a Khalti payment from the client-supplied token.
    #[instrument(skip(self))]
    pub async fn confirm_khalti(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
        token: &str,
        amount: Decimal,
    ) -> Result<(OrderModel, PaymentModel), ServiceError> {
        let order = self.pending_gateway_order(buyer_id, order_id, PaymentMethod::Khalti).await?;

        let verification = self.khalti.verify(token, order.total_amount).await;
        let verification = self
            .require_verified(order_id, verification, "Khalti")
            .await?;

        // Prefer the amount the gateway settled over the client's claim
        let amount = verification.amount.unwrap_or(amount);

        self.confirm_payment(buyer_id, order_id, Some(verification.reference), Some(amount))
            .await
    }

    /// Confirms payment for an order in one atomic transaction.
    ///
    /// Steps: conditional `pending -> paid` flip (loser of a race gets
    /// `AlreadyPaid`), amount pinning for gateway confirmations, payment row
    /// insert, order-item materialization with confirmation-time price and
    /// vendor snapshots, and cart clearing. Any failure rolls the whole
    /// transaction back.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
        gateway_ref: Option<String>,
        amount: Option<Decimal>,
    ) -> Result<(OrderModel, PaymentModel), ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .filter(order::Column::BuyerId.eq(buyer_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if let Some(got) = amount {
            if got != order.total_amount {
                return Err(ServiceError::AmountMismatch {
                    expected: order.total_amount,
                    got,
                });
            }
        }

        // Conditional flip: only one confirmation can move pending -> paid.
        let now = Utc::now();
        let flipped = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;
        if flipped.rows_affected == 0 {
            return Err(ServiceError::AlreadyPaid(order_id));
        }

        let status = match order.payment_method {
            // COD money changes hands at delivery
            PaymentMethod::Cod => PaymentStatus::Pending,
            PaymentMethod::Esewa | PaymentMethod::Khalti => PaymentStatus::Success,
        };

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            payment_method: Set(order.payment_method),
            transaction_id: Set(gateway_ref),
            amount: Set(order.total_amount),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let payment = payment.insert(&txn).await?;

        self.materialize_order_items(&txn, buyer_id, order_id).await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentConfirmed {
                order_id,
                payment_id: payment.id,
            })
            .await;

        info!("Confirmed payment {} for order {}", payment.id, order_id);
        Ok((order, payment))
    }

    /// Copies the buyer's cart lines into order items and clears the cart.
    /// Price and vendor are snapshotted as of confirmation.
    async fn materialize_order_items(
        &self,
        txn: &DatabaseTransaction,
        buyer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(buyer_id))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::InternalError("Paid order without a cart".to_string()))?;

        let lines: Vec<(CartItemModel, Option<ProductModel>)> = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(txn)
            .await?;

        let now = Utc::now();
        for (item, product) in &lines {
            let product = product.as_ref().ok_or_else(|| {
                ServiceError::InternalError("Cart line references a missing product".to_string())
            })?;
            let vendor_id = product.vendor_id.ok_or_else(|| {
                ServiceError::InternalError(format!("Product {} has no vendor", product.id))
            })?;

            let order_item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(product.id)),
                vendor_id: Set(vendor_id),
                quantity: Set(item.quantity),
                unit_price: Set(product.price),
                is_completed: Set(false),
                created_at: Set(now),
            };
            order_item.insert(txn).await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(txn)
            .await?;

        Ok(())
    }

    async fn cart_lines(
        &self,
        buyer_id: Uuid,
    ) -> Result<Vec<(CartItemModel, ProductModel)>, ServiceError> {
        let cart = match Cart::find()
            .filter(cart::Column::UserId.eq(buyer_id))
            .one(&*self.db)
            .await?
        {
            Some(cart) => cart,
            None => return Ok(Vec::new()),
        };

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(item, product)| {
                product
                    .map(|p| (item, p))
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "Cart line references a missing product".to_string(),
                        )
                    })
            })
            .collect()
    }

    /// Loads a pending order owned by the buyer, checking the payment method
    /// matches the gateway being confirmed.
    async fn pending_gateway_order(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::BuyerId.eq(buyer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_method != method {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} was not placed with this payment method",
                order_id
            )));
        }

        if order.status != OrderStatus::Pending {
            return Err(ServiceError::AlreadyPaid(order_id));
        }

        Ok(order)
    }

    async fn require_verified(
        &self,
        order_id: Uuid,
        verification: Result<crate::gateways::GatewayVerification, ServiceError>,
        gateway: &str,
    ) -> Result<crate::gateways::GatewayVerification, ServiceError> {
        match verification {
            Ok(v) if v.verified => Ok(v),
            Ok(_) => {
                warn!("{} declined payment for order {}", gateway, order_id);
                let reason = format!("{} did not verify the transaction", gateway);
                self.event_sender
                    .send_or_log(Event::PaymentFailed {
                        order_id,
                        reason: reason.clone(),
                    })
                    .await;
                Err(ServiceError::PaymentFailed(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Lists the buyer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, buyer_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        use sea_orm::QueryOrder;

        let orders = Order::find()
            .filter(order::Column::BuyerId.eq(buyer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// Fetches one of the buyer's orders with its payment, if any.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(OrderModel, Option<PaymentModel>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::BuyerId.eq(buyer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let payment = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;

        Ok((order, payment))
    }
}
