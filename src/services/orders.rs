use crate::{
    entities::{
        cart_item, order, order_item, product, shipping_address, shipping_status, CartItem, Order,
        OrderItem, OrderStatus, PaymentGateway, Product, ShipmentState, ShippingAddress,
        ShippingStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::PaymentService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order service. Owns the checkout protocol that converts a cart into a
/// confirmed order, and the cancellation path gated on shipping state.
///
/// Checkout runs as a single transaction: the user's cart rows are read
/// under an exclusive lock, validated against live products, charged, and
/// only then materialized into Order/OrderItems/ShippingStatus while stock
/// is decremented and the cart cleared. Any failure rolls the whole unit
/// back, so no partial order, payment or stock change is ever visible.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    payments: Arc<PaymentService>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        payments: Arc<PaymentService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            payments,
        }
    }

    /// Converts the user's cart into a confirmed order.
    ///
    /// Validation order is fixed (stock, price, amount, address) so error
    /// precedence is deterministic for a malformed request.
    ///
    /// # Returns
    ///
    /// * `Ok(OrderResponse)` - Confirmed order with items, address and shipping status
    /// * `Err(ServiceError::EmptyCart)` - No cart lines to check out
    /// * `Err(ServiceError::InsufficientStock)` - A line exceeds current stock
    /// * `Err(ServiceError::PriceMismatch)` - A line's price snapshot is stale
    /// * `Err(ServiceError::AmountMismatch)` - Payment amount differs from the cart total
    /// * `Err(ServiceError::InvalidAddress)` - Address missing or owned by someone else
    /// * `Err(ServiceError::UnsupportedGateway)` - Gateway not integrated
    /// * `Err(ServiceError::PaymentFailed)` - Gateway declined; nothing was persisted
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        // Lock the user's cart rows for the whole unit of work so a second
        // checkout or a cart mutation for the same user cannot interleave.
        let cart_rows = lock_for_update(CartItem::find(), &txn)
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&txn)
            .await?;

        if cart_rows.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut total = Decimal::ZERO;
        let mut drafts: Vec<(product::Model, i32, Decimal)> = Vec::new();

        for item in &cart_rows {
            let Some(product_id) = item.product_id else {
                // Product deleted since the line was added; line is dropped.
                continue;
            };

            // Products are read under the same exclusive lock; concurrent
            // checkouts of the same product serialize here instead of both
            // passing the stock check.
            let Some(product) = lock_for_update(Product::find_by_id(product_id), &txn)
                .one(&txn)
                .await?
            else {
                continue;
            };

            if product.stock_quantity < item.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of '{}' in stock",
                    product.stock_quantity, product.title
                )));
            }

            if product.price != item.price {
                return Err(ServiceError::PriceMismatch(format!(
                    "Price of '{}' changed since it was added",
                    product.title
                )));
            }

            total += item.price * Decimal::from(item.quantity);
            drafts.push((product, item.quantity, item.price));
        }

        if !amounts_match(total, request.amount) {
            return Err(ServiceError::AmountMismatch);
        }

        let address = ShippingAddress::find_by_id(request.shipping_address_id)
            .one(&txn)
            .await?;
        match address {
            Some(ref address) if address.user_id == user_id => {}
            _ => return Err(ServiceError::InvalidAddress),
        }

        // The order is inserted pending first so the payment row can
        // reference its id before anything commits.
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_price: Set(total),
            status: Set(OrderStatus::Pending),
            shipping_address_id: Set(request.shipping_address_id),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let payment = self
            .payments
            .create_payment(
                &txn,
                order.id,
                user_id,
                request.amount,
                request.gateway,
                request.simulate_success.unwrap_or(false),
            )
            .await?;

        if !payment.is_paid {
            // Discard the order, the payment attempt and the locks in one go.
            txn.rollback().await?;
            warn!("Payment declined for user {}, checkout aborted", user_id);
            return Err(ServiceError::PaymentFailed(
                "Payment was declined by the gateway".to_string(),
            ));
        }

        let order_id = order.id;
        let mut order_active: order::ActiveModel = order.into();
        order_active.status = Set(OrderStatus::Confirmed);
        order_active.update(&txn).await?;

        shipping_status::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(ShipmentState::Pending),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let mut decremented: Vec<(Uuid, i32)> = Vec::new();
        for (product, quantity, price) in drafts {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(product.id)),
                quantity: Set(quantity),
                price: Set(price),
            }
            .insert(&txn)
            .await?;

            let product_id = product.id;
            let remaining = product.stock_quantity - quantity;
            let mut product: product::ActiveModel = product.into();
            product.stock_quantity = Set(remaining);
            product.updated_at = Set(Utc::now());
            product.update(&txn).await?;

            decremented.push((product_id, quantity));
        }

        let cart_ids: Vec<Uuid> = cart_rows.iter().map(|item| item.id).collect();
        CartItem::delete_many()
            .filter(cart_item::Column::Id.is_in(cart_ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPlaced(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::PaymentCaptured {
                order_id,
                payment_id: payment.id,
            })
            .await;
        for (product_id, quantity) in decremented {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id,
                    quantity,
                })
                .await;
        }

        info!("Checkout complete: order {} for user {}", order_id, user_id);
        self.get_order(user_id, order_id).await
    }

    /// Cancels one of the caller's orders.
    ///
    /// Allowed only while the shipment is still pending; the order and its
    /// shipping status flip to cancelled in the same transaction.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let status_row = ShippingStatus::find()
            .filter(shipping_status::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?;

        let status_row = match status_row {
            Some(row) if row.status == ShipmentState::Pending => row,
            _ => {
                return Err(ServiceError::InvalidStatus(
                    "Only orders with pending shipping status can be cancelled".to_string(),
                ))
            }
        };

        let mut order_active: order::ActiveModel = order.into();
        order_active.status = Set(OrderStatus::Cancelled);
        order_active.update(&txn).await?;

        let mut status_active: shipping_status::ActiveModel = status_row.into();
        status_active.status = Set(ShipmentState::Cancelled);
        status_active.updated_at = Set(Utc::now());
        status_active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        info!("Cancelled order {} for user {}", order_id, user_id);
        self.get_order(user_id, order_id).await
    }

    /// Fetches one of the caller's orders with items, address and
    /// shipping status.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.assemble(order).await
    }

    /// Lists the caller's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            responses.push(self.assemble(order).await?);
        }
        Ok(responses)
    }

    /// Administrative listing of confirmed orders, optionally narrowed by
    /// shipping state or user.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        filter: AdminOrderFilter,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let mut query = Order::find().filter(order::Column::Status.eq(OrderStatus::Confirmed));

        if let Some(user_id) = filter.user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let rows = query
            .order_by_desc(order::Column::CreatedAt)
            .find_also_related(ShippingStatus)
            .all(&*self.db)
            .await?;

        let mut responses = Vec::new();
        for (order, status) in rows {
            if let Some(wanted) = filter.shipping_status {
                if status.as_ref().map(|s| s.status) != Some(wanted) {
                    continue;
                }
            }
            responses.push(self.assemble(order).await?);
        }
        Ok(responses)
    }

    async fn assemble(&self, order: order::Model) -> Result<OrderResponse, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let address = ShippingAddress::find_by_id(order.shipping_address_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Shipping address {} missing for order {}",
                    order.shipping_address_id, order.id
                ))
            })?;

        let shipping_status = ShippingStatus::find()
            .filter(shipping_status::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?
            .map(|row| row.status);

        let items = items
            .into_iter()
            .map(|(item, product)| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                product: product.map(|p| OrderedProductInfo {
                    title: p.title,
                    description: p.description,
                }),
            })
            .collect();

        Ok(OrderResponse {
            id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
            status: order.status,
            created_at: order.created_at,
            shipping_address: address,
            shipping_status,
            items,
        })
    }
}

/// Applies SELECT ... FOR UPDATE where the backend supports it. SQLite
/// serializes writers on a database-wide lock, so the clause is skipped.
fn lock_for_update<E: EntityTrait>(
    query: sea_orm::Select<E>,
    txn: &DatabaseTransaction,
) -> sea_orm::Select<E> {
    use sea_orm::ConnectionTrait;

    if txn.get_database_backend() == DatabaseBackend::Postgres {
        query.lock_exclusive()
    } else {
        query
    }
}

/// A settled payment may deviate from the cart total by at most one cent.
fn amounts_match(total: Decimal, paid: Decimal) -> bool {
    (total - paid).abs() <= dec!(0.01)
}

/// Input for checking out the current cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Amount the client intends to pay; must match the cart total
    pub amount: Decimal,
    pub shipping_address_id: Uuid,
    #[serde(default = "default_gateway")]
    pub gateway: PaymentGateway,
    /// Settlement outcome for the mock gateway
    pub simulate_success: Option<bool>,
}

fn default_gateway() -> PaymentGateway {
    PaymentGateway::Mock
}

/// Administrative order listing filter
#[derive(Debug, Default, Clone, Copy, Deserialize, utoipa::IntoParams)]
pub struct AdminOrderFilter {
    pub shipping_status: Option<ShipmentState>,
    pub user_id: Option<Uuid>,
}

/// Product details carried on an order line
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderedProductInfo {
    pub title: String,
    pub description: Option<String>,
}

/// One purchased line of an order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub price: Decimal,
    pub product: Option<OrderedProductInfo>,
}

/// Order with its items, address and shipping status eagerly loaded
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub shipping_address: shipping_address::Model,
    pub shipping_status: Option<ShipmentState>,
    pub items: Vec<OrderItemResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_match_within_one_cent() {
        assert!(amounts_match(dec!(20.00), dec!(20.00)));
        assert!(amounts_match(dec!(20.00), dec!(20.01)));
        assert!(amounts_match(dec!(20.00), dec!(19.99)));
        assert!(!amounts_match(dec!(20.00), dec!(20.02)));
        assert!(!amounts_match(dec!(20.00), dec!(19.98)));
    }

    #[test]
    fn checkout_request_defaults_to_mock_gateway() {
        let json = r#"{
            "amount": "20.00",
            "shipping_address_id": "550e8400-e29b-41d4-a716-446655440000"
        }"#;

        let request: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.gateway, PaymentGateway::Mock);
        assert!(request.simulate_success.is_none());
    }

    #[test]
    fn checkout_request_rejects_unknown_gateway() {
        let json = r#"{
            "amount": "20.00",
            "shipping_address_id": "550e8400-e29b-41d4-a716-446655440000",
            "gateway": "stripe"
        }"#;

        assert!(serde_json::from_str::<CheckoutRequest>(json).is_err());
    }
}
