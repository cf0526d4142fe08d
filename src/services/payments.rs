use crate::{
    entities::{payment, Payment, PaymentGateway, PaymentModel, PaymentStatus},
    errors::ServiceError,
    events::EventSender,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Payment gateway adapter and settlement record store.
///
/// Gateways form a closed set; each tag has its own handler and an
/// unimplemented tag fails fast instead of settling with undefined state.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    #[allow(dead_code)]
    event_sender: Arc<EventSender>,
}

/// Settlement outcome returned by a gateway.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub status: PaymentStatus,
    pub is_paid: bool,
    pub pg_order_id: String,
    pub pg_payment_id: String,
    pub pg_signature: String,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Dispatches a charge to the selected gateway.
    ///
    /// The mock gateway settles deterministically from `simulate_success`.
    /// Razorpay is not integrated yet and fails with UnsupportedGateway
    /// before any state is touched.
    pub async fn charge(
        &self,
        gateway: PaymentGateway,
        amount: Decimal,
        order_id: Uuid,
        user_id: Uuid,
        simulate_success: bool,
    ) -> Result<GatewayCharge, ServiceError> {
        info!(
            "Charging {} via {:?} for order {} (user {})",
            amount, gateway, order_id, user_id
        );

        match gateway {
            PaymentGateway::Mock => Ok(mock_charge(simulate_success)),
            PaymentGateway::Razorpay => Err(ServiceError::UnsupportedGateway(
                "razorpay integration is not available".to_string(),
            )),
        }
    }

    /// Charges the gateway and records the settlement on the caller's
    /// connection, so a surrounding transaction owns the payment row.
    pub async fn create_payment<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        gateway: PaymentGateway,
        simulate_success: bool,
    ) -> Result<PaymentModel, ServiceError> {
        let charge = self
            .charge(gateway, amount, order_id, user_id, simulate_success)
            .await?;

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            user_id: Set(user_id),
            amount: Set(amount),
            status: Set(charge.status),
            gateway: Set(gateway),
            is_paid: Set(charge.is_paid),
            pg_order_id: Set(Some(charge.pg_order_id)),
            pg_payment_id: Set(Some(charge.pg_payment_id)),
            pg_signature: Set(Some(charge.pg_signature)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(payment)
    }

    /// Fetches the payment for one of the caller's orders.
    #[instrument(skip(self))]
    pub async fn get_payment_for_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<PaymentModel, ServiceError> {
        Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment for order {} not found", order_id))
            })
    }

    /// Lists all of the caller's payments, newest first.
    #[instrument(skip(self))]
    pub async fn list_payments(&self, user_id: Uuid) -> Result<Vec<PaymentModel>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::UserId.eq(user_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

fn mock_charge(simulate_success: bool) -> GatewayCharge {
    let status = if simulate_success {
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    };
    let (pg_order_id, pg_payment_id, pg_signature) = mock_reference_ids();

    GatewayCharge {
        status,
        is_paid: status == PaymentStatus::Success,
        pg_order_id,
        pg_payment_id,
        pg_signature,
    }
}

/// Fabricates the three opaque gateway identifiers as an ordered triple.
fn mock_reference_ids() -> (String, String, String) {
    let token = || Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    (
        format!("MOCK-OD-{}", token()),
        format!("MOCK-PY-{}", token()),
        format!("MOCK-SI-{}", token()),
    )
}
