use crate::{
    entities::{
        shipping_address, shipping_status, ShipmentState, ShippingAddress, ShippingAddressModel,
        ShippingStatus, ShippingStatusModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Shipping address book and shipment lifecycle service.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a shipping address for the caller.
    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        user_id: Uuid,
        input: CreateAddressRequest,
    ) -> Result<ShippingAddressModel, ServiceError> {
        let address = shipping_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(input.name),
            address_line1: Set(input.address_line1),
            address_line2: Set(input.address_line2),
            city: Set(input.city),
            state: Set(input.state),
            pin_code: Set(input.pin_code),
            country: Set(input.country),
        }
        .insert(&*self.db)
        .await?;

        info!("Created shipping address {} for user {}", address.id, user_id);
        Ok(address)
    }

    /// Lists the caller's addresses.
    pub async fn list_addresses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ShippingAddressModel>, ServiceError> {
        Ok(ShippingAddress::find()
            .filter(shipping_address::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?)
    }

    /// Fetches one of the caller's addresses.
    pub async fn get_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<ShippingAddressModel, ServiceError> {
        self.find_owned_address(user_id, address_id).await
    }

    /// Applies a partial update to one of the caller's addresses.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: UpdateAddressRequest,
    ) -> Result<ShippingAddressModel, ServiceError> {
        let address = self.find_owned_address(user_id, address_id).await?;

        let mut active: shipping_address::ActiveModel = address.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(line1) = input.address_line1 {
            active.address_line1 = Set(line1);
        }
        if let Some(line2) = input.address_line2 {
            active.address_line2 = Set(Some(line2));
        }
        if let Some(city) = input.city {
            active.city = Set(city);
        }
        if let Some(state) = input.state {
            active.state = Set(state);
        }
        if let Some(pin_code) = input.pin_code {
            active.pin_code = Set(pin_code);
        }
        if let Some(country) = input.country {
            active.country = Set(country);
        }

        Ok(active.update(&*self.db).await?)
    }

    /// Deletes one of the caller's addresses.
    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let address = self.find_owned_address(user_id, address_id).await?;
        address.delete(&*self.db).await?;

        info!("Deleted shipping address {} for user {}", address_id, user_id);
        Ok(())
    }

    /// Administrative shipment transition. The transition itself is
    /// unconditional; cancellation rules live on the order service.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: ShipmentState,
    ) -> Result<ShippingStatusModel, ServiceError> {
        let row = ShippingStatus::find()
            .filter(shipping_status::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipping status for order {} not found", order_id))
            })?;

        let old_status = row.status;
        let mut active: shipping_status::ActiveModel = row.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ShippingStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status).to_lowercase(),
                new_status: format!("{:?}", new_status).to_lowercase(),
            })
            .await;

        info!(
            "Shipping status for order {} moved {:?} -> {:?}",
            order_id, old_status, new_status
        );
        Ok(updated)
    }

    async fn find_owned_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<ShippingAddressModel, ServiceError> {
        ShippingAddress::find_by_id(address_id)
            .filter(shipping_address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))
    }
}

/// Input for creating a shipping address
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub pin_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
}

/// Partial update for a shipping address
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    pub name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pin_code: Option<String>,
    pub country: Option<String>,
}

/// Input for the administrative shipment transition
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: ShipmentState,
}
