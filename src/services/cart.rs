use crate::{
    entities::{cart_item, product, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Shopping cart service.
///
/// Maintains one pending purchase line per (user, product) pair. Lines
/// snapshot the product price at the time they are added or adjusted;
/// checkout later verifies the snapshot against the live price.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the user's cart, or increments the existing line.
    ///
    /// The requested quantity must not exceed the product's current stock.
    /// When the line already exists its quantity is incremented and its
    /// price snapshot refreshed to the product's current price.
    ///
    /// # Returns
    ///
    /// * `Ok(CartItemResponse)` - The stored line with its computed total
    /// * `Err(ServiceError::NotFound)` - Product does not exist
    /// * `Err(ServiceError::InsufficientStock)` - Requested more than is in stock
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartRequest,
    ) -> Result<CartItemResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if product.stock_quantity < input.quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of '{}' in stock",
                product.stock_quantity, product.title
            )));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let item = if let Some(item) = existing {
            let quantity = item.quantity + input.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.price = Set(product.price);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(Some(input.product_id)),
                quantity: Set(input.quantity),
                price: Set(product.price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added product {} x{} to cart of user {}",
            input.product_id, input.quantity, user_id
        );
        Ok(line_response(&item, &product))
    }

    /// Adjusts the quantity of a cart line by a signed delta.
    ///
    /// Behaviour by current state:
    /// - No line, negative delta: NotFound.
    /// - No line, positive delta: requires at least one unit in stock and
    ///   seeds a quantity-1 line; only presence of stock is checked, the
    ///   delta magnitude is not applied to a fresh line.
    /// - Line exists and `quantity + delta <= 0`: the line is deleted and
    ///   a removal acknowledgment is returned.
    /// - Line exists otherwise: the new quantity must not exceed stock;
    ///   the quantity is stored and the price snapshot refreshed.
    #[instrument(skip(self))]
    pub async fn adjust_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        delta: i32,
    ) -> Result<CartAdjustment, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::ValidationError(
                "delta must be non-zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let item = match existing {
            None => {
                if delta < 0 {
                    return Err(ServiceError::NotFound(format!(
                        "Product {} is not in your cart",
                        product_id
                    )));
                }
                if product.stock_quantity < 1 {
                    return Err(ServiceError::InsufficientStock(format!(
                        "'{}' is out of stock",
                        product.title
                    )));
                }

                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(Some(product_id)),
                    quantity: Set(1),
                    price: Set(product.price),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?
            }
            Some(item) => {
                let new_quantity = item.quantity + delta;

                if new_quantity <= 0 {
                    item.delete(&txn).await?;
                    txn.commit().await?;

                    self.event_sender
                        .send_or_log(Event::CartItemRemoved {
                            user_id,
                            product_id: Some(product_id),
                        })
                        .await;

                    info!(
                        "Removed product {} from cart of user {}",
                        product_id, user_id
                    );
                    return Ok(CartAdjustment::Removed { product_id });
                }

                if new_quantity > product.stock_quantity {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Only {} of '{}' in stock",
                        product.stock_quantity, product.title
                    )));
                }

                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(new_quantity);
                item.price = Set(product.price);
                item.updated_at = Set(Utc::now());
                item.update(&txn).await?
            }
        };

        txn.commit().await?;

        Ok(CartAdjustment::Updated {
            item: line_response(&item, &product),
        })
    }

    /// Returns the user's cart with per-line and aggregate totals.
    ///
    /// Lines whose product has been deleted are skipped. Totals cover
    /// every surviving line.
    #[instrument(skip(self))]
    pub async fn list_cart(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(summarize(rows))
    }

    /// Deletes a cart line by its id. The line must belong to the caller.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let product_id = item.product_id;
        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;

        info!("Deleted cart item {} for user {}", item_id, user_id);
        Ok(())
    }
}

fn line_response(item: &cart_item::Model, product: &product::Model) -> CartItemResponse {
    CartItemResponse {
        id: item.id,
        product_id: product.id,
        product_title: product.title.clone(),
        quantity: item.quantity,
        price: item.price,
        line_total: (item.price * Decimal::from(item.quantity)).round_dp(2),
    }
}

fn summarize(rows: Vec<(cart_item::Model, Option<product::Model>)>) -> CartSummary {
    let mut items = Vec::new();
    let mut total_quantity = 0;
    let mut total_price = Decimal::ZERO;

    for (item, product) in rows {
        let Some(product) = product else {
            // Product was deleted since the line was added; the line is
            // invisible until it is explicitly removed or checkout skips it.
            continue;
        };

        let line_total = item.price * Decimal::from(item.quantity);
        total_quantity += item.quantity;
        total_price += line_total;

        items.push(CartItemResponse {
            id: item.id,
            product_id: product.id,
            product_title: product.title,
            quantity: item.quantity,
            price: item.price,
            line_total: line_total.round_dp(2),
        });
    }

    CartSummary {
        items,
        total_quantity,
        total_price,
    }
}

/// Input for adding a product to the cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Input for adjusting a cart line quantity
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustQuantityRequest {
    /// Signed change, typically +1 or -1
    pub delta: i32,
}

/// One cart line joined with its product
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

/// Full cart with aggregate totals
#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartItemResponse>,
    pub total_quantity: i32,
    pub total_price: Decimal,
}

/// Outcome of a quantity adjustment
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CartAdjustment {
    Updated { item: CartItemResponse },
    Removed { product_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_product(price: Decimal, stock: i32) -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            title: "Widget".to_string(),
            description: None,
            slug: "widget".to_string(),
            price,
            stock_quantity: stock,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_line(product: &product::Model, quantity: i32, price: Decimal) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: Some(product.id),
            quantity,
            price,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn line_total_is_rounded_to_cents() {
        let product = sample_product(dec!(19.99), 10);
        let item = sample_line(&product, 3, dec!(19.99));

        let response = line_response(&item, &product);
        assert_eq!(response.line_total, dec!(59.97));
    }

    #[test]
    fn summary_covers_every_line() {
        let product_a = sample_product(dec!(10.00), 10);
        let product_b = sample_product(dec!(2.50), 10);

        let rows = vec![
            (
                sample_line(&product_a, 2, dec!(10.00)),
                Some(product_a.clone()),
            ),
            (
                sample_line(&product_b, 4, dec!(2.50)),
                Some(product_b.clone()),
            ),
        ];

        let summary = summarize(rows);
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.total_quantity, 6);
        assert_eq!(summary.total_price, dec!(30.00));
    }

    #[test]
    fn summary_skips_lines_with_deleted_products() {
        let product = sample_product(dec!(5.00), 10);
        let orphan = cart_item::Model {
            product_id: None,
            ..sample_line(&product, 7, dec!(5.00))
        };

        let rows = vec![
            (sample_line(&product, 1, dec!(5.00)), Some(product.clone())),
            (orphan, None),
        ];

        let summary = summarize(rows);
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.total_quantity, 1);
        assert_eq!(summary.total_price, dec!(5.00));
    }

    #[test]
    fn empty_cart_summary_is_zeroed() {
        let summary = summarize(Vec::new());
        assert!(summary.items.is_empty());
        assert_eq!(summary.total_quantity, 0);
        assert_eq!(summary.total_price, Decimal::ZERO);
    }

    #[test]
    fn cart_adjustment_serialization_is_tagged() {
        let removed = CartAdjustment::Removed {
            product_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&removed).unwrap();
        assert_eq!(value["result"], "removed");
    }
}
