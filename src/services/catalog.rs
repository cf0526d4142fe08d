use crate::{
    entities::{
        cart_item, category, order_item, product, product_category, CartItem, Category,
        CategoryModel, OrderItem, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Product catalog service: product and category record management.
///
/// Stock is only ever decremented by a committed checkout; this service
/// sets absolute quantities when products are created or restocked.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product, optionally linked to existing categories.
    ///
    /// # Returns
    ///
    /// * `Ok(ProductModel)` - The created product
    /// * `Err(ServiceError::Conflict)` - Slug already taken
    /// * `Err(ServiceError::NotFound)` - A referenced category does not exist
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_product(
        &self,
        input: CreateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        let txn = self.db.begin().await?;

        let slug_taken = Product::find()
            .filter(product::Column::Slug.eq(input.slug.clone()))
            .one(&txn)
            .await?
            .is_some();
        if slug_taken {
            return Err(ServiceError::Conflict(format!(
                "Slug '{}' is already in use",
                input.slug
            )));
        }

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            description: Set(input.description),
            slug: Set(input.slug),
            price: Set(input.price),
            stock_quantity: Set(input.stock_quantity),
            image_url: Set(input.image_url),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        self.link_categories(&txn, product.id, &input.category_ids)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product {} ('{}')", product.id, product.slug);
        Ok(product)
    }

    /// Applies a partial update to a product.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(ref slug) = input.slug {
            let taken = Product::find()
                .filter(product::Column::Slug.eq(slug.clone()))
                .filter(product::Column::Id.ne(product_id))
                .one(&txn)
                .await?
                .is_some();
            if taken {
                return Err(ServiceError::Conflict(format!(
                    "Slug '{}' is already in use",
                    slug
                )));
            }
        }

        if let Some(stock) = input.stock_quantity {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock quantity cannot be negative".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = product.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(slug) = input.slug {
            active.slug = Set(slug);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock_quantity {
            active.stock_quantity = Set(stock);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(Utc::now());
        let product = active.update(&txn).await?;

        if let Some(category_ids) = input.category_ids {
            product_category::Entity::delete_many()
                .filter(product_category::Column::ProductId.eq(product_id))
                .exec(&txn)
                .await?;
            self.link_categories(&txn, product_id, &category_ids).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(product)
    }

    /// Deletes a product. Cart and order lines referencing it are
    /// detached (their product reference is nulled), never deleted.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        CartItem::update_many()
            .col_expr(cart_item::Column::ProductId, Expr::value(Option::<Uuid>::None))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        OrderItem::update_many()
            .col_expr(
                order_item::Column::ProductId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(order_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        product.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Deleted product {}", product_id);
        Ok(())
    }

    /// Fetches a product with its categories.
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let categories = product.find_related(Category).all(&*self.db).await?;

        Ok(ProductDetail {
            product,
            categories,
        })
    }

    /// Lists products, newest first, with the total count for pagination.
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let paginator = Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Creates a category; the name must be unique.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        let taken = Category::find()
            .filter(category::Column::Name.eq(name.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }

        Ok(category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
        }
        .insert(&*self.db)
        .await?)
    }

    /// Lists all categories.
    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    async fn link_categories<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        for category_id in category_ids {
            Category::find_by_id(*category_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Category {} not found", category_id))
                })?;

            product_category::ActiveModel {
                product_id: Set(product_id),
                category_id: Set(*category_id),
            }
            .insert(conn)
            .await?;
        }
        Ok(())
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Partial update for a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
}

/// Input for creating a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Product with its categories
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    #[schema(value_type = Object)]
    pub product: ProductModel,
    #[schema(value_type = Vec<Object>)]
    pub categories: Vec<CategoryModel>,
}
