/// Database entities. Plain value records keyed by id; relations are
/// explicit foreign-key columns resolved through lookups or joins.
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod product_category;
pub mod shipping_address;
pub mod shipping_status;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Entity as Payment, Model as PaymentModel, PaymentGateway, PaymentStatus};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_category::Entity as ProductCategory;
pub use shipping_address::{Entity as ShippingAddress, Model as ShippingAddressModel};
pub use shipping_status::{Entity as ShippingStatus, Model as ShippingStatusModel, ShipmentState};
