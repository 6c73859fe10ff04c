/// Marketplace entities module
pub mod activity_log;
pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod profile;
pub mod user;
pub mod vendor;

// Re-export entities
pub use activity_log::{Entity as ActivityLog, Model as ActivityLogModel};
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Entity as Payment, Model as PaymentModel, PaymentStatus};
pub use product::{Entity as Product, Model as ProductModel, ProductCategory};
pub use profile::{Entity as Profile, Model as ProfileModel};
pub use user::{Entity as User, Model as UserModel};
pub use vendor::{Entity as Vendor, Model as VendorModel};
