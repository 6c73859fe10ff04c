/// Marketplace services
pub mod accounts;
pub mod admin;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod vendors;

pub use accounts::AccountService;
pub use admin::AdminService;
pub use carts::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use orders::OrderService;
pub use vendors::VendorService;
