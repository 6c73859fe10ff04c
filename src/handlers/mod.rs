pub mod accounts;
pub mod admin;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod payments;
pub mod products;
pub mod vendors;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::gateways::{EsewaGateway, KhaltiGateway, PaymentGateway};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<crate::services::AccountService>,
    pub catalog: Arc<crate::services::CatalogService>,
    pub cart: Arc<crate::services::CartService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub orders: Arc<crate::services::OrderService>,
    pub vendors: Arc<crate::services::VendorService>,
    pub admin: Arc<crate::services::AdminService>,
}

impl AppServices {
    /// Build the service container with gateway clients taken from config.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<crate::auth::AuthService>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let esewa: Arc<dyn PaymentGateway> = Arc::new(EsewaGateway::from_config(config)?);
        let khalti: Arc<dyn PaymentGateway> = Arc::new(KhaltiGateway::from_config(config)?);
        Ok(Self::with_gateways(
            db_pool,
            event_sender,
            auth_service,
            esewa,
            khalti,
        ))
    }

    /// Build the service container with explicit gateway implementations.
    /// Tests use this to substitute fakes for the real verify clients.
    pub fn with_gateways(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<crate::auth::AuthService>,
        esewa: Arc<dyn PaymentGateway>,
        khalti: Arc<dyn PaymentGateway>,
    ) -> Self {
        let accounts = Arc::new(crate::services::AccountService::new(
            db_pool.clone(),
            event_sender.clone(),
            auth_service,
        ));
        let catalog = Arc::new(crate::services::CatalogService::new(db_pool.clone()));
        let cart = Arc::new(crate::services::CartService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            db_pool.clone(),
            event_sender.clone(),
            esewa,
            khalti,
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let vendors = Arc::new(crate::services::VendorService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let admin = Arc::new(crate::services::AdminService::new(db_pool, event_sender));

        Self {
            accounts,
            catalog,
            cart,
            checkout,
            orders,
            vendors,
            admin,
        }
    }
}
