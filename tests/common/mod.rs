#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use openbazar_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{
        product::{self, ProductCategory},
        profile, user, vendor, ProductModel, UserModel, VendorModel,
    },
    errors::ServiceError,
    events::{self, EventSender},
    gateways::{GatewayVerification, PaymentGateway},
    handlers::AppServices,
    services::vendors::RegisterVendorInput,
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_jwt_secret_that_is_definitely_longer_than_sixty_four_characters";

/// Gateway stand-in with a canned verification outcome, so payment flows can
/// be exercised without talking to eSewa or Khalti.
#[derive(Debug, Clone)]
pub struct FakeGateway {
    verified: bool,
    amount: Option<Decimal>,
}

impl FakeGateway {
    pub fn approving() -> Self {
        Self {
            verified: true,
            amount: None,
        }
    }

    pub fn approving_with_amount(amount: Decimal) -> Self {
        Self {
            verified: true,
            amount: Some(amount),
        }
    }

    pub fn declining() -> Self {
        Self {
            verified: false,
            amount: None,
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn verify(
        &self,
        reference: &str,
        _amount: Decimal,
    ) -> Result<GatewayVerification, ServiceError> {
        Ok(GatewayVerification {
            verified: self.verified,
            amount: self.amount,
            reference: reference.to_string(),
        })
    }
}

/// Helper harness that spins up the full application against a throwaway
/// SQLite database, with fake payment gateways wired in.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    auth_service: Arc<AuthService>,
    db_path: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Test application whose gateways approve every verification.
    pub async fn new() -> Self {
        Self::with_gateways(
            Arc::new(FakeGateway::approving()),
            Arc::new(FakeGateway::approving()),
        )
        .await
    }

    /// Test application with caller-supplied gateway behavior.
    pub async fn with_gateways(
        esewa: Arc<dyn PaymentGateway>,
        khalti: Arc<dyn PaymentGateway>,
    ) -> Self {
        let db_path = std::env::temp_dir().join(format!("openbazar_test_{}.db", Uuid::new_v4()));

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));

        let services = AppServices::with_gateways(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            auth_service.clone(),
            esewa,
            khalti,
        );

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        });

        let auth_service_for_layer = auth_service.clone();
        let api_router = openbazar_api::api_v1_routes().layer(middleware::from_fn_with_state(
            auth_service_for_layer,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: Request<Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ));

        let router = Router::new()
            .nest("/api/v1", api_router)
            .with_state(state.clone());

        Self {
            router,
            state,
            auth_service,
            db_path,
            _event_task: event_task,
        }
    }

    pub fn auth_service(&self) -> Arc<AuthService> {
        self.auth_service.clone()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Insert a user row directly, with a matching profile, and mint a token.
    pub async fn seed_user(&self, email: &str, is_staff: bool) -> (UserModel, String) {
        let user_row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(self.auth_service.hash_password("password123")),
            first_name: Set("Test".to_string()),
            last_name: Set("User".to_string()),
            is_staff: Set(is_staff),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
        };
        let user = user_row
            .insert(&*self.state.db)
            .await
            .expect("insert test user");

        let profile_row = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            phone: Set(Some("9800000000".to_string())),
            address: Set(Some("Kathmandu".to_string())),
            is_vendor: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        profile_row
            .insert(&*self.state.db)
            .await
            .expect("insert test profile");

        let token = self
            .auth_service
            .generate_token(&user)
            .expect("issue test token")
            .access_token;
        (user, token)
    }

    pub async fn seed_buyer(&self) -> (UserModel, String) {
        let email = format!("buyer-{}@example.com", Uuid::new_v4());
        self.seed_user(&email, false).await
    }

    pub async fn seed_staff(&self) -> (UserModel, String) {
        let email = format!("staff-{}@example.com", Uuid::new_v4());
        self.seed_user(&email, true).await
    }

    /// Register a vendor for the user, optionally flipping approval directly.
    pub async fn seed_vendor(&self, user_id: Uuid, approved: bool) -> VendorModel {
        let vendor = self
            .state
            .services
            .vendors
            .register_vendor(
                user_id,
                RegisterVendorInput {
                    bank_details: "NIC Asia 0123456789".to_string(),
                    nid_number: "12-34-56-78901".to_string(),
                },
            )
            .await
            .expect("register test vendor");

        if approved {
            let mut active: vendor::ActiveModel = vendor.into();
            active.is_approved = Set(true);
            active
                .update(&*self.state.db)
                .await
                .expect("approve test vendor")
        } else {
            vendor
        }
    }

    /// Approved product backed by a fresh approved vendor, for flows that
    /// reach checkout confirmation.
    pub async fn seed_sellable_product(&self, name: &str, price: Decimal) -> ProductModel {
        let (user, _) = self.seed_buyer().await;
        let vendor = self.seed_vendor(user.id, true).await;
        self.seed_product(Some(vendor.id), name, price, true).await
    }

    /// Insert a catalog product directly.
    pub async fn seed_product(
        &self,
        vendor_id: Option<Uuid>,
        name: &str,
        price: Decimal,
        approved: bool,
    ) -> ProductModel {
        let row = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            category: Set(ProductCategory::FoodsBakery),
            price: Set(price),
            vendor_id: Set(vendor_id),
            description: Set(Some("Seeded for tests".to_string())),
            image_url: Set(None),
            is_approved: Set(approved),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        row.insert(&*self.state.db)
            .await
            .expect("insert test product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_path);
        for ext in ["-wal", "-shm"] {
            let mut sidecar = self.db_path.clone();
            sidecar.set_extension(format!("db{ext}"));
            let _ = std::fs::remove_file(sidecar);
        }
    }
}
