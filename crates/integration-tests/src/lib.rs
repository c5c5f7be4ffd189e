//! End-to-end tests for Oja.
//!
//! Each test starts a [`StubBackend`] and the storefront or admin router on
//! ephemeral ports, then drives them with a cookie-keeping HTTP client the
//! way a browser would.
//!
//! ```bash
//! cargo test -p oja-integration-tests
//! ```

pub mod backend;

use std::io;
use std::net::SocketAddr;

use oja_admin::config::{AdminConfig, DEFAULT_IMAGE_BUCKET};
use oja_core::checkout::PricingPolicy;
use oja_storefront::config::StorefrontConfig;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

pub use backend::StubBackend;

/// A served app and a client that keeps its cookies.
#[derive(Debug, Clone)]
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Another browser against the same server, with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new_browser(&self) -> io::Result<Self> {
        Ok(Self {
            base_url: self.base_url.clone(),
            client: browser()?,
        })
    }
}

fn browser() -> io::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .map_err(io::Error::other)
}

fn session_secret() -> SecretString {
    SecretString::from(format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    ))
}

async fn bind() -> io::Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    Ok((listener, base_url))
}

/// Serve the storefront against `backend`. Card payments are approved
/// without a gateway.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the state cannot be built.
pub async fn spawn_storefront(backend: &StubBackend) -> io::Result<TestServer> {
    let (listener, base_url) = bind().await?;
    let addr = listener.local_addr()?;

    let state = oja_storefront::state::AppState::new(StorefrontConfig {
        host: addr.ip(),
        port: addr.port(),
        base_url: base_url.clone(),
        session_secret: session_secret(),
        backend: backend.config("anon-test-key"),
        paystack: None,
        pricing: PricingPolicy::default(),
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
    })
    .map_err(io::Error::other)?;

    let app = oja_storefront::app(state);
    tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!("Storefront stopped: {e}");
        }
    });

    Ok(TestServer {
        base_url,
        client: browser()?,
    })
}

/// Serve the admin panel against `backend`.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the state cannot be built.
pub async fn spawn_admin(backend: &StubBackend) -> io::Result<TestServer> {
    let (listener, base_url) = bind().await?;
    let addr = listener.local_addr()?;

    let state = oja_admin::state::AppState::new(AdminConfig {
        host: addr.ip(),
        port: addr.port(),
        base_url: base_url.clone(),
        session_secret: session_secret(),
        auth_backend: backend.config("anon-test-key"),
        backend: backend.config("service-role-test-key"),
        image_bucket: DEFAULT_IMAGE_BUCKET.to_string(),
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    })
    .map_err(io::Error::other)?;

    let app = oja_admin::app(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Admin stopped: {e}");
        }
    });

    Ok(TestServer {
        base_url,
        client: browser()?,
    })
}

// =============================================================================
// Fixtures
// =============================================================================

/// Seed an active product and return its id.
pub fn seed_product(backend: &StubBackend, title: &str, price: &str, stock: i32) -> String {
    let row = backend.seed(
        "products",
        json!({
            "title": title,
            "description": format!("{title} from the test catalog"),
            "price": price,
            "currency": "NGN",
            "sku": format!("SKU-{}", Uuid::new_v4().simple()),
            "stock_quantity": stock,
            "images": [],
            "tags": [],
            "status": "active",
        }),
    );
    id_of(&row)
}

/// Seed a variant of `product_id`.
pub fn seed_variant(
    backend: &StubBackend,
    product_id: &str,
    variant_type: &str,
    value: &str,
    stock: i32,
) -> String {
    let row = backend.seed(
        "product_variants",
        json!({
            "product_id": product_id,
            "type": variant_type,
            "value": value,
            "stock_quantity": stock,
            "sku": format!("{variant_type}-{value}"),
        }),
    );
    id_of(&row)
}

/// Seed a card-paid order for `product_id` in `status` and return its id.
pub fn seed_order(backend: &StubBackend, product_id: &str, status: &str) -> String {
    let order = backend.seed(
        "orders",
        json!({
            "order_number": format!("ORD-{}", chrono::Utc::now().timestamp_millis()),
            "status": status,
            "payment_status": "completed",
            "subtotal": "15000",
            "tax_amount": "1125",
            "shipping_fee": "2500",
            "discount_amount": "0",
            "total_amount": "18625",
            "currency": "NGN",
            "customer_email": "bisi@example.com",
            "customer_phone": "+2348090000000",
            "delivery_address": {
                "street": "4 Awolowo Road",
                "city": "Ikoyi",
                "state": "Lagos",
                "postal_code": "101233",
                "country": "Nigeria",
            },
            "contact_info": {
                "first_name": "Bisi",
                "last_name": "Adeyemi",
                "email": "bisi@example.com",
                "phone": "+2348090000000",
            },
            "payment_method": "paystack",
            "payment_reference": "ref_test",
        }),
    );
    let order_id = id_of(&order);
    backend.seed(
        "order_items",
        json!({
            "order_id": order_id,
            "product_id": product_id,
            "product_title": "Adire Silk Scarf",
            "quantity": 1,
            "unit_price": "15000",
        }),
    );
    order_id
}

/// Register an account with a profile carrying `role` and return its user id.
pub fn seed_account(
    backend: &StubBackend,
    email: &str,
    password: &str,
    first_name: &str,
    role: &str,
) -> Uuid {
    let user_id = backend.add_account(email, password);
    backend.seed(
        "profiles",
        json!({
            "user_id": user_id,
            "first_name": first_name,
            "last_name": "Tester",
            "phone": "+2348012345678",
            "role": role,
        }),
    );
    user_id
}

/// The `id` column of a row as a string.
#[must_use]
pub fn id_of(row: &Value) -> String {
    row.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
