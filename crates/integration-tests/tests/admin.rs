//! Admin flows: sign-in, product creation and order handling.
//!
//! Run with: cargo test -p oja-integration-tests

use oja_integration_tests::{
    StubBackend, TestServer, seed_account, seed_order, seed_product, spawn_admin,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

const ADMIN_EMAIL: &str = "ngozi@oja.test";
const ADMIN_PASSWORD: &str = "correct-horse-battery";

async fn setup() -> (StubBackend, TestServer) {
    let backend = StubBackend::start().await.expect("start stub backend");
    seed_account(&backend, ADMIN_EMAIL, ADMIN_PASSWORD, "Ngozi", "admin");
    let admin = spawn_admin(&backend).await.expect("start admin");
    (backend, admin)
}

/// Submit the login form and return the page it lands on.
async fn login(admin: &TestServer, email: &str, password: &str) -> reqwest::Response {
    admin
        .client
        .post(admin.url("/auth/login"))
        .form(&[("email", email), ("password", password)])
        .send()
        .await
        .expect("login request")
}

async fn signed_in() -> (StubBackend, TestServer) {
    let (backend, admin) = setup().await;
    let resp = login(&admin, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(resp.url().path(), "/", "admin login should land on the dashboard");
    (backend, admin)
}

#[tokio::test]
async fn test_pages_require_login() {
    let (_backend, admin) = setup().await;

    for path in ["/", "/products", "/orders"] {
        let resp = admin
            .client
            .get(admin.url(path))
            .send()
            .await
            .expect("GET request");
        assert_eq!(resp.url().path(), "/auth/login", "{path} should redirect");
    }
}

#[tokio::test]
async fn test_wrong_password_is_refused() {
    let (_backend, admin) = setup().await;

    let resp = login(&admin, ADMIN_EMAIL, "not-the-password").await;
    assert_eq!(resp.url().query(), Some("error=credentials"));
    let body = resp.text().await.expect("read body");
    assert!(body.contains("Invalid email or password."));
}

#[tokio::test]
async fn test_customer_account_is_refused() {
    let (backend, admin) = setup().await;
    seed_account(&backend, "tunde@example.com", "shopper-password", "Tunde", "customer");

    let resp = login(&admin, "tunde@example.com", "shopper-password").await;
    assert_eq!(resp.url().path(), "/auth/login");
    assert_eq!(resp.url().query(), Some("error=forbidden"));

    // No session was kept
    let resp = admin
        .client
        .get(admin.url("/"))
        .send()
        .await
        .expect("GET dashboard");
    assert_eq!(resp.url().path(), "/auth/login");
}

#[tokio::test]
async fn test_dashboard_shows_counts_and_logout_ends_session() {
    let (backend, admin) = signed_in().await;
    let product_id = seed_product(&backend, "Adire Silk Scarf", "15000", 5);
    seed_order(&backend, &product_id, "pending");

    let resp = admin
        .client
        .get(admin.url("/"))
        .send()
        .await
        .expect("GET dashboard");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("read body");
    assert!(body.contains("Ngozi Tester"));
    assert!(body.contains("bisi@example.com"));

    let resp = admin
        .client
        .post(admin.url("/auth/logout"))
        .send()
        .await
        .expect("logout");
    assert_eq!(resp.url().path(), "/auth/login");

    let resp = admin
        .client
        .get(admin.url("/products"))
        .send()
        .await
        .expect("GET products");
    assert_eq!(resp.url().path(), "/auth/login");
}

#[tokio::test]
async fn test_create_product_with_image_and_variants() {
    let (backend, admin) = signed_in().await;

    let image = Part::bytes(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
        .file_name("scarf front.png")
        .mime_str("image/png")
        .expect("image part");
    let form = Form::new()
        .text("title", "Indigo Adire Wrap")
        .text("description", "Hand-dyed in Abeokuta")
        .text("price", "22000")
        .text("discount_price", "")
        .text("stock_quantity", "")
        .text("status", "active")
        .text("sku", "")
        .text("currency", "NGN")
        .text("category_id", "")
        .text("tags", "adire, wrap")
        .text("variants", "size:M:4\nsize:L:6:1500")
        .part("image", image);

    let resp = admin
        .client
        .post(admin.url("/products"))
        .multipart(form)
        .send()
        .await
        .expect("create product");
    assert_eq!(resp.url().path(), "/products");
    assert_eq!(resp.url().query(), Some("success=created"));
    let body = resp.text().await.expect("read body");
    assert!(body.contains("Product created."));
    assert!(body.contains("Indigo Adire Wrap"));

    let products = backend.rows("products");
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product["stock_quantity"], 100);
    assert_eq!(product["tags"], serde_json::json!(["adire", "wrap"]));
    assert!(
        product["sku"]
            .as_str()
            .is_some_and(|sku| sku.starts_with("SKU-"))
    );

    let keys = backend.object_keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("product-images/"));
    let image_url = product["images"][0].as_str().expect("image url");
    assert!(image_url.contains("/storage/v1/object/public/product-images/"));

    let variants = backend.rows("product_variants");
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v["product_id"] == product["id"]));
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let (backend, admin) = signed_in().await;

    let upload = Part::bytes(b"#!/bin/sh".to_vec())
        .file_name("run.sh")
        .mime_str("text/x-shellscript")
        .expect("file part");
    let form = Form::new()
        .text("title", "Suspicious")
        .text("price", "1000")
        .part("image", upload);

    let resp = admin
        .client
        .post(admin.url("/products"))
        .multipart(form)
        .send()
        .await
        .expect("create product");
    let body = resp.text().await.expect("read body");
    assert!(body.contains("Only image files can be uploaded."));
    assert!(backend.rows("products").is_empty());
    assert!(backend.object_keys().is_empty());
}

#[tokio::test]
async fn test_order_status_moves_forward_only() {
    let (backend, admin) = signed_in().await;
    let product_id = seed_product(&backend, "Adire Silk Scarf", "15000", 5);
    let order_id = seed_order(&backend, &product_id, "pending");

    let change = |status: &'static str| {
        let admin = admin.clone();
        let order_id = order_id.clone();
        async move {
            admin
                .client
                .post(admin.url(&format!("/orders/{order_id}/status")))
                .form(&[("status", status), ("estimated_delivery", "2026-11-02")])
                .send()
                .await
                .expect("status change")
        }
    };

    let resp = change("processing").await;
    assert_eq!(resp.url().path(), format!("/orders/{order_id}"));
    assert_eq!(resp.url().query(), Some("success=status"));
    assert!(resp.text().await.expect("read body").contains("Order status updated."));

    let order = backend
        .rows("orders")
        .into_iter()
        .find(|o| o["id"] == order_id.as_str())
        .expect("seeded order");
    assert_eq!(order["status"], "processing");
    assert!(
        order["estimated_delivery"]
            .as_str()
            .is_some_and(|at| at.starts_with("2026-11-02T23:59:59"))
    );

    let resp = change("pending").await;
    assert_eq!(resp.url().query(), Some("error=invalid_transition"));
    let order = backend
        .rows("orders")
        .into_iter()
        .find(|o| o["id"] == order_id.as_str())
        .expect("seeded order");
    assert_eq!(order["status"], "processing");
}

#[tokio::test]
async fn test_order_list_filters_by_status() {
    let (backend, admin) = signed_in().await;
    let product_id = seed_product(&backend, "Adire Silk Scarf", "15000", 5);
    let shipped = seed_order(&backend, &product_id, "shipped");
    let pending = seed_order(&backend, &product_id, "pending");

    let body = admin
        .client
        .get(admin.url("/orders?status=shipped"))
        .send()
        .await
        .expect("GET orders")
        .text()
        .await
        .expect("read body");
    assert!(body.contains(&shipped));
    assert!(!body.contains(&pending));

    let resp = admin
        .client
        .get(admin.url("/orders?status=lost"))
        .send()
        .await
        .expect("GET orders");
    let body = resp.text().await.expect("read body");
    assert!(body.contains("Unknown status."));
}
