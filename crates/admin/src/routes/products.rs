//! Product management route handlers.
//!
//! Create and edit forms are multipart so an image can ride along. The image
//! goes to object storage first and its public URL is stored on the product.

use std::collections::HashMap;
use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use oja_backend::{BackendError, object_path};
use oja_core::catalog::{NewProduct, NewVariant, Product, ProductInputError, ProductUpdate};
use oja_core::{CategoryId, CurrencyCode, ProductId, ProductStatus, VariantType};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::CurrentAdmin;
use crate::routes::dashboard::AdminUserView;
use crate::routes::views::{PER_PAGE, Pager, non_blank};
use crate::state::AppState;

/// Largest accepted form body, image included.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Stock given to a new product when the field is left blank.
const DEFAULT_STOCK: i32 = 100;

// =============================================================================
// Form Parsing
// =============================================================================

/// Why a product form was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    Input(ProductInputError),
    InvalidNumber,
    InvalidVariant,
    InvalidStatus,
    InvalidCategory,
    InvalidCurrency,
    InvalidImage,
}

impl FormError {
    /// Short code used in `?error=` and by the message filter.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Input(ProductInputError::MissingTitle) => "missing_title",
            Self::Input(ProductInputError::NegativePrice) => "negative_price",
            Self::Input(ProductInputError::DiscountNotLower) => "discount_not_lower",
            Self::Input(ProductInputError::NegativeStock) => "negative_stock",
            Self::InvalidNumber => "invalid_number",
            Self::InvalidVariant => "invalid_variant",
            Self::InvalidStatus => "invalid_status",
            Self::InvalidCategory => "invalid_category",
            Self::InvalidCurrency => "invalid_currency",
            Self::InvalidImage => "invalid_image",
        }
    }
}

impl From<ProductInputError> for FormError {
    fn from(err: ProductInputError) -> Self {
        Self::Input(err)
    }
}

/// An uploaded image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A submitted product form: text fields plus an optional image.
#[derive(Debug, Clone, Default)]
pub struct ProductSubmission {
    fields: HashMap<String, String>,
    image: Option<ImageUpload>,
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

impl ProductSubmission {
    /// Read every part of a multipart body. An empty file input counts as
    /// no image.
    ///
    /// # Errors
    ///
    /// Returns 400 if the body is not valid multipart or exceeds the limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut submission = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if !bytes.is_empty() {
                    submission.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field.text().await.map_err(bad_multipart)?;
                submission.fields.insert(name, value);
            }
        }
        Ok(submission)
    }

    fn raw(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", |v| v.trim())
    }

    fn text(&self, name: &str) -> Option<&str> {
        non_blank(self.fields.get(name).map(String::as_str))
    }

    fn decimal(&self, name: &str) -> std::result::Result<Option<Decimal>, FormError> {
        self.text(name)
            .map(|v| Decimal::from_str(v).map_err(|_| FormError::InvalidNumber))
            .transpose()
    }

    fn stock(&self) -> std::result::Result<Option<i32>, FormError> {
        self.text("stock_quantity")
            .map(|v| v.parse::<i32>().map_err(|_| FormError::InvalidNumber))
            .transpose()
    }

    fn status(&self) -> std::result::Result<ProductStatus, FormError> {
        self.text("status")
            .map_or(Ok(ProductStatus::Active), |v| {
                v.parse().map_err(|_| FormError::InvalidStatus)
            })
    }

    /// Reject uploads that do not claim an image content type.
    fn check_image(&self) -> std::result::Result<(), FormError> {
        match &self.image {
            Some(image) if !image.content_type.starts_with("image/") => Err(FormError::InvalidImage),
            _ => Ok(()),
        }
    }

    /// Build a new product and its variants.
    ///
    /// Blank SKU becomes `SKU-<millis>`, blank stock becomes 100 and blank
    /// currency is naira.
    ///
    /// # Errors
    ///
    /// Returns the first malformed or invalid field.
    pub fn new_product(
        &self,
        now: DateTime<Utc>,
    ) -> std::result::Result<(NewProduct, Vec<NewVariant>), FormError> {
        self.check_image()?;
        let sku = self
            .text("sku")
            .map_or_else(|| format!("SKU-{}", now.timestamp_millis()), str::to_string);
        let product = NewProduct {
            title: self.raw("title").to_string(),
            description: self.raw("description").to_string(),
            category_id: self
                .text("category_id")
                .map(|v| v.parse::<CategoryId>().map_err(|_| FormError::InvalidCategory))
                .transpose()?,
            price: self.decimal("price")?.ok_or(FormError::InvalidNumber)?,
            discount_price: self.decimal("discount_price")?,
            currency: self
                .text("currency")
                .map(|v| v.parse::<CurrencyCode>().map_err(|_| FormError::InvalidCurrency))
                .transpose()?
                .unwrap_or_default(),
            stock_quantity: self.stock()?.unwrap_or(DEFAULT_STOCK),
            images: Vec::new(),
            tags: parse_tags(self.raw("tags")),
            status: self.status()?,
            sku,
        };
        product.validate()?;
        let variants = parse_variants(self.raw("variants"), &product.sku)?;
        Ok((product, variants))
    }

    /// Build an update for `existing`. Blank price and stock leave those
    /// fields alone; a blank discount clears it.
    ///
    /// # Errors
    ///
    /// Returns the first malformed or invalid field.
    pub fn update(&self, existing: &Product) -> std::result::Result<ProductUpdate, FormError> {
        self.check_image()?;
        let update = ProductUpdate {
            title: Some(self.raw("title").to_string()),
            description: Some(self.raw("description").to_string()),
            price: self.decimal("price")?,
            discount_price: Some(self.decimal("discount_price")?),
            stock_quantity: self.stock()?,
            images: None,
            status: Some(self.status()?),
        };
        update.validate()?;
        let price = update.price.unwrap_or(existing.price);
        if matches!(update.discount_price, Some(Some(discount)) if discount >= price) {
            return Err(ProductInputError::DiscountNotLower.into());
        }
        Ok(update)
    }
}

/// Comma-separated tags, blanks dropped.
fn parse_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// One variant per line as `type:value:stock[:extra price]`.
fn parse_variants(text: &str, sku: &str) -> std::result::Result<Vec<NewVariant>, FormError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split(':').map(str::trim).collect();
            let (kind, value, stock, extra) = match parts.as_slice() {
                [kind, value, stock] => (*kind, *value, *stock, None),
                [kind, value, stock, extra] => (*kind, *value, *stock, Some(*extra)),
                _ => return Err(FormError::InvalidVariant),
            };
            let variant_type: VariantType = kind
                .to_lowercase()
                .parse()
                .map_err(|_| FormError::InvalidVariant)?;
            if value.is_empty() {
                return Err(FormError::InvalidVariant);
            }
            let stock_quantity = stock
                .parse::<i32>()
                .ok()
                .filter(|s| *s >= 0)
                .ok_or(FormError::InvalidVariant)?;
            let additional_price = extra
                .filter(|e| !e.is_empty())
                .map(|e| {
                    Decimal::from_str(e)
                        .ok()
                        .filter(|d| *d >= Decimal::ZERO)
                        .ok_or(FormError::InvalidVariant)
                })
                .transpose()?;
            Ok(NewVariant {
                sku: variant_sku(sku, variant_type, value),
                variant_type,
                value: value.to_string(),
                stock_quantity,
                additional_price,
            })
        })
        .collect()
}

fn variant_sku(sku: &str, variant_type: VariantType, value: &str) -> String {
    let value: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '-' })
        .collect();
    format!("{sku}-{}-{value}", variant_type.as_str().to_ascii_uppercase())
}

async fn upload_image(state: &AppState, image: ImageUpload) -> std::result::Result<String, BackendError> {
    let path = object_path(&image.file_name, Utc::now());
    state
        .backend()
        .upload(
            &state.config().image_bucket,
            &path,
            image.bytes,
            &image.content_type,
        )
        .await
}

// =============================================================================
// Views
// =============================================================================

/// One row of the product table.
#[derive(Debug, Clone)]
pub struct ProductRowView {
    pub id: String,
    pub title: String,
    pub sku: String,
    pub price: String,
    pub sale_price: Option<String>,
    pub stock_quantity: i32,
    pub status: String,
    pub image: Option<String>,
}

impl From<&Product> for ProductRowView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            title: product.title.clone(),
            sku: product.sku.clone(),
            price: product.list_price().display(),
            sale_price: product
                .active_discount()
                .map(|d| oja_core::Price::new(d, product.currency).display()),
            stock_quantity: product.stock_quantity,
            status: product.status.to_string(),
            image: product.images.first().cloned(),
        }
    }
}

/// Values shown in the product form.
#[derive(Debug, Clone, Default)]
pub struct ProductFormView {
    pub action: String,
    pub is_new: bool,
    pub title: String,
    pub description: String,
    pub price: String,
    pub discount_price: String,
    pub stock_quantity: String,
    pub sku: String,
    pub tags: String,
    pub category_id: String,
    pub currency: String,
    pub status: String,
    pub variants: String,
    pub images: Vec<String>,
}

impl ProductFormView {
    /// Empty create form.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            action: "/products".to_string(),
            is_new: true,
            currency: CurrencyCode::default().code().to_string(),
            status: ProductStatus::Active.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Edit form filled from a stored product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            action: format!("/products/{}", product.id),
            is_new: false,
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            discount_price: product
                .discount_price
                .map(|d| d.to_string())
                .unwrap_or_default(),
            stock_quantity: product.stock_quantity.to_string(),
            sku: product.sku.clone(),
            tags: product.tags.join(", "),
            category_id: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            currency: product.currency.code().to_string(),
            status: product.status.as_str().to_string(),
            variants: String::new(),
            images: product.images.clone(),
        }
    }

    /// Refill a rejected form with what was submitted.
    #[must_use]
    fn refill(mut self, submission: &ProductSubmission) -> Self {
        for (name, slot) in [
            ("title", &mut self.title),
            ("description", &mut self.description),
            ("price", &mut self.price),
            ("discount_price", &mut self.discount_price),
            ("stock_quantity", &mut self.stock_quantity),
            ("sku", &mut self.sku),
            ("tags", &mut self.tags),
            ("category_id", &mut self.category_id),
            ("currency", &mut self.currency),
            ("status", &mut self.status),
            ("variants", &mut self.variants),
        ] {
            if let Some(value) = submission.fields.get(name) {
                value.clone_into(slot);
            }
        }
        self
    }
}

/// Category choice in the form.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub products: Vec<ProductRowView>,
    pub pager: Pager,
    pub search: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub form: ProductFormView,
    pub categories: Vec<CategoryOption>,
    pub statuses: Vec<&'static str>,
    pub currencies: Vec<&'static str>,
    pub error: Option<String>,
}

/// Product list query.
#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub error: Option<String>,
    pub success: Option<String>,
}

async fn form_page(
    state: &AppState,
    admin: &CurrentAdmin,
    form: ProductFormView,
    error: Option<&str>,
) -> ProductFormTemplate {
    let categories = match state.backend().get_categories().await {
        Ok(categories) => categories
            .iter()
            .map(|c| CategoryOption {
                id: c.id.to_string(),
                name: c.name.clone(),
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load categories for product form");
            Vec::new()
        }
    };
    ProductFormTemplate {
        admin_user: AdminUserView::from(admin),
        current_path: "/products".to_string(),
        form,
        categories,
        statuses: ProductStatus::ALL.iter().map(|s| s.as_str()).collect(),
        currencies: CurrencyCode::ALL.iter().map(|c| c.code()).collect(),
        error: error.map(str::to_string),
    }
}

fn parse_product_id(id: &str) -> Result<ProductId> {
    id.parse()
        .map_err(|_| AppError::NotFound(format!("product {id}")))
}

// =============================================================================
// Router
// =============================================================================

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/new", get(new_form))
        .route("/products/{id}", post(update))
        .route("/products/{id}/edit", get(edit_form))
        .route("/products/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

// =============================================================================
// Handlers
// =============================================================================

/// Product list with title search.
///
/// GET /products
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<ProductsIndexTemplate> {
    let search = non_blank(query.search.as_deref());
    let page = state
        .backend()
        .list_all_products(query.page.unwrap_or(1), PER_PAGE, search)
        .await?;
    let base_query = search
        .map(|s| format!("search={}", urlencoding::encode(s)))
        .unwrap_or_default();

    Ok(ProductsIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/products".to_string(),
        products: page.items.iter().map(ProductRowView::from).collect(),
        pager: Pager::new("/products", &base_query, &page),
        search: search.unwrap_or_default().to_string(),
        error: query.error,
        success: query.success,
    })
}

/// Empty create form.
///
/// GET /products/new
#[instrument(skip(admin, state))]
pub async fn new_form(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> ProductFormTemplate {
    form_page(&state, &admin, ProductFormView::blank(), None).await
}

/// Create a product, uploading its image first.
///
/// POST /products
///
/// # Errors
///
/// Returns 400 for a malformed multipart body. Invalid fields and backend
/// failures re-render the form.
#[instrument(skip(admin, state, multipart))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response> {
    let submission = ProductSubmission::read(multipart).await?;
    let retry = |code: &'static str| {
        let form = ProductFormView::blank().refill(&submission);
        let state = state.clone();
        let admin = admin.clone();
        async move { form_page(&state, &admin, form, Some(code)).await.into_response() }
    };

    let (mut product, variants) = match submission.new_product(Utc::now()) {
        Ok(parsed) => parsed,
        Err(e) => return Ok(retry(e.code()).await),
    };

    if let Some(image) = submission.image.clone() {
        match upload_image(&state, image).await {
            Ok(url) => product.images.push(url),
            Err(e) => {
                tracing::error!(error = %e, "Product image upload failed");
                return Ok(retry("upload").await);
            }
        }
    }

    match state.backend().create_product(&product, &variants).await {
        Ok(created) => {
            tracing::info!(
                admin_id = %admin.id,
                product_id = %created.id,
                variants = variants.len(),
                "Product created"
            );
            Ok(Redirect::to("/products?success=created").into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create product");
            Ok(retry("save").await)
        }
    }
}

/// Edit form for an existing product.
///
/// GET /products/{id}/edit
///
/// # Errors
///
/// Returns 404 for unknown products.
#[instrument(skip(admin, state))]
pub async fn edit_form(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ProductListQuery>,
) -> Result<ProductFormTemplate> {
    let detail = state.backend().get_product(parse_product_id(&id)?).await?;
    Ok(form_page(
        &state,
        &admin,
        ProductFormView::from_product(&detail.product),
        query.error.as_deref(),
    )
    .await)
}

/// Save changes to a product. A new image goes in front of the existing
/// ones.
///
/// POST /products/{id}
///
/// # Errors
///
/// Returns 404 for unknown products and 400 for a malformed body.
#[instrument(skip(admin, state, multipart))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let product_id = parse_product_id(&id)?;
    let existing = state.backend().get_product(product_id).await?.product;
    let submission = ProductSubmission::read(multipart).await?;
    let retry = |code: &'static str| {
        let form = ProductFormView::from_product(&existing).refill(&submission);
        let state = state.clone();
        let admin = admin.clone();
        async move { form_page(&state, &admin, form, Some(code)).await.into_response() }
    };

    let mut changes = match submission.update(&existing) {
        Ok(changes) => changes,
        Err(e) => return Ok(retry(e.code()).await),
    };

    if let Some(image) = submission.image.clone() {
        match upload_image(&state, image).await {
            Ok(url) => {
                let mut images = Vec::with_capacity(existing.images.len() + 1);
                images.push(url);
                images.extend(existing.images.iter().cloned());
                changes.images = Some(images);
            }
            Err(e) => {
                tracing::error!(error = %e, "Product image upload failed");
                return Ok(retry("upload").await);
            }
        }
    }

    match state.backend().update_product(product_id, &changes).await {
        Ok(_) => {
            tracing::info!(admin_id = %admin.id, product_id = %product_id, "Product updated");
            Ok(Redirect::to("/products?success=updated").into_response())
        }
        Err(e) if e.is_not_found() => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update product");
            Ok(retry("save").await)
        }
    }
}

/// Delete a product.
///
/// POST /products/{id}/delete
///
/// # Errors
///
/// Returns 404 for a malformed id.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let product_id = parse_product_id(&id)?;
    match state.backend().delete_product(product_id).await {
        Ok(()) => {
            tracing::info!(admin_id = %admin.id, product_id = %product_id, "Product deleted");
            Ok(Redirect::to("/products?success=deleted"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete product");
            Ok(Redirect::to("/products?error=save"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn submission(pairs: &[(&str, &str)]) -> ProductSubmission {
        ProductSubmission {
            fields: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            image: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_767_225_600_000).unwrap()
    }

    fn stored(price: i64) -> Product {
        serde_json::from_value(serde_json::json!({
            "id": ProductId::generate(),
            "title": "Adire Tote",
            "price": price.to_string(),
            "images": ["https://cdn.example.com/a.jpg"],
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_new_product_defaults() {
        let (product, variants) = submission(&[("title", " Ankara Dress "), ("price", "15000")])
            .new_product(now())
            .unwrap();
        assert_eq!(product.title, "Ankara Dress");
        assert_eq!(product.sku, "SKU-1767225600000");
        assert_eq!(product.stock_quantity, DEFAULT_STOCK);
        assert_eq!(product.currency, CurrencyCode::NGN);
        assert_eq!(product.status, ProductStatus::Active);
        assert!(product.images.is_empty());
        assert!(variants.is_empty());
    }

    #[test]
    fn test_new_product_reads_tags_and_variants() {
        let (product, variants) = submission(&[
            ("title", "Ankara Dress"),
            ("price", "15000"),
            ("sku", "ANK-1"),
            ("tags", "ankara, , dress"),
            ("variants", "size:M:4\nColor:Deep Blue:2:500\n\n"),
        ])
        .new_product(now())
        .unwrap();

        assert_eq!(product.tags, vec!["ankara", "dress"]);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].variant_type, VariantType::Size);
        assert_eq!(variants[0].sku, "ANK-1-SIZE-M");
        assert_eq!(variants[1].variant_type, VariantType::Color);
        assert_eq!(variants[1].sku, "ANK-1-COLOR-DEEP-BLUE");
        assert_eq!(variants[1].additional_price, Some(Decimal::new(500, 0)));
    }

    #[test]
    fn test_new_product_rejections() {
        let code = |pairs: &[(&str, &str)]| submission(pairs).new_product(now()).unwrap_err().code();
        assert_eq!(code(&[("title", " "), ("price", "10")]), "missing_title");
        assert_eq!(code(&[("title", "T")]), "invalid_number");
        assert_eq!(code(&[("title", "T"), ("price", "ten")]), "invalid_number");
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("discount_price", "10")]),
            "discount_not_lower"
        );
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("stock_quantity", "-1")]),
            "negative_stock"
        );
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("variants", "size:M")]),
            "invalid_variant"
        );
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("variants", "weight:1kg:3")]),
            "invalid_variant"
        );
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("currency", "EUR")]),
            "invalid_currency"
        );
        assert_eq!(
            code(&[("title", "T"), ("price", "10"), ("status", "archived")]),
            "invalid_status"
        );
    }

    #[test]
    fn test_non_image_upload_rejected() {
        let mut form = submission(&[("title", "T"), ("price", "10")]);
        form.image = Some(ImageUpload {
            file_name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        });
        assert_eq!(form.new_product(now()).unwrap_err(), FormError::InvalidImage);
    }

    #[test]
    fn test_update_blank_discount_clears_it() {
        let changes = submission(&[("title", "Tote"), ("discount_price", "")])
            .update(&stored(12_000))
            .unwrap();
        assert_eq!(changes.discount_price, Some(None));
        assert_eq!(changes.price, None);
        assert_eq!(changes.stock_quantity, None);
        assert_eq!(changes.images, None);
    }

    #[test]
    fn test_update_checks_discount_against_stored_price() {
        let err = submission(&[("title", "Tote"), ("discount_price", "12000")])
            .update(&stored(12_000))
            .unwrap_err();
        assert_eq!(err.code(), "discount_not_lower");
    }

    #[test]
    fn test_refill_keeps_submitted_values() {
        let form = ProductFormView::from_product(&stored(12_000))
            .refill(&submission(&[("title", ""), ("price", "abc")]));
        assert_eq!(form.title, "");
        assert_eq!(form.price, "abc");
        assert_eq!(form.images, vec!["https://cdn.example.com/a.jpg"]);
        assert!(!form.is_new);
    }

    #[test]
    fn test_form_renders_error_and_categories() {
        let html = ProductFormTemplate {
            admin_user: AdminUserView {
                name: "Ngozi".to_string(),
                email: "ngozi@example.com".to_string(),
            },
            current_path: "/products".to_string(),
            form: ProductFormView::blank(),
            categories: vec![CategoryOption {
                id: CategoryId::generate().to_string(),
                name: "Bags".to_string(),
            }],
            statuses: ProductStatus::ALL.iter().map(|s| s.as_str()).collect(),
            currencies: CurrencyCode::ALL.iter().map(|c| c.code()).collect(),
            error: Some("negative_price".to_string()),
        }
        .render()
        .unwrap();

        assert!(html.contains("Price cannot be negative."));
        assert!(html.contains("Bags"));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
    }
}
