//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use oja_core::catalog::{ProductDetail, ProductFilters, ProductSort};
use oja_core::{CategoryId, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::views::{CategoryLink, Layout, ProductCard};
use crate::state::AppState;

/// Products per listing page.
const PER_PAGE: u32 = 12;

/// Related products shown under a product.
const RELATED_COUNT: u64 = 4;

/// Shop listing query parameters.
///
/// Everything arrives as text so that empty form fields mean "no filter"
/// rather than a rejected request.
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ShopQuery {
    /// Listing filters. Unparseable values are ignored.
    #[must_use]
    pub fn filters(&self) -> ProductFilters {
        let decimal = |v: Option<&String>| non_empty(v).and_then(|s| s.parse::<Decimal>().ok());
        ProductFilters {
            category: non_empty(self.category.as_ref()).and_then(|s| s.parse::<CategoryId>().ok()),
            min_price: decimal(self.min_price.as_ref()),
            max_price: decimal(self.max_price.as_ref()),
            search: non_empty(self.search.as_ref()).map(str::to_string),
            sort: non_empty(self.sort.as_ref())
                .and_then(|s| ProductSort::ALL.iter().copied().find(|o| o.as_str() == s))
                .unwrap_or_default(),
        }
    }

    /// Query string for the same filters on another page.
    fn page_link(&self, page: u32) -> String {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        for (key, value) in [
            ("category", &self.category),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
            ("search", &self.search),
            ("sort", &self.sort),
        ] {
            if let Some(value) = non_empty(value.as_ref()) {
                pairs.push((key, value));
            }
        }
        let page = page.to_string();
        pairs.push(("page", page.as_str()));
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Sort option for the listing's select box.
#[derive(Debug, Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Category option for the listing's filter.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub link: CategoryLink,
    pub selected: bool,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ShopTemplate {
    pub layout: Layout,
    pub heading: String,
    pub action: String,
    pub products: Vec<ProductCard>,
    pub total: u64,
    pub categories: Vec<CategoryOption>,
    pub sorts: Vec<SortOption>,
    pub search: String,
    pub min_price: String,
    pub max_price: String,
    pub current_page: u32,
    pub total_pages: u64,
    pub previous_link: Option<String>,
    pub next_link: Option<String>,
}

/// One selectable value of a variant attribute.
#[derive(Debug, Clone)]
pub struct VariantChoice {
    pub value: String,
    /// Extra cost, if any, e.g. `+₦1,500.00`.
    pub surcharge: Option<String>,
    pub in_stock: bool,
}

/// Picker for one variant attribute (size, color, ...).
#[derive(Debug, Clone)]
pub struct VariantPicker {
    /// Form field name.
    pub name: &'static str,
    pub label: &'static str,
    pub choices: Vec<VariantChoice>,
}

/// Product detail display data.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub card: ProductCard,
    pub description: String,
    pub sku: String,
    pub stock: u32,
    pub images: Vec<String>,
    pub pickers: Vec<VariantPicker>,
    pub rating: Option<String>,
}

impl From<&ProductDetail> for ProductView {
    fn from(detail: &ProductDetail) -> Self {
        let product = &detail.product;
        let pickers = detail
            .options()
            .into_iter()
            .map(|(variant_type, variants)| VariantPicker {
                name: variant_type.as_str(),
                label: variant_type.label(),
                choices: variants
                    .into_iter()
                    .map(|v| VariantChoice {
                        value: v.value.clone(),
                        surcharge: v
                            .additional_price
                            .filter(|p| *p > Decimal::ZERO)
                            .map(|p| format!("+{}", oja_core::Price::new(p, product.currency))),
                        in_stock: v.stock_quantity > 0,
                    })
                    .collect(),
            })
            .collect();

        Self {
            card: ProductCard::from(product),
            description: product.description.clone(),
            sku: product.sku.clone(),
            stock: product.available_stock(),
            images: detail.image_urls().into_iter().map(str::to_string).collect(),
            pickers,
            rating: (product.rating_count > 0).then(|| {
                format!("{:.1} ({} reviews)", product.rating_avg, product.rating_count)
            }),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub related_products: Vec<ProductCard>,
    pub error: Option<String>,
    pub added: bool,
}

/// Query parameters on the product page after an add-to-cart attempt.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub error: Option<String>,
    pub added: Option<String>,
}

async fn listing(
    state: &AppState,
    layout: Layout,
    query: &ShopQuery,
    heading: &str,
    action: &str,
) -> Result<ShopTemplate> {
    let filters = query.filters();
    let page = query.page.unwrap_or(1).max(1);

    let (products, categories) = tokio::join!(
        state.backend().get_products(page, PER_PAGE, &filters),
        state.backend().get_categories(),
    );
    let products = products?;
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    let link = |p: u32| format!("{action}?{}", query.page_link(p));

    Ok(ShopTemplate {
        layout,
        heading: heading.to_string(),
        action: action.to_string(),
        products: products.items.iter().map(ProductCard::from).collect(),
        total: products.total,
        categories: categories
            .iter()
            .map(|c| CategoryOption {
                link: CategoryLink::from(c),
                selected: filters.category == Some(c.id),
            })
            .collect(),
        sorts: ProductSort::ALL
            .iter()
            .map(|s| SortOption {
                value: s.as_str(),
                label: s.label(),
                selected: *s == filters.sort,
            })
            .collect(),
        search: filters.search.clone().unwrap_or_default(),
        min_price: filters.min_price.map(|d| d.to_string()).unwrap_or_default(),
        max_price: filters.max_price.map(|d| d.to_string()).unwrap_or_default(),
        current_page: products.page,
        total_pages: products.total_pages(),
        previous_link: products.has_previous().then(|| link(products.page - 1)),
        next_link: products.has_next().then(|| link(products.page + 1)),
    })
}

/// Display the shop listing with filters and pagination.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip(state, layout))]
pub async fn shop(
    State(state): State<AppState>,
    layout: Layout,
    Query(query): Query<ShopQuery>,
) -> Result<impl IntoResponse> {
    listing(&state, layout, &query, "Shop", "/shop").await
}

/// Display the newest products.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip(state, layout))]
pub async fn new_arrivals(
    State(state): State<AppState>,
    layout: Layout,
    Query(mut query): Query<ShopQuery>,
) -> Result<impl IntoResponse> {
    query.sort = Some(ProductSort::Newest.as_str().to_string());
    listing(&state, layout, &query, "New Arrivals", "/new-arrivals").await
}

/// Display a product with its variants, gallery and related products.
///
/// # Errors
///
/// Returns 404 for unknown or malformed product ids.
#[instrument(skip(state, layout, query))]
pub async fn show(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse> {
    let id: ProductId = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("product {id}")))?;
    let detail = state.backend().get_product(id).await?;

    let related = match detail.product.category_id {
        Some(category) => state
            .backend()
            .get_related_products(category, id, RELATED_COUNT)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load related products");
                Vec::new()
            }),
        None => Vec::new(),
    };

    Ok(ProductShowTemplate {
        layout,
        product: ProductView::from(&detail),
        related_products: related.iter().map(ProductCard::from).collect(),
        error: query.error,
        added: query.added.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_do_not_filter() {
        let query = ShopQuery {
            category: Some(String::new()),
            min_price: Some("  ".to_string()),
            max_price: Some("abc".to_string()),
            search: Some(String::new()),
            sort: Some("bogus".to_string()),
            page: None,
        };
        assert_eq!(query.filters(), ProductFilters::default());
    }

    #[test]
    fn test_filters_are_parsed() {
        let query = ShopQuery {
            min_price: Some("1000".to_string()),
            max_price: Some("25000.50".to_string()),
            search: Some(" ankara ".to_string()),
            sort: Some("price_high".to_string()),
            ..ShopQuery::default()
        };
        let filters = query.filters();
        assert_eq!(filters.min_price, Some(Decimal::new(1000, 0)));
        assert_eq!(filters.max_price, Some(Decimal::new(2_500_050, 2)));
        assert_eq!(filters.search.as_deref(), Some("ankara"));
        assert_eq!(filters.sort, ProductSort::PriceHigh);
    }

    #[test]
    fn test_page_link_keeps_filters() {
        let query = ShopQuery {
            search: Some("wrap dress".to_string()),
            sort: Some("newest".to_string()),
            min_price: Some(String::new()),
            ..ShopQuery::default()
        };
        assert_eq!(query.page_link(3), "search=wrap%20dress&sort=newest&page=3");
    }
}
