//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use oja_core::catalog::{ProductFilters, ProductSort};
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::routes::views::{CategoryLink, Layout, ProductCard};
use crate::state::AppState;

/// Products shown in the new arrivals strip.
const NEW_ARRIVALS_COUNT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub new_arrivals: Vec<ProductCard>,
    pub categories: Vec<CategoryLink>,
}

/// Display the home page: newest products and top-level categories.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip(state, layout))]
pub async fn home(State(state): State<AppState>, layout: Layout) -> Result<impl IntoResponse> {
    let filters = ProductFilters {
        sort: ProductSort::Newest,
        ..ProductFilters::default()
    };
    let (products, categories) = tokio::join!(
        state.backend().get_products(1, NEW_ARRIVALS_COUNT, &filters),
        state.backend().get_categories(),
    );

    // A missing category strip should not take the home page down
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    Ok(HomeTemplate {
        layout,
        new_arrivals: products?.items.iter().map(ProductCard::from).collect(),
        categories: categories.iter().map(CategoryLink::from).collect(),
    })
}
