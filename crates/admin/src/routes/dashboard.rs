//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use oja_core::OrderStatus;
use oja_core::order::OrderFilters;
use tracing::instrument;

use crate::{
    filters, middleware::RequireAdminAuth, models::CurrentAdmin, routes::orders::OrderRowView,
    state::AppState,
};

/// Orders shown on the dashboard.
const RECENT_ORDERS: u32 = 10;

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.clone(),
        }
    }
}

/// Dashboard counts. `None` when the backend could not be reached.
#[derive(Debug, Clone, Default)]
pub struct DashboardCounts {
    pub orders: Option<u64>,
    pub pending: Option<u64>,
    pub products: Option<u64>,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub counts: DashboardCounts,
    pub recent_orders: Vec<OrderRowView>,
}

/// Dashboard page handler.
#[instrument(skip(admin, state))]
pub async fn dashboard(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> DashboardTemplate {
    let backend = state.backend();
    let all = OrderFilters::default();
    let pending = OrderFilters {
        status: Some(OrderStatus::Pending),
        ..OrderFilters::default()
    };

    let (recent, pending, products) = tokio::join!(
        backend.get_all_orders(&all, 1, RECENT_ORDERS),
        backend.get_all_orders(&pending, 1, 1),
        backend.list_all_products(1, 1, None),
    );

    let mut counts = DashboardCounts::default();
    let recent_orders = match recent {
        Ok(page) => {
            counts.orders = Some(page.total);
            page.items.iter().map(OrderRowView::from).collect()
        }
        Err(e) => {
            tracing::error!("Failed to fetch orders: {e}");
            Vec::new()
        }
    };
    match pending {
        Ok(page) => counts.pending = Some(page.total),
        Err(e) => tracing::error!("Failed to count pending orders: {e}"),
    }
    match products {
        Ok(page) => counts.products = Some(page.total),
        Err(e) => tracing::error!("Failed to count products: {e}"),
    }

    DashboardTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/".to_string(),
        counts,
        recent_orders,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_renders_unavailable_counts() {
        let html = DashboardTemplate {
            admin_user: AdminUserView {
                name: "Ngozi Okafor".to_string(),
                email: "ngozi@example.com".to_string(),
            },
            current_path: "/".to_string(),
            counts: DashboardCounts {
                orders: Some(42),
                pending: None,
                products: Some(7),
            },
            recent_orders: Vec::new(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Ngozi Okafor"));
        assert!(html.contains("42"));
        assert!(html.contains("No orders yet."));
        assert!(html.contains("&mdash;"));
    }
}
