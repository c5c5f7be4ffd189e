//! Order queries.

use chrono::{DateTime, Utc};
use oja_core::catalog::Page;
use oja_core::checkout::OrderNumber;
use oja_core::order::{NewOrder, NewOrderItemRow, Order, OrderFilters, OrderItem};
use oja_core::{OrderId, OrderStatus, PaymentStatus, UserId};
use serde::Serialize;
use tracing::instrument;

use crate::rest::Stamped;
use crate::{Backend, BackendError};

const ORDERS: &str = "orders";
const ORDER_ITEMS: &str = "order_items";
const WITH_ITEMS: &str = "*,order_items(*)";

#[derive(Debug, Serialize)]
struct StatusChange {
    status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct PaymentChange<'a> {
    payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_reference: Option<&'a str>,
}

impl Backend {
    /// A customer's orders, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user_orders(&self, user_id: UserId) -> Result<Vec<Order>, BackendError> {
        self.from(ORDERS)
            .select(WITH_ITEMS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .fetch()
            .await
    }

    /// An order with its items.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, BackendError> {
        self.from(ORDERS)
            .select(WITH_ITEMS)
            .eq("id", id)
            .single()
            .await
    }

    /// Look an order up by its customer-facing number.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if no order has that number.
    #[instrument(skip(self), fields(order_number = %number))]
    pub async fn track_order(&self, number: &OrderNumber) -> Result<Order, BackendError> {
        self.from(ORDERS)
            .select(WITH_ITEMS)
            .eq("order_number", number)
            .single()
            .await
    }

    /// Insert an order, then its items.
    ///
    /// The returned order has the inserted items embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if either insert is rejected. When the items fail,
    /// the order row already exists and is logged so it can be cleaned up.
    #[instrument(skip(self, order), fields(order_number = %order.order_number, total = %order.total_amount))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        let mut created: Order = self
            .from(ORDERS)
            .insert::<_, Order>(order)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("inserted order".to_string()))?;

        let rows: Vec<NewOrderItemRow<'_>> = order
            .items
            .iter()
            .map(|item| item.for_order(created.id))
            .collect();

        match self.from(ORDER_ITEMS).insert::<_, OrderItem>(&rows).await {
            Ok(items) => created.order_items = items,
            Err(e) => {
                tracing::error!(
                    order_id = %created.id,
                    error = %e,
                    "Order created but its items were rejected"
                );
                return Err(e);
            }
        }

        Ok(created)
    }

    /// Set an order's fulfillment status and optionally its estimated
    /// delivery date.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<Order, BackendError> {
        let change = StatusChange {
            status,
            estimated_delivery,
        };
        self.update_order(id, &change).await
    }

    /// Set an order's payment status, recording the gateway reference when
    /// one is given.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> Result<Order, BackendError> {
        let change = PaymentChange {
            payment_status: status,
            payment_reference: reference,
        };
        self.update_order(id, &change).await
    }

    async fn update_order<T: Serialize>(
        &self,
        id: OrderId,
        change: &T,
    ) -> Result<Order, BackendError> {
        self.from(ORDERS)
            .eq("id", id)
            .update::<_, Order>(&Stamped::now(change))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("order {id}")))
    }

    /// All orders matching `filters`, newest first, with an exact count.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_all_orders(
        &self,
        filters: &OrderFilters,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Order>, BackendError> {
        let (first, last) = Page::<Order>::bounds(page, per_page);
        let mut query = self.from(ORDERS).select(WITH_ITEMS);

        if let Some(status) = filters.status {
            query = query.eq("status", status);
        }
        if let Some(payment_status) = filters.payment_status {
            query = query.eq("payment_status", payment_status);
        }
        if let Some(since) = filters.from {
            query = query.gte("created_at", since.to_rfc3339());
        }
        if let Some(until) = filters.to {
            query = query.lte("created_at", until.to_rfc3339());
        }

        let (items, total) = query
            .order("created_at", false)
            .range(first, last)
            .fetch_with_count()
            .await?;

        Ok(Page {
            items,
            total,
            page: page.max(1),
            per_page,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_change_omits_missing_reference() {
        let change = PaymentChange {
            payment_status: PaymentStatus::Failed,
            payment_reference: None,
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            serde_json::json!({ "payment_status": "failed" })
        );
    }

    #[test]
    fn test_status_change_is_stamped() {
        let change = StatusChange {
            status: OrderStatus::Shipped,
            estimated_delivery: None,
        };
        let json = serde_json::to_value(Stamped::now(&change)).unwrap();
        assert_eq!(json["status"], "shipped");
        assert!(json.get("updated_at").is_some());
        assert!(json.get("estimated_delivery").is_none());
    }
}
