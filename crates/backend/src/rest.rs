//! Table API query builder.
//!
//! Requests go to `{base}/rest/v1/{table}` with filters encoded as query
//! parameters (`status=eq.active`, `price=gte.1000`, ...). Inserts, updates
//! and deletes ask for the affected rows back with
//! `Prefer: return=representation`.

use std::fmt::Display;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{Backend, BackendError};

const RETURN_REPRESENTATION: &str = "return=representation";

/// A query against one table.
///
/// Built with [`Backend::from`] and consumed by one of the execution
/// methods.
#[derive(Debug)]
#[must_use = "a query does nothing until it is executed"]
pub struct Query<'a> {
    backend: &'a Backend,
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    range: Option<(u64, u64)>,
    limit: Option<u64>,
}

impl Backend {
    /// Start a query against `table`.
    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            backend: self,
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            limit: None,
        }
    }
}

impl Query<'_> {
    /// Columns to return, including embedded relations such as
    /// `*,order_items(*)`.
    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("{op}.{value}")));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "neq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(self, column: &str, pattern: impl Display) -> Self {
        self.filter(column, "ilike", pattern)
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is", "null")
    }

    /// Match any of several conditions, e.g.
    /// `title.ilike.*silk*,description.ilike.*silk*`.
    pub fn or(mut self, conditions: &str) -> Self {
        self.filters
            .push(("or".to_string(), format!("({conditions})")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    /// Zero-based inclusive row range.
    pub const fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string parameters for this query.
    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            params.push(("order".to_string(), self.order.join(",")));
        }
        match (self.range, self.limit) {
            (Some((from, to)), _) => {
                params.push(("offset".to_string(), from.to_string()));
                params.push((
                    "limit".to_string(),
                    (to.saturating_sub(from) + 1).to_string(),
                ));
            }
            (None, Some(limit)) => params.push(("limit".to_string(), limit.to_string())),
            (None, None) => {}
        }
        params
    }

    fn path(&self) -> String {
        format!("rest/v1/{}", self.table)
    }

    fn build(&self, method: Method) -> reqwest::RequestBuilder {
        self.backend
            .request(method, &self.path())
            .query(&self.params())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Fetch matching rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or rows do not decode as `T`.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let (_, text) = self.backend.send(self.build(Method::GET)).await?;
        Backend::decode(&text)
    }

    /// Fetch matching rows along with the exact number of rows that match
    /// ignoring the range.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or rows do not decode as `T`.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch_with_count<T: DeserializeOwned>(
        self,
    ) -> Result<(Vec<T>, u64), BackendError> {
        let request = self.build(Method::GET).header("Prefer", "count=exact");
        let (headers, text) = self.backend.send(request).await?;
        let rows: Vec<T> = Backend::decode(&text)?;
        let total = content_range_total(&headers).unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Fetch exactly one row.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] unless exactly one row matches.
    pub async fn single<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        let table = self.table.clone();
        let mut rows: Vec<T> = self.limit(2).fetch().await?;
        match rows.len() {
            1 => rows
                .pop()
                .ok_or_else(|| BackendError::NotFound(table)),
            0 => Err(BackendError::NotFound(table)),
            n => Err(BackendError::NotFound(format!(
                "{table}: expected one row, {n} matched"
            ))),
        }
    }

    /// Fetch the first matching row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row does not decode.
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, BackendError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row (an object) or many (an array) and return them as
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the rows.
    #[instrument(skip(self, rows), fields(table = %self.table))]
    pub async fn insert<B, T>(self, rows: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .backend
            .request(Method::POST, &self.path())
            .query(&[("select", self.select.as_str())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(rows);
        let (_, text) = self.backend.send(request).await?;
        Backend::decode(&text)
    }

    /// Apply `changes` to every matching row and return the updated rows.
    ///
    /// # Errors
    ///
    /// Refuses to run without a filter, and returns an error if the backend
    /// rejects the change.
    #[instrument(skip(self, changes), fields(table = %self.table))]
    pub async fn update<B, T>(self, changes: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if self.filters.is_empty() {
            return Err(BackendError::UnfilteredMutation("update", self.table));
        }
        let request = self
            .build(Method::PATCH)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(changes);
        let (_, text) = self.backend.send(request).await?;
        Backend::decode(&text)
    }

    /// Delete every matching row.
    ///
    /// # Errors
    ///
    /// Refuses to run without a filter, and returns an error if the backend
    /// rejects the delete.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(self) -> Result<(), BackendError> {
        if self.filters.is_empty() {
            return Err(BackendError::UnfilteredMutation("delete", self.table));
        }
        self.backend.send(self.build(Method::DELETE)).await?;
        Ok(())
    }
}

/// Changes with an `updated_at` stamp added.
#[derive(Debug, Serialize)]
pub(crate) struct Stamped<'a, T: Serialize> {
    #[serde(flatten)]
    pub changes: &'a T,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'a, T: Serialize> Stamped<'a, T> {
    pub fn now(changes: &'a T) -> Self {
        Self {
            changes,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Total from a `Content-Range: 0-11/42` (or `*/0`) header.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit_once('/')?
        .1
        .parse()
        .ok()
}
