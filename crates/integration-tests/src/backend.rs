//! In-process stand-in for the hosted backend.
//!
//! Serves the subset of the REST, auth and storage endpoints the apps call,
//! over tables held in memory. Filters understand `eq`, `neq`, `gte`, `lte`,
//! `ilike`, `is` and `or=(...)`; `select=*,child(*)` embeds child rows whose
//! `<parent>_id` column points at the parent.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use oja_backend::BackendConfig;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use url::Url;
use uuid::Uuid;

type Params = Vec<(String, String)>;

#[derive(Debug, Clone)]
struct Account {
    id: Uuid,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
struct Store {
    tables: HashMap<String, Vec<Value>>,
    accounts: Vec<Account>,
    /// Access and refresh tokens to account ids.
    tokens: HashMap<String, Uuid>,
    objects: HashMap<String, Vec<u8>>,
}

/// A running stub backend.
///
/// Clones share the same tables.
#[derive(Debug, Clone)]
pub struct StubBackend {
    url: Url,
    store: Arc<Mutex<Store>>,
}

impl StubBackend {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = Url::parse(&format!("http://{addr}"))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let backend = Self {
            url,
            store: Arc::new(Mutex::new(Store::default())),
        };
        let app = router(backend.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Stub backend stopped: {e}");
            }
        });
        Ok(backend)
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Client settings pointing at this stub with the given key.
    #[must_use]
    pub fn config(&self, api_key: &str) -> BackendConfig {
        BackendConfig::new(self.url.clone(), SecretString::from(api_key.to_string()))
    }

    /// Insert a row as the REST endpoint would and return it as stored.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = with_defaults(row);
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Every row of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Register a password account and return its user id.
    pub fn add_account(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().accounts.push(Account {
            id,
            email: email.to_string(),
            password: password.to_string(),
        });
        id
    }

    /// Keys (`bucket/path`) of uploaded objects.
    #[must_use]
    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn router(backend: StubBackend) -> Router {
    Router::new()
        .route(
            "/rest/v1/{table}",
            get(select_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/storage/v1/object/{bucket}/{*path}", post(upload))
        .with_state(backend)
}

// =============================================================================
// REST
// =============================================================================

/// A parsed REST query string.
#[derive(Debug, Default)]
struct RowQuery {
    filters: Vec<(String, String)>,
    any_of: Vec<(String, String)>,
    order: Vec<(String, bool)>,
    offset: usize,
    limit: Option<usize>,
    embeds: Vec<String>,
}

impl RowQuery {
    fn parse(params: &Params) -> Self {
        let mut query = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "select" => {
                    query.embeds = value
                        .split(',')
                        .filter_map(|part| part.trim().strip_suffix("(*)"))
                        .map(str::to_string)
                        .collect();
                }
                "order" => {
                    query.order = value
                        .split(',')
                        .filter_map(|part| part.rsplit_once('.'))
                        .map(|(column, direction)| (column.to_string(), direction != "desc"))
                        .collect();
                }
                "offset" => query.offset = value.parse().unwrap_or(0),
                "limit" => query.limit = value.parse().ok(),
                "or" => {
                    query.any_of = value
                        .trim_start_matches('(')
                        .trim_end_matches(')')
                        .split(',')
                        .filter_map(|condition| condition.split_once('.'))
                        .map(|(column, condition)| (column.to_string(), condition.to_string()))
                        .collect();
                }
                _ => query.filters.push((key.clone(), value.clone())),
            }
        }
        query
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, condition)| matches(row, column, condition))
            && (self.any_of.is_empty()
                || self
                    .any_of
                    .iter()
                    .any(|(column, condition)| matches(row, column, condition)))
    }

    fn sort(&self, rows: &mut [Value]) {
        rows.sort_by(|a, b| {
            self.order
                .iter()
                .map(|(column, ascending)| {
                    let ordering = compare_values(field(a, column), field(b, column));
                    if *ascending { ordering } else { ordering.reverse() }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// Text form of a column value as it would appear in a filter.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Ok(x), Ok(y)) = (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (text(a), text(b)) {
        (Some(a), Some(b)) => compare_text(&a, &b),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn matches(row: &Value, column: &str, condition: &str) -> bool {
    let Some((op, expected)) = condition.split_once('.') else {
        return false;
    };
    let actual = text(field(row, column));
    match op {
        "eq" => actual.is_some_and(|a| compare_text(&a, expected).is_eq()),
        "neq" => actual.is_none_or(|a| compare_text(&a, expected).is_ne()),
        "gte" => actual.is_some_and(|a| compare_text(&a, expected).is_ge()),
        "lte" => actual.is_some_and(|a| compare_text(&a, expected).is_le()),
        "ilike" => actual.is_some_and(|a| ilike(&a, expected)),
        "is" => match expected {
            "null" => actual.is_none(),
            _ => actual.is_some_and(|a| a == expected),
        },
        _ => false,
    }
}

/// Case-insensitive match where `*` stands for any run of characters.
fn ilike(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    let mut parts = pattern.split('*');
    let mut rest = value.as_str();

    if let Some(head) = parts.next() {
        match rest.strip_prefix(head) {
            Some(after) => rest = after,
            None => return false,
        }
    }
    for part in parts.filter(|part| !part.is_empty()) {
        match rest.split_once(part) {
            Some((_, after)) => rest = after,
            None => return false,
        }
    }
    pattern.ends_with('*') || rest.is_empty()
}

/// Column on a child table that refers to `parent`: `orders` -> `order_id`.
fn foreign_key(parent: &str) -> String {
    format!("{}_id", parent.strip_suffix('s').unwrap_or(parent))
}

/// Fill `id`, `created_at` and `updated_at` when the payload leaves them out.
fn with_defaults(row: Value) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    let now = Utc::now().to_rfc3339();
    for (column, value) in [
        ("id", Value::String(Uuid::new_v4().to_string())),
        ("created_at", Value::String(now.clone())),
        ("updated_at", Value::String(now)),
    ] {
        if map.get(column).is_none_or(Value::is_null) {
            map.insert(column.to_string(), value);
        }
    }
    Value::Object(map)
}

impl Store {
    fn table(&self, name: &str) -> &[Value] {
        self.tables.get(name).map_or(&[], Vec::as_slice)
    }

    fn embed(&self, table: &str, row: Value, embeds: &[String]) -> Value {
        let Value::Object(mut map) = row else {
            return row;
        };
        let key = foreign_key(table);
        let id = map.get("id").and_then(text);
        for child in embeds {
            let children: Vec<Value> = self
                .table(child)
                .iter()
                .filter(|c| text(field(c, &key)) == id)
                .cloned()
                .collect();
            map.insert(child.clone(), Value::Array(children));
        }
        Value::Object(map)
    }
}

fn wants_count(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("count=exact"))
}

async fn select_rows(
    State(backend): State<StubBackend>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let query = RowQuery::parse(&params);
    let store = backend.lock();

    let mut rows: Vec<Value> = store
        .table(&table)
        .iter()
        .filter(|row| query.matches(row))
        .cloned()
        .collect();
    query.sort(&mut rows);
    let total = rows.len();

    let page: Vec<Value> = rows
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|row| store.embed(&table, row, &query.embeds))
        .collect();
    let shown = page.len();

    let mut response = Json(Value::Array(page)).into_response();
    if wants_count(&headers) {
        let range = if shown == 0 {
            format!("*/{total}")
        } else {
            format!("{}-{}/{total}", query.offset, query.offset + shown - 1)
        };
        if let Ok(value) = HeaderValue::from_str(&range) {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }
    }
    response
}

async fn insert_rows(
    State(backend): State<StubBackend>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> Response {
    let query = RowQuery::parse(&params);
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(_) => vec![body],
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let mut store = backend.lock();
    let inserted: Vec<Value> = rows.into_iter().map(with_defaults).collect();
    store
        .tables
        .entry(table.clone())
        .or_default()
        .extend(inserted.iter().cloned());

    let created: Vec<Value> = inserted
        .into_iter()
        .map(|row| store.embed(&table, row, &query.embeds))
        .collect();
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn update_rows(
    State(backend): State<StubBackend>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    Json(changes): Json<Map<String, Value>>,
) -> Response {
    let query = RowQuery::parse(&params);
    let mut store = backend.lock();

    let mut updated = Vec::new();
    if let Some(rows) = store.tables.get_mut(&table) {
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            if let Value::Object(map) = row {
                map.extend(changes.clone());
            }
            updated.push(row.clone());
        }
    }

    let updated: Vec<Value> = updated
        .into_iter()
        .map(|row| store.embed(&table, row, &query.embeds))
        .collect();
    Json(Value::Array(updated)).into_response()
}

async fn delete_rows(
    State(backend): State<StubBackend>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
) -> StatusCode {
    let query = RowQuery::parse(&params);
    if let Some(rows) = backend.lock().tables.get_mut(&table) {
        rows.retain(|row| !query.matches(row));
    }
    StatusCode::NO_CONTENT
}

// =============================================================================
// Auth
// =============================================================================

fn auth_error(status: StatusCode, code: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": code, "error_description": description })),
    )
        .into_response()
}

fn user_json(account: &Account) -> Value {
    json!({
        "id": account.id,
        "email": account.email,
        "user_metadata": {},
        "created_at": Utc::now(),
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn token(
    State(backend): State<StubBackend>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut store = backend.lock();
    let account = match params.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
            let password = body
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or_default();
            store
                .accounts
                .iter()
                .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password)
                .cloned()
        }
        Some("refresh_token") => {
            let refresh = body
                .get("refresh_token")
                .and_then(Value::as_str)
                .unwrap_or_default();
            store
                .tokens
                .get(refresh)
                .and_then(|id| store.accounts.iter().find(|a| a.id == *id))
                .cloned()
        }
        _ => return auth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", "Unsupported grant"),
    };
    let Some(account) = account else {
        return auth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "Invalid login credentials",
        );
    };

    let access_token = format!("access-{}", Uuid::new_v4().simple());
    let refresh_token = format!("refresh-{}", Uuid::new_v4().simple());
    store.tokens.insert(access_token.clone(), account.id);
    store.tokens.insert(refresh_token.clone(), account.id);

    Json(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": 3600,
        "expires_at": Utc::now().timestamp() + 3600,
        "user": user_json(&account),
    }))
    .into_response()
}

async fn logout(State(backend): State<StubBackend>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer(&headers) {
        backend.lock().tokens.remove(&token);
    }
    StatusCode::NO_CONTENT
}

// =============================================================================
// Storage
// =============================================================================

async fn upload(
    State(backend): State<StubBackend>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let key = format!("{bucket}/{path}");
    let mut store = backend.lock();
    if store.objects.contains_key(&key) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Duplicate", "message": "The resource already exists" })),
        )
            .into_response();
    }
    store.objects.insert(key.clone(), body.to_vec());
    Json(json!({ "Key": key })).into_response()
}
