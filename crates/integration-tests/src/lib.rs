//! Integration tests for Pexpress.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pexpress-integration-tests
//! ```
//!
//! Nothing external is needed: each test starts a [`FakeSanity`] server and
//! the real stock service router on ephemeral ports, then talks to the
//! service over HTTP.
//!
//! # Fake Sanity
//!
//! The fake implements just enough of the Content Lake API for the service:
//!
//! - `POST /v<version>/data/query/<dataset>` answers the three queries the
//!   service sends, told apart by their parameters (`rowKey` for a row
//!   snapshot, `ids` for products by ID, none for the catalog)
//! - `POST /v<version>/data/mutate/<dataset>` applies `dec` patches as one
//!   transaction and rejects stale `ifRevisionID` guards with `409`
//! - every write gets a new `_rev`
//! - requests without the expected bearer token get `401`

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use pexpress_api::config::{ApiConfig, EnvLookup};
use pexpress_api::sanity::mutations::parse_stock_path;
use pexpress_api::state::AppState;
use serde_json::{Value, json};

/// Write token shared by the fake and the service under test.
pub const TOKEN: &str = "skQ7vN3pX9aLmR2tY8wB4cE6hJ1kD5fG0sZ";

/// Project ID used in test configuration.
pub const PROJECT_ID: &str = "pexpress-test";

/// Dataset served by the fake.
pub const DATASET: &str = "test";

/// Origin the service is configured to allow.
pub const ALLOWED_ORIGIN: &str = "https://pedidos.pexpress.test";

// =============================================================================
// Fake Sanity
// =============================================================================

/// In-memory Sanity dataset with a Content Lake-shaped HTTP API.
///
/// Cheap to clone; clones share the same dataset.
#[derive(Clone, Default)]
pub struct FakeSanity {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    products: BTreeMap<String, FakeProduct>,
    next_rev: u64,
    next_transaction: u64,
    concurrent_writes: VecDeque<(String, String, i64)>,
    fail_queries: bool,
    queries: usize,
    mutate_requests: usize,
    last_mutations: Vec<Value>,
}

struct FakeProduct {
    name: String,
    rev: String,
    rows: Vec<FakeRow>,
}

struct FakeRow {
    key: String,
    flavor: String,
    stock: Option<Value>,
}

impl FakeRow {
    fn to_json(&self) -> Value {
        let mut row = json!({ "_key": self.key, "flavor": self.flavor });
        if let (Some(stock), Some(map)) = (&self.stock, row.as_object_mut()) {
            map.insert("stock".to_string(), stock.clone());
        }
        row
    }
}

impl FakeProduct {
    fn to_json(&self, id: &str) -> Value {
        json!({
            "_id": id,
            "_rev": self.rev,
            "name": self.name,
            "rows": self.rows.iter().map(FakeRow::to_json).collect::<Vec<_>>(),
        })
    }

    fn snapshot(&self, id: &str, row_key: &str) -> Value {
        json!({
            "_id": id,
            "_rev": self.rev,
            "name": self.name,
            "row": self
                .rows
                .iter()
                .find(|row| row.key == row_key)
                .map_or(Value::Null, FakeRow::to_json),
        })
    }
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_rev += 1;
        format!("rev{:04}", self.next_rev)
    }

    /// Apply `dec` operations to one document and give it a new revision.
    fn apply(&mut self, id: &str, decrements: &[(String, i64)]) {
        let rev = self.bump();
        if let Some(product) = self.products.get_mut(id) {
            product.rev = rev;
            for (key, units) in decrements {
                if let Some(row) = product.rows.iter_mut().find(|row| &row.key == key) {
                    let current = row.stock.as_ref().and_then(Value::as_i64).unwrap_or(0);
                    row.stock = Some(json!(current - units));
                }
            }
        }
    }
}

impl FakeSanity {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add a product. Rows are `(key, flavor, stock)`; a `Value::Null`
    /// stock is stored as an absent field.
    #[must_use]
    pub fn with_product(self, id: &str, name: &str, rows: &[(&str, &str, Value)]) -> Self {
        {
            let mut state = self.lock();
            let rev = state.bump();
            state.products.insert(
                id.to_string(),
                FakeProduct {
                    name: name.to_string(),
                    rev,
                    rows: rows
                        .iter()
                        .map(|(key, flavor, stock)| FakeRow {
                            key: (*key).to_string(),
                            flavor: (*flavor).to_string(),
                            stock: (!stock.is_null()).then(|| stock.clone()),
                        })
                        .collect(),
                },
            );
        }
        self
    }

    /// Stored stock of a row, exactly as held in the dataset.
    #[must_use]
    pub fn stock(&self, id: &str, key: &str) -> Option<Value> {
        self.lock()
            .products
            .get(id)?
            .rows
            .iter()
            .find(|row| row.key == key)?
            .stock
            .clone()
    }

    /// Current revision of a product.
    #[must_use]
    pub fn revision(&self, id: &str) -> Option<String> {
        self.lock().products.get(id).map(|p| p.rev.clone())
    }

    /// Simulate another clerk taking `units` from a row right before the
    /// next mutate request is handled.
    pub fn queue_concurrent_write(&self, id: &str, key: &str, units: i64) {
        self.lock()
            .concurrent_writes
            .push_back((id.to_string(), key.to_string(), units));
    }

    /// Make every query fail with `500`.
    pub fn fail_queries(&self) {
        self.lock().fail_queries = true;
    }

    /// Number of query requests received.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.lock().queries
    }

    /// Number of mutate requests received, including rejected ones.
    #[must_use]
    pub fn mutate_requests(&self) -> usize {
        self.lock().mutate_requests
    }

    /// Mutations of the most recent mutate request.
    #[must_use]
    pub fn last_mutations(&self) -> Vec<Value> {
        self.lock().last_mutations.clone()
    }

    /// Serve the fake on an ephemeral port and return its base URL.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn serve(&self) -> String {
        let router = Router::new()
            .route("/{version}/data/query/{dataset}", post(query))
            .route("/{version}/data/mutate/{dataset}", post(mutate))
            .with_state(self.clone());
        format!("http://{}", spawn(router).await)
    }
}

fn sanity_error(status: StatusCode, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "description": description, "type": "mutationError" } })),
    )
        .into_response()
}

fn check_request(headers: &HeaderMap, version: &str, dataset: &str) -> Result<(), Response> {
    let expected = format!("Bearer {TOKEN}");
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized - Session not found" })),
        )
            .into_response());
    }
    if !version.starts_with('v') || dataset != DATASET {
        return Err(sanity_error(StatusCode::NOT_FOUND, "Dataset not found"));
    }
    Ok(())
}

async fn query(
    State(fake): State<FakeSanity>,
    Path((version, dataset)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = check_request(&headers, &version, &dataset) {
        return response;
    }

    let mut state = fake.lock();
    state.queries += 1;
    if state.fail_queries {
        return sanity_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
    }

    let params = body.get("params").cloned().unwrap_or(Value::Null);
    let result = if let Some(row_key) = params.get("rowKey").and_then(Value::as_str) {
        let id = params
            .get("productId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        state
            .products
            .get(id)
            .map_or(Value::Null, |p| p.snapshot(id, row_key))
    } else if let Some(ids) = params.get("ids").and_then(Value::as_array) {
        Value::Array(
            state
                .products
                .iter()
                .filter(|(id, _)| ids.iter().any(|wanted| wanted.as_str() == Some(id.as_str())))
                .map(|(id, p)| p.to_json(id))
                .collect(),
        )
    } else {
        let mut catalog: Vec<(&String, &FakeProduct)> = state.products.iter().collect();
        catalog.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        Value::Array(catalog.into_iter().map(|(id, p)| p.to_json(id)).collect())
    };

    Json(json!({ "ms": 1, "result": result })).into_response()
}

async fn mutate(
    State(fake): State<FakeSanity>,
    Path((version, dataset)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = check_request(&headers, &version, &dataset) {
        return response;
    }

    let mut state = fake.lock();
    state.mutate_requests += 1;
    let mutations = body
        .get("mutations")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    state.last_mutations.clone_from(&mutations);

    if let Some((id, key, units)) = state.concurrent_writes.pop_front() {
        state.apply(&id, &[(key, units)]);
    }

    // Validate the whole transaction before touching anything.
    let mut planned: Vec<(String, Vec<(String, i64)>)> = Vec::new();
    for mutation in &mutations {
        let Some(patch) = mutation.get("patch") else {
            return sanity_error(StatusCode::BAD_REQUEST, "Only patch mutations are supported");
        };
        let id = patch.get("id").and_then(Value::as_str).unwrap_or_default();
        let Some(product) = state.products.get(id) else {
            return sanity_error(
                StatusCode::NOT_FOUND,
                &format!("The document with ID \"{id}\" was not found"),
            );
        };
        if let Some(guard) = patch.get("ifRevisionID").and_then(Value::as_str) {
            if guard != product.rev {
                return sanity_error(
                    StatusCode::CONFLICT,
                    &format!(
                        "The mutation(s) failed: Document \"{id}\" has unexpected revision ID (\"{}\"), expected \"{guard}\"",
                        product.rev
                    ),
                );
            }
        }

        let mut decrements = Vec::new();
        if let Some(dec) = patch.get("dec").and_then(Value::as_object) {
            for (path, units) in dec {
                let (Some(key), Some(units)) = (parse_stock_path(path), units.as_i64()) else {
                    return sanity_error(StatusCode::BAD_REQUEST, &format!("Invalid path {path}"));
                };
                decrements.push((key.as_str().to_string(), units));
            }
        }
        planned.push((id.to_string(), decrements));
    }

    for (id, decrements) in &planned {
        state.apply(id, decrements);
    }

    state.next_transaction += 1;
    let results: Vec<Value> = planned
        .iter()
        .map(|(id, _)| json!({ "id": id, "operation": "update" }))
        .collect();
    Json(json!({
        "transactionId": format!("tx{}", state.next_transaction),
        "results": results,
    }))
    .into_response()
}

// =============================================================================
// Service under test
// =============================================================================

/// The stock service running against a [`FakeSanity`].
pub struct TestApp {
    /// Base URL of the stock service.
    pub base_url: String,
    /// HTTP client for talking to the service.
    pub client: reqwest::Client,
    /// The dataset behind the service.
    pub sanity: FakeSanity,
}

impl TestApp {
    /// Start the fake and the service.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is rejected or a listener cannot be
    /// bound.
    pub async fn spawn(sanity: FakeSanity) -> Self {
        let sanity_url = sanity.serve().await;
        let config = ApiConfig::from_lookup(&EnvLookup::from_pairs([
            ("SANITY_PROJECT_ID", PROJECT_ID),
            ("SANITY_DATASET", DATASET),
            ("SANITY_WRITE_TOKEN", TOKEN),
            ("SANITY_API_HOST", sanity_url.as_str()),
            ("SANITY_TIMEOUT_SECS", "5"),
            ("CORS_ALLOWED_ORIGIN", ALLOWED_ORIGIN),
        ]))
        .expect("test configuration should be valid");

        let state = AppState::new(&config).expect("Sanity client should build");
        let addr = spawn(pexpress_api::app(state)).await;

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            sanity,
        }
    }

    /// Absolute URL of a service path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /update-stock` with a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn update_stock(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/update-stock"))
            .json(body)
            .send()
            .await
            .expect("request should be sent")
    }

    /// `POST /reservar-lote` with a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn reserve_batch(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/reservar-lote"))
            .json(body)
            .send()
            .await
            .expect("request should be sent")
    }
}

/// Read a response as status plus JSON body.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn status_and_json(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.expect("response body should be JSON");
    (status, body)
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should be available");
    let addr = listener
        .local_addr()
        .expect("listener should have an address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
