//! # REST API
//!
//! Builds the axum router that exposes every hosted party's HTTP interface.
//! All endpoints share application state through axum's `State` extractor;
//! the `:party` path segment picks the node a request runs against.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Description                          |
//! |--------|---------------------------------------|--------------------------------------|
//! | GET    | `/health`                             | Liveness check                       |
//! | GET    | `/api/:party/me`                      | The party's legal identity           |
//! | GET    | `/api/:party/peers`                   | Other parties on the network map     |
//! | GET    | `/api/:party/obligations`             | Unconsumed obligations in the vault  |
//! | GET    | `/api/:party/cash`                    | Unconsumed cash in the vault         |
//! | GET    | `/api/:party/cash-balances`           | Owned cash per currency              |
//! | GET    | `/api/:party/owed-per-currency`       | Obligations where it is not lender   |
//! | POST   | `/api/:party/issue-obligation`        | Borrow from a lender                 |
//! | POST   | `/api/:party/transfer-obligation`     | Hand an obligation to a new lender   |
//! | POST   | `/api/:party/settle-obligation`       | Pay an obligation with cash          |
//! | POST   | `/api/:party/self-issue-cash`         | Issue cash to oneself                |
//!
//! Amounts in request bodies are whole currency units; responses report
//! quantities in hundredths.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use obligation_flows::{ErrorCategory, FlowError, FlowNode};
use obligation_protocol::ledger::{AbstractParty, Amount, Currency, Party, UniqueIdentifier};
use obligation_protocol::services::NetworkMap;
use obligation_protocol::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::SharedMetrics;

/// Hundredths per whole unit of every currency.
pub const UNITS_PER_WHOLE: u64 = 100;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Hosted nodes by legal name.
    pub nodes: Arc<HashMap<String, FlowNode>>,
    pub network_map: Arc<dyn NetworkMap>,
    pub metrics: SharedMetrics,
}

impl AppState {
    fn node(&self, name: &str) -> Result<&FlowNode, ApiError> {
        self.nodes
            .get(name)
            .ok_or_else(|| ApiError::NotFound(format!("no node named {name}")))
    }

    fn party(&self, name: &str) -> Result<Party, ApiError> {
        self.network_map
            .party_from_name(name)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown party {name}")))
    }

    async fn run_flow<F>(&self, flow: &'static str, fut: F) -> Result<SignedTransaction, ApiError>
    where
        F: Future<Output = Result<SignedTransaction, FlowError>>,
    {
        let started = self.metrics.started(flow);
        let outcome = fut.await;
        self.metrics.finished(flow, started, &outcome);
        Ok(outcome?)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/:party/me", get(me_handler))
        .route("/api/:party/peers", get(peers_handler))
        .route("/api/:party/obligations", get(obligations_handler))
        .route("/api/:party/cash", get(cash_handler))
        .route("/api/:party/cash-balances", get(cash_balances_handler))
        .route("/api/:party/owed-per-currency", get(owed_handler))
        .route("/api/:party/issue-obligation", post(issue_handler))
        .route("/api/:party/transfer-obligation", post(transfer_handler))
        .route("/api/:party/settle-obligation", post(settle_handler))
        .route("/api/:party/self-issue-cash", post(self_issue_cash_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Flow(FlowError),
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        ApiError::Flow(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Flow(e) => {
                let status = match e.category() {
                    ErrorCategory::RuleViolation
                    | ErrorCategory::Authorization
                    | ErrorCategory::Resource => StatusCode::BAD_REQUEST,
                    ErrorCategory::OrderingConflict => StatusCode::CONFLICT,
                    ErrorCategory::Coordination => StatusCode::BAD_GATEWAY,
                };
                tracing::warn!(category = %e.category(), error = %e, "flow failed");
                (status, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn amount(whole: u64, currency: &str) -> Result<Amount, ApiError> {
    let currency: Currency = currency
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let quantity = whole
        .checked_mul(UNITS_PER_WHOLE)
        .ok_or_else(|| ApiError::BadRequest(format!("amount {whole} too large")))?;
    Ok(Amount::new(quantity, currency))
}

fn linear_id(raw: &str) -> Result<UniqueIdentifier, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("bad obligation id {raw}: {e}")))
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub amount: u64,
    pub currency: String,
    pub lender: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub id: String,
    pub new_lender: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub id: String,
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CashRequest {
    pub amount: u64,
    pub currency: String,
}

/// Returned by every flow endpoint on success.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlowResponse {
    pub tx_id: String,
    /// Set by `issue-obligation`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linear_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartyResponse {
    pub name: String,
    pub key: String,
}

impl From<&Party> for PartyResponse {
    fn from(p: &Party) -> Self {
        Self {
            name: p.name.clone(),
            key: p.owning_key.to_base58(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObligationResponse {
    pub linear_id: String,
    pub lender: String,
    pub borrower: String,
    pub currency: String,
    pub amount: u64,
    pub paid: u64,
    pub display: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CashResponse {
    pub issuer: String,
    pub owner: String,
    pub currency: String,
    pub amount: u64,
}

/// Legal name when this node can resolve it, base58 key otherwise.
fn display_name(node: &FlowNode, party: &AbstractParty) -> String {
    node.hub()
        .well_known(party)
        .map(|p| p.name)
        .unwrap_or_else(|_| party.to_string())
}

fn per_currency(amounts: BTreeMap<Currency, Amount>) -> BTreeMap<String, u64> {
    amounts
        .into_iter()
        .map(|(currency, amount)| (currency.to_string(), amount.quantity))
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn me_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<PartyResponse>, ApiError> {
    let node = state.node(&party)?;
    Ok(Json(node.me().into()))
}

/// Everyone on the network map except the caller and the notaries.
async fn peers_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<Vec<PartyResponse>>, ApiError> {
    let node = state.node(&party)?;
    let notaries = state.network_map.notary_identities();
    let peers = state
        .network_map
        .all_parties()
        .iter()
        .filter(|p| *p != node.me() && !notaries.contains(p))
        .map(PartyResponse::from)
        .collect();
    Ok(Json(peers))
}

async fn obligations_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<Vec<ObligationResponse>>, ApiError> {
    let node = state.node(&party)?;
    let records = node.obligations().await?;
    let obligations = records
        .iter()
        .filter_map(|r| r.state.as_obligation())
        .map(|ob| ObligationResponse {
            linear_id: ob.linear_id.to_string(),
            lender: display_name(node, &ob.lender),
            borrower: display_name(node, &ob.borrower),
            currency: ob.amount.currency.to_string(),
            amount: ob.amount.quantity,
            paid: ob.paid.quantity,
            display: ob.to_string(),
        })
        .collect();
    Ok(Json(obligations))
}

async fn cash_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<Vec<CashResponse>>, ApiError> {
    let node = state.node(&party)?;
    let records = node.cash().await?;
    let cash = records
        .iter()
        .filter_map(|r| r.state.as_cash())
        .map(|c| CashResponse {
            issuer: display_name(node, &c.issuer.party),
            owner: display_name(node, &c.owner),
            currency: c.amount.currency.to_string(),
            amount: c.amount.quantity,
        })
        .collect();
    Ok(Json(cash))
}

async fn cash_balances_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<BTreeMap<String, u64>>, ApiError> {
    let node = state.node(&party)?;
    Ok(Json(per_currency(node.cash_balances().await?)))
}

async fn owed_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
) -> Result<Json<BTreeMap<String, u64>>, ApiError> {
    let node = state.node(&party)?;
    Ok(Json(per_currency(node.owed_per_currency().await?)))
}

async fn issue_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
    Json(req): Json<IssueRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let node = state.node(&party)?;
    let amount = amount(req.amount, &req.currency)?;
    let lender = state.party(&req.lender)?;

    let stx = state
        .run_flow("issue", node.issue(amount, lender, req.anonymous))
        .await?;
    let linear_id = stx
        .tx
        .outputs()
        .iter()
        .find_map(|s| s.as_obligation())
        .map(|ob| ob.linear_id.to_string());
    Ok((
        StatusCode::CREATED,
        Json(FlowResponse {
            tx_id: stx.id().to_string(),
            linear_id,
        }),
    ))
}

async fn transfer_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
    Json(req): Json<TransferRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let node = state.node(&party)?;
    let id = linear_id(&req.id)?;
    let new_lender = state.party(&req.new_lender)?;

    let stx = state
        .run_flow("transfer", node.transfer(id, new_lender, req.anonymous))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FlowResponse {
            tx_id: stx.id().to_string(),
            linear_id: None,
        }),
    ))
}

async fn settle_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
    Json(req): Json<SettleRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let node = state.node(&party)?;
    let id = linear_id(&req.id)?;
    let amount = amount(req.amount, &req.currency)?;

    let stx = state.run_flow("settle", node.settle(id, amount)).await?;
    Ok((
        StatusCode::CREATED,
        Json(FlowResponse {
            tx_id: stx.id().to_string(),
            linear_id: None,
        }),
    ))
}

async fn self_issue_cash_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
    Json(req): Json<CashRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let node = state.node(&party)?;
    let amount = amount(req.amount, &req.currency)?;

    let stx = state
        .run_flow("self_issue_cash", node.self_issue_cash(amount))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FlowResponse {
            tx_id: stx.id().to_string(),
            linear_id: None,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use obligation_flows::SimulatedNetwork;
    use obligation_protocol::config::FlowConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// A notary plus PartyA and PartyB, all served by one router.
    fn test_router() -> (Router, AppState) {
        let net = SimulatedNetwork::new(FlowConfig::default());
        net.add_notary("Notary");
        let nodes: HashMap<String, FlowNode> = ["PartyA", "PartyB"]
            .into_iter()
            .map(|name| (name.to_string(), net.add_node(name)))
            .collect();
        let state = AppState {
            nodes: Arc::new(nodes),
            network_map: net.network_map(),
            metrics: Arc::new(crate::metrics::NodeMetrics::new().unwrap()),
        };
        (create_router(state.clone()), state)
    }

    /// Sends a GET request and returns the (status, body).
    async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Sends a POST request with JSON body and returns (status, body).
    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (router, _) = test_router();
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_node_is_not_found() {
        let (router, _) = test_router();
        let (status, body) = get(&router, "/api/Mallory/me").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Mallory"));
    }

    #[tokio::test]
    async fn me_and_peers() {
        let (router, _) = test_router();
        let (status, me) = get(&router, "/api/PartyA/me").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "PartyA");

        let (_, peers) = get(&router, "/api/PartyA/peers").await;
        let names: Vec<&str> = peers
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["PartyB"]);
    }

    #[tokio::test]
    async fn issue_and_settle_over_http() {
        let (router, state) = test_router();

        let (status, issued) = post_json(
            &router,
            "/api/PartyA/issue-obligation",
            json!({ "amount": 50, "currency": "USD", "lender": "PartyB" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = issued["linear_id"].as_str().unwrap().to_string();

        let (_, obligations) = get(&router, "/api/PartyB/obligations").await;
        assert_eq!(obligations[0]["linear_id"], id.as_str());
        assert_eq!(obligations[0]["lender"], "PartyB");
        assert_eq!(obligations[0]["borrower"], "PartyA");
        assert_eq!(obligations[0]["amount"], 5000);

        let (_, owed) = get(&router, "/api/PartyA/owed-per-currency").await;
        assert_eq!(owed, json!({ "USD": 5000 }));
        let (_, owed) = get(&router, "/api/PartyB/owed-per-currency").await;
        assert_eq!(owed, json!({}));

        let (status, _) = post_json(
            &router,
            "/api/PartyA/self-issue-cash",
            json!({ "amount": 80, "currency": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, balances) = get(&router, "/api/PartyA/cash-balances").await;
        assert_eq!(balances, json!({ "USD": 8000 }));

        let (status, _) = post_json(
            &router,
            "/api/PartyA/settle-obligation",
            json!({ "id": id, "amount": 50, "currency": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, obligations) = get(&router, "/api/PartyB/obligations").await;
        assert_eq!(obligations, json!([]));
        let (_, balances) = get(&router, "/api/PartyB/cash-balances").await;
        assert_eq!(balances, json!({ "USD": 5000 }));
        let (_, cash) = get(&router, "/api/PartyB/cash").await;
        assert_eq!(cash[0]["issuer"], "PartyA");

        assert_eq!(
            state
                .metrics
                .flows_completed_total
                .with_label_values(&["settle"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn bad_input_is_a_bad_request() {
        let (router, _) = test_router();

        let (status, _) = post_json(
            &router,
            "/api/PartyA/issue-obligation",
            json!({ "amount": 50, "currency": "US$", "lender": "PartyB" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            &router,
            "/api/PartyA/issue-obligation",
            json!({ "amount": 50, "currency": "USD", "lender": "Nobody" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Nobody"));

        let (status, _) = post_json(
            &router,
            "/api/PartyA/settle-obligation",
            json!({ "id": "not-a-uuid", "amount": 1, "currency": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn flow_errors_map_to_status_codes() {
        let (router, state) = test_router();

        let (status, _) = post_json(
            &router,
            "/api/PartyA/issue-obligation",
            json!({ "amount": 50, "currency": "USD", "lender": "PartyA" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            &router,
            "/api/PartyA/settle-obligation",
            json!({ "id": UniqueIdentifier::new().to_string(), "amount": 1, "currency": "USD" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("no unconsumed obligation"));

        assert_eq!(
            state
                .metrics
                .flows_failed_total
                .with_label_values(&["settle", "resource"])
                .get(),
            1
        );
    }
}
