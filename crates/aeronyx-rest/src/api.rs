//! Typed AeroNyx endpoints.

use crate::client::{RequestOptions, RestClient};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateNodeRequest, NodeCatalogItem, NodeDetailedStatus, NodesOverview, PerformanceHistory,
    RegistrationCode,
};
use aeronyx_auth::{BoxFuture, Challenge, ChallengeProvider};
use aeronyx_core::{Credential, ErrorKind};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound of the performance history window.
pub const MAX_HISTORY_HOURS: u32 = 168;

const SIGNATURE_MESSAGE: &str = "/generate-signature-message/";
const NODES: &str = "/nodes/";
const REGISTRATION_CODE: &str = "/nodes/generate-registration-code/";
const NODES_OVERVIEW: &str = "/user/nodes-overview/";
const NODE_DETAILED_STATUS: &str = "/user/node-detailed-status/";
const NODE_PERFORMANCE_HISTORY: &str = "/user/node-performance-history/";
const NODE_TYPES: &str = "/node-types/";
const NODE_RESOURCES: &str = "/node-resources/";

/// AeroNyx API on top of `RestClient`.
#[derive(Clone)]
pub struct AeronyxApi {
    client: RestClient,
}

impl AeronyxApi {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Request a challenge to be signed by `wallet_address`.
    pub async fn generate_signature_message(&self, wallet_address: &str) -> ApiResult<Challenge> {
        let value = self
            .client
            .post(
                SIGNATURE_MESSAGE,
                json!({ "wallet_address": wallet_address }),
                RequestOptions::idempotent(),
            )
            .await?;
        decode(value)
    }

    /// Register a new node. Not retried.
    pub async fn create_node(
        &self,
        credential: &Credential,
        request: &CreateNodeRequest,
    ) -> ApiResult<Value> {
        if request.name.trim().is_empty() {
            return Err(ApiError::validation("node name must not be empty"));
        }
        let mut body = to_object(request)?;
        body.insert("wallet_address".into(), json!(credential.wallet_address));
        body.insert("wallet_type".into(), json!(credential.wallet_type));
        body.insert("signature".into(), json!(credential.signature));
        body.insert("signature_message".into(), json!(credential.message));

        info!(name = %request.name, "Creating node");
        let value = self
            .client
            .post(NODES, Value::Object(body), RequestOptions::default())
            .await?;
        self.forget_overview(&credential.wallet_address);
        Ok(value)
    }

    /// Issue a registration code for a created node. Not retried.
    pub async fn generate_registration_code(
        &self,
        credential: &Credential,
        node_id: i64,
        blockchain_network_id: i64,
    ) -> ApiResult<RegistrationCode> {
        let mut body = auth_body(credential);
        body.insert("node_id".into(), json!(node_id));
        body.insert("blockchain_network_id".into(), json!(blockchain_network_id));

        let value = self
            .client
            .post(REGISTRATION_CODE, Value::Object(body), RequestOptions::default())
            .await?;
        decode(value)
    }

    /// All nodes of the wallet, grouped by status.
    pub async fn nodes_overview(
        &self,
        credential: &Credential,
        force_refresh: bool,
    ) -> ApiResult<NodesOverview> {
        let ttl = Duration::from_secs(self.client.config().cache_ttl.overview_secs);
        let value = self
            .client
            .post(
                NODES_OVERVIEW,
                Value::Object(auth_body(credential)),
                RequestOptions::cached(ttl).force_refresh(force_refresh),
            )
            .await?;
        decode(value)
    }

    pub async fn node_detailed_status(
        &self,
        credential: &Credential,
        reference_code: &str,
        force_refresh: bool,
    ) -> ApiResult<NodeDetailedStatus> {
        let reference_code = require_reference(reference_code)?;
        let mut body = auth_body(credential);
        body.insert("reference_code".into(), json!(reference_code));

        let ttl = Duration::from_secs(self.client.config().cache_ttl.detailed_status_secs);
        let value = self
            .client
            .post(
                NODE_DETAILED_STATUS,
                Value::Object(body),
                RequestOptions::cached(ttl).force_refresh(force_refresh),
            )
            .await?;
        decode(value)
    }

    /// Performance samples for the last `hours` (1..=168).
    pub async fn node_performance_history(
        &self,
        credential: &Credential,
        reference_code: &str,
        hours: u32,
    ) -> ApiResult<PerformanceHistory> {
        if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
            return Err(ApiError::validation(format!(
                "hours must be between 1 and {MAX_HISTORY_HOURS}, got {hours}"
            )));
        }
        let reference_code = require_reference(reference_code)?;
        let mut body = auth_body(credential);
        body.insert("reference_code".into(), json!(reference_code));
        body.insert("hours".into(), json!(hours));

        let ttl = Duration::from_secs(self.client.config().cache_ttl.history_secs);
        let value = self
            .client
            .post(
                NODE_PERFORMANCE_HISTORY,
                Value::Object(body),
                RequestOptions::cached(ttl),
            )
            .await?;
        decode(value)
    }

    pub async fn node_types(&self) -> ApiResult<Vec<NodeCatalogItem>> {
        let ttl = Duration::from_secs(self.client.config().cache_ttl.catalog_secs);
        let value = self
            .client
            .get(NODE_TYPES, RequestOptions::cached(ttl))
            .await?;
        decode(value)
    }

    pub async fn node_resources(&self) -> ApiResult<Vec<NodeCatalogItem>> {
        let ttl = Duration::from_secs(self.client.config().cache_ttl.catalog_secs);
        let value = self
            .client
            .get(NODE_RESOURCES, RequestOptions::cached(ttl))
            .await?;
        decode(value)
    }

    /// Drop every cached response issued for a wallet.
    pub fn forget_wallet(&self, wallet_address: &str) -> usize {
        let needle = format!("wallet_address={}", wallet_address.to_ascii_lowercase());
        let removed = self
            .client
            .invalidate_cached(|key| key.to_ascii_lowercase().contains(&needle));
        debug!(wallet = %wallet_address, removed, "Dropped cached responses");
        removed
    }

    fn forget_overview(&self, wallet_address: &str) {
        let needle = format!("wallet_address={}", wallet_address.to_ascii_lowercase());
        self.client.invalidate_cached(|key| {
            key.starts_with(NODES_OVERVIEW) && key.to_ascii_lowercase().contains(&needle)
        });
    }
}

impl ChallengeProvider for AeronyxApi {
    fn fetch_challenge(&self, wallet_address: &str) -> BoxFuture<'_, Result<Challenge, String>> {
        let wallet_address = wallet_address.to_string();
        Box::pin(async move {
            self.generate_signature_message(&wallet_address)
                .await
                .map_err(|e| e.to_string())
        })
    }
}

/// `{wallet_address, signature, message, wallet_type}`
fn auth_body(credential: &Credential) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("wallet_address".into(), json!(credential.wallet_address));
    body.insert("signature".into(), json!(credential.signature));
    body.insert("message".into(), json!(credential.message));
    body.insert("wallet_type".into(), json!(credential.wallet_type));
    body
}

fn require_reference(reference_code: &str) -> ApiResult<&str> {
    let trimmed = reference_code.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("reference_code must not be empty"));
    }
    Ok(trimmed)
}

fn to_object<T: serde::Serialize>(value: &T) -> ApiResult<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::validation("request must serialize to an object")),
        Err(e) => Err(ApiError::validation(e.to_string())),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::new(ErrorKind::Server, format!("Malformed response: {e}")))
}
