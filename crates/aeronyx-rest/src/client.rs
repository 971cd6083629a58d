//! HTTP transport with retry, circuit breaker, cache and de-duplication.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::RestConfig;
use crate::error::{ApiError, ApiResult};
use crate::retry::compute_delay;
use aeronyx_auth::BoxFuture;
use aeronyx_cache::CacheStore;
use aeronyx_core::ErrorKind;
use aeronyx_telemetry::Metrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{FutureExt, Shared};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Cache namespace holding REST responses.
pub const RESPONSE_NAMESPACE: &str = "api";

/// Body keys that carry credential material and never take part in a cache key.
const CREDENTIAL_PARAMS: [&str; 3] = ["signature", "message", "signature_message"];

/// Per-request behavior.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Safe to repeat: enables retry and de-duplication. Implied for GET.
    pub idempotent: bool,
    /// Cache successful responses for this long.
    pub cache_ttl: Option<Duration>,
    /// Skip the cache read; the response still refreshes the entry.
    pub force_refresh: bool,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn idempotent() -> Self {
        Self {
            idempotent: true,
            ..Self::default()
        }
    }

    pub fn cached(ttl: Duration) -> Self {
        Self {
            idempotent: true,
            cache_ttl: Some(ttl),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// `endpoint?k1=v1&k2=v2` with the body's top-level keys sorted and
/// credential material left out.
pub fn cache_key(path: &str, body: Option<&Value>) -> String {
    let mut params: Vec<String> = match body {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(k, _)| !CREDENTIAL_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect(),
        _ => Vec::new(),
    };

    if params.is_empty() {
        return path.to_string();
    }
    params.sort();
    format!("{path}?{}", params.join("&"))
}

type SharedResponse = Shared<BoxFuture<'static, ApiResult<Value>>>;

struct Inner {
    http: Client,
    base_url: String,
    config: RestConfig,
    breaker: CircuitBreaker,
    cache: Arc<CacheStore>,
    in_flight: DashMap<String, SharedResponse>,
}

/// REST client. Cheap to clone; clones share breaker, cache and in-flight map.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl RestClient {
    pub fn new(config: RestConfig, cache: Arc<CacheStore>) -> ApiResult<Self> {
        let http = Client::builder().build().map_err(|e| {
            ApiError::new(
                ErrorKind::Network,
                format!("Failed to create HTTP client: {e}"),
            )
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.base_url(),
                breaker: CircuitBreaker::new(config.breaker.clone()),
                config,
                cache,
                in_flight: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.inner.cache
    }

    /// Drop cached responses whose key matches `predicate`.
    pub fn invalidate_cached<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.inner.cache.delete_where(RESPONSE_NAMESPACE, predicate)
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::POST, path, Some(body), options).await
    }

    /// Perform a request and unwrap the `{success, data, message, code}`
    /// envelope.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        let key = cache_key(path, body.as_ref());

        if options.cache_ttl.is_some() && !options.force_refresh {
            if let Some(value) = self.inner.cache.get(RESPONSE_NAMESPACE, &key) {
                trace!(key = %key, "Response cache hit");
                Metrics::rest_cache("hit");
                return Ok(value);
            }
            Metrics::rest_cache("miss");
        }

        let shareable = options.idempotent || method == Method::GET;
        if !shareable {
            return self.inner.execute(method, path, body, &options).await;
        }

        let shared = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(key = %key, "Joining in-flight request");
                Metrics::rest_cache("shared");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let path = path.to_string();
                let task_key = key.clone();
                let request: BoxFuture<'static, ApiResult<Value>> = Box::pin(async move {
                    let result = inner.execute(method, &path, body, &options).await;
                    // Cache before releasing the slot so a late caller finds it.
                    if let (Ok(value), Some(ttl)) = (&result, options.cache_ttl) {
                        inner
                            .cache
                            .set(RESPONSE_NAMESPACE, &task_key, value.clone(), Some(ttl));
                    }
                    inner.in_flight.remove(&task_key);
                    result
                });
                let shared = request.shared();
                slot.insert(shared.clone());
                shared
            }
        };

        shared.await
    }
}

impl Inner {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        let retry_allowed = options.idempotent || method == Method::GET;
        let max_attempts = if retry_allowed {
            self.config.retry.max_retries.saturating_add(1)
        } else {
            1
        };
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        let mut attempt = 0;
        loop {
            attempt += 1;

            if !self.breaker.try_acquire() {
                warn!(path, "Circuit open, failing fast");
                Metrics::rest_request(path, "circuit_open");
                return Err(ApiError::circuit_open());
            }

            let started = Instant::now();
            let result = self.send_once(&method, path, body.as_ref(), timeout).await;
            Metrics::rest_latency(path, started.elapsed().as_secs_f64() * 1000.0);

            match &result {
                Ok(_) => self.breaker.record_success(),
                Err(e) if e.is_retryable() => self.breaker.record_failure(),
                Err(_) => self.breaker.record_non_transient(),
            }

            match result {
                Ok(value) => {
                    Metrics::rest_request(path, "ok");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = compute_delay(&self.config.retry, attempt);
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    Metrics::rest_retry(path);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(path, attempt, error = %e, "Request failed");
                    Metrics::rest_request(path, &e.kind.to_string());
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| ApiError::from_transport(&e))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| ApiError::from_transport(&e))?;
            Ok::<_, ApiError>((status, text))
        };

        let (status, text) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ApiError::timeout(timeout))??;

        let body = parse_body(&text);
        if ErrorKind::from_http_status(status).is_some() {
            return Err(ApiError::from_response(status, &body));
        }
        unwrap_envelope(status, body)
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// `success: false` becomes an error; `data` is returned when present.
fn unwrap_envelope(status: u16, body: Value) -> ApiResult<Value> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };

    match map.get("success").and_then(Value::as_bool) {
        Some(false) => Err(ApiError::from_response(status, &Value::Object(map))),
        Some(true) => match map.remove("data") {
            Some(data) => Ok(data),
            None => Ok(Value::Object(map)),
        },
        None => Ok(Value::Object(map)),
    }
}
