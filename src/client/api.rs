//! Resilient F5XC API client.
//!
//! # Responsibilities
//! - Guard every call with the per-endpoint circuit breaker
//! - Retry transient failures with backoff, honouring `Retry-After`
//! - Classify outcomes and feed them back to the breaker
//! - Publish breaker state gauges
//!
//! # Data Flow
//! ```text
//! collector → get/post(endpoint)
//!     → breaker.is_call_allowed? no → ApiError::CircuitOpen
//!     → semaphore permit (max concurrent requests)
//!     → send, retrying 429/5xx/connect errors with backoff
//!     → 2xx record_success | 401 untouched | other record_failure
//!     → refresh f5xc_circuit_breaker_* gauges
//! ```

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

use crate::client::error::{ApiError, ApiResult};
use crate::config::{ClientConfig, RetryConfig, TenantConfig};
use crate::observability::MetricsRegistry;
use crate::resilience::backoff::{backoff_for, rate_limit_delay};
use crate::resilience::retries::{is_retryable_status, parse_retry_after, DEFAULT_RETRY_AFTER};
use crate::resilience::CircuitBreaker;

const BREAKER_STATE: &str = "f5xc_circuit_breaker_state";
const BREAKER_FAILURES: &str = "f5xc_circuit_breaker_failures";
const ERROR_BODY_LIMIT: usize = 256;

/// HTTP client that wraps the breaker and retry policy around every call.
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: Url,
    tenant_name: String,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    limiter: Option<Semaphore>,
    registry: MetricsRegistry,
}

impl ResilientClient {
    pub fn new(
        tenant: &TenantConfig,
        client: &ClientConfig,
        retry: &RetryConfig,
        breaker: Arc<CircuitBreaker>,
        registry: &MetricsRegistry,
    ) -> ApiResult<Self> {
        let base_url = Url::parse(tenant.url_str())
            .map_err(|e| ApiError::Setup(format!("invalid tenant URL: {}", e)))?;
        let tenant_name = tenant.tenant_name().unwrap_or_default();

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("APIToken {}", tenant.access_token))
            .map_err(|e| ApiError::Setup(format!("invalid access token: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("f5xc-exporter/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(client.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        let limiter = match client.max_concurrent_requests {
            0 => None,
            n => Some(Semaphore::new(n)),
        };

        registry.describe_gauge(
            BREAKER_STATE,
            "Circuit breaker state (0=closed, 1=open, 2=half_open)",
        );
        registry.describe_gauge(BREAKER_FAILURES, "Circuit breaker failure count");

        Ok(Self {
            http,
            base_url,
            tenant_name,
            breaker,
            retry: retry.clone(),
            limiter,
            registry: registry.clone(),
        })
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// `GET endpoint` with optional query parameters.
    pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ApiResult<Value> {
        self.execute(Method::GET, endpoint, query, None).await
    }

    /// `POST endpoint` with a JSON body.
    pub async fn post(&self, endpoint: &str, body: &Value) -> ApiResult<Value> {
        self.execute(Method::POST, endpoint, &[], Some(body)).await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let allowed = self.breaker.is_call_allowed(endpoint);
        self.refresh_breaker_gauges(endpoint);
        if !allowed {
            tracing::warn!(
                endpoint = %endpoint,
                state = "OPEN",
                "Circuit breaker rejecting request"
            );
            return Err(ApiError::CircuitOpen {
                endpoint: endpoint.to_string(),
            });
        }

        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await.map_err(|e| ApiError::Api {
                endpoint: endpoint.to_string(),
                status: None,
                message: e.to_string(),
            })?),
            None => None,
        };

        let url = self.base_url.join(endpoint).map_err(|e| ApiError::Api {
            endpoint: endpoint.to_string(),
            status: None,
            message: format!("invalid endpoint: {}", e),
        })?;

        tracing::debug!(method = %method, endpoint = %endpoint, "Making F5XC API request");

        let outcome = self.send_with_retries(method, url, endpoint, query, body).await;

        match &outcome {
            Ok(_) => self.breaker.record_success(endpoint),
            Err(ApiError::Authentication { .. }) => {
                tracing::error!(endpoint = %endpoint, "Authentication failed");
            }
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "F5XC API request failed");
                if e.counts_as_failure() {
                    self.breaker.record_failure(endpoint);
                }
            }
        }
        self.refresh_breaker_gauges(endpoint);

        outcome
    }

    async fn send_with_retries(
        &self,
        method: Method,
        url: Url,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let delay = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| ApiError::Api {
                            endpoint: endpoint.to_string(),
                            status: Some(status.as_u16()),
                            message: format!("invalid JSON body: {}", e),
                        });
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ApiError::Authentication {
                            endpoint: endpoint.to_string(),
                        });
                    }

                    let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
                        parse_retry_after(
                            response
                                .headers()
                                .get(header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok()),
                        )
                    } else {
                        None
                    };

                    if !is_retryable_status(status.as_u16()) || attempt >= max_attempts {
                        return Err(final_error(endpoint, status, retry_after, response).await);
                    }

                    match retry_after {
                        Some(hint) => rate_limit_delay(hint, &self.retry),
                        None => backoff_for(attempt, &self.retry),
                    }
                }
                Err(e) => {
                    let transient = e.is_connect() || e.is_timeout() || e.is_request();
                    if !transient || attempt >= max_attempts {
                        return Err(ApiError::Api {
                            endpoint: endpoint.to_string(),
                            status: e.status().map(|s| s.as_u16()),
                            message: e.to_string(),
                        });
                    }
                    backoff_for(attempt, &self.retry)
                }
            };

            tracing::debug!(
                endpoint = %endpoint,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying F5XC API request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn refresh_breaker_gauges(&self, endpoint: &str) {
        self.registry.set_gauge(
            BREAKER_STATE,
            &[("endpoint", endpoint)],
            f64::from(self.breaker.get_state_value(endpoint)),
        );
        self.registry.set_gauge(
            BREAKER_FAILURES,
            &[("endpoint", endpoint)],
            f64::from(self.breaker.get_failure_count(endpoint)),
        );
    }
}

async fn final_error(
    endpoint: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    response: reqwest::Response,
) -> ApiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
        tracing::warn!(
            endpoint = %endpoint,
            retry_after_secs = retry_after.as_secs(),
            "Rate limited by F5XC API"
        );
        return ApiError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after,
        };
    }

    let body = response.text().await.unwrap_or_default();
    ApiError::Api {
        endpoint: endpoint.to_string(),
        status: Some(status.as_u16()),
        message: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.base_url.as_str())
            .field("tenant_name", &self.tenant_name)
            .finish_non_exhaustive()
    }
}
