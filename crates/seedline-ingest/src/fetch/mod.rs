//! Paginated REST fetching
//!
//! Pages are requested strictly one after another. Each page gets a bounded
//! number of tries with linear backoff; when a page exhausts its tries the
//! endpoint stops paginating and whatever was already collected is returned.
//! Transport and status failures are logged and absorbed here, never
//! propagated.

pub mod normalize;
pub mod policy;

pub use normalize::extract_records;
pub use policy::RetryPolicy;

use crate::error::{IngestError, Result};
use crate::source::{EndpointDescriptor, Pagination, RestConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcome of fetching one endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Records of every successful page, in page order
    pub records: Vec<Value>,

    /// Page iterations entered, including one whose tries ran out
    pub pages_processed: u32,

    /// HTTP requests issued across all pages
    pub attempts: u32,

    /// Time spent in retry backoff
    pub total_backoff: Duration,

    /// False when pagination ended because a page could not be fetched
    pub completed: bool,
}

/// Why a single page request did not produce records
#[derive(Debug, Error)]
enum PageError {
    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("response body is not JSON: {0}")]
    Body(#[source] reqwest::Error),
}

/// Fetches every page of a REST source's endpoints
pub struct PaginatedFetcher {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl PaginatedFetcher {
    /// Build a client carrying the source headers and request timeout
    pub fn new(config: &RestConfig) -> Result<Self> {
        let policy = RetryPolicy::from_rate_limit(&config.rate_limit);
        let headers = header_map(&config.headers)?;

        let client = Client::builder()
            .timeout(policy.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch all pages of `endpoint`
    ///
    /// Only an unusable URL or method is an error; HTTP failures end up in
    /// the report as a short (`completed = false`) result.
    pub async fn fetch_endpoint(&self, endpoint: &EndpointDescriptor) -> Result<FetchReport> {
        let url = endpoint_url(&self.base_url, &endpoint.path)?;
        let method = Method::from_bytes(endpoint.method.to_uppercase().as_bytes()).map_err(|e| {
            IngestError::config(format!("endpoint '{}': invalid method: {}", endpoint.name, e))
        })?;
        let pagination = &endpoint.pagination;
        let page_size = pagination.default_limit as usize;

        let mut report = FetchReport {
            completed: true,
            ..FetchReport::default()
        };
        let mut page: u32 = 1;
        let mut has_more = true;

        while has_more && page <= pagination.max_pages {
            info!("Fetching {} page {}/{}", endpoint.name, page, pagination.max_pages);

            let Some(records) = self
                .fetch_page_with_retry(&method, &url, pagination, page, &mut report)
                .await
            else {
                warn!(
                    "Endpoint {}: page {} failed after {} attempts, keeping {} records",
                    endpoint.name,
                    page,
                    self.policy.max_attempts,
                    report.records.len()
                );
                report.completed = false;
                page += 1;
                break;
            };

            debug!("Endpoint {}: page {} returned {} records", endpoint.name, page, records.len());

            // A full page means the provider may have more
            has_more = records.len() >= page_size;
            report.records.extend(records);
            page += 1;

            if has_more && page <= pagination.max_pages {
                tokio::time::sleep(self.policy.request_interval).await;
            }
        }

        report.pages_processed = page - 1;

        info!(
            "Endpoint {}: {} records from {} pages ({} requests)",
            endpoint.name,
            report.records.len(),
            report.pages_processed,
            report.attempts
        );

        Ok(report)
    }

    async fn fetch_page_with_retry(
        &self,
        method: &Method,
        url: &Url,
        pagination: &Pagination,
        page: u32,
        report: &mut FetchReport,
    ) -> Option<Vec<Value>> {
        for attempt in 1..=self.policy.max_attempts {
            report.attempts += 1;

            match self.fetch_page(method, url, pagination, page).await {
                Ok(records) => return Some(records),
                Err(e) => {
                    warn!(
                        "Page {} attempt {}/{} failed: {}",
                        page, attempt, self.policy.max_attempts, e
                    );

                    if let Some(delay) = self.policy.backoff_for(attempt) {
                        report.total_backoff += delay;
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        None
    }

    async fn fetch_page(
        &self,
        method: &Method,
        url: &Url,
        pagination: &Pagination,
        page: u32,
    ) -> std::result::Result<Vec<Value>, PageError> {
        let query = [
            (pagination.page_param.as_str(), page.to_string()),
            (pagination.limit_param.as_str(), pagination.default_limit.to_string()),
        ];

        let response = self
            .client
            .request(method.clone(), url.clone())
            .query(&query)
            .send()
            .await
            .map_err(PageError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Status(status));
        }

        let body: Value = response.json().await.map_err(PageError::Body)?;
        Ok(extract_records(body))
    }
}

/// `baseUrl` and `path` are joined verbatim
fn endpoint_url(base_url: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base_url, path);
    Url::parse(&raw).map_err(|e| IngestError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })
}

fn header_map(headers: &std::collections::BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| IngestError::config(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| IngestError::config(format!("invalid value for header '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_endpoint_url_joins_verbatim() {
        let url = endpoint_url("https://api.example.com/v1", "/users").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users");
    }

    #[test]
    fn test_endpoint_url_rejects_garbage() {
        assert!(matches!(
            endpoint_url("not a url", "/users"),
            Err(IngestError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_header_map() {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("X-Api-Key".to_string(), "secret".to_string());
        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("accept").unwrap(), "application/json");
        assert_eq!(map.get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn test_header_map_rejects_bad_name() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(header_map(&headers), Err(IngestError::Config(_))));
    }
}
