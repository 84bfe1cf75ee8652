use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::types::{DetailedHealth, Health, Logs, Stats};
use crate::config::{ApiConfig, Config};
use crate::error::FetchFailed;

/// Largest page the backend serves from `/logs`.
pub const MAX_LOGS_LIMIT: u32 = 10_000;

/// Parameters of a `/logs` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsQuery {
  /// Domains to leave out of the results
  pub exclude: Vec<String>,
  pub limit: u32,
  pub offset: u64,
}

impl Default for LogsQuery {
  fn default() -> Self {
    Self {
      exclude: Vec::new(),
      limit: 1000,
      offset: 0,
    }
  }
}

impl LogsQuery {
  pub fn validate(&self) -> Result<()> {
    if !(1..=MAX_LOGS_LIMIT).contains(&self.limit) {
      return Err(eyre!(
        "limit must be between 1 and {}, got {}",
        MAX_LOGS_LIMIT,
        self.limit
      ));
    }
    Ok(())
  }

  fn params(&self) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = self
      .exclude
      .iter()
      .map(|domain| ("exclude", domain.clone()))
      .collect();
    params.push(("limit", self.limit.to_string()));
    params.push(("offset", self.offset.to_string()));
    params
  }
}

/// Dashboard API client wrapper
#[derive(Clone)]
pub struct DashboardClient {
  http: reqwest::Client,
  base_url: Url,
  username: String,
  password: String,
}

impl DashboardClient {
  pub fn new(config: &Config) -> Result<Self> {
    let password = Config::get_password()?;
    Self::with_password(&config.api, password)
  }

  pub fn with_password(api: &ApiConfig, password: String) -> Result<Self> {
    let mut base_url =
      Url::parse(&api.url).map_err(|e| eyre!("Invalid API url {}: {}", api.url, e))?;
    // Joining relative paths keeps the last segment only with a trailing slash
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(api.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      username: api.username.clone(),
      password,
    })
  }

  /// Liveness of the API and its database
  pub async fn health(&self) -> Result<Health> {
    self.get("health", &[], false).await
  }

  /// Health with host resource details
  pub async fn health_detailed(&self) -> Result<DetailedHealth> {
    self.get("health/detailed", &[], false).await
  }

  /// Record count summary
  pub async fn stats(&self) -> Result<Stats> {
    self.get("stats", &[], true).await
  }

  /// A page of DNS query logs
  pub async fn logs(&self, query: &LogsQuery) -> Result<Logs> {
    query.validate()?;
    self.get("logs", &query.params(), true).await
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
    authenticated: bool,
  ) -> Result<T> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;

    let mut request = self.http.get(url).query(params);
    if authenticated {
      request = request.basic_auth(&self.username, Some(&self.password));
    }

    let response = request.send().await.map_err(|e| {
      FetchFailed::new(
        e.status().map(|s| s.as_u16()),
        format!("Request to /{} failed: {}", path, e),
      )
    })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(
        FetchFailed::new(
          Some(status.as_u16()),
          format!("/{} returned {}", path, status),
        )
        .with_body(body)
        .into(),
      );
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse /{} response: {}", path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_server;
  use crate::error::status_of;

  fn client(url: &str) -> DashboardClient {
    let api = ApiConfig {
      url: url.to_string(),
      username: "admin".to_string(),
      timeout_secs: 5,
    };
    DashboardClient::with_password(&api, "secret".to_string()).unwrap()
  }

  #[tokio::test]
  async fn test_health() {
    let server =
      test_server::serve(vec![(200, r#"{"status":"healthy","healthy":true}"#.to_string())]).await;

    let health = client(&server.url).health().await.unwrap();
    assert!(health.healthy);

    let requests = server.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].uri, "/health");
    assert!(requests[0].authorization.is_none());
  }

  #[tokio::test]
  async fn test_stats_sends_basic_auth() {
    let server = test_server::serve(vec![(
      200,
      r#"{"total_records":5,"message":"Database contains 5 DNS log records"}"#.to_string(),
    )])
    .await;

    let stats = client(&server.url).stats().await.unwrap();
    assert_eq!(stats.total_records, 5);

    // base64("admin:secret")
    assert_eq!(
      server.requests()[0].authorization.as_deref(),
      Some("Basic YWRtaW46c2VjcmV0")
    );
  }

  #[tokio::test]
  async fn test_logs_query_parameters() {
    let server = test_server::serve(vec![(
      200,
      r#"{"data":[],"total_records":0,"returned_records":0}"#.to_string(),
    )])
    .await;

    let query = LogsQuery {
      exclude: vec!["ads.example".to_string()],
      limit: 50,
      offset: 100,
    };
    let logs = client(&server.url).logs(&query).await.unwrap();
    assert!(logs.data.is_empty());

    assert_eq!(
      server.requests()[0].uri,
      "/logs?exclude=ads.example&limit=50&offset=100"
    );
  }

  #[tokio::test]
  async fn test_error_status_is_typed() {
    let server =
      test_server::serve(vec![(503, r#"{"detail":"maintenance"}"#.to_string())]).await;

    let err = client(&server.url).health().await.unwrap_err();
    assert_eq!(status_of(&err), Some(503));

    let failed = err.downcast_ref::<FetchFailed>().unwrap();
    assert_eq!(failed.body.as_deref(), Some(r#"{"detail":"maintenance"}"#));
  }

  #[tokio::test]
  async fn test_connection_refused_has_no_status() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&url).health().await.unwrap_err();
    assert!(err.downcast_ref::<FetchFailed>().is_some());
    assert_eq!(status_of(&err), None);
  }

  #[test]
  fn test_logs_limit_bounds() {
    let mut query = LogsQuery::default();
    assert!(query.validate().is_ok());
    query.limit = 0;
    assert!(query.validate().is_err());
    query.limit = MAX_LOGS_LIMIT + 1;
    assert!(query.validate().is_err());
  }

  #[test]
  fn test_base_url_with_path_prefix() {
    let client = client("http://localhost:5000/api");
    assert_eq!(client.base_url.as_str(), "http://localhost:5000/api/");
    assert_eq!(
      client.base_url.join("health/detailed").unwrap().as_str(),
      "http://localhost:5000/api/health/detailed"
    );
  }
}
