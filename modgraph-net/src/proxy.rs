// modgraph-net/src/proxy.rs
use std::time::Duration;

use async_trait::async_trait;
use modgraph_common::config::Config;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{DependencyManifest, ModuleInfo};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, trace};

use crate::escape::{escape_path, escape_version};
use crate::modfile::parse_manifest;
use crate::registry::RegistrySource;
use crate::validation::validate_url;

const CONNECT_TIMEOUT_SECS: u64 = 5;
const USER_AGENT_STRING: &str = "modgraph dependency crawler (Rust)";
const CACHED_ONLY_PREFIX: &str = "/cached-only";

/// HTTP client for a module proxy speaking the `@latest` / `@v` protocol.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url(base_url)?;
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.proxy_url, config.http_timeout)
    }

    fn endpoint(&self, path: &str, suffix: &str, cached_only: bool) -> String {
        let prefix = if cached_only { CACHED_ONLY_PREFIX } else { "" };
        format!("{}{}/{}/{}", self.base_url, prefix, escape_path(path), suffix)
    }

    async fn get(&self, url: &str, subject: &str) -> Result<Response> {
        trace!("GET {}", url);
        let response = self.http.get(url).send().await.map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            ModgraphError::from(e)
        })?;

        let status = response.status();
        debug!("Received HTTP status: {} for {}", status, url);
        match status {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                Err(ModgraphError::NotFound(subject.to_string()))
            }
            s => Err(ModgraphError::HttpStatus {
                status: s.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn get_info(&self, url: &str, subject: &str) -> Result<ModuleInfo> {
        let response = self.get(url, subject).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl RegistrySource for ProxyClient {
    async fn latest_info(&self, path: &str, cached_only: bool) -> Result<ModuleInfo> {
        let url = self.endpoint(path, "@latest", cached_only);
        self.get_info(&url, path).await
    }

    async fn info(&self, path: &str, version: &str, cached_only: bool) -> Result<ModuleInfo> {
        let suffix = format!("@v/{}.info", escape_version(version));
        let url = self.endpoint(path, &suffix, cached_only);
        self.get_info(&url, &format!("{path}@{version}")).await
    }

    async fn manifest(
        &self,
        path: &str,
        version: &str,
        cached_only: bool,
    ) -> Result<DependencyManifest> {
        let suffix = format!("@v/{}.mod", escape_version(version));
        let url = self.endpoint(path, &suffix, cached_only);
        let response = self.get(&url, &format!("{path}@{version}")).await?;
        let body = response.text().await?;
        parse_manifest(&body).map_err(|e| match e {
            ModgraphError::InvalidManifest(msg) => {
                ModgraphError::InvalidManifest(format!("{path}@{version}: {msg}"))
            }
            other => other,
        })
    }
}

fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ModgraphError::Config(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn client(server: &MockServer) -> ProxyClient {
        ProxyClient::new(&server.base_url(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn latest_info_uses_cached_only_prefix() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/cached-only/example.com/a/@latest");
                then.status(200)
                    .body(r#"{"Version":"v1.0.0","Time":"2024-01-02T03:04:05Z"}"#);
            })
            .await;

        let info = client(&server).latest_info("example.com/a", true).await.unwrap();
        assert_eq!(info.version, "v1.0.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn paths_and_versions_are_case_escaped() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/github.com/!burnt!sushi/toml/@v/v1.3.2.info");
                then.status(200).body(r#"{"Version":"v1.3.2"}"#);
            })
            .await;

        let info = client(&server)
            .info("github.com/BurntSushi/toml", "v1.3.2", false)
            .await
            .unwrap();
        assert_eq!(info.version, "v1.3.2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_and_gone_map_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/example.com/missing/@latest");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/example.com/gone/@v/v1.0.0.mod");
                then.status(410).body("not found: unknown revision");
            })
            .await;

        let client = client(&server);
        let err = client.latest_info("example.com/missing", false).await.unwrap_err();
        assert!(err.is_not_found());
        let err = client.manifest("example.com/gone", "v1.0.0", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn other_statuses_are_generic_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/example.com/a/@latest");
                then.status(502);
            })
            .await;

        let err = client(&server).latest_info("example.com/a", false).await.unwrap_err();
        assert!(matches!(err, ModgraphError::HttpStatus { status: 502, .. }));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn manifest_is_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/cached-only/example.com/a/@v/v1.0.0.mod");
                then.status(200).body(
                    "module example.com/a\n\nrequire (\n\texample.com/b v1.0.0\n\texample.com/c v0.2.0 // indirect\n)\n",
                );
            })
            .await;

        let manifest = client(&server)
            .manifest("example.com/a", "v1.0.0", true)
            .await
            .unwrap();
        assert_eq!(manifest.module.as_ref().unwrap().path, "example.com/a");
        assert_eq!(manifest.direct_requirements().count(), 1);
    }

    #[tokio::test]
    async fn malformed_manifest_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/example.com/a/@v/v1.0.0.mod");
                then.status(200).body("module example.com/a\nrequire example.com/b\n");
            })
            .await;

        let err = client(&server)
            .manifest("example.com/a", "v1.0.0", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ModgraphError::InvalidManifest(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/example.com/slow/@latest");
                then.status(200)
                    .delay(Duration::from_millis(800))
                    .body(r#"{"Version":"v1.0.0"}"#);
            })
            .await;

        let client = ProxyClient::new(&server.base_url(), Duration::from_millis(100)).unwrap();
        let err = client.latest_info("example.com/slow", false).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[test]
    fn insecure_proxy_url_is_rejected() {
        assert!(ProxyClient::new("http://proxy.example.com", Duration::from_secs(1)).is_err());
    }
}
