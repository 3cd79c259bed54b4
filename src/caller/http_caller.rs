//! Signed HTTP call execution.
//!
//! # Responsibilities
//! - Resolve the host for a path and build the call URL
//! - Build standard headers, compress and sign the body
//! - Send with a deadline and classify the outcome
//! - Emit call latency, count and error metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::Authenticator;
use crate::availability::HostSelector;
use crate::caller::codec;
use crate::caller::endpoint::{with_option_queries, UrlCenter};
use crate::caller::error::CallError;
use crate::caller::options::Options;
use crate::config::{CallerConfig, ClientConfig};
use crate::observability::metrics::{self, tag, MetricsSink};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the shared transport client from caller settings.
pub fn build_http_client(config: &CallerConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_idle_timeout(config.keep_alive())
        .pool_max_idle_per_host(config.max_connections)
        .connect_timeout(config.connect_timeout())
        .build()
}

/// Executes signed calls against the best host of each path.
pub struct HttpCaller {
    client: reqwest::Client,
    tenant_id: String,
    project_id: String,
    host_header: Option<String>,
    authenticator: Authenticator,
    selector: Arc<dyn HostSelector>,
    urls: UrlCenter,
    default_headers: Vec<(String, String)>,
    default_timeout: Duration,
    sink: MetricsSink,
}

impl HttpCaller {
    /// Create a new caller.
    pub fn new(
        config: &ClientConfig,
        client: reqwest::Client,
        authenticator: Authenticator,
        selector: Arc<dyn HostSelector>,
        sink: MetricsSink,
    ) -> Self {
        let mut default_headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        default_headers.sort();

        Self {
            client,
            tenant_id: config.tenant_id.clone(),
            project_id: config.project_id.clone().unwrap_or_default(),
            host_header: config.host_header.clone().filter(|h| !h.is_empty()),
            authenticator,
            selector,
            urls: UrlCenter::new(config.schema.clone()),
            default_headers,
            default_timeout: config.caller.default_timeout(),
            sink,
        }
    }

    /// URL a call to `path` would use right now.
    pub fn url_for(&self, path: &str) -> String {
        let host = self.selector.get_host(path);
        self.urls.get_url(&host, path)
    }

    /// Call `path` with a JSON request and decode a JSON response.
    pub async fn call_json<Req, Rsp>(
        &self,
        path: &str,
        request: &Req,
        options: Options,
    ) -> Result<Rsp, CallError>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        let url = self.url_for(path);
        let body = serde_json::to_vec(request).map_err(|source| {
            self.count_error("marshal_json_request_fail", &url);
            tracing::error!(url = %url, error = %source, "Marshal json request failed");
            CallError::Serialization {
                url: url.clone(),
                source,
            }
        })?;

        let (request_id, rsp) = self
            .execute(&url, body, JSON_CONTENT_TYPE, options)
            .await?;

        serde_json::from_slice(&rsp).map_err(|source| {
            self.count_error("unmarshal_json_response_fail", &url);
            self.sink.error(
                &request_id,
                format!("unmarshal json response fail, url:{url} err:{source}"),
            );
            tracing::error!(
                url = %url,
                request_id = %request_id,
                error = %source,
                "Unmarshal json response failed"
            );
            CallError::Serialization { url, source }
        })
    }

    /// Call `path` with an already encoded body; returns the decoded response
    /// body.
    pub async fn call_bytes(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        options: Options,
    ) -> Result<Bytes, CallError> {
        let url = self.url_for(path);
        let (_, rsp) = self.execute(&url, body, content_type, options).await?;
        Ok(Bytes::from(rsp))
    }

    async fn execute(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        options: Options,
    ) -> Result<(String, Vec<u8>), CallError> {
        let (headers, request_id) = self.build_headers(url, &options, content_type)?;
        let url = with_option_queries(url, &options.queries).map_err(|e| {
            CallError::InvalidRequest {
                url: url.to_string(),
                message: format!("invalid url: {e}"),
            }
        })?;
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let rsp = self
            .do_request(&request_id, &url, headers, body, timeout)
            .await?;
        Ok((request_id, rsp))
    }

    fn build_headers(
        &self,
        url: &str,
        options: &Options,
        content_type: &str,
    ) -> Result<(HeaderMap, String), CallError> {
        let request_id = match &options.request_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                tracing::info!(request_id = %id, "Request id generated");
                id
            }
        };

        let mut pairs: Vec<(&str, String)> = vec![
            ("Content-Encoding", "gzip".to_string()),
            ("Accept-Encoding", "gzip".to_string()),
            ("Content-Type", content_type.to_string()),
            ("Accept", content_type.to_string()),
            ("Tenant-Id", self.tenant_id.clone()),
            ("Request-Id", request_id.clone()),
        ];
        if !self.project_id.is_empty() {
            pairs.push(("Project-Id", self.project_id.clone()));
        }
        if let Some(host) = &self.host_header {
            pairs.push(("Host", host.clone()));
        }
        if let Some(server_timeout) = options.server_timeout {
            pairs.push(("Timeout-Millis", server_timeout.as_millis().to_string()));
        }
        for (k, v) in self.default_headers.iter().chain(options.headers.iter()) {
            pairs.push((k.as_str(), v.clone()));
        }

        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            let invalid = |what: &str| CallError::InvalidRequest {
                url: url.to_string(),
                message: format!("invalid header {what} '{name}'"),
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid("name"))?;
            let header_value = HeaderValue::from_str(&value).map_err(|_| invalid("value"))?;
            headers.insert(header_name, header_value);
        }
        Ok((headers, request_id))
    }

    async fn do_request(
        &self,
        request_id: &str,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, CallError> {
        let invalid = |message: String| CallError::InvalidRequest {
            url: url.to_string(),
            message,
        };
        let compressed = codec::gzip(&body).map_err(|e| invalid(format!("gzip body: {e}")))?;
        let mut request = self
            .client
            .post(url)
            .headers(headers)
            .body(compressed)
            .timeout(timeout)
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        self.authenticator
            .sign(&mut request)
            .map_err(|e| invalid(e.to_string()))?;

        let start = Instant::now();
        let result = self.client.execute(request).await;
        let cost = start.elapsed();
        self.record_call(request_id, url, cost);

        let response = match result {
            Ok(response) => response,
            Err(source) => return Err(self.transport_failure(request_id, url, cost, source)),
        };

        let status = response.status();
        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw = response
            .bytes()
            .await
            .map_err(|source| self.transport_failure(request_id, url, cost, source))?;

        if status != reqwest::StatusCode::OK {
            let encoding = encoding.as_deref();
            return Err(self.status_failure(request_id, url, status.as_u16(), encoding, &raw));
        }

        codec::decode_body(encoding.as_deref(), &raw).map_err(|message| {
            self.count_error("decompress_response_fail", url);
            tracing::error!(
                url = %url,
                request_id = %request_id,
                error = %message,
                "Response decode failed"
            );
            CallError::Encoding {
                url: url.to_string(),
                message,
            }
        })
    }

    fn record_call(&self, request_id: &str, url: &str, cost: Duration) {
        let cost_ms = cost.as_millis() as u64;
        let tags = self.tags(url);
        self.sink
            .timer(metrics::REQUEST_TOTAL_COST, cost_ms as f64, tags.clone());
        self.sink.counter(metrics::REQUEST_COUNT, 1.0, tags);
        self.sink.info(
            request_id,
            format!("http request project_id:{}, url:{url}, cost:{cost_ms}ms", self.project_id),
        );
        tracing::debug!(url = %url, request_id = %request_id, cost_ms, "Call finished");
    }

    fn transport_failure(
        &self,
        request_id: &str,
        url: &str,
        cost: Duration,
        source: reqwest::Error,
    ) -> CallError {
        let err = CallError::from_transport(url, source);
        self.count_error(err.metric_type(), url);
        self.sink.error(request_id, format!("do http request fail, url:{url}, err:{err}"));
        tracing::error!(
            url = %url,
            request_id = %request_id,
            cost_ms = cost.as_millis() as u64,
            error = %err,
            "Call failed"
        );
        err
    }

    fn status_failure(
        &self,
        request_id: &str,
        url: &str,
        status: u16,
        encoding: Option<&str>,
        raw: &[u8],
    ) -> CallError {
        let mut tags = self.tags(url);
        tags.push("type:rsp_status_not_ok".to_string());
        tags.push(format!("status:{status}"));
        self.sink.counter(metrics::COMMON_ERROR, 1.0, tags);

        let body = codec::decode_body(encoding, raw)
            .ok()
            .filter(|b| !b.is_empty())
            .map(|b| String::from_utf8_lossy(&b).into_owned());
        let shown = body.as_deref().unwrap_or("");
        self.sink.error(
            request_id,
            format!("http status not 200, url:{url}, code:{status}, body:{shown}"),
        );
        tracing::error!(
            url = %url,
            request_id = %request_id,
            status,
            body = shown,
            "Call returned non-200 status"
        );
        CallError::Status {
            url: url.to_string(),
            status,
            body,
        }
    }

    fn count_error(&self, kind: &str, url: &str) {
        let mut tags = self.tags(url);
        tags.push(format!("type:{kind}"));
        self.sink.counter(metrics::COMMON_ERROR, 1.0, tags);
    }

    fn tags(&self, url: &str) -> Vec<String> {
        vec![tag("project_id", &self.project_id), tag("url", url)]
    }
}

impl std::fmt::Debug for HttpCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCaller")
            .field("tenant_id", &self.tenant_id)
            .field("project_id", &self.project_id)
            .field("auth", &self.authenticator.mode())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AirAuth;

    struct StaticSelector;

    impl HostSelector for StaticSelector {
        fn get_host(&self, _path: &str) -> String {
            "h.example.com".to_string()
        }

        fn get_hosts(&self) -> Vec<String> {
            vec!["h.example.com".to_string()]
        }
    }

    fn config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.tenant_id = "tenant".into();
        config.project_id = Some("proj".into());
        config.headers.insert("X-Client".into(), "rec".into());
        config
    }

    fn caller() -> HttpCaller {
        caller_with(&config())
    }

    fn caller_with(config: &ClientConfig) -> HttpCaller {
        HttpCaller::new(
            config,
            reqwest::Client::new(),
            Authenticator::Air(AirAuth::new("token", "tenant")),
            Arc::new(StaticSelector),
            MetricsSink::disabled(),
        )
    }

    #[test]
    fn test_url_for() {
        assert_eq!(caller().url_for("/Retail/User"), "https://h.example.com/Retail/User");
    }

    #[test]
    fn test_build_headers() {
        let options = Options::new()
            .with_server_timeout(Duration::from_millis(750))
            .with_header("X-Client", "override");
        let (headers, request_id) = caller()
            .build_headers("u", &options, JSON_CONTENT_TYPE)
            .unwrap();
        assert_eq!(headers["content-encoding"], "gzip");
        assert_eq!(headers["accept-encoding"], "gzip");
        assert_eq!(headers["content-type"], JSON_CONTENT_TYPE);
        assert_eq!(headers["tenant-id"], "tenant");
        assert_eq!(headers["project-id"], "proj");
        assert_eq!(headers["timeout-millis"], "750");
        assert_eq!(headers["x-client"], "override");
        assert_eq!(headers["request-id"], request_id.as_str());
        assert_eq!(request_id.len(), 36);
        assert!(!headers.contains_key("host"));
    }

    #[test]
    fn test_host_header_is_sent() {
        let mut config = config();
        config.host_header = Some("rec.example.com".into());
        let (headers, _) = caller_with(&config)
            .build_headers("u", &Options::new(), JSON_CONTENT_TYPE)
            .unwrap();
        assert_eq!(headers["host"], "rec.example.com");
    }

    #[test]
    fn test_explicit_request_id_is_kept() {
        let options = Options::new().with_request_id("req-1");
        let (headers, request_id) = caller()
            .build_headers("u", &options, JSON_CONTENT_TYPE)
            .unwrap();
        assert_eq!(request_id, "req-1");
        assert_eq!(headers["request-id"], "req-1");
        assert!(!headers.contains_key("timeout-millis"));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let options = Options::new().with_header("bad header", "v");
        let err = caller().build_headers("u", &options, JSON_CONTENT_TYPE).unwrap_err();
        assert!(matches!(err, CallError::InvalidRequest { .. }));
    }
}
