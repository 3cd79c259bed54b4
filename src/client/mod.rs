//! Client facade.
//!
//! # Data Flow
//! ```text
//! ClientBuilder (or ClientConfig from a TOML file)
//!     → validate_config
//!     → shared reqwest::Client
//!     → metrics pipeline (sink now, flusher once hosts are known)
//!     → HostAvailabilityManager::start (first score + fetch, then loops)
//!     → HttpCaller (+ optional keepalive)
//!     → Client
//!
//! Client::call_json / call_bytes → HttpCaller
//! Client::shutdown → every loop observes the shared signal
//! ```
//!
//! # Design Decisions
//! - `build` fails fast on configuration errors; nothing is spawned before
//!   validation passes
//! - One transport client serves calls, probes, fetches and reports
//! - Dropping the client shuts its loops down

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::{AirAuth, Authenticator, Credential};
use crate::availability::{
    AvailabilityError, HostAvailabilityManager, HostConfigFetcher, HostSelector,
};
use crate::caller::{build_http_client, CallError, HttpCaller, Keepalive, Options};
use crate::config::{
    validate_config, AvailabilityConfig, CallerConfig, ClientConfig, ConfigError, MetricsConfig,
    RegionConfig, RegionError, RegionTable,
};
use crate::health::{HostScorer, PingHostScorer, Prober};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::{pipeline, MetricsFlusher, MetricsSink};

/// Errors that can occur while building a client.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("host availability: {0}")]
    Availability(#[from] AvailabilityError),

    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    scorer: Option<Arc<dyn HostScorer>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            scorer: None,
        }
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.config.tenant_id = tenant_id.into();
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.project_id = Some(project_id.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Send `host` as the `Host` header of calls and pings.
    pub fn host_header(mut self, host: impl Into<String>) -> Self {
        self.config.host_header = Some(host.into());
        self
    }

    /// Register defaults for a region. Fails if `name` is already registered.
    pub fn register_region(
        mut self,
        name: impl Into<String>,
        region: RegionConfig,
    ) -> Result<Self, RegionError> {
        self.config.regions.register(name, region)?;
        Ok(self)
    }

    /// Replace the region table.
    pub fn regions(mut self, regions: RegionTable) -> Self {
        self.config.regions = regions;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = schema.into();
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.config.headers.extend(headers);
        self
    }

    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.config.auth.access_key = Some(access_key.into());
        self
    }

    pub fn secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.config.auth.secret_key = Some(secret_key.into());
        self
    }

    pub fn session_token(mut self, session_token: impl Into<String>) -> Self {
        self.config.auth.session_token = Some(session_token.into());
        self
    }

    pub fn auth_service(mut self, service: impl Into<String>) -> Self {
        self.config.auth.service = service.into();
        self
    }

    /// Switch to token based auth with `token`.
    pub fn air_auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.use_air_auth = true;
        self.config.auth.air_auth_token = Some(token.into());
        self
    }

    pub fn caller_config(mut self, caller: CallerConfig) -> Self {
        self.config.caller = caller;
        self
    }

    pub fn availability_config(mut self, availability: AvailabilityConfig) -> Self {
        self.config.availability = availability;
        self
    }

    pub fn metrics_config(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Replace the default ping scorer.
    pub fn host_scorer(mut self, scorer: Arc<dyn HostScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate, start the background loops and return a ready client.
    pub async fn build(self) -> Result<Client, BuildError> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let http = build_http_client(&config.caller)?;
        let authenticator = authenticator(&config);

        let (sink, receiver) = if config.metrics.enabled {
            let (sink, receiver) = pipeline(&config.metrics);
            (sink, Some(receiver))
        } else {
            (MetricsSink::disabled(), None)
        };

        let availability = &config.availability;
        let prober = |timeout: Duration| {
            Prober::new(
                http.clone(),
                config.schema.clone(),
                availability.ping_path.clone(),
                timeout,
            )
            .with_host_header(config.host_header.clone())
            .with_project_id(config.project_id.clone().unwrap_or_default())
            .with_sink(sink.clone())
        };
        let scorer = self.scorer.unwrap_or_else(|| {
            PingHostScorer::new(prober(availability.ping_timeout()), availability.window_size)
                .into_shared()
        });
        let fetcher = match &config.project_id {
            Some(project_id) if availability.fetch_hosts_from_server => Some(HostConfigFetcher::new(
                http.clone(),
                project_id.clone(),
                availability.fetch_timeout(),
                availability.fetch_max_attempts,
            )),
            _ => None,
        };
        let hosts = config.resolved_hosts();
        let manager = HostAvailabilityManager::start(availability, hosts, scorer, fetcher).await?;
        let selector: Arc<dyn HostSelector> = manager.clone();

        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        if let Some(receiver) = receiver {
            let flusher = MetricsFlusher::new(
                config.metrics.clone(),
                config.schema.clone(),
                http.clone(),
                Arc::clone(&selector),
                receiver,
            );
            tasks.push(flusher.spawn(shutdown.subscribe()));
        }

        if config.keep_alive {
            let keepalive = Keepalive::new(
                prober(config.caller.ping_timeout()),
                Arc::clone(&selector),
                config.caller.ping_interval(),
                sink.clone(),
            );
            tasks.push(keepalive.spawn(shutdown.subscribe()));
        }

        let caller = HttpCaller::new(&config, http, authenticator, selector, sink.clone());

        tracing::info!(
            tenant_id = %config.tenant_id,
            auth = authenticator_mode(&config),
            keep_alive = config.keep_alive,
            metrics = config.metrics.enabled,
            "Client built"
        );

        Ok(Client {
            caller,
            manager,
            sink,
            shutdown,
            tasks: Mutex::new(tasks),
        })
    }
}

fn authenticator(config: &ClientConfig) -> Authenticator {
    let auth = &config.auth;
    if auth.use_air_auth {
        return Authenticator::Air(AirAuth::new(
            auth.air_auth_token.clone().unwrap_or_default(),
            config.tenant_id.clone(),
        ));
    }
    let mut credential = Credential::new(
        auth.access_key.clone().unwrap_or_default(),
        auth.secret_key.clone().unwrap_or_default(),
        config.credential_region().to_string(),
        auth.service.clone(),
    );
    if let Some(token) = auth.session_token.as_ref().filter(|t| !t.is_empty()) {
        credential = credential.with_session_token(token.clone());
    }
    Authenticator::Hmac(credential)
}

fn authenticator_mode(config: &ClientConfig) -> &'static str {
    if config.auth.use_air_auth {
        "air"
    } else {
        "hmac"
    }
}

/// A ready transport client.
pub struct Client {
    caller: HttpCaller,
    manager: Arc<HostAvailabilityManager>,
    sink: MetricsSink,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Call `path` with a JSON body and decode the JSON response.
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
        self.caller.call_json(path, request, options).await
    }

    /// Call `path` with a pre-encoded body of `content_type`.
    pub async fn call_bytes(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        options: Options,
    ) -> Result<Bytes, CallError> {
        self.caller.call_bytes(path, body, content_type, options).await
    }

    /// Host a call to `path` would go to right now.
    pub fn get_host(&self, path: &str) -> String {
        self.manager.get_host(path)
    }

    /// Every known host.
    pub fn hosts(&self) -> Vec<String> {
        self.manager.get_hosts()
    }

    pub fn availability(&self) -> &Arc<HostAvailabilityManager> {
        &self.manager
    }

    /// Sink sharing this client's reporting pipeline.
    pub fn metrics(&self) -> &MetricsSink {
        &self.sink
    }

    /// Stop every background loop. Idempotent.
    pub fn shutdown(&self) {
        self.manager.shutdown();
        self.shutdown.trigger();
    }

    /// Stop every background loop and wait for them, including the final
    /// metrics flush.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("caller", &self.caller)
            .field("manager", &self.manager)
            .finish()
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("scorer", &self.scorer.is_some())
            .finish()
    }
}
