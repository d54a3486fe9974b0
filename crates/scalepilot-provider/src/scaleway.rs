//! Scaleway Instance API v1 client.
//!
//! Implements [`ComputeProvider`] over HTTPS. Authentication uses the
//! `X-Auth-Token` header carrying the secret key. Power actions are
//! fire-and-poll: the action is posted, then the server is polled until
//! it reaches the action's target state or the timeout elapses.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, header};
use scalepilot_core::{Instance, InstanceStatus, ProviderConfig, Zone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ComputeProvider, CreateRequest, ListFilter, PowerAction, ServerPage};
use crate::error::{ProviderError, ProviderResult};

/// Default interval between server state polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the total number of listed servers.
const TOTAL_COUNT_HEADER: &str = "x-total-count";

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ServerWire {
    id: String,
    #[serde(default)]
    name: String,
    zone: Zone,
    #[serde(default)]
    commercial_type: String,
    #[serde(default)]
    tags: Vec<String>,
    state: InstanceStatus,
    /// Volumes keyed by attachment index ("0", "1", ...).
    #[serde(default)]
    volumes: BTreeMap<String, VolumeWire>,
}

#[derive(Debug, Deserialize)]
struct VolumeWire {
    id: String,
}

impl From<ServerWire> for Instance {
    fn from(w: ServerWire) -> Self {
        let mut volumes: Vec<(u32, String)> = w
            .volumes
            .into_iter()
            .map(|(slot, v)| (slot.parse().unwrap_or(u32::MAX), v.id))
            .collect();
        volumes.sort_by_key(|(slot, _)| *slot);

        Instance {
            id: w.id,
            name: w.name,
            zone: w.zone,
            commercial_type: w.commercial_type,
            tags: w.tags,
            status: w.state,
            volumes: volumes.into_iter().map(|(_, id)| id).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListServersWire {
    servers: Vec<ServerWire>,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerWire,
}

#[derive(Debug, Deserialize)]
struct UserDataKeys {
    #[serde(default)]
    user_data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateServerBody<'a> {
    name: &'a str,
    dynamic_ip_required: bool,
    commercial_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    volumes: BTreeMap<String, serde_json::Value>,
    enable_ipv6: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    security_group: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placement_group: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ActionBody {
    action: PowerAction,
}

// ── Client ─────────────────────────────────────────────────────────

/// HTTP client for the Scaleway Instance API.
#[derive(Debug, Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    project_id: String,
    default_zone: Option<Zone>,
    poll_interval: Duration,
}

impl ScalewayClient {
    /// Build a client from decoded provider configuration.
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("scalepilot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
            project_id: config.project_id.clone(),
            default_zone: config.zone.clone(),
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Override the state polling interval used by power actions.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn zone<'a>(&'a self, zone: Option<&'a Zone>) -> ProviderResult<&'a Zone> {
        zone.or(self.default_zone.as_ref()).ok_or(ProviderError::NoZone)
    }

    fn url(&self, zone: &Zone, path: &str) -> String {
        format!("{}/instance/v1/zones/{}/{}", self.api_url, zone, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Auth-Token", &self.secret_key)
    }

    /// Send a request and turn non-2xx responses into `ProviderError::Api`.
    async fn send(&self, req: RequestBuilder) -> ProviderResult<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_server(&self, zone: &Zone, id: &str) -> ProviderResult<Instance> {
        let url = self.url(zone, &format!("servers/{id}"));
        let envelope: ServerEnvelope = self
            .send(self.request(Method::GET, &url))
            .await?
            .json()
            .await?;
        Ok(envelope.server.into())
    }

    async fn wait_for(&self, instance: &Instance, action: PowerAction) -> ProviderResult<()> {
        loop {
            let server = self.get_server(&instance.zone, &instance.id).await?;
            if action.is_reached(server.status) {
                return Ok(());
            }
            if server.status == InstanceStatus::Locked {
                return Err(ProviderError::UnexpectedState {
                    server_id: instance.id.clone(),
                    action,
                    status: server.status,
                });
            }
            debug!(server = %instance.id, status = %server.status, %action, "waiting for server");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Name for a server created from a blueprint without one.
fn generated_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let seq = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("srv-{nanos:x}{seq}")
}

#[async_trait]
impl ComputeProvider for ScalewayClient {
    async fn list_page(
        &self,
        filter: &ListFilter,
        page: u32,
        per_page: u32,
    ) -> ProviderResult<ServerPage> {
        let zone = self.zone(filter.zone.as_ref())?;
        let mut query: Vec<(&str, String)> =
            vec![("page", page.to_string()), ("per_page", per_page.to_string())];
        if let Some(name) = &filter.name {
            query.push(("name", name.clone()));
        }
        if let Some(ct) = &filter.commercial_type {
            query.push(("commercial_type", ct.clone()));
        }
        if !filter.tags.is_empty() {
            query.push(("tags", filter.tags.join(",")));
        }
        if !self.project_id.is_empty() {
            query.push(("project", self.project_id.clone()));
        }

        let resp = self
            .send(self.request(Method::GET, &self.url(zone, "servers")).query(&query))
            .await?;
        let total_count = resp
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body: ListServersWire = resp.json().await?;

        let servers: Vec<Instance> = body.servers.into_iter().map(Instance::from).collect();
        Ok(ServerPage {
            total_count: total_count.unwrap_or(servers.len() as u32),
            servers,
        })
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Instance> {
        let zone = self.zone(request.zone.as_ref())?;
        let name = if request.name.is_empty() {
            generated_name()
        } else {
            request.name.clone()
        };
        let body = CreateServerBody {
            name: &name,
            dynamic_ip_required: request.dynamic_ip_required,
            commercial_type: &request.commercial_type,
            image: request.image.as_deref(),
            volumes: BTreeMap::new(),
            enable_ipv6: request.enable_ipv6,
            project: Some(self.project_id.as_str()).filter(|p| !p.is_empty()),
            tags: &request.tags,
            security_group: request.security_group.as_deref(),
            placement_group: request.placement_group.as_deref(),
        };

        let envelope: ServerEnvelope = self
            .send(self.request(Method::POST, &self.url(zone, "servers")).json(&body))
            .await?
            .json()
            .await?;
        Ok(envelope.server.into())
    }

    async fn set_user_data(
        &self,
        instance: &Instance,
        data: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        let base = self.url(&instance.zone, &format!("servers/{}/user_data", instance.id));

        let existing: UserDataKeys = self
            .send(self.request(Method::GET, &base))
            .await?
            .json()
            .await?;
        let stale: BTreeSet<&String> = existing
            .user_data
            .iter()
            .filter(|k| !data.contains_key(*k))
            .collect();
        for key in stale {
            self.send(self.request(Method::DELETE, &format!("{base}/{key}")))
                .await?;
        }

        for (key, value) in data {
            self.send(
                self.request(Method::PATCH, &format!("{base}/{key}"))
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(value.clone()),
            )
            .await?;
        }
        Ok(())
    }

    async fn action_and_wait(
        &self,
        instance: &Instance,
        action: PowerAction,
        timeout: Duration,
    ) -> ProviderResult<()> {
        let url = self.url(&instance.zone, &format!("servers/{}/action", instance.id));
        self.send(self.request(Method::POST, &url).json(&ActionBody { action }))
            .await?;

        match tokio::time::timeout(timeout, self.wait_for(instance, action)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(server = %instance.id, %action, ?timeout, "power action timed out");
                Err(ProviderError::Timeout {
                    server_id: instance.id.clone(),
                    action,
                    timeout,
                })
            }
        }
    }

    async fn delete(&self, instance: &Instance) -> ProviderResult<()> {
        let url = self.url(&instance.zone, &format!("servers/{}", instance.id));
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn delete_volume(&self, zone: &Zone, volume_id: &str) -> ProviderResult<()> {
        let url = self.url(zone, &format!("volumes/{volume_id}"));
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }
}
