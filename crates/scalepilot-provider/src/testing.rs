//! In-memory provider for tests.
//!
//! `FakeProvider` keeps servers and volumes in memory, enforces the same
//! ordering rules as the real API (no deleting running servers, no
//! deleting attached volumes), records every call, and tracks how many
//! calls were in flight at once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scalepilot_core::{Blueprint, Instance, InstanceStatus, VolumeId, Zone};

use crate::api::{ComputeProvider, CreateRequest, ListFilter, PowerAction, ServerPage};
use crate::error::{ProviderError, ProviderResult};

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListPage { page: u32 },
    Create { name: String },
    SetUserData { server: String },
    Action { server: String, action: PowerAction },
    Delete { server: String },
    DeleteVolume { volume: String },
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::ListPage { .. } => CallKind::ListPage,
            Call::Create { .. } => CallKind::Create,
            Call::SetUserData { .. } => CallKind::SetUserData,
            Call::Action { .. } => CallKind::Action,
            Call::Delete { .. } => CallKind::Delete,
            Call::DeleteVolume { .. } => CallKind::DeleteVolume,
        }
    }

    /// The server, volume, or name the call targeted.
    fn target(&self) -> Option<&str> {
        match self {
            Call::ListPage { .. } => None,
            Call::Create { name } => Some(name.as_str()),
            Call::SetUserData { server } | Call::Action { server, .. } | Call::Delete { server } => {
                Some(server.as_str())
            }
            Call::DeleteVolume { volume } => Some(volume.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    ListPage,
    Create,
    SetUserData,
    Action,
    Delete,
    DeleteVolume,
}

#[derive(Debug, Clone)]
struct FailureRule {
    kind: CallKind,
    target: Option<String>,
}

#[derive(Debug, Default)]
struct Remote {
    servers: Vec<Instance>,
    volumes: Vec<VolumeId>,
    user_data: HashMap<String, BTreeMap<String, String>>,
    next_id: u64,
}

impl Remote {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`ComputeProvider`].
#[derive(Debug)]
pub struct FakeProvider {
    remote: Mutex<Remote>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<FailureRule>>,
    failing_pages: Mutex<Vec<u32>>,
    default_zone: Zone,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when a call finishes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            remote: Mutex::new(Remote::default()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            failing_pages: Mutex::new(Vec::new()),
            default_zone: Zone::try_from("fr-par-1".to_string()).expect("valid zone"),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every call take at least `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// Fail calls of `kind`, optionally only those targeting `target`.
    pub fn fail_on(&self, kind: CallKind, target: Option<&str>) {
        self.failures.lock().unwrap().push(FailureRule {
            kind,
            target: target.map(str::to_string),
        });
    }

    /// Fail requests for listing page `page`.
    pub fn fail_on_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().push(page);
    }

    /// Add `n` running servers built from `blueprint`, without recording calls.
    pub fn seed_running(&self, blueprint: &Blueprint, n: usize) -> Vec<Instance> {
        (0..n)
            .map(|_| self.seed_running_with_volumes(blueprint, 1))
            .collect()
    }

    /// Add one running server with `volumes` attached volumes.
    pub fn seed_running_with_volumes(&self, blueprint: &Blueprint, volumes: usize) -> Instance {
        let mut remote = self.remote.lock().unwrap();
        // Seeded servers carry exactly the blueprint's tags.
        let request = CreateRequest {
            tags: blueprint.tags.clone(),
            ..CreateRequest::from_blueprint(blueprint)
        };
        let mut instance = self.build_instance(&mut remote, &request, volumes);
        instance.status = InstanceStatus::Running;
        remote.servers.push(instance.clone());
        instance
    }

    /// Add an arbitrary server as-is.
    pub fn seed(&self, instance: Instance) {
        let mut remote = self.remote.lock().unwrap();
        remote.volumes.extend(instance.volumes.iter().cloned());
        remote.servers.push(instance);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    /// Calls that change remote state.
    pub fn mutations(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind() != CallKind::ListPage)
            .count()
    }

    pub fn servers(&self) -> Vec<Instance> {
        self.remote.lock().unwrap().servers.clone()
    }

    pub fn volumes(&self) -> Vec<VolumeId> {
        self.remote.lock().unwrap().volumes.clone()
    }

    pub fn user_data(&self, server: &str) -> Option<BTreeMap<String, String>> {
        self.remote.lock().unwrap().user_data.get(server).cloned()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn build_instance(&self, remote: &mut Remote, request: &CreateRequest, volumes: usize) -> Instance {
        let n = remote.next_id();
        let volumes: Vec<VolumeId> = (0..volumes).map(|i| format!("vol-{n}-{i}")).collect();
        remote.volumes.extend(volumes.iter().cloned());
        Instance {
            id: format!("srv-{n}"),
            name: if request.name.is_empty() {
                format!("srv-{n}")
            } else {
                request.name.clone()
            },
            zone: request.zone.clone().unwrap_or_else(|| self.default_zone.clone()),
            commercial_type: request.commercial_type.clone(),
            tags: request.tags.clone(),
            status: InstanceStatus::Stopped,
            volumes,
        }
    }

    /// Record the call, apply configured latency, and check failure rules.
    async fn enter(&self, call: Call) -> ProviderResult<InFlight<'_>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let should_fail = self.failures.lock().unwrap().iter().any(|rule| {
            rule.kind == call.kind()
                && rule
                    .target
                    .as_deref()
                    .is_none_or(|t| call.target() == Some(t))
        });
        self.calls.lock().unwrap().push(call);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if should_fail {
            return Err(ProviderError::Api {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(guard)
    }
}

#[async_trait]
impl ComputeProvider for FakeProvider {
    async fn list_page(
        &self,
        filter: &ListFilter,
        page: u32,
        per_page: u32,
    ) -> ProviderResult<ServerPage> {
        let _guard = self.enter(Call::ListPage { page }).await?;
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(ProviderError::Transport(format!("page {page} unavailable")));
        }

        let remote = self.remote.lock().unwrap();
        let matching: Vec<&Instance> = remote.servers.iter().filter(|s| filter.matches(s)).collect();
        let start = (page.saturating_sub(1) * per_page) as usize;
        let servers = matching
            .iter()
            .skip(start)
            .take(per_page as usize)
            .map(|s| (*s).clone())
            .collect();

        Ok(ServerPage {
            servers,
            total_count: matching.len() as u32,
        })
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<Instance> {
        let _guard = self
            .enter(Call::Create {
                name: request.name.clone(),
            })
            .await?;

        let mut remote = self.remote.lock().unwrap();
        let instance = self.build_instance(&mut remote, request, 1);
        remote.servers.push(instance.clone());
        Ok(instance)
    }

    async fn set_user_data(
        &self,
        instance: &Instance,
        data: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        let _guard = self
            .enter(Call::SetUserData {
                server: instance.id.clone(),
            })
            .await?;

        let mut remote = self.remote.lock().unwrap();
        if !remote.servers.iter().any(|s| s.id == instance.id) {
            return Err(ProviderError::NotFound(instance.id.clone()));
        }
        remote.user_data.insert(instance.id.clone(), data.clone());
        Ok(())
    }

    async fn action_and_wait(
        &self,
        instance: &Instance,
        action: PowerAction,
        _timeout: Duration,
    ) -> ProviderResult<()> {
        let _guard = self
            .enter(Call::Action {
                server: instance.id.clone(),
                action,
            })
            .await?;

        let mut remote = self.remote.lock().unwrap();
        let server = remote
            .servers
            .iter_mut()
            .find(|s| s.id == instance.id)
            .ok_or_else(|| ProviderError::NotFound(instance.id.clone()))?;
        server.status = match action {
            PowerAction::PowerOn => InstanceStatus::Running,
            PowerAction::PowerOff => InstanceStatus::Stopped,
        };
        Ok(())
    }

    async fn delete(&self, instance: &Instance) -> ProviderResult<()> {
        let _guard = self
            .enter(Call::Delete {
                server: instance.id.clone(),
            })
            .await?;

        let mut remote = self.remote.lock().unwrap();
        let idx = remote
            .servers
            .iter()
            .position(|s| s.id == instance.id)
            .ok_or_else(|| ProviderError::NotFound(instance.id.clone()))?;
        if !remote.servers[idx].status.is_stopped() {
            return Err(ProviderError::Api {
                status: 400,
                message: "server should be stopped".to_string(),
            });
        }
        remote.servers.remove(idx);
        remote.user_data.remove(&instance.id);
        Ok(())
    }

    async fn delete_volume(&self, _zone: &Zone, volume_id: &str) -> ProviderResult<()> {
        let _guard = self
            .enter(Call::DeleteVolume {
                volume: volume_id.to_string(),
            })
            .await?;

        let mut remote = self.remote.lock().unwrap();
        if remote
            .servers
            .iter()
            .any(|s| s.volumes.iter().any(|v| v == volume_id))
        {
            return Err(ProviderError::Api {
                status: 400,
                message: "volume is attached to a server".to_string(),
            });
        }
        let idx = remote
            .volumes
            .iter()
            .position(|v| v == volume_id)
            .ok_or_else(|| ProviderError::NotFound(volume_id.to_string()))?;
        remote.volumes.remove(idx);
        Ok(())
    }
}
