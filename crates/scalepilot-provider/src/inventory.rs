//! Inventory fetcher: a consistent snapshot of the pool.
//!
//! Pages are requested with a fixed size starting at page 1 until the
//! provider returns an empty page. Any failing page aborts the listing;
//! partial results are never returned.

use scalepilot_core::{Blueprint, Instance, InstanceId, InstanceStatus};
use serde::Serialize;
use tracing::debug;

use crate::api::{ComputeProvider, ListFilter};
use crate::error::ProviderResult;

/// Servers requested per page.
pub const PAGE_SIZE: u32 = 100;

/// Point-in-time listing of servers matching a blueprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    servers: Vec<Instance>,
}

impl Inventory {
    pub fn new(servers: Vec<Instance>) -> Self {
        Self { servers }
    }

    /// Whether every server is running. An empty inventory is ready.
    pub fn ready(&self) -> bool {
        self.servers
            .iter()
            .all(|s| s.status == InstanceStatus::Running)
    }

    pub fn count(&self) -> i64 {
        self.servers.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.servers.iter().map(|s| s.id.clone()).collect()
    }

    pub fn with_id(&self, id: &str) -> Option<&Instance> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Servers whose id is in `ids`, in the order of `ids`. Unknown ids are skipped.
    pub fn with_ids(&self, ids: &[&str]) -> Vec<&Instance> {
        ids.iter().filter_map(|id| self.with_id(id)).collect()
    }

    pub fn with_name(&self, name: &str) -> Option<&Instance> {
        self.servers.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.servers.iter()
    }

    pub fn into_vec(self) -> Vec<Instance> {
        self.servers
    }
}

/// List every server matching `blueprint`.
pub async fn list_all(
    provider: &dyn ComputeProvider,
    blueprint: &Blueprint,
) -> ProviderResult<Inventory> {
    let filter = ListFilter::from(blueprint);
    let mut servers = Vec::new();
    let mut page = 1;

    loop {
        let resp = provider.list_page(&filter, page, PAGE_SIZE).await?;
        if resp.servers.is_empty() {
            debug!(pages = page, servers = servers.len(), "inventory listed");
            return Ok(Inventory::new(servers));
        }
        servers.extend(resp.servers);
        page += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, CallKind, FakeProvider};

    fn blueprint() -> Blueprint {
        Blueprint {
            zone: Some("fr-par-1".parse().unwrap()),
            tags: vec!["nomad".to_string()],
            ..Blueprint::default()
        }
    }

    fn page_requests(fake: &FakeProvider) -> Vec<u32> {
        fake.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListPage { page } => Some(page),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn accumulates_pages_until_empty() {
        let fake = FakeProvider::new();
        fake.seed_running(&blueprint(), 237);

        let inventory = list_all(&fake, &blueprint()).await.unwrap();

        assert_eq!(inventory.count(), 237);
        assert_eq!(page_requests(&fake), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_first_page_stops_immediately() {
        let fake = FakeProvider::new();

        let inventory = list_all(&fake, &blueprint()).await.unwrap();

        assert!(inventory.is_empty());
        assert_eq!(page_requests(&fake), vec![1]);
    }

    #[tokio::test]
    async fn preserves_arrival_order() {
        let fake = FakeProvider::new();
        let seeded = fake.seed_running(&blueprint(), 150);

        let inventory = list_all(&fake, &blueprint()).await.unwrap();

        let expected: Vec<_> = seeded.iter().map(|s| s.id.clone()).collect();
        assert_eq!(inventory.ids(), expected);
    }

    #[tokio::test]
    async fn page_failure_returns_error_without_partial_result() {
        let fake = FakeProvider::new();
        fake.seed_running(&blueprint(), 150);
        fake.fail_on_page(2);

        let result = list_all(&fake, &blueprint()).await;

        assert!(result.is_err());
        assert_eq!(page_requests(&fake), vec![1, 2]);
        assert_eq!(fake.count(CallKind::ListPage), 2);
    }

    #[tokio::test]
    async fn unfiltered_blueprint_lists_whole_pool() {
        let fake = FakeProvider::new();
        fake.seed_running(&blueprint(), 3);
        fake.seed_running(&Blueprint::named("unrelated"), 2);

        let all = list_all(&fake, &Blueprint::default()).await.unwrap();
        let pool = list_all(&fake, &blueprint()).await.unwrap();

        assert_eq!(all.count(), 5);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn readiness_requires_all_running() {
        let fake = FakeProvider::new();
        let mut servers = fake.seed_running(&blueprint(), 2);
        assert!(Inventory::new(servers.clone()).ready());

        servers[1].status = InstanceStatus::Starting;
        assert!(!Inventory::new(servers).ready());
    }

    #[test]
    fn lookups_by_id_and_name() {
        let fake = FakeProvider::new();
        let servers = fake.seed_running(&blueprint(), 3);
        let inventory = Inventory::new(servers.clone());

        assert_eq!(inventory.with_id(&servers[1].id), Some(&servers[1]));
        assert_eq!(inventory.with_name(&servers[2].name), Some(&servers[2]));
        assert!(inventory.with_id("missing").is_none());

        let picked = inventory.with_ids(&[servers[2].id.as_str(), "missing", servers[0].id.as_str()]);
        assert_eq!(picked, vec![&servers[2], &servers[0]]);
    }
}
