use crate::reconcile::{ExternalSource, RawExternalRecord, sync_inventory};
use crate::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Always returns the same device list
struct FixedSource(Vec<RawExternalRecord>);

impl ExternalSource for FixedSource {
    async fn fetch_records(&self) -> Result<Vec<RawExternalRecord>, SshmError> {
        Ok(self.0.clone())
    }
}

/// Behaves like an unreachable Netbox
struct FailingSource;

impl ExternalSource for FailingSource {
    async fn fetch_records(&self) -> Result<Vec<RawExternalRecord>, SshmError> {
        Err(SshmError::ExternalSource("connection refused".to_string()))
    }
}

fn device(name: &str, address: Option<&str>) -> RawExternalRecord {
    RawExternalRecord {
        name: Some(name.to_string()),
        classification: Some("Juniper".to_string()),
        primary_address: address.map(str::to_string),
    }
}

fn mixed_inventory() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hosts.yaml");
    let hosts = vec![
        HostRecord::local("jumpbox", "10.0.0.2", "Linux"),
        HostRecord::external(
            "stale-sw1".to_string(),
            "10.1.0.1".to_string(),
            "Cisco".to_string(),
        ),
        HostRecord::external(
            "stale-sw2".to_string(),
            "10.1.0.2".to_string(),
            "Cisco".to_string(),
        ),
    ];
    inventory::save(&path, &hosts).expect("Failed to seed inventory");
    (temp_dir, path)
}

/// Sorted copies with ordinals cleared, for comparing inventories as sets
fn normalized(hosts: &[HostRecord]) -> Vec<HostRecord> {
    let mut hosts: Vec<HostRecord> = hosts
        .iter()
        .cloned()
        .map(|mut host| {
            host.ordinal = 0;
            host
        })
        .collect();
    hosts.sort_by(|a, b| {
        (&a.category, &a.hostname, &a.address).cmp(&(&b.category, &b.hostname, &b.address))
    });
    hosts
}

#[test]
fn test_ordinals_are_reassigned_after_delete() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hosts.yaml");
    let hosts = vec![
        HostRecord::local("a1", "10.0.0.1", "a"),
        HostRecord::local("a2", "10.0.0.2", "a"),
        HostRecord::local("b1", "10.0.0.3", "b"),
        HostRecord::local("c1", "10.0.0.4", "c"),
    ];
    inventory::save(&path, &hosts).expect("Failed to save");

    let loaded = inventory::load(&path).expect("Failed to load");
    let remaining = inventory::delete_by_ordinal(loaded, 1);
    inventory::save(&path, &remaining).expect("Failed to save");

    let reloaded = inventory::load(&path).expect("Failed to reload");
    let keys: Vec<(usize, &str)> = reloaded
        .iter()
        .map(|h| (h.ordinal, h.hostname.as_str()))
        .collect();
    assert_eq!(keys, vec![(0, "a1"), (1, "b1"), (2, "c1")]);
}

#[test]
fn test_save_load_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hosts.yaml");
    let original = vec![
        HostRecord::local("web", "192.168.0.10", "Dell"),
        HostRecord::external(
            "fw".to_string(),
            "192.168.0.1".to_string(),
            "Fortinet".to_string(),
        ),
        HostRecord::local("web", "192.168.0.11", "Dell"),
    ];

    inventory::save(&path, &original).expect("Failed to save");
    let first = inventory::load(&path).expect("Failed to load");
    inventory::save(&path, &first).expect("Failed to save again");
    let second = inventory::load(&path).expect("Failed to load again");

    assert_eq!(normalized(&second), normalized(&original));
    assert_eq!(first, second);
}

#[test]
fn test_old_inventory_format_is_readable() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(".sshmhosts.yaml");
    fs::write(
        &path,
        "IP: 127.0.0.1\nhostname: loopback\n---\nIP: 1.1.1.1\nhostname: host1\n---\nIP: 2.2.2.2\nhostname: host2\n",
    )
    .expect("Failed to write");

    let hosts = inventory::load(&path).expect("Failed to load");
    assert_eq!(hosts.len(), 3);
    assert!(hosts.iter().all(|h| h.origin == Origin::Local));
    assert!(hosts.iter().all(|h| h.category == DEFAULT_CATEGORY));

    let loopback = hosts
        .iter()
        .find(|h| h.hostname == "loopback")
        .expect("loopback should be present");
    assert_eq!(loopback.address, "127.0.0.1");
}

#[tokio::test]
async fn test_sync_preserves_local_and_replaces_external() {
    let (_temp_dir, path) = mixed_inventory();
    let source = FixedSource(vec![
        device("core-sw", Some("10.2.0.1/24")),
        device("unaddressed", None),
    ]);

    let outcome = sync_inventory(&path, &source)
        .await
        .expect("sync should succeed");
    assert_eq!(outcome.synced, 1);
    assert_eq!(outcome.replaced, 2);
    assert_eq!(outcome.skipped, 1);

    let hosts = inventory::load(&path).expect("Failed to load");
    let names: Vec<(&str, Origin)> = hosts
        .iter()
        .map(|h| (h.hostname.as_str(), h.origin))
        .collect();
    assert_eq!(
        names,
        vec![("core-sw", Origin::External), ("jumpbox", Origin::Local)]
    );
    assert_eq!(hosts[0].address, "10.2.0.1");
    assert!(hosts.iter().all(|h| h.hostname != "unaddressed"));
}

#[tokio::test]
async fn test_sync_into_missing_inventory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hosts.yaml");

    let source = FixedSource(vec![device("edge", Some("172.16.0.1/30"))]);
    sync_inventory(&path, &source)
        .await
        .expect("sync should succeed");

    let hosts = inventory::load(&path).expect("Failed to load");
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].address, "172.16.0.1");
}

#[tokio::test]
async fn test_failed_fetch_leaves_file_untouched() {
    let (_temp_dir, path) = mixed_inventory();
    let before = fs::read(&path).expect("Failed to read");

    let result = sync_inventory(&path, &FailingSource).await;
    assert!(matches!(result, Err(SshmError::ExternalSource(_))));

    let after = fs::read(&path).expect("Failed to read");
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_failed_fetch_does_not_create_inventory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hosts.yaml");

    let result = sync_inventory(&path, &FailingSource).await;
    assert!(result.is_err());
    assert!(!path.exists());
}
