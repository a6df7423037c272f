//! Merging Netbox devices into the local inventory
//!
//! Records with [Origin::External] belong to the external source: every sync throws all of them
//! away and rebuilds them from the freshly fetched device list. [Origin::Local] records are never
//! touched.

use std::path::Path;

use tracing::{debug, info};

use crate::{DEFAULT_CATEGORY, HostRecord, Origin, SshmError, inventory};

/// A device as reported by the external source, before it becomes a [HostRecord].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExternalRecord {
    pub name: Option<String>,
    /// Manufacturer or device type
    pub classification: Option<String>,
    /// Primary address, possibly with a prefix length (`10.0.0.5/24`)
    pub primary_address: Option<String>,
}

impl RawExternalRecord {
    /// Returns `None` when the device has no usable primary address.
    fn into_host(self) -> Option<HostRecord> {
        let address = self
            .primary_address
            .as_deref()
            .map(strip_prefix_length)
            .filter(|address| !address.is_empty())?
            .to_string();

        let hostname = self
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| address.clone());

        let category = self
            .classification
            .map(|class| class.trim().to_string())
            .filter(|class| !class.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Some(HostRecord::external(hostname, address, category))
    }
}

/// Drop a trailing `/NN` prefix length from an address.
pub fn strip_prefix_length(address: &str) -> &str {
    address
        .split_once('/')
        .map_or(address, |(ip, _prefix)| ip)
        .trim()
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Local hosts followed by the rebuilt external hosts, unsorted and unnumbered
    pub hosts: Vec<HostRecord>,
    /// External hosts created by this sync
    pub synced: usize,
    /// External hosts that were discarded
    pub replaced: usize,
    /// Fetched devices without a primary address
    pub skipped: usize,
}

pub fn reconcile(current: Vec<HostRecord>, fetched: Vec<RawExternalRecord>) -> ReconcileOutcome {
    let (mut hosts, stale): (Vec<HostRecord>, Vec<HostRecord>) = current
        .into_iter()
        .partition(|host| host.origin == Origin::Local);

    let fetched_count = fetched.len();
    let external: Vec<HostRecord> = fetched
        .into_iter()
        .filter_map(|record| {
            let name = record.name.clone();
            let host = record.into_host();
            if host.is_none() {
                debug!("Skipping device {name:?}: no primary address");
            }
            host
        })
        .collect();

    let synced = external.len();
    hosts.extend(external);

    ReconcileOutcome {
        hosts,
        synced,
        replaced: stale.len(),
        skipped: fetched_count - synced,
    }
}

/// Somewhere authoritative devices can be fetched from.
///
/// Implementations must either return the complete device list or an error, never a partial
/// list.
pub trait ExternalSource {
    fn fetch_records(
        &self,
    ) -> impl Future<Output = Result<Vec<RawExternalRecord>, SshmError>> + Send;
}

/// Fetch from `source`, reconcile against the inventory at `inventory_path` and save the result.
///
/// The inventory file is only read and written after the fetch has fully succeeded, so a failed
/// fetch leaves it exactly as it was.
pub async fn sync_inventory<S: ExternalSource>(
    inventory_path: &Path,
    source: &S,
) -> Result<ReconcileOutcome, SshmError> {
    let fetched = source.fetch_records().await?;
    info!("Fetched {} devices from Netbox", fetched.len());

    let current = inventory::load(inventory_path)?;
    let outcome = reconcile(current, fetched);
    inventory::save(inventory_path, &outcome.hosts)?;

    Ok(outcome)
}
