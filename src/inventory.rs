//! Inventory store
//!
//! The hosts file is a multi-document YAML stream with one document per host. Document order on
//! disk carries no meaning: every load sorts the hosts by `(category, hostname)` and hands out
//! ordinals `0..n` in that order. Ordinals are the short keys users type on the command line and
//! are only valid until the inventory is next modified.

use std::{fs, io::ErrorKind, net::IpAddr, path::Path};

use cidr::IpCidr;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{HostRecord, Origin, SshmError};

/// Load the inventory from `path`, sorted and numbered.
///
/// A missing or unparseable file is treated as an empty inventory. Any other read failure, such
/// as a permission problem, is returned to the caller.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<HostRecord>, SshmError> {
    match read_hosts(path.as_ref()) {
        Ok(mut hosts) => {
            assign_ordinals(&mut hosts);
            debug!(
                "Loaded {} hosts from {}",
                hosts.len(),
                path.as_ref().display()
            );
            Ok(hosts)
        }
        Err(SshmError::StorageUnavailable(reason)) => {
            debug!("Starting with an empty inventory: {reason}");
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

fn read_hosts(path: &Path) -> Result<Vec<HostRecord>, SshmError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SshmError::StorageUnavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            warn!("Ignoring {}: not valid UTF-8", path.display());
            return Err(SshmError::StorageUnavailable(err.to_string()));
        }
        Err(err) => return Err(SshmError::Io(err)),
    };

    parse_hosts(&content).map_err(|err| {
        warn!(
            "Ignoring {}: could not parse inventory, the next add, delete or sync will replace it: {err}",
            path.display()
        );
        SshmError::StorageUnavailable(format!("{} could not be parsed: {err}", path.display()))
    })
}

/// Parse a YAML stream of host documents. Empty documents are skipped.
pub fn parse_hosts(content: &str) -> Result<Vec<HostRecord>, serde_yaml::Error> {
    let mut hosts = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        if let Some(host) = Option::<HostRecord>::deserialize(document)? {
            hosts.push(host);
        }
    }
    Ok(hosts)
}

/// Render hosts as a YAML stream, one document per host. Ordinals are not written.
pub fn render_hosts(hosts: &[HostRecord]) -> Result<String, SshmError> {
    let documents = hosts
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(documents.join("---\n"))
}

/// Overwrite the hosts file with `hosts`.
///
/// The file is written in place; a crash part-way through can leave it truncated.
pub fn save<P: AsRef<Path>>(path: P, hosts: &[HostRecord]) -> Result<(), SshmError> {
    let content = render_hosts(hosts)?;
    fs::write(path.as_ref(), content).map_err(SshmError::Write)?;
    debug!("Saved {} hosts to {}", hosts.len(), path.as_ref().display());
    Ok(())
}

/// Stable sort by `(category, hostname)`, then number from zero.
pub fn assign_ordinals(hosts: &mut [HostRecord]) {
    hosts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    for (ordinal, host) in hosts.iter_mut().enumerate() {
        host.ordinal = ordinal;
    }
}

pub fn find_by_ordinal(hosts: &[HostRecord], ordinal: usize) -> Result<&HostRecord, SshmError> {
    hosts
        .iter()
        .find(|host| host.ordinal == ordinal)
        .ok_or(SshmError::NotFound(ordinal))
}

/// Remove the host(s) carrying `ordinal`. Unknown ordinals leave the inventory as it was.
pub fn delete_by_ordinal(hosts: Vec<HostRecord>, ordinal: usize) -> Vec<HostRecord> {
    hosts
        .into_iter()
        .filter(|host| host.ordinal != ordinal)
        .collect()
}

/// Validate a user-entered host and append it.
///
/// Nothing is appended when validation fails. The new host gets the next free ordinal until the
/// inventory is reloaded and renumbered.
pub fn add(hosts: &mut Vec<HostRecord>, mut host: HostRecord) -> Result<(), SshmError> {
    host.validate()?;
    host.origin = Origin::Local;
    host.ordinal = hosts.len();
    hosts.push(host);
    Ok(())
}

/// Predicates for narrowing down a listing. Every predicate that is set has to match.
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    pub hostname: Option<String>,
    pub category: Option<String>,
    pub origin: Option<String>,
    /// Only hosts whose address is inside this network
    pub network: Option<IpCidr>,
}

impl HostFilter {
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.category.is_none()
            && self.origin.is_none()
            && self.network.is_none()
    }

    pub fn matches(&self, host: &HostRecord) -> bool {
        let text_matches = [
            (self.hostname.as_deref(), host.hostname.as_str()),
            (self.category.as_deref(), host.category.as_str()),
        ]
        .into_iter()
        .all(|(needle, haystack)| {
            needle.is_none_or(|needle| contains_ignore_case(haystack, needle))
        });
        let origin_matches = self.origin.as_deref().is_none_or(|needle| {
            host.origin
                .names()
                .iter()
                .any(|name| contains_ignore_case(name, needle))
        });

        // hosts with unparseable addresses never match a network
        text_matches
            && origin_matches
            && self.network.as_ref().is_none_or(|network| {
                host.address
                    .parse::<IpAddr>()
                    .is_ok_and(|address| network.contains(&address))
            })
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn filter<'a>(hosts: &'a [HostRecord], host_filter: &HostFilter) -> Vec<&'a HostRecord> {
    hosts
        .iter()
        .filter(|host| host_filter.matches(host))
        .collect()
}
