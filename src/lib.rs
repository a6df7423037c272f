#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::await_holding_lock)]

use std::{fmt::Display, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::ssh::SshError;

pub mod cli;
pub mod config;
pub mod inventory;
pub mod netbox;
pub mod reconcile;
pub mod ssh;
#[cfg(test)]
mod tests;

/// Category used for records that were written before categories existed.
pub const DEFAULT_CATEGORY: &str = "unknown";

/// Where a host record came from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Entered by the user, never touched by a sync
    #[default]
    #[serde(rename = "local")]
    Local,
    /// Owned by Netbox, replaced wholesale on every sync
    #[serde(rename = "netbox", alias = "external")]
    External,
}

impl Origin {
    /// Every name the origin is known by, the persisted one first
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Origin::Local => &["local"],
            Origin::External => &["netbox", "external"],
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::External => write!(f, "netbox"),
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// One inventory entry, as stored in the hosts file.
///
/// `ordinal` is never written to disk. It is recomputed from the sort order every time the
/// inventory is loaded, so the same host may get a different ordinal after an add or delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    pub hostname: String,
    #[serde(rename = "IP")]
    pub address: String,
    #[serde(
        default = "default_category",
        alias = "type",
        alias = "manufacturer"
    )]
    pub category: String,
    #[serde(default, rename = "source", alias = "origin")]
    pub origin: Origin,
    #[serde(skip)]
    pub ordinal: usize,
}

impl HostRecord {
    /// Build a user-entered record. Call [HostRecord::validate] (or [inventory::add]) before
    /// trusting it.
    pub fn local(
        hostname: impl Into<String>,
        address: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into().trim().to_string(),
            address: address.into().trim().to_string(),
            category: category.into().trim().to_string(),
            origin: Origin::Local,
            ordinal: 0,
        }
    }

    pub fn external(hostname: String, address: String, category: String) -> Self {
        Self {
            hostname,
            address,
            category,
            origin: Origin::External,
            ordinal: 0,
        }
    }

    /// Checks the fields a user has to get right before a record is accepted.
    pub fn validate(&self) -> Result<(), SshmError> {
        if self.hostname.is_empty() {
            return Err(SshmError::Validation("hostname must not be empty".to_string()));
        }
        if self.category.is_empty() {
            return Err(SshmError::Validation("category must not be empty".to_string()));
        }
        self.address.parse::<Ipv4Addr>().map_err(|err| {
            SshmError::Validation(format!(
                "'{}' is not a valid IPv4 address: {err}",
                self.address
            ))
        })?;
        Ok(())
    }

    /// Sort key for the inventory: category first, then hostname, both case-sensitive.
    pub fn sort_key(&self) -> (&str, &str) {
        (self.category.as_str(), self.hostname.as_str())
    }
}

#[derive(Debug)]
pub enum SshmError {
    Config(String),
    ExternalSource(String),
    Io(std::io::Error),
    MissingConfiguration(String),
    NotFound(usize),
    Serde(String),
    Ssh(SshError),
    StorageUnavailable(String),
    Validation(String),
    Write(std::io::Error),
}

impl From<SshError> for SshmError {
    fn from(err: SshError) -> Self {
        SshmError::Ssh(err)
    }
}

impl From<std::io::Error> for SshmError {
    fn from(err: std::io::Error) -> Self {
        SshmError::Io(err)
    }
}

impl From<serde_json::Error> for SshmError {
    fn from(err: serde_json::Error) -> Self {
        SshmError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for SshmError {
    fn from(err: serde_yaml::Error) -> Self {
        SshmError::Serde(err.to_string())
    }
}

impl From<reqwest::Error> for SshmError {
    fn from(err: reqwest::Error) -> Self {
        SshmError::ExternalSource(err.to_string())
    }
}

impl std::fmt::Display for SshmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshmError::Config(error) => write!(f, "Config error: {error}"),
            SshmError::ExternalSource(error) => write!(f, "Netbox error: {error}"),
            SshmError::Io(error) => write!(f, "IO error: {error}"),
            SshmError::MissingConfiguration(what) => {
                write!(f, "Missing configuration: {what}")
            }
            SshmError::NotFound(ordinal) => write!(f, "No host with key {ordinal}"),
            SshmError::Serde(error) => write!(f, "Serde error: {error}"),
            SshmError::Ssh(error) => write!(f, "SSH error: {error}"),
            SshmError::StorageUnavailable(error) => {
                write!(f, "Inventory unavailable: {error}")
            }
            SshmError::Validation(error) => write!(f, "Invalid host: {error}"),
            SshmError::Write(error) => write!(f, "Failed to write inventory: {error}"),
        }
    }
}

impl std::error::Error for SshmError {}
