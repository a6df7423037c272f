//! Netbox device client
//!
//! Pulls every device with a primary IP from `/api/dcim/devices/`, following pagination until the
//! listing is exhausted. Nothing is returned unless every page was fetched and decoded.

use std::{collections::HashSet, time::Duration};

use reqwest::{
    Client, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    SshmError,
    config::NetboxConfig,
    reconcile::{ExternalSource, RawExternalRecord},
};

/// Devices requested per page
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct DevicePage {
    #[serde(default)]
    pub count: Option<usize>,
    pub next: Option<String>,
    pub results: Vec<NetboxDevice>,
}

#[derive(Debug, Deserialize)]
pub struct NetboxDevice {
    pub name: Option<String>,
    pub device_type: Option<NetboxDeviceType>,
    pub primary_ip: Option<NetboxAddress>,
}

#[derive(Debug, Deserialize)]
pub struct NetboxDeviceType {
    pub manufacturer: Option<NetboxNamed>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NetboxNamed {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NetboxAddress {
    pub address: Option<String>,
}

impl From<NetboxDevice> for RawExternalRecord {
    fn from(device: NetboxDevice) -> Self {
        let classification = device.device_type.and_then(|device_type| {
            device_type
                .manufacturer
                .map(|manufacturer| manufacturer.name)
                .or(device_type.model)
        });

        RawExternalRecord {
            name: device.name,
            classification,
            primary_address: device.primary_ip.and_then(|ip| ip.address),
        }
    }
}

pub struct NetboxClient {
    base_url: String,
    client: Client,
}

impl NetboxClient {
    pub fn new(config: &NetboxConfig) -> Result<Self, SshmError> {
        config.check()?;

        let mut headers = HeaderMap::new();
        let mut token =
            HeaderValue::from_str(&format!("Token {}", config.token)).map_err(|err| {
                SshmError::Config(format!("Netbox token is not a valid header: {err}"))
            })?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|err| SshmError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn devices_url(&self) -> String {
        format!(
            "{}/api/dcim/devices/?has_primary_ip=true&limit={PAGE_SIZE}",
            self.base_url
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<DevicePage, SshmError> {
        trace!("GET {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SshmError::ExternalSource(format!(
                "Netbox rejected the API token ({status})"
            )));
        } else if !status.is_success() {
            return Err(SshmError::ExternalSource(format!(
                "Netbox returned {status} for {url}"
            )));
        }

        response.json::<DevicePage>().await.map_err(|err| {
            SshmError::ExternalSource(format!("Failed to decode Netbox response: {err}"))
        })
    }

    pub async fn fetch_devices(&self) -> Result<Vec<NetboxDevice>, SshmError> {
        let mut devices = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.devices_url());

        while let Some(url) = next {
            let page = self.fetch_page(&url).await?;
            debug!(
                "Fetched {} devices ({} total reported)",
                page.results.len(),
                page.count.map_or_else(|| "?".to_string(), |c| c.to_string())
            );
            devices.extend(page.results);
            visited.insert(url);
            if let Some(link) = page.next.as_deref() {
                self.check_next_link(link, &visited)?;
            }
            next = page.next;
        }

        Ok(devices)
    }

    /// A `next` link must stay on the configured Netbox host, since every request carries the
    /// token, and must not point back at a page already fetched.
    pub fn check_next_link(&self, link: &str, visited: &HashSet<String>) -> Result<(), SshmError> {
        if visited.contains(link) {
            return Err(SshmError::ExternalSource(format!(
                "Netbox pagination loops back to {link}"
            )));
        }

        let base = Url::parse(&self.base_url).map_err(|err| {
            SshmError::Config(format!("Invalid Netbox URL {}: {err}", self.base_url))
        })?;
        let next = Url::parse(link).map_err(|err| {
            SshmError::ExternalSource(format!("Netbox returned an invalid next link {link}: {err}"))
        })?;
        if next.host_str() != base.host_str() {
            return Err(SshmError::ExternalSource(format!(
                "Refusing to follow Netbox next link to another host: {link}"
            )));
        }
        Ok(())
    }
}

impl ExternalSource for NetboxClient {
    async fn fetch_records(&self) -> Result<Vec<RawExternalRecord>, SshmError> {
        Ok(self
            .fetch_devices()
            .await?
            .into_iter()
            .map(RawExternalRecord::from)
            .collect())
    }
}
