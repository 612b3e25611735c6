//! Source-address allow-list for inbound hooks.

use ipnetwork::IpNetwork;
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Range used until the metadata refresh succeeds.
pub const DEFAULT_RANGE: &str = "192.30.252.0/22";

/// Metadata document listing the hook delivery ranges.
pub const DEFAULT_METADATA_URL: &str = "https://api.github.com/meta";

#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("Invalid CIDR range {range}: {message}")]
    InvalidRange { range: String, message: String },
    #[error("Metadata request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Metadata endpoint returned status {0}")]
    Status(u16),
    #[error("Metadata contained no hook ranges")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    hooks: Vec<String>,
}

/// Shared, replaceable set of trusted CIDR ranges.
#[derive(Debug, Clone)]
pub struct AllowList {
    ranges: Arc<RwLock<Vec<IpNetwork>>>,
}

impl Default for AllowList {
    fn default() -> Self {
        let range = IpNetwork::from_str(DEFAULT_RANGE)
            .map(|range| vec![range])
            .unwrap_or_default();
        Self::new(range)
    }
}

impl AllowList {
    pub fn new(ranges: Vec<IpNetwork>) -> Self {
        Self {
            ranges: Arc::new(RwLock::new(ranges)),
        }
    }

    /// Build from CIDR strings such as `10.0.0.0/8`.
    pub fn parse<I, S>(ranges: I) -> Result<Self, AllowListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(parse_ranges(ranges)?))
    }

    /// True if `addr` lies in any range. IPv4-mapped IPv6 addresses are
    /// matched as IPv4.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = canonical(addr);
        self.read().iter().any(|range| range.contains(addr))
    }

    pub fn ranges(&self) -> Vec<IpNetwork> {
        self.read().clone()
    }

    pub fn replace(&self, ranges: Vec<IpNetwork>) {
        *self
            .ranges
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = ranges;
    }

    /// Fetch the metadata document and replace the ranges with its
    /// `hooks` entries. The current list is kept on any error.
    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<usize, AllowListError> {
        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, "shipwright")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AllowListError::Status(response.status().as_u16()));
        }

        let metadata: Metadata = response.json().await?;
        let ranges = parse_ranges(&metadata.hooks)?;
        if ranges.is_empty() {
            return Err(AllowListError::Empty);
        }

        let count = ranges.len();
        self.replace(ranges);
        Ok(count)
    }

    /// Refresh in the background; failures are logged and the current
    /// list stays in effect.
    pub fn spawn_refresh(&self, url: String, timeout: Duration) -> JoinHandle<()> {
        let allow_list = self.clone();
        tokio::spawn(async move {
            let client = match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "Could not build metadata client");
                    return;
                }
            };

            match allow_list.refresh(&client, &url).await {
                Ok(count) => info!(url = %url, ranges = count, "Allow-list refreshed"),
                Err(e) => error!(url = %url, error = %e, "Allow-list refresh failed, keeping current ranges"),
            }
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<IpNetwork>> {
        self.ranges
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_ranges<I, S>(ranges: I) -> Result<Vec<IpNetwork>, AllowListError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ranges
        .into_iter()
        .map(|range| {
            let range = range.as_ref();
            IpNetwork::from_str(range.trim()).map_err(|e| AllowListError::InvalidRange {
                range: range.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

pub(crate) fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
        IpAddr::V4(_) => addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_contains_private_range() {
        let list = AllowList::parse(["10.0.0.0/8"]).unwrap();
        assert!(list.contains(ip("10.1.2.3")));
        assert!(!list.contains(ip("203.0.113.5")));
    }

    #[test]
    fn test_ipv4_mapped_source() {
        let list = AllowList::parse(["10.0.0.0/8"]).unwrap();
        assert!(list.contains(ip("::ffff:10.1.2.3")));
        assert!(!list.contains(ip("::ffff:203.0.113.5")));
    }

    #[test]
    fn test_ipv6_range() {
        let list = AllowList::parse(["2a0a:a440::/29"]).unwrap();
        assert!(list.contains(ip("2a0a:a440::1")));
        assert!(!list.contains(ip("10.1.2.3")));
    }

    #[test]
    fn test_default_range() {
        let list = AllowList::default();
        assert!(list.contains(ip("192.30.252.10")));
        assert!(!list.contains(ip("10.1.2.3")));
    }

    #[test]
    fn test_invalid_range_rejected() {
        assert!(matches!(
            AllowList::parse(["not-a-cidr"]),
            Err(AllowListError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_replace() {
        let list = AllowList::default();
        let shared = list.clone();
        shared.replace(parse_ranges(["127.0.0.0/8"]).unwrap());
        assert!(list.contains(ip("127.0.0.1")));
        assert_eq!(list.ranges().len(), 1);
    }
}
