use std::collections::HashMap;
use std::net::IpAddr;

use axum::http::HeaderMap;
use gatewarden_common::config::ClientsConfig;
use gatewarden_common::RequestDescriptor;
use ipnet::IpNet;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

struct KeyedClient {
    name: String,
    tier: String,
}

struct NetworkClient {
    network: IpNet,
    name: String,
    tier: String,
}

/// Resolves inbound requests to the descriptors admission control needs.
///
/// Identification is best-effort and never fails: an API key wins over a
/// network match, and an unknown caller keeps its address as the client
/// key with an empty tier (the engine then applies the default tier).
pub struct ClientDirectory {
    keys: HashMap<String, KeyedClient>,
    networks: Vec<NetworkClient>,
}

impl ClientDirectory {
    /// Build the directory from configuration. Invalid network ranges are
    /// logged and skipped, never fatal.
    pub fn from_config(config: &ClientsConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|entry| {
                (
                    entry.key.clone(),
                    KeyedClient {
                        name: entry.name.clone(),
                        tier: entry.tier.clone(),
                    },
                )
            })
            .collect();

        let mut networks = Vec::new();
        for entry in &config.networks {
            // A bare address is accepted as a host-length prefix.
            let parsed = entry
                .cidr
                .parse::<IpNet>()
                .or_else(|_| entry.cidr.parse::<IpAddr>().map(IpNet::from));
            match parsed {
                Ok(network) => networks.push(NetworkClient {
                    network,
                    name: entry.name.clone(),
                    tier: entry.tier.clone(),
                }),
                Err(_) => {
                    warn!(
                        client = %entry.name,
                        range = %entry.cidr,
                        "skipping invalid network range"
                    );
                }
            }
        }

        Self { keys, networks }
    }

    pub fn identify(
        &self,
        endpoint: &str,
        headers: &HeaderMap,
        peer_addr: IpAddr,
    ) -> RequestDescriptor {
        let source_addr = client_ip(headers, peer_addr);

        // API keys are sensitive: log the client name, never the key.
        if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            if let Some(client) = self.keys.get(key) {
                debug!(client = %client.name, "identified client by API key");
                return RequestDescriptor {
                    endpoint: endpoint.to_string(),
                    client_key: key.to_string(),
                    source_addr,
                    tier: client.tier.clone(),
                };
            }
            debug!("request carried an unrecognized API key");
        }

        if let Ok(addr) = source_addr.parse::<IpAddr>() {
            for client in &self.networks {
                if client.network.contains(&addr) {
                    debug!(
                        client = %client.name,
                        matched = %client.network,
                        "identified client by network range"
                    );
                    return RequestDescriptor {
                        endpoint: endpoint.to_string(),
                        client_key: client.name.clone(),
                        source_addr,
                        tier: client.tier.clone(),
                    };
                }
            }
        }

        RequestDescriptor {
            endpoint: endpoint.to_string(),
            client_key: source_addr.clone(),
            source_addr,
            tier: String::new(),
        }
    }
}

/// The first `X-Forwarded-For` entry wins over the socket peer address,
/// for proxy and load-balancer deployments.
fn client_ip(headers: &HeaderMap, peer: IpAddr) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| peer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewarden_common::config::{ApiKeyEntry, NetworkEntry};

    fn directory() -> ClientDirectory {
        ClientDirectory::from_config(&ClientsConfig {
            api_keys: vec![ApiKeyEntry {
                key: "k-secret".into(),
                name: "acme".into(),
                tier: "premium".into(),
            }],
            networks: vec![
                NetworkEntry {
                    cidr: "10.0.0.0/8".into(),
                    name: "office".into(),
                    tier: "premium".into(),
                },
                NetworkEntry {
                    cidr: "not-a-range".into(),
                    name: "broken".into(),
                    tier: "free".into(),
                },
                NetworkEntry {
                    cidr: "192.168.1.1".into(),
                    name: "host".into(),
                    tier: "free".into(),
                },
            ],
        })
    }

    fn peer() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    #[test]
    fn invalid_ranges_are_skipped() {
        let directory = directory();
        assert_eq!(directory.networks.len(), 2);
    }

    #[test]
    fn api_key_wins_over_network() {
        let directory = directory();
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, "k-secret".parse().unwrap());
        headers.insert(FORWARDED_FOR_HEADER, "10.1.2.3".parse().unwrap());

        let d = directory.identify("/api/data", &headers, peer());
        assert_eq!(d.client_key, "k-secret");
        assert_eq!(d.tier, "premium");
        assert_eq!(d.source_addr, "10.1.2.3");
    }

    #[test]
    fn network_match_names_the_client() {
        let directory = directory();
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, "10.1.2.3".parse().unwrap());

        let d = directory.identify("/api/data", &headers, peer());
        assert_eq!(d.client_key, "office");
        assert_eq!(d.tier, "premium");
    }

    #[test]
    fn bare_address_entry_matches_exactly() {
        let directory = directory();
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, "192.168.1.1".parse().unwrap());
        assert_eq!(directory.identify("/x", &headers, peer()).client_key, "host");

        headers.insert(FORWARDED_FOR_HEADER, "192.168.1.2".parse().unwrap());
        let d = directory.identify("/x", &headers, peer());
        assert_eq!(d.client_key, "192.168.1.2");
        assert_eq!(d.tier, "");
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let directory = directory();
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            "10.9.8.7, 172.16.0.1, 203.0.113.1".parse().unwrap(),
        );
        let d = directory.identify("/x", &headers, peer());
        assert_eq!(d.source_addr, "10.9.8.7");
        assert_eq!(d.client_key, "office");
    }

    #[test]
    fn unknown_key_falls_through_to_address_identity() {
        let directory = directory();
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, "bogus".parse().unwrap());

        let d = directory.identify("/x", &headers, peer());
        assert_eq!(d.client_key, peer().to_string());
        assert_eq!(d.tier, "");
    }
}
