use std::net::IpAddr;

use ipnet::IpNet;

/// How a policy's endpoint criterion matched the request endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMatch {
    Exact,
    /// The literal `*` pattern, which matches any endpoint.
    Wildcard,
    /// A `{param}`-segment template; carries the placeholder count.
    Template(u32),
}

/// Match an endpoint criterion against a concrete request path.
///
/// Templates match segment-for-segment with equal segment counts: literal
/// segments must be equal, `{...}` segments match anything.
pub fn match_endpoint(pattern: &str, endpoint: &str) -> Option<EndpointMatch> {
    if pattern == endpoint {
        return Some(EndpointMatch::Exact);
    }
    if pattern == "*" {
        return Some(EndpointMatch::Wildcard);
    }
    if !pattern.contains('{') {
        return None;
    }

    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let endpoint_segments: Vec<&str> = endpoint.split('/').collect();
    if pattern_segments.len() != endpoint_segments.len() {
        return None;
    }

    let mut placeholders = 0u32;
    for (pat, seg) in pattern_segments.iter().zip(&endpoint_segments) {
        if pat.starts_with('{') && pat.ends_with('}') && pat.len() >= 2 {
            placeholders += 1;
        } else if pat != seg {
            return None;
        }
    }
    Some(EndpointMatch::Template(placeholders))
}

/// Match a network criterion (CIDR range or bare address) against a source
/// address, returning the matched prefix length.
///
/// A bare address is treated as a host-length prefix, so an exact IPv4
/// match and a /32 range score identically. A source address or criterion
/// that does not parse simply fails the match; resolution never errors.
pub fn match_network(criterion: &str, source: &str) -> Option<u8> {
    let addr: IpAddr = source.trim().parse().ok()?;

    if let Ok(net) = criterion.parse::<IpNet>() {
        return net.contains(&addr).then(|| net.prefix_len());
    }
    if let Ok(exact) = criterion.parse::<IpAddr>() {
        if exact == addr {
            return Some(match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            });
        }
    }
    None
}
