use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use log::debug;
use thiserror::Error;
use tokio::time::timeout;

/// A host/port pair ready to be dialed; the output of `decode` and the
/// (possibly SRV-rewritten) result of `resolve_srv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub host: String,
    pub port: u16,
}

/// Failure kinds of `decode`, per the address grammar of the handshake
/// `host.[port].domain` encoding. Disposition for all of these is: close
/// the downstream with no reply, log at info.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("connect address must end with the configured server domain")]
    MustEndWithDomain,
    #[error("connect address must be in the form <host>.[port].<server_domain>")]
    BadForm,
    #[error("port must be between 1 and 65535")]
    PortOutOfRange,
    #[error("connect address must not be localhost")]
    NoLocalhost,
    #[error("host looks like an IPv4 address but is not a valid one")]
    InvalidIp,
    #[error("host must be a public IPv4 address")]
    NotPublic,
}

/// Decodes the upstream `(host, port)` from a `pass_through_by_domain`
/// handshake's requested host, per the grammar:
/// `<host>( "." <port> )? "." <server_domain>`.
///
/// Pure function; see spec fixtures in `tests`.
pub fn decode(connect_addr: &str, server_domain: &str) -> Result<ResolvedAddress, DecodeError> {
    let suffix = format!(".{server_domain}");
    if !connect_addr.ends_with(&suffix) {
        return Err(DecodeError::MustEndWithDomain);
    }
    let prefix = &connect_addr[..connect_addr.len() - suffix.len()];

    // A full 4-octet IPv4 literal takes the whole prefix as the host with
    // the default port; only once that's ruled out do we consider the
    // trailing label a port. Otherwise "12.34.56.78.server.domain" would
    // have its last octet stripped off as a port.
    if let Some(octets) = parse_ipv4(prefix) {
        if is_reserved(octets) {
            return Err(DecodeError::NotPublic);
        }
        return Ok(ResolvedAddress {
            host: prefix.to_string(),
            port: 25565,
        });
    }

    let last_dot = match prefix.rfind('.') {
        Some(idx) if idx >= 1 => idx,
        _ => return Err(DecodeError::BadForm),
    };

    let tail = &prefix[last_dot + 1..];
    let (host_str, port) = if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
        (&prefix[..last_dot], tail.parse::<u32>().unwrap_or(u32::MAX))
    } else {
        (prefix, 25565)
    };

    if port < 1 || port > 65535 {
        return Err(DecodeError::PortOutOfRange);
    }
    let port = port as u16;

    if host_str.split('.').any(|label| label == "localhost") {
        return Err(DecodeError::NoLocalhost);
    }

    let labels: Vec<&str> = host_str.split('.').collect();
    let looks_like_ip = labels
        .iter()
        .all(|label| !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()));
    if looks_like_ip {
        if labels.len() != 4 {
            return Err(DecodeError::InvalidIp);
        }
        let mut octets = [0u8; 4];
        for (i, label) in labels.iter().enumerate() {
            match label.parse::<u32>() {
                Ok(v) if v <= 255 => octets[i] = v as u8,
                _ => return Err(DecodeError::InvalidIp),
            }
        }
        if is_reserved(octets) {
            return Err(DecodeError::NotPublic);
        }
    }

    Ok(ResolvedAddress {
        host: host_str.to_string(),
        port,
    })
}

/// Parses `prefix` as a full 4-octet IPv4 literal, with no port attached.
/// Returns `None` if it has a label count other than 4, a non-digit label,
/// or an out-of-range octet.
fn parse_ipv4(prefix: &str) -> Option<[u8; 4]> {
    let labels: Vec<&str> = prefix.split('.').collect();
    if labels.len() != 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (i, label) in labels.iter().enumerate() {
        if label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match label.parse::<u32>() {
            Ok(v) if v <= 255 => octets[i] = v as u8,
            _ => return None,
        }
    }
    Some(octets)
}

fn is_reserved(o: [u8; 4]) -> bool {
    match o {
        [10, ..] => true,
        [127, ..] => true,
        [192, 168, ..] => true,
        [172, b, ..] if (16..=31).contains(&b) => true,
        [169, 254, ..] => true,
        [100, b, ..] if (64..=127).contains(&b) => true,
        [0, ..] => true,
        _ => false,
    }
}

/// Consults DNS SRV record `_minecraft._tcp.<host>` when `port == 25565`
/// (the default Minecraft port), with a 10s timeout. On any failure
/// (timeout, NXDOMAIN, resolver error) the original address is returned
/// unchanged — SRV lookup failure recovers locally.
pub async fn resolve_srv(addr: &ResolvedAddress) -> ResolvedAddress {
    if addr.port != 25565 {
        return addr.clone();
    }

    let query = format!("_minecraft._tcp.{}", addr.host);
    let lookup = async {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        resolver.srv_lookup(query.clone()).await
    };

    match timeout(Duration::from_secs(10), lookup).await {
        Ok(Ok(response)) => match response.iter().min_by_key(|srv| srv.priority()) {
            Some(srv) => {
                let target = srv.target().to_utf8();
                let target = target.trim_end_matches('.').to_string();
                debug!(
                    "SRV rewrite: {} -> {}:{}",
                    addr.host,
                    target,
                    srv.port()
                );
                ResolvedAddress {
                    host: target,
                    port: srv.port(),
                }
            }
            None => addr.clone(),
        },
        Ok(Err(err)) => {
            debug!("SRV lookup failed for {}: {}", query, err);
            addr.clone()
        }
        Err(_) => {
            debug!("SRV lookup timed out for {}", query);
            addr.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "server.domain";

    fn addr(host: &str, port: u16) -> ResolvedAddress {
        ResolvedAddress {
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn host_dot_com() {
        assert_eq!(decode("host.com.server.domain", DOMAIN), Ok(addr("host.com", 25565)));
    }

    #[test]
    fn explicit_default_port() {
        assert_eq!(
            decode("my.host.com.25565.server.domain", DOMAIN),
            Ok(addr("my.host.com", 25565))
        );
    }

    #[test]
    fn explicit_custom_port() {
        assert_eq!(
            decode("my.host.com.3000.server.domain", DOMAIN),
            Ok(addr("my.host.com", 3000))
        );
    }

    #[test]
    fn ip_literal_host_with_port() {
        assert_eq!(
            decode("12.34.56.78.3000.server.domain", DOMAIN),
            Ok(addr("12.34.56.78", 3000))
        );
    }

    #[test]
    fn ip_literal_host_default_port() {
        assert_eq!(
            decode("12.34.56.78.server.domain", DOMAIN),
            Ok(addr("12.34.56.78", 25565))
        );
    }

    #[test]
    fn empty_address() {
        assert_eq!(decode("", DOMAIN), Err(DecodeError::MustEndWithDomain));
    }

    #[test]
    fn missing_host_label() {
        assert_eq!(decode("c.server.domain", DOMAIN), Err(DecodeError::BadForm));
    }

    #[test]
    fn localhost_with_explicit_port() {
        assert_eq!(
            decode("localhost.25565.server.domain", DOMAIN),
            Err(DecodeError::NoLocalhost)
        );
    }

    #[test]
    fn localhost_as_a_sub_label() {
        assert_eq!(
            decode("hello.localhost.server.domain", DOMAIN),
            Err(DecodeError::NoLocalhost)
        );
    }

    #[test]
    fn loopback_is_not_public() {
        assert_eq!(
            decode("127.0.0.1.server.domain", DOMAIN),
            Err(DecodeError::NotPublic)
        );
    }

    #[test]
    fn out_of_range_octet_is_invalid_ip() {
        assert_eq!(
            decode("100.200.300.400.server.domain", DOMAIN),
            Err(DecodeError::InvalidIp)
        );
    }

    #[test]
    fn too_few_octets_is_invalid_ip_not_a_hostname() {
        assert_eq!(decode("1.2.3.server.domain", DOMAIN), Err(DecodeError::InvalidIp));
    }

    #[test]
    fn too_many_digit_labels_is_invalid_ip() {
        assert_eq!(
            decode("1.2.3.4.5.6.server.domain", DOMAIN),
            Err(DecodeError::InvalidIp)
        );
    }

    #[test]
    fn out_of_range_octets_with_explicit_port_is_still_invalid_ip() {
        assert_eq!(
            decode("100.200.300.400.500.server.domain", DOMAIN),
            Err(DecodeError::InvalidIp)
        );
    }

    #[test]
    fn port_above_range() {
        assert_eq!(
            decode("host.com.65536.server.domain", DOMAIN),
            Err(DecodeError::PortOutOfRange)
        );
    }

    #[test]
    fn private_ranges_are_rejected() {
        for host in [
            "10.0.0.1", "192.168.1.1", "172.16.0.1", "169.254.1.1", "100.64.0.1", "0.0.0.1",
        ] {
            let connect = format!("{host}.server.domain");
            assert_eq!(decode(&connect, DOMAIN), Err(DecodeError::NotPublic), "{host}");
        }
    }
}
