//! Default addressing for VLAN networks
//!
//! Given an IPv4 CIDR, the gateway is host 1, the first usable address is
//! host 4 (hosts 2 and 3 are reserved by the platform), and the last usable
//! address is host `size - 2`, just below broadcast.

use cloudplane_core::{Error, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Smallest accepted prefix (largest network)
pub const MIN_PREFIX: u8 = 21;
/// Largest accepted prefix; a /29 is the smallest network that holds the
/// gateway, the reserved hosts and a usable address
pub const MAX_PREFIX: u8 = 29;

/// Addresses derived from a CIDR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpData {
    pub gateway: Ipv4Addr,
    pub first_usable: Ipv4Addr,
    pub last_usable: Ipv4Addr,
}

/// Derive gateway and usable range from `cidr`
///
/// # Returns
///
/// - `Err(Error::Validation)`: If the CIDR does not parse or is not a /21 to
///   /29 IPv4 network
///
/// # Example
///
/// ```
/// use cloudplane_provider_power::cidr::generate_ip_data;
///
/// let data = generate_ip_data("192.168.10.0/24").unwrap();
/// assert_eq!(data.gateway.to_string(), "192.168.10.1");
/// assert_eq!(data.first_usable.to_string(), "192.168.10.4");
/// assert_eq!(data.last_usable.to_string(), "192.168.10.254");
/// ```
pub fn generate_ip_data(cidr: &str) -> Result<IpData> {
    let net: Ipv4Net = cidr
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("invalid CIDR '{cidr}': {e}")))?;

    let prefix = net.prefix_len();
    if !(MIN_PREFIX..=MAX_PREFIX).contains(&prefix) {
        return Err(Error::validation(format!(
            "CIDR '{cidr}' must have a prefix between /{MIN_PREFIX} and /{MAX_PREFIX}"
        )));
    }

    let size = 1u32 << (32 - u32::from(prefix));
    let host = |index: u32| Ipv4Addr::from(u32::from(net.network()) + index);

    Ok(IpData {
        gateway: host(1),
        first_usable: host(4),
        last_usable: host(size - 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_21() {
        let data = generate_ip_data("10.10.0.0/21").unwrap();
        assert_eq!(data.gateway, Ipv4Addr::new(10, 10, 0, 1));
        assert_eq!(data.first_usable, Ipv4Addr::new(10, 10, 0, 4));
        assert_eq!(data.last_usable, Ipv4Addr::new(10, 10, 7, 254));
    }

    #[test]
    fn test_host_bits_are_masked() {
        let data = generate_ip_data("172.16.5.77/26").unwrap();
        assert_eq!(data.gateway, Ipv4Addr::new(172, 16, 5, 65));
        assert_eq!(data.first_usable, Ipv4Addr::new(172, 16, 5, 68));
        assert_eq!(data.last_usable, Ipv4Addr::new(172, 16, 5, 126));
    }

    #[test]
    fn test_smallest_usable_network() {
        let data = generate_ip_data("192.168.0.8/29").unwrap();
        assert_eq!(data.first_usable, Ipv4Addr::new(192, 168, 0, 12));
        assert_eq!(data.last_usable, Ipv4Addr::new(192, 168, 0, 14));
    }

    #[test]
    fn test_rejects_out_of_range_prefixes() {
        assert!(generate_ip_data("10.0.0.0/16").is_err());
        assert!(generate_ip_data("10.0.0.0/32").is_err());
        assert!(generate_ip_data("10.0.0.0/30").is_err());
        assert!(generate_ip_data("10.0.0.0/31").is_err());
    }

    #[test]
    fn test_small_prefix_error_names_accepted_range() {
        let err = generate_ip_data("10.0.0.0/30").unwrap_err();
        assert!(err.to_string().contains("between /21 and /29"));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = generate_ip_data("not-a-cidr").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(generate_ip_data("fd00::/64").is_err());
    }
}
