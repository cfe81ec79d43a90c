use std::net::IpAddr;
use log::debug;
use sysinfo::Networks;

use crate::error::LinkError;
use crate::link::constants::WIRELESS_NAME_PREFIXES;
use crate::link::types::InterfacePolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub addrs: Vec<IpAddr>,
    pub wireless: bool,
}

#[cfg(target_os = "linux")]
fn is_wireless(name: &str) -> bool {
    let sys = std::path::Path::new("/sys/class/net").join(name);
    if sys.join("wireless").exists() || sys.join("phy80211").exists() {
        return true;
    }
    has_wireless_name(name)
}

#[cfg(not(target_os = "linux"))]
fn is_wireless(name: &str) -> bool {
    has_wireless_name(name)
}

fn has_wireless_name(name: &str) -> bool {
    let name = name.to_lowercase();
    WIRELESS_NAME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Lists the local network interfaces, sorted by name.
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<InterfaceInfo> = networks
        .list()
        .iter()
        .map(|(name, data)| InterfaceInfo {
            name: name.clone(),
            addrs: data.ip_networks().iter().map(|network| network.addr).collect(),
            wireless: is_wireless(name),
        })
        .collect();

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Network interfaces: {:?}", interfaces);
    interfaces
}

/// Picks the local address to bind to for reaching a peer of the given address family.
///
/// Returns `Ok(None)` for [`InterfacePolicy::Any`]. Fails with [`LinkError::NoInterface`] when
/// no interface matches the policy or the match has no address of the wanted family.
pub fn select_local_addr(
    interfaces: &[InterfaceInfo],
    policy: &InterfacePolicy,
    want_ipv4: bool,
) -> Result<Option<(String, IpAddr)>, LinkError> {
    let usable = |interface: &InterfaceInfo| {
        interface.addrs.iter()
            .copied()
            .find(|addr| addr.is_ipv4() == want_ipv4 && !addr.is_loopback())
            .map(|addr| (interface.name.clone(), addr))
    };

    match policy {
        InterfacePolicy::Any => Ok(None),
        InterfacePolicy::Wifi => interfaces.iter()
            .filter(|interface| interface.wireless)
            .find_map(usable)
            .map(Some)
            .ok_or(LinkError::NoInterface),
        InterfacePolicy::Named(name) => interfaces.iter()
            .find(|interface| &interface.name == name)
            .and_then(usable)
            .map(Some)
            .ok_or(LinkError::NoInterface),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn interface(name: &str, addrs: &[&str], wireless: bool) -> InterfaceInfo {
        InterfaceInfo {
            name: name.to_string(),
            addrs: addrs.iter().map(|addr| addr.parse().unwrap()).collect(),
            wireless,
        }
    }

    fn sample() -> Vec<InterfaceInfo> {
        vec![
            interface("eth0", &["10.0.0.5"], false),
            interface("lo", &["127.0.0.1", "::1"], false),
            interface("wlan0", &["192.168.4.2", "fe80::1"], true),
        ]
    }

    #[test]
    fn wifi_policy_prefers_wireless_interface() {
        let selected = select_local_addr(&sample(), &InterfacePolicy::Wifi, true).unwrap();
        assert_eq!(selected, Some(("wlan0".to_string(), "192.168.4.2".parse().unwrap())));
    }

    #[test]
    fn wifi_policy_fails_without_wireless_interface() {
        let wired = vec![interface("eth0", &["10.0.0.5"], false)];
        assert_matches!(select_local_addr(&wired, &InterfacePolicy::Wifi, true), Err(LinkError::NoInterface));
    }

    #[test]
    fn wifi_policy_needs_matching_family() {
        let v6_only = vec![interface("wlan0", &["fe80::1"], true)];
        assert_matches!(select_local_addr(&v6_only, &InterfacePolicy::Wifi, true), Err(LinkError::NoInterface));
    }

    #[test]
    fn any_policy_does_not_bind() {
        assert_matches!(select_local_addr(&[], &InterfacePolicy::Any, true), Ok(None));
    }

    #[test]
    fn named_policy() {
        let policy = InterfacePolicy::Named("eth0".to_string());
        let selected = select_local_addr(&sample(), &policy, true).unwrap();
        assert_eq!(selected, Some(("eth0".to_string(), "10.0.0.5".parse().unwrap())));

        let missing = InterfacePolicy::Named("wlan9".to_string());
        assert_matches!(select_local_addr(&sample(), &missing, true), Err(LinkError::NoInterface));
    }

    #[test]
    fn wireless_names() {
        assert!(has_wireless_name("wlp3s0"));
        assert!(has_wireless_name("Wi-Fi"));
        assert!(!has_wireless_name("enp0s31f6"));
    }
}
