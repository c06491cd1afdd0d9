// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of syslog-udp.
//
// syslog-udp is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// syslog-udp is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with syslog-udp.  If not,
// see <http://www.gnu.org/licenses/>.

//! Remote host resolution.
//!
//! Besides literal addresses & DNS names, [`resolve`] understands three sentinel host names:
//!
//! - `$loopback`: the IPv4 loopback address
//! - `$broadcast`: the limited broadcast address, 255.255.255.255
//! - `$subnet`: the directed broadcast address of the first interface that is up, can broadcast &
//!   has an IPv4 gateway
//!
//! Sentinels are matched case-insensitively.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

pub const LOOPBACK: &str = "$loopback";
pub const BROADCAST: &str = "$broadcast";
pub const SUBNET: &str = "$subnet";

/// Resolve `host` to a single address, preferring IPv4 over IPv6.
pub fn resolve(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }
    match host.to_ascii_lowercase().as_str() {
        LOOPBACK => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        BROADCAST => Some(IpAddr::V4(Ipv4Addr::BROADCAST)),
        SUBNET => subnet_broadcast().map(IpAddr::V4),
        _ => {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Some(ip);
            }
            // The port is irrelevant; `ToSocketAddrs` just insists on one.
            let addrs: Vec<IpAddr> = (host, 0u16)
                .to_socket_addrs()
                .ok()?
                .map(|sa| sa.ip())
                .collect();
            addrs
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
        }
    }
}

/// What [`subnet_broadcast`] needs to know about a network interface
#[derive(Clone, Debug, Default)]
struct Candidate {
    /// Administratively up & operational
    up: bool,
    /// Able to send broadcasts (as opposed to, say, a point-to-point tunnel)
    broadcast: bool,
    has_gateway: bool,
    /// (address, netmask) pairs
    ipv4: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl From<&netdev::Interface> for Candidate {
    fn from(iface: &netdev::Interface) -> Self {
        Candidate {
            up: iface.is_up() && iface.is_running(),
            broadcast: iface.is_broadcast() && !iface.is_loopback(),
            has_gateway: iface
                .gateway
                .as_ref()
                .map_or(false, |gateway| !gateway.ipv4.is_empty()),
            ipv4: iface
                .ipv4
                .iter()
                .map(|net| (net.addr(), net.netmask()))
                .collect(),
        }
    }
}

/// The directed broadcast address of the first candidate that is up, can broadcast & has an IPv4
/// gateway, computed from its first routable (i.e. not link-local) IPv4 address.
fn select_subnet<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> Option<Ipv4Addr> {
    candidates
        .into_iter()
        .filter(|c| c.up && c.broadcast && c.has_gateway)
        .find_map(|c| {
            c.ipv4
                .iter()
                .find(|(addr, _)| !addr.is_link_local() && !addr.is_unspecified())
                .map(|(addr, mask)| directed_broadcast(*addr, *mask))
        })
}

/// The directed broadcast address for the subnet of this host's first usable interface.
pub fn subnet_broadcast() -> Option<Ipv4Addr> {
    let candidates: Vec<Candidate> = netdev::get_interfaces()
        .iter()
        .map(Candidate::from)
        .collect();
    select_subnet(&candidates)
}

/// `(addr & mask) | !mask`
pub fn directed_broadcast(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    let addr = u32::from(addr);
    let mask = u32::from(mask);
    Ipv4Addr::from((addr & mask) | !mask)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(
            resolve("$loopback"),
            Some(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))
        );
        assert_eq!(
            resolve(" $Broadcast "),
            Some(IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)))
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            resolve("192.0.2.1"),
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
        );
        assert_eq!(resolve("::1"), Some("::1".parse().unwrap()));
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("   "), None);
    }

    fn candidate(up: bool, has_gateway: bool, ipv4: &[(Ipv4Addr, Ipv4Addr)]) -> Candidate {
        Candidate {
            up,
            broadcast: true,
            has_gateway,
            ipv4: ipv4.to_vec(),
        }
    }

    #[test]
    fn subnet_selection() {
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        let down = candidate(false, true, &[(Ipv4Addr::new(10, 0, 0, 5), mask)]);
        let no_gateway = candidate(true, false, &[(Ipv4Addr::new(10, 0, 1, 5), mask)]);
        let tunnel = Candidate {
            broadcast: false,
            ..candidate(true, true, &[(Ipv4Addr::new(10, 0, 2, 5), mask)])
        };
        let link_local_only = candidate(
            true,
            true,
            &[(Ipv4Addr::new(169, 254, 3, 5), Ipv4Addr::new(255, 255, 0, 0))],
        );
        let lan = candidate(
            true,
            true,
            &[
                (Ipv4Addr::new(169, 254, 3, 5), Ipv4Addr::new(255, 255, 0, 0)),
                (Ipv4Addr::new(192, 168, 2, 17), mask),
            ],
        );
        let second_lan = candidate(true, true, &[(Ipv4Addr::new(172, 16, 0, 9), mask)]);

        assert_eq!(
            select_subnet(&[
                down.clone(),
                no_gateway.clone(),
                tunnel.clone(),
                link_local_only.clone(),
                lan,
                second_lan
            ]),
            Some(Ipv4Addr::new(192, 168, 2, 255))
        );
        assert_eq!(
            select_subnet(&[down, no_gateway, tunnel, link_local_only]),
            None
        );
        assert_eq!(select_subnet(&Vec::<Candidate>::new()), None);
    }

    #[test]
    fn broadcast_arithmetic() {
        assert_eq!(
            directed_broadcast(
                Ipv4Addr::new(192, 168, 1, 17),
                Ipv4Addr::new(255, 255, 255, 0)
            ),
            Ipv4Addr::new(192, 168, 1, 255)
        );
        assert_eq!(
            directed_broadcast(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 0, 0, 0)),
            Ipv4Addr::new(10, 255, 255, 255)
        );
        assert_eq!(
            directed_broadcast(
                Ipv4Addr::new(10, 1, 2, 3),
                Ipv4Addr::new(255, 255, 255, 255)
            ),
            Ipv4Addr::new(10, 1, 2, 3)
        );
    }
}
