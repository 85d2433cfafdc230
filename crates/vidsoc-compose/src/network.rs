//! Network address constants baked into the firmware build.

use std::net::Ipv4Addr;

use indexmap::IndexMap;

use crate::error::{ComposeError, Result};

/// Host octet of the board's own address.
pub const LOCAL_HOST: u8 = 50;
/// Host octet of the TFTP server address.
pub const REMOTE_HOST: u8 = 100;

/// Board and TFTP server addresses derived from an address range such as
/// "192.168.100".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    pub local: Ipv4Addr,
    pub remote: Ipv4Addr,
}

impl IpRange {
    /// Parse one to four dotted octets. Missing octets are zero; the host
    /// octet is always replaced.
    pub fn parse(range: &str) -> Result<Self> {
        let invalid = || ComposeError::InvalidIpRange {
            range: range.to_string(),
        };
        let octets = range
            .split('.')
            .map(|o| o.trim().parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<u8>>>()?;
        if octets.is_empty() || octets.len() > 4 {
            return Err(invalid());
        }
        let mut net = [0u8; 3];
        for (slot, octet) in net.iter_mut().zip(&octets) {
            *slot = *octet;
        }
        Ok(Self {
            local: Ipv4Addr::new(net[0], net[1], net[2], LOCAL_HOST),
            remote: Ipv4Addr::new(net[0], net[1], net[2], REMOTE_HOST),
        })
    }

    /// `LOCALIP1..4` and `REMOTEIP1..4` build constants.
    pub fn constants(&self) -> IndexMap<String, u64> {
        let mut constants = IndexMap::new();
        for (prefix, addr) in [("LOCALIP", self.local), ("REMOTEIP", self.remote)] {
            for (i, octet) in addr.octets().iter().enumerate() {
                constants.insert(format!("{prefix}{}", i + 1), u64::from(*octet));
            }
        }
        constants
    }
}
