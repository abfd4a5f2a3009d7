//! `src` ACL type: client source address
//!
//! ```text
//! acl aclname src [-i] addr ...
//! ```
//!
//! Each value is a single address, a CIDR (`10.0.0.0/8`), an address with a
//! dotted netmask (`10.0.0.0/255.0.0.0`), an inclusive range
//! (`10.0.0.1-10.0.0.20`) or `all`. With `-i`, IPv4-mapped IPv6 client
//! addresses (`::ffff:10.1.2.3`) are also matched as their IPv4 form.

use crate::acl::{AclType, Flag, FlagSet, MatchResult, FLAG_CASE_INSENSITIVE};
use crate::checklist::Checklist;
use crate::error::{AclError, Result};
use crate::parser::ConfigParser;
use ipnet::{IpNet, Ipv4Net, Ipv4Subnets, Ipv6Net, Ipv6Subnets};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

const TYPE_NAME: &str = "src";

#[derive(Debug, Clone, Default)]
pub struct SourceIpAcl {
    nets: Vec<IpNet>,
    /// Match IPv4-mapped IPv6 addresses against IPv4 entries
    unmap_v4: bool,
}

impl SourceIpAcl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nets(&self) -> &[IpNet] {
        &self.nets
    }

    fn contains(&self, addr: &IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(addr))
    }
}

impl AclType for SourceIpAcl {
    fn type_string(&self) -> &'static str {
        TYPE_NAME
    }

    fn supported_flags(&self) -> &'static [Flag] {
        &[FLAG_CASE_INSENSITIVE]
    }

    fn clone_unconfigured(&self) -> Box<dyn AclType> {
        Box::new(Self::new())
    }

    fn parse(&mut self, flags: &FlagSet, parser: &mut ConfigParser) -> Result<()> {
        self.unmap_v4 = flags.is_set(FLAG_CASE_INSENSITIVE);
        while let Some(token) = parser.next_token() {
            let nets = parse_address(&token).map_err(|reason| AclError::InvalidValue {
                acl_type: TYPE_NAME,
                value: token.clone(),
                reason,
            })?;
            self.nets.extend(nets);
        }
        Ok(())
    }

    fn dump(&self) -> Vec<String> {
        self.nets
            .iter()
            .map(|net| {
                if net.prefix_len() == net.max_prefix_len() {
                    net.addr().to_string()
                } else {
                    net.to_string()
                }
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    fn match_checklist(&self, _flags: &FlagSet, checklist: &mut dyn Checklist) -> MatchResult {
        let addr = match checklist.src_addr() {
            Some(addr) => addr,
            None => return MatchResult::NoMatch,
        };

        if self.contains(&addr) {
            return MatchResult::Match;
        }
        if self.unmap_v4 {
            if let IpAddr::V6(v6) = addr {
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return self.contains(&IpAddr::V4(v4)).into();
                }
            }
        }
        MatchResult::NoMatch
    }
}

/// Parse one `src` value into the networks it covers
fn parse_address(token: &str) -> std::result::Result<Vec<IpNet>, String> {
    if token == "all" {
        let v4 = Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0).map_err(|e| e.to_string())?;
        let v6 = Ipv6Net::new(Ipv6Addr::UNSPECIFIED, 0).map_err(|e| e.to_string())?;
        return Ok(vec![IpNet::V4(v4), IpNet::V6(v6)]);
    }

    if let Some((from, to)) = token.split_once('-') {
        return parse_range(from, to);
    }

    if let Some((addr, mask)) = token.split_once('/') {
        if mask.contains('.') {
            let addr = Ipv4Addr::from_str(addr).map_err(|e| e.to_string())?;
            let mask = Ipv4Addr::from_str(mask).map_err(|e| e.to_string())?;
            let prefix = netmask_prefix(mask)?;
            let net = Ipv4Net::new(addr, prefix).map_err(|e| e.to_string())?;
            return Ok(vec![IpNet::V4(net.trunc())]);
        }
        let net = IpNet::from_str(token).map_err(|e| e.to_string())?;
        return Ok(vec![net.trunc()]);
    }

    let addr = IpAddr::from_str(token).map_err(|e| e.to_string())?;
    Ok(vec![IpNet::from(addr)])
}

fn parse_range(from: &str, to: &str) -> std::result::Result<Vec<IpNet>, String> {
    let from = IpAddr::from_str(from).map_err(|e| e.to_string())?;
    let to = IpAddr::from_str(to).map_err(|e| e.to_string())?;
    if from > to {
        return Err("range start is above range end".to_string());
    }

    match (from, to) {
        (IpAddr::V4(start), IpAddr::V4(end)) => {
            Ok(Ipv4Subnets::new(start, end, 0).map(IpNet::V4).collect())
        }
        (IpAddr::V6(start), IpAddr::V6(end)) => {
            Ok(Ipv6Subnets::new(start, end, 0).map(IpNet::V6).collect())
        }
        _ => Err("range mixes address families".to_string()),
    }
}

fn netmask_prefix(mask: Ipv4Addr) -> std::result::Result<u8, String> {
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    let expected = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    if bits != expected {
        return Err(format!("non-contiguous netmask {}", mask));
    }
    Ok(prefix as u8)
}
