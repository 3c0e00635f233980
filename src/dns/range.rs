//! Address range expressions
//!
//! A caller may describe the addresses to allocate from in several ways:
//!
//! * an explicit pair of first/last addresses (`192.168.133.0 192.168.134.255`)
//! * a CIDR, including abbreviated forms (`192.168.132/23`)
//! * an address glob where an octet may be `*` or a span `a-b`
//!   (`192.168.132-133.*`)
//! * a single address (`192.168.135.100`)
//! * nothing at all, in which case the zone's declared range is used
//!
//! All of them end up as an [`AddressRange`], an inclusive low/high pair
//! scanned from low to high.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;

use crate::dns::errors::ProvisionError;
use crate::dns::repository::ZoneRangeMapping;

type Result<T> = std::result::Result<T, ProvisionError>;

/// Inclusive, ordered range of IPv4 addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    low: Ipv4Addr,
    high: Ipv4Addr,
}

impl AddressRange {
    pub fn new(low: Ipv4Addr, high: Ipv4Addr) -> Result<AddressRange> {
        if u32::from(low) > u32::from(high) {
            return Err(ProvisionError::MalformedRange(format!(
                "lower bound {} greater than upper bound {}",
                low, high
            )));
        }
        Ok(AddressRange { low, high })
    }

    pub fn single(addr: Ipv4Addr) -> AddressRange {
        AddressRange {
            low: addr,
            high: addr,
        }
    }

    pub fn low(&self) -> Ipv4Addr {
        self.low
    }

    pub fn high(&self) -> Ipv4Addr {
        self.high
    }

    /// Number of addresses covered
    pub fn size(&self) -> u64 {
        u64::from(u32::from(self.high)) - u64::from(u32::from(self.low)) + 1
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u32::from(addr);
        u32::from(self.low) <= addr && addr <= u32::from(self.high)
    }

    pub fn contains_range(&self, other: &AddressRange) -> bool {
        self.contains(other.low) && self.contains(other.high)
    }

    /// Addresses from low to high
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.low)..=u32::from(self.high)).map(Ipv4Addr::from)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// One octet of an [`AddressGlob`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctetPattern {
    Exact(u8),
    /// Inclusive span, always `low < high`
    Span(u8, u8),
    Any,
}

impl OctetPattern {
    fn bounds(&self) -> (u8, u8) {
        match *self {
            OctetPattern::Exact(o) => (o, o),
            OctetPattern::Span(low, high) => (low, high),
            OctetPattern::Any => (0, 255),
        }
    }
}

impl fmt::Display for OctetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OctetPattern::Exact(o) => write!(f, "{}", o),
            OctetPattern::Span(low, high) => write!(f, "{}-{}", low, high),
            OctetPattern::Any => f.write_str("*"),
        }
    }
}

/// Dotted-quad pattern such as `192.168.132-133.*`
///
/// At most one octet may be a span, and once a span or `*` appears every
/// following octet must be `*`. A plain address is a valid glob covering
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressGlob {
    octets: [OctetPattern; 4],
}

impl AddressGlob {
    /// The glob covering exactly the addresses of `network`
    pub fn from_network(network: Ipv4Network) -> AddressGlob {
        let base = network.network().octets();
        let prefix = u32::from(network.prefix());
        let mut octets = [OctetPattern::Any; 4];

        for (i, octet) in octets.iter_mut().enumerate() {
            let start = 8 * i as u32;
            *octet = if prefix >= start + 8 {
                OctetPattern::Exact(base[i])
            } else if prefix <= start {
                OctetPattern::Any
            } else {
                let host_bits = start + 8 - prefix;
                let mask = ((1u32 << host_bits) - 1) as u8;
                OctetPattern::Span(base[i], base[i] | mask)
            };
        }

        AddressGlob { octets }
    }

    pub fn octets(&self) -> &[OctetPattern; 4] {
        &self.octets
    }

    pub fn to_range(&self) -> AddressRange {
        let mut low = [0u8; 4];
        let mut high = [0u8; 4];
        for (i, octet) in self.octets.iter().enumerate() {
            let (l, h) = octet.bounds();
            low[i] = l;
            high[i] = h;
        }

        AddressRange {
            low: Ipv4Addr::from(low),
            high: Ipv4Addr::from(high),
        }
    }
}

impl FromStr for AddressGlob {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<AddressGlob> {
        let invalid = || ProvisionError::MalformedRange(format!("unable to convert {:?} to a range", s));

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }

        let mut seen_span = false;
        let mut seen_any = false;
        let mut octets = [OctetPattern::Any; 4];

        for (i, part) in parts.iter().enumerate() {
            octets[i] = if *part == "*" {
                seen_any = true;
                OctetPattern::Any
            } else if let Some(dash) = part.find('-') {
                if seen_span || seen_any {
                    return Err(invalid());
                }
                seen_span = true;
                let low = parse_octet(&part[..dash]).ok_or_else(invalid)?;
                let high = parse_octet(&part[dash + 1..]).ok_or_else(invalid)?;
                if low >= high {
                    return Err(invalid());
                }
                OctetPattern::Span(low, high)
            } else {
                if seen_span || seen_any {
                    return Err(invalid());
                }
                OctetPattern::Exact(parse_octet(part).ok_or_else(invalid)?)
            };
        }

        Ok(AddressGlob { octets })
    }
}

impl fmt::Display for AddressGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

fn parse_octet(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse `address/prefix`, padding abbreviated addresses with zero octets
fn parse_cidr(s: &str) -> Result<Ipv4Network> {
    let invalid = || ProvisionError::MalformedRange(format!("invalid CIDR {:?}", s));

    let (addr, prefix) = match s.find('/') {
        Some(slash) => (&s[..slash], &s[slash + 1..]),
        None => return Err(invalid()),
    };

    let mut octets = [0u8; 4];
    let parts: Vec<&str> = addr.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return Err(invalid());
    }
    for (i, part) in parts.iter().enumerate() {
        octets[i] = parse_octet(part).ok_or_else(invalid)?;
    }

    let prefix = parse_octet(prefix).ok_or_else(invalid)?;
    let network = Ipv4Network::new(Ipv4Addr::from(octets), prefix).map_err(|_| invalid())?;

    // Host bits are dropped, so 192.168.133/23 covers 192.168.132.0/23
    Ipv4Network::new(network.network(), prefix).map_err(|_| invalid())
}

/// Convert a CIDR expression into the equivalent glob
pub fn cidr_to_glob(cidr: &str) -> Result<AddressGlob> {
    parse_cidr(cidr).map(AddressGlob::from_network)
}

fn parse_address(s: &str) -> Result<Ipv4Addr> {
    s.parse()
        .map_err(|_| ProvisionError::MalformedRange(format!("invalid address {:?}", s)))
}

/// Turn the range tokens given by a caller into an [`AddressRange`]
///
/// Two tokens are an explicit pair, one token is a CIDR, glob or single
/// address. An empty or longer token list is rejected; use
/// [`resolve_range`] when a zone may stand in for the range.
pub fn parse_range<S: AsRef<str>>(tokens: &[S]) -> Result<AddressRange> {
    match tokens {
        [low, high] => {
            AddressRange::new(parse_address(low.as_ref().trim())?, parse_address(high.as_ref().trim())?)
        }
        [single] => {
            let single = single.as_ref().trim();
            let glob = if single.contains('/') {
                cidr_to_glob(single)?
            } else {
                single.parse::<AddressGlob>()?
            };
            Ok(glob.to_range())
        }
        _ => {
            let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
            Err(ProvisionError::MalformedRange(format!(
                "unable to find a suitable range using {:?}",
                tokens
            )))
        }
    }
}

/// Like [`parse_range`], falling back to the zone's declared range when no
/// range tokens are given
pub fn resolve_range<S: AsRef<str>>(
    tokens: &[S],
    zone: Option<&str>,
    mapping: &dyn ZoneRangeMapping,
) -> Result<AddressRange> {
    if !tokens.is_empty() {
        return parse_range(tokens);
    }

    match zone {
        Some(zone) => mapping.range_for_zone(zone).ok_or_else(|| {
            ProvisionError::MalformedRange(format!(
                "unable to handle implicit mapping with zone: {}",
                zone
            ))
        }),
        None => Err(ProvisionError::MalformedRange(
            "unable to handle implicit mapping without a range or zone".to_string(),
        )),
    }
}
