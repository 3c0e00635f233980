//! Zones and the lookup of the zone owning a name
//!
//! ## Zone Resolution
//!
//! A name belongs to the most specific registered zone that is a complete
//! suffix of it, compared label by label from the top-level label down:
//!
//! - `host.super.stable.tld` belongs to `super.stable.tld` when that zone
//!   exists, even though `stable.tld` and `tld` also match
//! - `host.super.great.tld` belongs to `tld`, since `stable.tld` stops
//!   matching at `great`
//! - a name with no matching zone at all is an error
//!
//! Forward names are resolved against forward zones only, and reverse-lookup
//! names (`15.132.168.192.in-addr.arpa`) against the `in-addr.arpa` zones.
//!
//! ## Serials
//!
//! Zone serials follow the `YYYYMMDDnn` convention: the first change of a day
//! sets `nn` to `01` and each further change that day increments it.

use std::net::Ipv4Addr;

use chrono::{Datelike, NaiveDate};

use crate::dns::errors::ProvisionError;

/// Domain under which reverse-lookup zones live
pub const REVERSE_DOMAIN: &str = "in-addr.arpa";

type Result<T> = std::result::Result<T, ProvisionError>;

/// A row of the PowerDNS `domains` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    /// The `notified_serial` column, unset for a zone never changed
    pub serial: Option<u32>,
}

impl Zone {
    pub fn new(id: i64, name: &str) -> Zone {
        Zone {
            id,
            name: name.to_string(),
            serial: None,
        }
    }

    pub fn is_reverse(&self) -> bool {
        let name = self.name.trim_end_matches('.');
        name == REVERSE_DOMAIN || name.ends_with(&format!(".{}", REVERSE_DOMAIN))
    }

    /// Advance the serial for a change made on `today`
    pub fn touch_serial(&mut self, today: NaiveDate) {
        self.serial = Some(next_serial(self.serial, today));
    }
}

/// The serial following `current` for a change made on `today`
pub fn next_serial(current: Option<u32>, today: NaiveDate) -> u32 {
    let first_of_day = today.year() as u32 * 1_000_000 + today.month() * 10_000 + today.day() * 100 + 1;

    match current {
        Some(serial) => std::cmp::max(first_of_day, serial.saturating_add(1)),
        None => first_of_day,
    }
}

/// Name of the PTR record for `addr`, without the trailing dot
pub fn reverse_pointer_name(addr: Ipv4Addr) -> String {
    let [a, b, c, d] = addr.octets();
    format!("{}.{}.{}.{}.{}", d, c, b, a, REVERSE_DOMAIN)
}

fn reversed_labels(name: &str) -> Vec<&str> {
    name.trim_end_matches('.').rsplit('.').collect()
}

/// Most specific zone among `zones` owning `name`
///
/// A zone is a candidate only when every one of its labels matches the
/// corresponding label of `name`, top-level label first. Among candidates
/// the one with most labels wins; on a tie the first one seen is kept.
pub fn closest_zone<'a, I>(name: &str, zones: I) -> Result<&'a Zone>
where
    I: IntoIterator<Item = &'a Zone>,
{
    let name_labels = reversed_labels(name);

    let mut best_match: Option<(usize, &'a Zone)> = None;
    for zone in zones {
        let zone_labels = reversed_labels(&zone.name);
        if zone_labels.len() > name_labels.len() {
            continue;
        }

        let complete_match = zone_labels
            .iter()
            .zip(name_labels.iter())
            .all(|(zone_label, name_label)| zone_label == name_label);
        if !complete_match {
            continue;
        }

        let matches = zone_labels.len();
        let better = match best_match {
            Some((len, _)) => matches > len,
            None => true,
        };
        if better {
            best_match = Some((matches, zone));
        }
    }

    match best_match {
        Some((_, zone)) => Ok(zone),
        None => Err(ProvisionError::ZoneNotFound(name.to_string())),
    }
}

/// Forward zone owning a fully-qualified name
pub fn forward_zone_for<'a>(fqdn: &str, zones: &'a [Zone]) -> Result<&'a Zone> {
    closest_zone(fqdn, zones.iter().filter(|z| !z.is_reverse()))
}

/// Reverse zone owning a reverse-lookup name
pub fn reverse_zone_for_name<'a>(ptr_name: &str, zones: &'a [Zone]) -> Result<&'a Zone> {
    closest_zone(ptr_name, zones.iter().filter(|z| z.is_reverse()))
}

/// Reverse zone that should hold the PTR record of `addr`
pub fn reverse_zone_for<'a>(addr: Ipv4Addr, zones: &'a [Zone]) -> Result<&'a Zone> {
    reverse_zone_for_name(&reverse_pointer_name(addr), zones)
}
