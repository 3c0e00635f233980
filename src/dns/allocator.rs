//! Selection of a free address from a range
//!
//! Addresses ending in `.0`, `.1` or `.255` are never handed out; they are
//! kept for network identifiers, gateways and broadcast. Any address already
//! used by an `A` record is taken, whichever zone that record lives in.
//! The scan always starts at the low end of the range, so the same store
//! and range always yield the same address.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::dns::errors::{ProvisionError, StoreError};
use crate::dns::range::AddressRange;
use crate::dns::record::{Criteria, RecordKind};
use crate::dns::repository::RecordRepository;

/// Whether `addr` may ever be allocated
pub fn is_assignable(addr: Ipv4Addr) -> bool {
    !matches!(addr.octets()[3], 0 | 1 | 255)
}

/// Addresses currently held by `A` records
///
/// Always read fresh from the store, never cached between calls.
pub fn reserved_addresses<R>(records: &R) -> Result<BTreeSet<Ipv4Addr>, StoreError>
where
    R: RecordRepository + ?Sized,
{
    let reserved: BTreeSet<Ipv4Addr> = records
        .find_all(RecordKind::A, &Criteria::default())?
        .iter()
        .filter_map(|record| record.addr())
        .collect();

    log::debug!("found {} reserved addresses", reserved.len());
    Ok(reserved)
}

/// Lowest address in `range` that is assignable and not in `reserved`
pub fn allocate(range: &AddressRange, reserved: &BTreeSet<Ipv4Addr>) -> Result<Ipv4Addr, ProvisionError> {
    match range
        .iter()
        .find(|addr| is_assignable(*addr) && !reserved.contains(addr))
    {
        Some(addr) => {
            log::debug!("selected {} from {}", addr, range);
            Ok(addr)
        }
        None => Err(ProvisionError::NoAvailableAddress {
            range: *range,
            reserved: reserved.iter().copied().collect(),
        }),
    }
}
