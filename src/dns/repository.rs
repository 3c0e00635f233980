//! Interfaces to the record and zone store
//!
//! The engine never talks to a database directly. It reads through
//! [`RecordRepository`] and [`ZoneRepository`], stages inserts, deletions
//! and serial bumps, and finally calls `commit`, which applies everything
//! staged since the last commit as one unit or nothing at all.

use std::collections::BTreeMap;

use crate::dns::authority::Zone;
use crate::dns::errors::StoreError;
use crate::dns::range::AddressRange;
use crate::dns::record::{Criteria, Record, RecordKind};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read and stage access to resource records
pub trait RecordRepository {
    /// First committed record of `kind` matching `criteria`
    fn find_one(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Option<Record>>;

    /// All committed records of `kind` matching `criteria`, in id order
    fn find_all(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Vec<Record>>;

    /// Stage records for insertion
    fn insert(&mut self, records: Vec<Record>) -> StoreResult<()>;

    /// Stage persisted records for deletion
    fn delete(&mut self, records: Vec<Record>) -> StoreResult<()>;

    /// Apply everything staged, all or nothing
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard everything staged
    fn rollback(&mut self);
}

/// Read access to zones and staged serial bumps
pub trait ZoneRepository {
    fn all_zones(&self) -> StoreResult<Vec<Zone>>;

    fn zone_by_name(&self, name: &str) -> StoreResult<Option<Zone>>;

    /// Stage a serial bump, applied by the next `commit`
    fn bump_serial(&mut self, zone_id: i64) -> StoreResult<()>;
}

/// Anything usable as the backing store of the engine
pub trait Store: RecordRepository + ZoneRepository {}

impl<T: RecordRepository + ZoneRepository> Store for T {}

/// Declared address ranges of zones, used when a caller names a zone
/// instead of a range
pub trait ZoneRangeMapping {
    fn range_for_zone(&self, zone: &str) -> Option<AddressRange>;

    /// The zone whose declared range is exactly `range`, if any
    fn zone_for_range(&self, _range: &AddressRange) -> Option<String> {
        None
    }
}

/// Zone to range table, typically built from the configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneRanges {
    ranges: BTreeMap<String, AddressRange>,
}

impl ZoneRanges {
    pub fn new() -> ZoneRanges {
        ZoneRanges {
            ranges: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, zone: &str, range: AddressRange) {
        self.ranges.insert(zone.trim_end_matches('.').to_string(), range);
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl ZoneRangeMapping for ZoneRanges {
    fn range_for_zone(&self, zone: &str) -> Option<AddressRange> {
        self.ranges.get(zone.trim_end_matches('.')).copied()
    }

    fn zone_for_range(&self, range: &AddressRange) -> Option<String> {
        let mut zones = self.ranges.iter().filter(|(_, r)| *r == range);
        match (zones.next(), zones.next()) {
            (Some((zone, _)), None) => Some(zone.clone()),
            _ => None,
        }
    }
}

/// A change waiting for the next commit
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StagedChange {
    Insert(Record),
    Delete(Record),
    BumpSerial(i64),
}
