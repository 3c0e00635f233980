//! In-process record store
//!
//! Holds zones and records in ordered maps the way the zone store of a
//! running server does. Staged changes are applied to a copy of the data on
//! commit and swapped in only when every change applied cleanly.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::dns::authority::Zone;
use crate::dns::errors::StoreError;
use crate::dns::record::{Criteria, Record, RecordKind};
use crate::dns::repository::{RecordRepository, StagedChange, StoreResult, ZoneRepository};

#[derive(Clone, Debug, Default)]
struct Tables {
    zones: BTreeMap<i64, Zone>,
    records: BTreeMap<i64, Record>,
    next_record_id: i64,
}

impl Tables {
    fn apply(&mut self, change: StagedChange, today: NaiveDate) -> StoreResult<()> {
        match change {
            StagedChange::Insert(mut record) => {
                if !self.zones.contains_key(&record.zone_id) {
                    return Err(StoreError::NoSuchZone(record.zone_id));
                }
                self.next_record_id += 1;
                record.id = Some(self.next_record_id);
                self.records.insert(self.next_record_id, record);
            }
            StagedChange::Delete(record) => {
                let id = record.id.ok_or_else(|| StoreError::Unpersisted(record.name.clone()))?;
                if self.records.remove(&id).is_none() {
                    return Err(StoreError::NoSuchRecord(id));
                }
            }
            StagedChange::BumpSerial(zone_id) => {
                let zone = self
                    .zones
                    .get_mut(&zone_id)
                    .ok_or(StoreError::NoSuchZone(zone_id))?;
                zone.touch_serial(today);
                log::debug!("updated serial for {} to {:?}", zone.name, zone.serial);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    staged: Vec<StagedChange>,
    serial_date: Option<NaiveDate>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Fix the date used for serial bumps instead of today's
    pub fn with_serial_date(mut self, date: NaiveDate) -> MemoryStore {
        self.serial_date = Some(date);
        self
    }

    /// Register a zone immediately, outside any staged change set
    pub fn add_zone(&mut self, name: &str) -> Zone {
        let id = self.tables.zones.keys().next_back().map_or(1, |id| id + 1);
        let zone = Zone::new(id, name);
        self.tables.zones.insert(id, zone.clone());
        zone
    }

    /// Insert a record immediately, outside any staged change set
    pub fn seed_record(&mut self, record: Record) -> StoreResult<Record> {
        let today = self.today();
        self.tables.apply(StagedChange::Insert(record), today)?;
        let id = self.tables.next_record_id;
        Ok(self.tables.records[&id].clone())
    }

    /// Every committed record, in id order
    pub fn records(&self) -> Vec<Record> {
        self.tables.records.values().cloned().collect()
    }

    pub fn zone(&self, id: i64) -> Option<&Zone> {
        self.tables.zones.get(&id)
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    fn today(&self) -> NaiveDate {
        self.serial_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

impl RecordRepository for MemoryStore {
    fn find_one(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Option<Record>> {
        Ok(self
            .tables
            .records
            .values()
            .find(|record| record.matches(kind, criteria))
            .cloned())
    }

    fn find_all(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Vec<Record>> {
        Ok(self
            .tables
            .records
            .values()
            .filter(|record| record.matches(kind, criteria))
            .cloned()
            .collect())
    }

    fn insert(&mut self, records: Vec<Record>) -> StoreResult<()> {
        self.staged.extend(records.into_iter().map(StagedChange::Insert));
        Ok(())
    }

    fn delete(&mut self, records: Vec<Record>) -> StoreResult<()> {
        for record in records {
            if record.id.is_none() {
                return Err(StoreError::Unpersisted(record.name));
            }
            self.staged.push(StagedChange::Delete(record));
        }
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let today = self.today();
        let staged = std::mem::take(&mut self.staged);

        let mut tables = self.tables.clone();
        for change in staged {
            tables.apply(change, today)?;
        }

        self.tables = tables;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}

impl ZoneRepository for MemoryStore {
    fn all_zones(&self) -> StoreResult<Vec<Zone>> {
        Ok(self.tables.zones.values().cloned().collect())
    }

    fn zone_by_name(&self, name: &str) -> StoreResult<Option<Zone>> {
        let name = name.trim_end_matches('.');
        Ok(self
            .tables
            .zones
            .values()
            .find(|zone| zone.name == name)
            .cloned())
    }

    fn bump_serial(&mut self, zone_id: i64) -> StoreResult<()> {
        self.staged.push(StagedChange::BumpSerial(zone_id));
        Ok(())
    }
}
