//! Resource records as stored in the PowerDNS `records` table

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dns::errors::StoreError;

/// `RecordKind` is the value of the `type` column
///
/// `Soa` is only ever read; the engine never creates or removes it.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    A,
    Ptr,
    Cname,
    Txt,
    Soa,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            RecordKind::A => "A",
            RecordKind::Ptr => "PTR",
            RecordKind::Cname => "CNAME",
            RecordKind::Txt => "TXT",
            RecordKind::Soa => "SOA",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordKind::A),
            "PTR" => Ok(RecordKind::Ptr),
            "CNAME" => Ok(RecordKind::Cname),
            "TXT" => Ok(RecordKind::Txt),
            "SOA" => Ok(RecordKind::Soa),
            other => Err(StoreError::UnknownKind(other.to_string())),
        }
    }
}

/// Kind-specific record content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordData {
    A(Ipv4Addr),
    /// Forward name the pointer resolves to
    Ptr(String),
    /// Name the alias points at
    Cname(String),
    Txt(String),
    Soa(String),
}

impl RecordData {
    /// Validate raw column content against its kind
    pub fn parse(kind: RecordKind, content: &str) -> Result<RecordData, StoreError> {
        let invalid = || StoreError::InvalidRecord {
            kind: kind.to_string(),
            content: content.to_string(),
        };

        match kind {
            RecordKind::A => content.parse().map(RecordData::A).map_err(|_| invalid()),
            RecordKind::Ptr | RecordKind::Cname if content.trim().is_empty() => Err(invalid()),
            RecordKind::Ptr => Ok(RecordData::Ptr(content.to_string())),
            RecordKind::Cname => Ok(RecordData::Cname(content.to_string())),
            RecordKind::Txt => Ok(RecordData::Txt(content.to_string())),
            RecordKind::Soa => Ok(RecordData::Soa(content.to_string())),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RecordData::A(_) => RecordKind::A,
            RecordData::Ptr(_) => RecordKind::Ptr,
            RecordData::Cname(_) => RecordKind::Cname,
            RecordData::Txt(_) => RecordKind::Txt,
            RecordData::Soa(_) => RecordKind::Soa,
        }
    }

    /// The value written to the `content` column
    pub fn content(&self) -> String {
        match self {
            RecordData::A(addr) => addr.to_string(),
            RecordData::Ptr(host) | RecordData::Cname(host) => host.clone(),
            RecordData::Txt(text) | RecordData::Soa(text) => text.clone(),
        }
    }
}

/// A single resource record
///
/// `id` is `None` until the record has been committed to a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record {
    pub id: Option<i64>,
    pub zone_id: i64,
    pub name: String,
    pub data: RecordData,
    pub ttl: u32,
    pub change_date: i64,
}

impl Record {
    pub fn new(zone_id: i64, name: &str, data: RecordData, ttl: u32) -> Record {
        Record {
            id: None,
            zone_id,
            name: name.to_string(),
            data,
            ttl,
            change_date: chrono::Utc::now().timestamp(),
        }
    }

    pub fn address(zone_id: i64, name: &str, addr: Ipv4Addr, ttl: u32) -> Record {
        Record::new(zone_id, name, RecordData::A(addr), ttl)
    }

    pub fn pointer(zone_id: i64, name: &str, target: &str, ttl: u32) -> Record {
        Record::new(zone_id, name, RecordData::Ptr(target.to_string()), ttl)
    }

    pub fn alias(zone_id: i64, name: &str, target: &str, ttl: u32) -> Record {
        Record::new(zone_id, name, RecordData::Cname(target.to_string()), ttl)
    }

    pub fn text(zone_id: i64, name: &str, text: &str, ttl: u32) -> Record {
        Record::new(zone_id, name, RecordData::Txt(text.to_string()), ttl)
    }

    pub fn kind(&self) -> RecordKind {
        self.data.kind()
    }

    pub fn content(&self) -> String {
        self.data.content()
    }

    /// The address of an `A` record
    pub fn addr(&self) -> Option<Ipv4Addr> {
        match self.data {
            RecordData::A(addr) => Some(addr),
            _ => None,
        }
    }

    pub fn matches(&self, kind: RecordKind, criteria: &Criteria) -> bool {
        self.kind() == kind && criteria.accepts(self)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} <=> {}", self.kind(), self.name, self.content())
    }
}

/// Exact-match filter applied on top of the record kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub name: Option<String>,
    pub content: Option<String>,
    pub zone_id: Option<i64>,
}

impl Criteria {
    pub fn by_name(name: &str) -> Criteria {
        Criteria::default().name(name)
    }

    pub fn by_content(content: &str) -> Criteria {
        Criteria::default().content(content)
    }

    pub fn name(mut self, name: &str) -> Criteria {
        self.name = Some(name.to_string());
        self
    }

    pub fn content(mut self, content: &str) -> Criteria {
        self.content = Some(content.to_string());
        self
    }

    pub fn zone_id(mut self, zone_id: i64) -> Criteria {
        self.zone_id = Some(zone_id);
        self
    }

    pub fn accepts(&self, record: &Record) -> bool {
        if let Some(name) = &self.name {
            if &record.name != name {
                return false;
            }
        }
        if let Some(content) = &self.content {
            if &record.content() != content {
                return false;
            }
        }
        if let Some(zone_id) = self.zone_id {
            if record.zone_id != zone_id {
                return false;
            }
        }
        true
    }
}
