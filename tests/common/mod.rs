//! Shared PowerDNS fixture for the integration tests

#![allow(dead_code)]

use std::net::Ipv4Addr;

use powerglove::dns::record::{Criteria, Record, RecordData, RecordKind};
use powerglove::dns::repository::{RecordRepository, ZoneRepository};
use powerglove::dns::sql_store::SqlStore;

pub const ZONES: &[&str] = &[
    "tld",
    "stable.tld",
    "test.tld",
    "super.stable.tld",
    "super.test.tld",
    "132.168.192.in-addr.arpa",
    "133.168.192.in-addr.arpa",
    "134.168.192.in-addr.arpa",
    "135.168.192.in-addr.arpa",
    "10.10.in-addr.arpa",
    "10.in-addr.arpa",
];

/// Zone, name and data of every record in the fixture
pub fn fixture_records() -> Vec<(&'static str, &'static str, RecordData)> {
    vec![
        ("stable.tld", "test_existing.stable.tld", RecordData::A(Ipv4Addr::new(192, 168, 134, 2))),
        ("stable.tld", "test_existing2.stable.tld", RecordData::A(Ipv4Addr::new(192, 168, 135, 2))),
        ("134.168.192.in-addr.arpa", "2.134.168.192.in-addr.arpa", ptr("test_existing.stable.tld")),
        ("135.168.192.in-addr.arpa", "2.135.168.192.in-addr.arpa", ptr("test_existing2.stable.tld")),
        ("test.tld", "test_existing.test.tld", RecordData::A(Ipv4Addr::new(192, 168, 132, 2))),
        ("test.tld", "test_existing2.test.tld", RecordData::A(Ipv4Addr::new(192, 168, 133, 2))),
        ("132.168.192.in-addr.arpa", "2.132.168.192.in-addr.arpa", ptr("test_existing.test.tld")),
        ("133.168.192.in-addr.arpa", "2.133.168.192.in-addr.arpa", ptr("test_existing2.test.tld")),
        ("test.tld", "cnamer.test.tld", RecordData::Cname("cnamee.test.tld".to_string())),
        ("test.tld", "cnamee.test.tld", RecordData::A(Ipv4Addr::new(192, 168, 133, 57))),
        ("test.tld", "text.test.tld", RecordData::Txt("this is a text record".to_string())),
        ("test.tld", "text.test.tld", RecordData::A(Ipv4Addr::new(192, 168, 133, 61))),
        ("tld", "big.domain.tld", RecordData::A(Ipv4Addr::new(10, 10, 111, 61))),
        ("10.10.in-addr.arpa", "61.111.10.10.in-addr.arpa", ptr("big.domain.tld")),
    ]
}

fn ptr(target: &str) -> RecordData {
    RecordData::Ptr(target.to_string())
}

/// Fresh in-memory PowerDNS database holding the fixture zones and records
pub fn create_test_store() -> SqlStore {
    let store = SqlStore::connect("sqlite::memory:").expect("connect to in-memory database");
    store.ensure_schema().expect("create schema");

    for zone in ZONES {
        store.create_zone(zone).expect("create zone");
    }
    for (zone, name, data) in fixture_records() {
        let zone_id = store.zone_by_name(zone).unwrap().unwrap().id;
        store.seed_record(&Record::new(zone_id, name, data, 300)).unwrap();
    }

    store
}

pub fn record_exists<R: RecordRepository>(store: &R, kind: RecordKind, criteria: &Criteria) -> bool {
    store.find_one(kind, criteria).unwrap().is_some()
}

pub fn count_records<R: RecordRepository>(store: &R) -> usize {
    [RecordKind::A, RecordKind::Ptr, RecordKind::Cname, RecordKind::Txt]
        .iter()
        .map(|kind| store.find_all(*kind, &Criteria::default()).unwrap().len())
        .sum()
}

/// Every record as (kind, name, content, zone id, ttl), sorted
pub fn snapshot<R: RecordRepository>(store: &R) -> Vec<(RecordKind, String, String, i64, u32)> {
    let mut rows: Vec<_> = [RecordKind::A, RecordKind::Ptr, RecordKind::Cname, RecordKind::Txt]
        .iter()
        .flat_map(|kind| store.find_all(*kind, &Criteria::default()).unwrap())
        .map(|record| (record.kind(), record.name.clone(), record.content(), record.zone_id, record.ttl))
        .collect();
    rows.sort();
    rows
}
