//! PowerDNS SQLite backend behaviour

mod common;

use std::net::Ipv4Addr;

use common::{count_records, create_test_store};
use powerglove::dns::errors::StoreError;
use powerglove::dns::record::{Criteria, Record, RecordKind};
use powerglove::dns::repository::{RecordRepository, ZoneRepository};
use powerglove::dns::sql_store::SqlStore;

#[test]
fn test_schema_is_idempotent() {
    let store = SqlStore::connect("sqlite::memory:").unwrap();
    store.ensure_schema().unwrap();
    store.ensure_schema().unwrap();
    assert!(store.all_zones().unwrap().is_empty());
}

#[test]
fn test_zone_lookup() {
    let store = create_test_store();

    let zone = store.zone_by_name("stable.tld.").unwrap().unwrap();
    assert_eq!(zone.name, "stable.tld");
    assert_eq!(zone.serial, None);
    assert!(store.zone_by_name("missing.tld").unwrap().is_none());
}

#[test]
fn test_find_by_name_content_and_zone() {
    let store = create_test_store();
    let test_zone = store.zone_by_name("test.tld").unwrap().unwrap();

    let records = store
        .find_all(RecordKind::A, &Criteria::default().zone_id(test_zone.id))
        .unwrap();
    let names: Vec<&str> = records.iter().map(|record| record.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["test_existing.test.tld", "test_existing2.test.tld", "cnamee.test.tld", "text.test.tld"]
    );

    let pointer = store
        .find_one(RecordKind::Ptr, &Criteria::by_content("big.domain.tld"))
        .unwrap()
        .unwrap();
    assert_eq!(pointer.name, "61.111.10.10.in-addr.arpa");
    assert!(pointer.id.is_some());

    let text = store
        .find_one(RecordKind::Txt, &Criteria::by_name("text.test.tld"))
        .unwrap()
        .unwrap();
    assert_eq!(text.content(), "this is a text record");
}

#[test]
fn test_commit_applies_staged_changes() {
    let mut store = create_test_store();
    let zone = store.zone_by_name("test.tld").unwrap().unwrap();

    store
        .insert(vec![Record::address(zone.id, "staged.test.tld", Ipv4Addr::new(192, 168, 132, 9), 300)])
        .unwrap();
    store.bump_serial(zone.id).unwrap();
    assert_eq!(count_records(&store), 14);

    store.commit().unwrap();
    assert_eq!(count_records(&store), 15);
    assert!(store.zone_by_name("test.tld").unwrap().unwrap().serial.is_some());
}

#[test]
fn test_failed_commit_rolls_back_transaction() {
    let mut store = create_test_store();
    let zone = store.zone_by_name("test.tld").unwrap().unwrap();

    let mut ghost = Record::text(zone.id, "ghost.test.tld", "gone", 300);
    ghost.id = Some(9999);

    store
        .insert(vec![Record::address(zone.id, "staged.test.tld", Ipv4Addr::new(192, 168, 132, 9), 300)])
        .unwrap();
    store.delete(vec![ghost]).unwrap();

    match store.commit() {
        Err(StoreError::NoSuchRecord(9999)) => {}
        other => panic!("Expected missing record, got {:?}", other),
    }
    assert_eq!(count_records(&store), 14);
    assert!(store
        .find_one(RecordKind::A, &Criteria::by_name("staged.test.tld"))
        .unwrap()
        .is_none());
}

#[test]
fn test_rollback_discards_staged_changes() {
    let mut store = create_test_store();
    let zone = store.zone_by_name("test.tld").unwrap().unwrap();

    store
        .insert(vec![Record::text(zone.id, "note.test.tld", "hello", 300)])
        .unwrap();
    store.rollback();
    store.commit().unwrap();
    assert_eq!(count_records(&store), 14);
}

#[test]
fn test_delete_requires_persisted_record() {
    let mut store = create_test_store();
    let zone = store.zone_by_name("test.tld").unwrap().unwrap();

    match store.delete(vec![Record::text(zone.id, "note.test.tld", "hello", 300)]) {
        Err(StoreError::Unpersisted(name)) => assert_eq!(name, "note.test.tld"),
        other => panic!("Expected unpersisted record, got {:?}", other),
    }
}
