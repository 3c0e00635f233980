//! End-to-end provisioning against a PowerDNS SQLite database

mod common;

use std::net::Ipv4Addr;

use common::{count_records, create_test_store, record_exists, snapshot};
use powerglove::dns::errors::{ProvisionError, ProvisionResult};
use powerglove::dns::provision::{AddressRequest, Provisioner};
use powerglove::dns::record::{Criteria, RecordKind};
use powerglove::dns::repository::{RecordRepository, ZoneRepository};
use powerglove::dns::sql_store::SqlStore;

fn provisioner() -> Provisioner<SqlStore> {
    Provisioner::new(create_test_store())
}

fn add(provisioner: &mut Provisioner<SqlStore>, name: &str, range: &[&str]) -> ProvisionResult<(String, Ipv4Addr)> {
    let request = AddressRequest::new(name).range(range.iter().copied());
    provisioner.add_address_record(&request)
}

/// Add `name`, check both of its records and return the assigned address
fn add_and_check(provisioner: &mut Provisioner<SqlStore>, name: &str, range: &[&str]) -> Ipv4Addr {
    let (fqdn, addr) = add(provisioner, name, range).unwrap();
    let store = provisioner.store();

    let a_record = store
        .find_one(RecordKind::A, &Criteria::by_name(&fqdn))
        .unwrap()
        .unwrap();
    assert_eq!(a_record.addr(), Some(addr));
    assert!(record_exists(store, RecordKind::Ptr, &Criteria::by_content(&fqdn)));
    addr
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

#[test]
fn test_fixture_is_loaded() {
    let provisioner = provisioner();
    let store = provisioner.store();

    assert_eq!(store.all_zones().unwrap().len(), 11);
    assert_eq!(count_records(store), 14);
    assert!(record_exists(
        store,
        RecordKind::Ptr,
        &Criteria::by_name("2.134.168.192.in-addr.arpa").content("test_existing.stable.tld")
    ));
}

#[test]
fn test_adding_with_explicit_range() {
    let mut provisioner = provisioner();

    let addr = add_and_check(
        &mut provisioner,
        "must_be_192.168.135.101.stable.tld",
        &["192.168.135.101", "192.168.135.101"],
    );
    assert_eq!(addr, ip("192.168.135.101"));

    let addr = add_and_check(
        &mut provisioner,
        "as_a_result_must_be_192.168.135.102.stable.tld",
        &["192.168.135.101", "192.168.135.102"],
    );
    assert_eq!(addr, ip("192.168.135.102"));

    add_and_check(
        &mut provisioner,
        "whatever_basically.stable.tld",
        &["192.168.132.1", "192.168.133.255"],
    );

    match add(&mut provisioner, "ip_already_reserved", &["192.168.135.101", "192.168.135.102"]) {
        Err(ProvisionError::NoAvailableAddress { .. }) => {}
        other => panic!("Expected exhausted range, got {:?}", other),
    }

    match add(&mut provisioner, "invalid_explicit.test.tld", &["192.168.132.150", "192.168.132.5"]) {
        Err(ProvisionError::MalformedRange(_)) => {}
        other => panic!("Expected malformed range, got {:?}", other),
    }

    let addr = add_and_check(&mut provisioner, "mismatched_ip.stable.tld", &["192.168.135.62", "192.168.135.62"]);
    assert_ne!(addr, ip("192.168.135.63"));
}

#[test]
fn test_add_and_delete_with_explicit_range() {
    let mut provisioner = provisioner();
    let name = "must_be_192.168.135.101.stable.tld";

    let addr = add_and_check(&mut provisioner, name, &["192.168.135.101", "192.168.135.101"]);
    assert_eq!(addr, ip("192.168.135.101"));

    provisioner.remove_name(name).unwrap();
    assert!(!record_exists(provisioner.store(), RecordKind::A, &Criteria::by_name(name)));
    assert!(!record_exists(provisioner.store(), RecordKind::Ptr, &Criteria::by_content(name)));

    // The freed address is handed out again
    let name = "due_to_delete_is_still_192.168.135.101.stable.tld";
    let addr = add_and_check(&mut provisioner, name, &["192.168.135.101", "192.168.135.102"]);
    assert_eq!(addr, ip("192.168.135.101"));
}

#[test]
fn test_avoiding_invalid_addresses() {
    let mut provisioner = provisioner();

    match add(
        &mut provisioner,
        "must_not_be_0_255_or_duplicate.test.tld",
        &["192.168.132.255", "192.168.133.2"],
    ) {
        Err(ProvisionError::NoAvailableAddress { reserved, .. }) => {
            assert!(reserved.contains(&ip("192.168.133.2")));
        }
        other => panic!("Expected exhausted range, got {:?}", other),
    }

    let addr = add_and_check(
        &mut provisioner,
        "found_valid_address.test.tld",
        &["192.168.132.255", "192.168.133.3"],
    );
    assert_eq!(addr, ip("192.168.133.3"));
}

#[test]
fn test_duplicate_hostname() {
    let mut provisioner = provisioner();

    add_and_check(&mut provisioner, "brand_new_name.test.tld", &["192.168.132.150", "192.168.132.151"]);
    match add(&mut provisioner, "brand_new_name.test.tld", &["192.168.132.155", "192.168.132.156"]) {
        Err(ProvisionError::DuplicateName(name)) => assert_eq!(name, "brand_new_name.test.tld"),
        other => panic!("Expected duplicate name, got {:?}", other),
    }

    // The first host keeps its address and pointer
    let store = provisioner.store();
    let a_records = store
        .find_all(RecordKind::A, &Criteria::by_name("brand_new_name.test.tld"))
        .unwrap();
    assert_eq!(a_records.len(), 1);
    assert_eq!(a_records[0].addr(), Some(ip("192.168.132.150")));
    let pointers = store
        .find_all(RecordKind::Ptr, &Criteria::by_content("brand_new_name.test.tld"))
        .unwrap();
    assert_eq!(pointers.len(), 1);
    assert_eq!(pointers[0].name, "150.132.168.192.in-addr.arpa");
    assert!(!record_exists(store, RecordKind::A, &Criteria::by_content("192.168.132.155")));

    // Aliases count as taken names too
    match add(&mut provisioner, "cnamer.test.tld", &["192.168.132.155", "192.168.132.156"]) {
        Err(ProvisionError::DuplicateName(_)) => {}
        other => panic!("Expected duplicate name, got {:?}", other),
    }
}

#[test]
fn test_adding_with_cidr() {
    let mut provisioner = provisioner();

    let addr = add_and_check(&mut provisioner, "32_bit_mask.stable.tld", &["192.168.135.100/32"]);
    assert_eq!(addr, ip("192.168.135.100"));

    let addr = add_and_check(&mut provisioner, "23_bit_maskstable.tld", &["192.168.132/23"]);
    assert_eq!(addr, ip("192.168.132.3"));

    let addr = add_and_check(&mut provisioner, "23_bit_mask_same_domains.table.tld", &["192.168.133/23"]);
    assert_eq!(addr, ip("192.168.132.4"));
}

#[test]
fn test_adding_with_glob() {
    let mut provisioner = provisioner();

    let addr = add_and_check(&mut provisioner, "32_bit_mask.stable.tld", &["192.168.135.100-101"]);
    assert_eq!(addr, ip("192.168.135.100"));

    let addr = add_and_check(&mut provisioner, "23_bit_mask.stable.tld", &["192.168.132-133.*"]);
    assert_eq!(addr, ip("192.168.132.3"));
}

#[test]
fn test_adding_with_explicit_ip() {
    let mut provisioner = provisioner();

    add_and_check(&mut provisioner, "hundred.stable.tld", &["192.168.135.100"]);
    add_and_check(&mut provisioner, "hundredone.stable.tld", &["192.168.135.101"]);
    match add(&mut provisioner, "hundredone-dup.stable.tld", &["192.168.135.101"]) {
        Err(ProvisionError::NoAvailableAddress { .. }) => {}
        other => panic!("Expected exhausted range, got {:?}", other),
    }
}

#[test]
fn test_unable_to_handle_no_range_or_zone() {
    let mut provisioner = provisioner();

    match add(&mut provisioner, "fall.down", &[]) {
        Err(e) => assert_eq!(e.to_string(), "unable to handle implicit mapping without a range or zone"),
        Ok(added) => panic!("Expected malformed range, got {:?}", added),
    }
}

#[test]
fn test_creating_alias_for_existing_a_record() {
    let mut provisioner = provisioner();

    provisioner
        .add_alias_record("created_cname.test.tld", "test_existing.test.tld")
        .unwrap();
    assert!(record_exists(
        provisioner.store(),
        RecordKind::Cname,
        &Criteria::by_name("created_cname.test.tld").content("test_existing.test.tld")
    ));
    assert!(provisioner.is_present("created_cname.test.tld").unwrap());
}

#[test]
fn test_presence_of_name() {
    let provisioner = provisioner();

    assert!(provisioner.is_present("test_existing.test.tld").unwrap());
    assert!(!provisioner.is_present("nonexistant.fqdn").unwrap());
}

#[test]
fn test_creation_of_text_record() {
    let mut provisioner = provisioner();
    let request = AddressRequest::new("record_with_associated_text.test.tld")
        .range(vec!["192.168.132.233"])
        .text("test.thing.what");

    provisioner.add_address_record(&request).unwrap();
    assert!(record_exists(
        provisioner.store(),
        RecordKind::Txt,
        &Criteria::by_name("record_with_associated_text.test.tld").content("test.thing.what")
    ));
}

#[test]
fn test_remove_alias_record() {
    let mut provisioner = provisioner();
    assert!(record_exists(provisioner.store(), RecordKind::Cname, &Criteria::by_name("cnamer.test.tld")));

    provisioner.remove_name("cnamer.test.tld").unwrap();
    assert!(!record_exists(provisioner.store(), RecordKind::Cname, &Criteria::by_name("cnamer.test.tld")));
    assert!(provisioner.is_present("cnamee.test.tld").unwrap());
}

#[test]
fn test_unable_to_remove_record_with_alias() {
    let mut provisioner = provisioner();

    match provisioner.remove_name("cnamee.test.tld") {
        Err(ProvisionError::DependentAlias { aliases, .. }) => {
            assert_eq!(aliases, vec!["cnamer.test.tld".to_string()]);
        }
        other => panic!("Expected dependent alias, got {:?}", other),
    }
    assert_eq!(count_records(provisioner.store()), 14);
}

#[test]
fn test_removal_also_deletes_text_records() {
    let mut provisioner = provisioner();

    let deleted = provisioner.remove_name("text.test.tld").unwrap();
    assert_eq!(deleted.len(), 2);

    let store = provisioner.store();
    assert!(!record_exists(store, RecordKind::A, &Criteria::by_name("text.test.tld")));
    assert!(!record_exists(store, RecordKind::Txt, &Criteria::by_name("text.test.tld")));
    assert!(!record_exists(store, RecordKind::Ptr, &Criteria::by_content("text.test.tld")));
}

#[test]
fn test_remove_existing_name_leaves_others() {
    let mut provisioner = provisioner();

    provisioner.remove_name("test_existing.test.tld").unwrap();
    provisioner.remove_name("test_existing.stable.tld").unwrap();

    let store = provisioner.store();
    assert!(!record_exists(store, RecordKind::A, &Criteria::by_name("test_existing.test.tld")));
    assert!(record_exists(store, RecordKind::A, &Criteria::by_name("test_existing2.test.tld")));
    assert!(!record_exists(store, RecordKind::Ptr, &Criteria::by_name("2.132.168.192.in-addr.arpa")));
    assert!(record_exists(store, RecordKind::Ptr, &Criteria::by_name("2.133.168.192.in-addr.arpa")));
    assert!(!record_exists(store, RecordKind::A, &Criteria::by_name("test_existing.stable.tld")));
    assert!(record_exists(store, RecordKind::A, &Criteria::by_name("test_existing2.stable.tld")));
    assert!(!record_exists(store, RecordKind::Ptr, &Criteria::by_name("2.134.168.192.in-addr.arpa")));
    assert!(record_exists(store, RecordKind::Ptr, &Criteria::by_name("2.135.168.192.in-addr.arpa")));
}

#[test]
fn test_round_trip_restores_records() {
    let mut provisioner = provisioner();
    let before = snapshot(provisioner.store());

    let request = AddressRequest::new("round_trip.test.tld")
        .range(vec!["192.168.133.0/24"])
        .text("temporary");
    provisioner.add_address_record(&request).unwrap();
    assert_eq!(count_records(provisioner.store()), before.len() + 3);

    provisioner.remove_name("round_trip.test.tld").unwrap();
    assert_eq!(snapshot(provisioner.store()), before);
}

#[test]
fn test_serials_bumped_in_database() {
    let mut provisioner = provisioner();
    add_and_check(&mut provisioner, "serial.test.tld", &["192.168.133.0/24"]);

    let store = provisioner.store();
    let forward = store.zone_by_name("test.tld").unwrap().unwrap();
    let reverse = store.zone_by_name("133.168.192.in-addr.arpa").unwrap().unwrap();
    let untouched = store.zone_by_name("stable.tld").unwrap().unwrap();

    let today: u32 = chrono::Utc::now().format("%Y%m%d01").to_string().parse().unwrap();
    assert!(forward.serial.unwrap() >= today);
    assert!(reverse.serial.unwrap() >= today);
    assert_eq!(untouched.serial, None);
}
