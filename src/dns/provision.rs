//! Creation and removal of complete record sets
//!
//! The [`Provisioner`] keeps forward, reverse and auxiliary records
//! consistent with each other:
//!
//! * an address record is always created together with its PTR record, and
//!   optionally a TXT record carrying a description
//! * an alias is only created for a name that owns an address record
//! * an address record is never removed while aliases still point at it,
//!   and it always takes its PTR and TXT records with it
//! * every zone touched by an operation has its serial bumped
//!
//! All checks run before anything is staged, and everything staged for one
//! operation is committed as a single unit. A failed commit leaves the store
//! as it was.
//!
//! The provisioner performs no locking of its own. Two processes allocating
//! from the same range against the same database at the same time can both
//! pick the same address, so callers must serialize access per store.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::dns::allocator::{allocate, reserved_addresses};
use crate::dns::authority::{forward_zone_for, reverse_pointer_name, reverse_zone_for_name, Zone};
use crate::dns::context::DEFAULT_TTL;
use crate::dns::errors::{ProvisionError, ProvisionResult};
use crate::dns::range::{resolve_range, AddressRange};
use crate::dns::record::{Criteria, Record, RecordKind};
use crate::dns::repository::{Store, StoreResult, ZoneRangeMapping, ZoneRanges};

/// Optional checks applied on top of the basic invariants
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProvisionPolicy {
    /// Only allocate from ranges inside the owning zone's declared range
    pub enforce_zone_ranges: bool,
}

/// Parameters of an address reservation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressRequest {
    /// Fully-qualified name, or a bare hostname when a zone is given
    pub name: String,
    /// Range tokens as accepted by [`resolve_range`]
    pub range: Vec<String>,
    pub zone: Option<String>,
    pub ttl: u32,
    /// Content of the accompanying TXT record
    pub text: Option<String>,
}

impl AddressRequest {
    pub fn new(name: &str) -> AddressRequest {
        AddressRequest {
            name: name.to_string(),
            range: Vec::new(),
            zone: None,
            ttl: DEFAULT_TTL,
            text: None,
        }
    }

    pub fn range<I, T>(mut self, tokens: I) -> AddressRequest
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.range = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn zone(mut self, zone: &str) -> AddressRequest {
        self.zone = Some(zone.to_string());
        self
    }

    pub fn ttl(mut self, ttl: u32) -> AddressRequest {
        self.ttl = ttl;
        self
    }

    pub fn text(mut self, text: &str) -> AddressRequest {
        self.text = Some(text.to_string());
        self
    }
}

/// `name` inside `zone`, unless it already is
fn qualify(name: &str, zone: &str) -> String {
    let name = name.trim_end_matches('.');
    if name == zone || name.ends_with(&format!(".{}", zone)) {
        name.to_string()
    } else {
        format!("{}.{}", name, zone)
    }
}

/// Record orchestration over a [`Store`]
pub struct Provisioner<S> {
    store: S,
    zone_ranges: Box<dyn ZoneRangeMapping>,
    policy: ProvisionPolicy,
}

impl<S: Store> Provisioner<S> {
    pub fn new(store: S) -> Provisioner<S> {
        Provisioner {
            store,
            zone_ranges: Box::new(ZoneRanges::new()),
            policy: ProvisionPolicy::default(),
        }
    }

    /// Declared zone ranges, used when a request names a zone instead of a range
    pub fn with_zone_ranges<M: ZoneRangeMapping + 'static>(mut self, zone_ranges: M) -> Provisioner<S> {
        self.zone_ranges = Box::new(zone_ranges);
        self
    }

    pub fn with_policy(mut self, policy: ProvisionPolicy) -> Provisioner<S> {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reserve an address for a name and create its A, PTR and TXT records
    ///
    /// Returns the fully-qualified name and the address it received.
    pub fn add_address_record(&mut self, request: &AddressRequest) -> ProvisionResult<(String, Ipv4Addr)> {
        let range = resolve_range(&request.range[..], request.zone.as_deref(), &*self.zone_ranges)?;

        let zone_name = match &request.zone {
            Some(zone) => Some(zone.trim_end_matches('.').to_string()),
            None if !request.name.trim_end_matches('.').contains('.') => {
                self.zone_ranges.zone_for_range(&range)
            }
            None => None,
        };

        // A given zone only qualifies the name; the owner is resolved below
        let fqdn = match zone_name {
            Some(zone_name) => {
                let zone = self
                    .store
                    .zone_by_name(&zone_name)?
                    .ok_or_else(|| ProvisionError::ZoneNotFound(zone_name.clone()))?;
                qualify(&request.name, &zone.name)
            }
            None => request.name.trim_end_matches('.').to_string(),
        };

        if self.is_present(&fqdn)? {
            return Err(ProvisionError::DuplicateName(fqdn));
        }

        log::debug!("attempting to add a record for {} within {}", fqdn, range);

        let reserved = reserved_addresses(&self.store)?;
        let addr = allocate(&range, &reserved)?;

        let zones = self.store.all_zones()?;
        let a_zone = forward_zone_for(&fqdn, &zones)?;
        self.check_zone_range(a_zone, &range)?;

        let ptr_name = reverse_pointer_name(addr);
        let ptr_zone = reverse_zone_for_name(&ptr_name, &zones)?;

        let mut records = vec![
            Record::address(a_zone.id, &fqdn, addr, request.ttl),
            Record::pointer(ptr_zone.id, &ptr_name, &fqdn, request.ttl),
        ];
        if let Some(text) = request.text.as_deref().filter(|text| !text.is_empty()) {
            records.push(Record::text(a_zone.id, &fqdn, text, request.ttl));
        }

        let zone_ids: BTreeSet<i64> = records.iter().map(|record| record.zone_id).collect();
        self.persist(records, Vec::new(), zone_ids)?;

        log::info!("created A record {} -> {}", fqdn, addr);
        Ok((fqdn, addr))
    }

    /// Create a CNAME `alias` pointing at the existing address record `target`
    pub fn add_alias_record(&mut self, alias: &str, target: &str) -> ProvisionResult<(String, String)> {
        let alias = alias.trim_end_matches('.');
        let target = target.trim_end_matches('.');

        let target_record = self
            .store
            .find_one(RecordKind::A, &Criteria::by_name(target))?
            .ok_or_else(|| ProvisionError::TargetNotFound(target.to_string()))?;

        if self.is_present(alias)? {
            return Err(ProvisionError::DuplicateName(alias.to_string()));
        }

        let cname = Record::alias(target_record.zone_id, alias, target, target_record.ttl);
        let mut zone_ids = BTreeSet::new();
        zone_ids.insert(cname.zone_id);
        self.persist(vec![cname], Vec::new(), zone_ids)?;

        log::info!("created CNAME alias {} -> {}", alias, target);
        Ok((alias.to_string(), target.to_string()))
    }

    /// Remove the address or alias record of `name` and everything tied to it
    ///
    /// Returns the records that were deleted.
    pub fn remove_name(&mut self, name: &str) -> ProvisionResult<Vec<Record>> {
        let name = name.trim_end_matches('.');

        if let Some(a_record) = self.store.find_one(RecordKind::A, &Criteria::by_name(name))? {
            return self.remove_address_record(a_record);
        }

        if let Some(cname_record) = self.store.find_one(RecordKind::Cname, &Criteria::by_name(name))? {
            log::info!("removing CNAME alias {}", cname_record);
            let mut zone_ids = BTreeSet::new();
            zone_ids.insert(cname_record.zone_id);
            self.persist(Vec::new(), vec![cname_record.clone()], zone_ids)?;
            return Ok(vec![cname_record]);
        }

        Err(ProvisionError::NameNotFound(name.to_string()))
    }

    fn remove_address_record(&mut self, a_record: Record) -> ProvisionResult<Vec<Record>> {
        let aliases = self
            .store
            .find_all(RecordKind::Cname, &Criteria::by_content(&a_record.name))?;
        if !aliases.is_empty() {
            return Err(ProvisionError::DependentAlias {
                name: a_record.name.clone(),
                aliases: aliases.into_iter().map(|alias| alias.name).collect(),
            });
        }

        let pointers = self
            .store
            .find_all(RecordKind::Ptr, &Criteria::by_content(&a_record.name))?;
        let texts = self
            .store
            .find_all(RecordKind::Txt, &Criteria::by_name(&a_record.name))?;

        log::info!("removing associated A/PTR/TXT records for {}", a_record.name);

        let mut deleted = vec![a_record];
        deleted.extend(pointers);
        deleted.extend(texts);

        let zone_ids: BTreeSet<i64> = deleted.iter().map(|record| record.zone_id).collect();
        self.persist(Vec::new(), deleted.clone(), zone_ids)?;
        Ok(deleted)
    }

    /// Whether `name` owns an address or alias record
    pub fn is_present(&self, name: &str) -> ProvisionResult<bool> {
        let criteria = Criteria::by_name(name.trim_end_matches('.'));
        Ok(self.store.find_one(RecordKind::A, &criteria)?.is_some()
            || self.store.find_one(RecordKind::Cname, &criteria)?.is_some())
    }

    /// Fail with [`ProvisionError::NameNotFound`] unless `name` is present
    pub fn assert_present(&self, name: &str) -> ProvisionResult<()> {
        if self.is_present(name)? {
            Ok(())
        } else {
            Err(ProvisionError::NameNotFound(name.trim_end_matches('.').to_string()))
        }
    }

    fn check_zone_range(&self, zone: &Zone, range: &AddressRange) -> ProvisionResult<()> {
        if !self.policy.enforce_zone_ranges {
            return Ok(());
        }

        match self.zone_ranges.range_for_zone(&zone.name) {
            Some(declared) if !declared.contains_range(range) => Err(ProvisionError::MalformedRange(format!(
                "range {} reaches outside the range {} declared for {}",
                range, declared, zone.name
            ))),
            _ => Ok(()),
        }
    }

    fn persist(&mut self, inserts: Vec<Record>, deletes: Vec<Record>, zone_ids: BTreeSet<i64>) -> ProvisionResult<()> {
        let staged = self.stage(inserts, deletes, &zone_ids);
        match staged.and_then(|()| self.store.commit()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.store.rollback();
                log::warn!("no changes persisted: {}", e);
                Err(e.into())
            }
        }
    }

    fn stage(&mut self, inserts: Vec<Record>, deletes: Vec<Record>, zone_ids: &BTreeSet<i64>) -> StoreResult<()> {
        for record in &inserts {
            log::debug!("setting up {}", record);
        }
        for record in &deletes {
            log::debug!("removing {}", record);
        }

        self.store.insert(inserts)?;
        self.store.delete(deletes)?;
        for zone_id in zone_ids {
            self.store.bump_serial(*zone_id)?;
        }
        Ok(())
    }
}
