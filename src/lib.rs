//! powerglove
//!
//! IPv4 address allocation and DNS record management on top of a PowerDNS
//! database.
//!
//! # Features
//!
//! * Range expressions as CIDRs, globs or explicit low/high pairs
//! * Deterministic selection of the lowest free address in a range
//! * A records always created and removed together with their PTR records
//! * CNAME aliases that block removal of their target
//! * Zone serials bumped on every change
//! * All-or-nothing commits against the store
//!
//! # Architecture
//!
//! Everything lives in the `dns` module. The engine works against the
//! repository traits in [`dns::repository`]; [`dns::sql_store::SqlStore`]
//! implements them for a PowerDNS SQLite database and
//! [`dns::memory_store::MemoryStore`] keeps everything in memory.

/// Address allocation and record provisioning
pub mod dns;
