//! Address allocation and record provisioning for PowerDNS
//!
//! This module keeps the A, PTR, CNAME and TXT records of a PowerDNS
//! database consistent while handing out IPv4 addresses:
//! * Parsing of address ranges given as CIDRs, globs or explicit pairs
//! * Resolution of names and addresses to their owning zones
//! * Selection of free addresses
//! * Creation and removal of complete record sets
//!
//! # Module Structure
//!
//! * `range` - address range expressions
//! * `authority` - zones, zone resolution and serials
//! * `allocator` - free address selection
//! * `provision` - record orchestration
//! * `repository` - store interfaces
//! * `memory_store` / `sql_store` - store implementations
//! * `context` - configuration file handling

/// Zones, longest-suffix zone resolution and serial numbers
pub mod authority;

/// Free address selection within a range
pub mod allocator;

/// Configuration file handling
pub mod context;

/// Error types for provisioning and storage
pub mod errors;

/// Log output setup
pub mod logging;

/// In-process record store
pub mod memory_store;

/// Record orchestration
pub mod provision;

/// Address range expressions
pub mod range;

/// Resource record types
pub mod record;

/// Record and zone store interfaces
pub mod repository;

/// PowerDNS SQLite backend
pub mod sql_store;
