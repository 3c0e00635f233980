//! Error types for allocation and record provisioning
//!
//! Every failure an operation can report is a distinct variant of
//! [`ProvisionError`], so callers can match on the kind instead of parsing
//! messages. Store and configuration failures are wrapped so that `?` works
//! across the whole engine.

use std::fmt;
use std::error::Error;
use std::io;
use std::net::Ipv4Addr;

use crate::dns::context::ConfigError;
use crate::dns::range::AddressRange;

/// Failure of a single engine operation
#[derive(Debug)]
pub enum ProvisionError {
    /// A range expression or zone mapping could not be understood
    MalformedRange(String),
    /// No managed zone owns the given name
    ZoneNotFound(String),
    /// Every address in the range is reserved or structurally invalid
    NoAvailableAddress {
        range: AddressRange,
        reserved: Vec<Ipv4Addr>,
    },
    /// The name already owns an address or alias record
    DuplicateName(String),
    /// The alias target has no address record
    TargetNotFound(String),
    /// The address record still has aliases pointing at it
    DependentAlias { name: String, aliases: Vec<String> },
    /// Neither an address nor an alias record exists for the name
    NameNotFound(String),
    /// A configuration key or value was rejected
    InvalidConfiguration(String),
    Config(ConfigError),
    Store(StoreError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::MalformedRange(msg) => write!(f, "{}", msg),
            ProvisionError::ZoneNotFound(name) => {
                write!(f, "unable to get a zone from associated string: {}", name)
            }
            ProvisionError::NoAvailableAddress { range, reserved } => {
                let reserved: Vec<String> = reserved.iter().map(|a| a.to_string()).collect();
                write!(
                    f,
                    "unable to find suitable address given range {} and existing addresses [{}]",
                    range,
                    reserved.join(", ")
                )
            }
            ProvisionError::DuplicateName(name) => {
                write!(f, "fully-qualified domain name {} exists", name)
            }
            ProvisionError::TargetNotFound(name) => write!(
                f,
                "attempting to create an alias for a non-existent name: {}",
                name
            ),
            ProvisionError::DependentAlias { name, aliases } => write!(
                f,
                "aliases exist for {}: {}",
                name,
                aliases.join(" ")
            ),
            ProvisionError::NameNotFound(name) => {
                write!(f, "no records associated with name: {}", name)
            }
            ProvisionError::InvalidConfiguration(msg) => write!(f, "{}", msg),
            ProvisionError::Config(e) => write!(f, "Configuration error: {}", e),
            ProvisionError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl Error for ProvisionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProvisionError::Config(e) => Some(e),
            ProvisionError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ProvisionError {
    fn from(err: StoreError) -> Self {
        ProvisionError::Store(err)
    }
}

impl From<ConfigError> for ProvisionError {
    fn from(err: ConfigError) -> Self {
        ProvisionError::Config(err)
    }
}

/// Failure reported by a record or zone repository
#[derive(Debug)]
pub enum StoreError {
    Sql(sqlx::Error),
    Io(io::Error),
    /// A stored record whose content does not fit its kind
    InvalidRecord { kind: String, content: String },
    UnknownKind(String),
    NoSuchZone(i64),
    NoSuchRecord(i64),
    /// Deletion was requested for a record that was never persisted
    Unpersisted(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sql(e) => write!(f, "SQL error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::InvalidRecord { kind, content } => {
                write!(f, "invalid {} record content: {:?}", kind, content)
            }
            StoreError::UnknownKind(kind) => write!(f, "invalid record type {} specified", kind),
            StoreError::NoSuchZone(id) => write!(f, "Zone not found: {}", id),
            StoreError::NoSuchRecord(id) => write!(f, "Record not found: {}", id),
            StoreError::Unpersisted(name) => {
                write!(f, "record {} has no identifier and cannot be deleted", name)
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Sql(e) => Some(e),
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Sql(err)
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// Result type alias for engine operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;
