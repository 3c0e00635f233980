//! Configuration shared by the command line and embedding programs
//!
//! Settings live in a TOML file, `~/.powerglove.toml` unless another path
//! is given:
//!
//! ```toml
//! pdns_connect_string = "sqlite:///var/lib/powerdns/pdns.sqlite3"
//! default_ttl = 300
//! enforce_zone_ranges = false
//!
//! [zone_ranges]
//! "test.tld" = "192.168.132/23"
//! "stable.tld" = "192.168.134.0 192.168.135.255"
//! ```
//!
//! Nothing here is global: callers load a [`GloveConfig`] and hand the parts
//! the engine needs to it explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::dns::errors::{ProvisionError, ProvisionResult};
use crate::dns::provision::ProvisionPolicy;
use crate::dns::range::{parse_range, AddressRange};
use crate::dns::repository::ZoneRanges;

#[derive(Debug, Display, From, Error)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

/// TTL given to new records when the caller does not choose one
pub const DEFAULT_TTL: u32 = 300;

/// File name of the configuration in the user's home directory
pub const CONFIG_FILE_NAME: &str = ".powerglove.toml";

/// Keys accepted by [`GloveConfig::set`]
pub const ALLOWED_KEYS: &[&str] = &[
    "pdns_connect_string",
    "default_ttl",
    "enforce_zone_ranges",
    "zone_ranges.<zone>",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GloveConfig {
    /// sqlx URL of the PowerDNS database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdns_connect_string: Option<String>,
    pub default_ttl: u32,
    /// Reject ranges reaching outside the owning zone's declared range
    pub enforce_zone_ranges: bool,
    /// Zone name to range expression
    pub zone_ranges: BTreeMap<String, String>,
}

impl Default for GloveConfig {
    fn default() -> Self {
        GloveConfig {
            pdns_connect_string: None,
            default_ttl: DEFAULT_TTL,
            enforce_zone_ranges: false,
            zone_ranges: BTreeMap::new(),
        }
    }
}

impl GloveConfig {
    /// `~/.powerglove.toml`, when a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<GloveConfig, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`GloveConfig::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<GloveConfig, ConfigError> {
        if path.exists() {
            GloveConfig::load(path)
        } else {
            Ok(GloveConfig::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Change one setting after validating its value
    pub fn set(&mut self, key: &str, value: &str) -> ProvisionResult<()> {
        match key {
            "pdns_connect_string" => {
                self.pdns_connect_string = Some(value.to_string());
            }
            "default_ttl" => {
                self.default_ttl = value.parse().map_err(|_| {
                    ProvisionError::InvalidConfiguration(format!("default_ttl must be a number, not {:?}", value))
                })?;
            }
            "enforce_zone_ranges" => {
                self.enforce_zone_ranges = value.parse().map_err(|_| {
                    ProvisionError::InvalidConfiguration(format!(
                        "enforce_zone_ranges must be true or false, not {:?}",
                        value
                    ))
                })?;
            }
            _ if key.starts_with("zone_ranges.") && key.len() > "zone_ranges.".len() => {
                let zone = &key["zone_ranges.".len()..];
                parse_zone_range(value)?;
                self.zone_ranges.insert(zone.trim_end_matches('.').to_string(), value.to_string());
            }
            _ => {
                return Err(ProvisionError::InvalidConfiguration(format!(
                    "{:?} not an allowed configuration key. Possible values are {}",
                    key,
                    ALLOWED_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// The database URL to use
    ///
    /// An explicit connect string wins; otherwise the configuration file at
    /// `path` must exist and name one.
    pub fn connect_string(explicit: Option<&str>, path: Option<&Path>) -> ProvisionResult<String> {
        if let Some(url) = explicit {
            return Ok(url.to_string());
        }

        let path = match path {
            Some(path) if path.exists() => path,
            Some(path) => {
                return Err(ProvisionError::InvalidConfiguration(format!(
                    "non-existent configuration file {:?} and no PowerDNS connection given",
                    path
                )))
            }
            None => {
                return Err(ProvisionError::InvalidConfiguration(
                    "no configuration file and no PowerDNS connection given".to_string(),
                ))
            }
        };

        GloveConfig::load(path)?.pdns_connect_string.ok_or_else(|| {
            ProvisionError::InvalidConfiguration(format!(
                "configuration file {:?} doesn't specify a 'pdns_connect_string'",
                path
            ))
        })
    }

    /// The `[zone_ranges]` table, every entry parsed
    pub fn zone_ranges(&self) -> ProvisionResult<ZoneRanges> {
        let mut ranges = ZoneRanges::new();
        for (zone, expr) in &self.zone_ranges {
            ranges.insert(zone, parse_zone_range(expr)?);
        }
        Ok(ranges)
    }

    pub fn policy(&self) -> ProvisionPolicy {
        ProvisionPolicy {
            enforce_zone_ranges: self.enforce_zone_ranges,
        }
    }
}

fn parse_zone_range(expr: &str) -> ProvisionResult<AddressRange> {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    parse_range(&tokens[..])
}

/// Load the file at `path` (or start empty), change one key, write it back
pub fn set_config(path: &Path, key: &str, value: &str) -> ProvisionResult<()> {
    let mut config = GloveConfig::load_or_default(path)?;
    config.set(key, value)?;
    config.save(path)?;
    log::info!("set {} in {:?}", key, path);
    Ok(())
}
