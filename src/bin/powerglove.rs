//! powerglove command line
//!
//! Reserves addresses and keeps A, PTR, CNAME and TXT records of a PowerDNS
//! database consistent.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::*;
use comfy_table::Table;

use powerglove::dns::context::{set_config, GloveConfig, ALLOWED_KEYS};
use powerglove::dns::errors::{ProvisionError, ProvisionResult};
use powerglove::dns::logging::{init_logging, LogLevel, LoggerConfig};
use powerglove::dns::provision::{AddressRequest, Provisioner};
use powerglove::dns::record::Record;
use powerglove::dns::sql_store::SqlStore;

/// powerglove - address allocation and record management for PowerDNS
#[derive(Parser)]
#[command(name = "powerglove")]
#[command(version)]
#[command(about = "Address allocation and record management for PowerDNS", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file, ~/.powerglove.toml by default
    #[arg(short = 'c', long, env = "POWERGLOVE_CONFIG")]
    config: Option<PathBuf>,

    /// PowerDNS database URL, overriding the configuration file
    #[arg(short = 'p', long, env = "POWERGLOVE_CONNECT")]
    connect: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: LogLevel,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// No color output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve an address and create its A, PTR and TXT records
    Add(AddArgs),

    /// Create a CNAME pointing at a name with an A record
    Alias {
        /// New alias name
        alias: String,

        /// Existing name to point at
        target: String,
    },

    /// Remove a name along with its PTR and TXT records
    Remove {
        /// Name to remove
        name: String,
    },

    /// Check whether a name has an A or CNAME record
    Present {
        /// Name to look up
        name: String,

        /// Fail with an error message instead of printing false
        #[arg(long)]
        assert: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Fully-qualified name, or a bare hostname together with --zone
    hostname: String,

    /// CIDR, glob, single address, or a low and high address
    range: Vec<String>,

    /// Zone to create the name in
    #[arg(short = 'z', long)]
    zone: Option<String>,

    /// Record TTL, defaulting to the configured one
    #[arg(short = 't', long)]
    ttl: Option<u32>,

    /// TXT record content
    #[arg(long, conflicts_with = "no_text")]
    text: Option<String>,

    /// Do not create a TXT record
    #[arg(long)]
    no_text: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a configuration key
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },

    /// Show the current configuration
    Show,
}

struct Printer;

impl Printer {
    fn new(no_color: bool) -> Printer {
        if no_color {
            colored::control::set_override(false);
        }
        Printer
    }

    fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    fn print_records(&self, records: &[Record]) {
        let mut table = Table::new();
        table.set_header(vec!["Type", "Name", "Content", "TTL"]);
        for record in records {
            table.add_row(vec![
                record.kind().to_string(),
                record.name.clone(),
                record.content(),
                record.ttl.to_string(),
            ]);
        }
        println!("{}", table);
    }

    fn print_config(&self, path: &Path, config: &GloveConfig) {
        println!("{}", path.display().to_string().bold());

        let mut table = Table::new();
        table.set_header(vec!["Key", "Value"]);
        table.add_row(vec![
            "pdns_connect_string".to_string(),
            config.pdns_connect_string.clone().unwrap_or_default(),
        ]);
        table.add_row(vec!["default_ttl".to_string(), config.default_ttl.to_string()]);
        table.add_row(vec![
            "enforce_zone_ranges".to_string(),
            config.enforce_zone_ranges.to_string(),
        ]);
        for (zone, range) in &config.zone_ranges {
            table.add_row(vec![format!("zone_ranges.{}", zone), range.clone()]);
        }
        println!("{}", table);
    }
}

fn exit_code(error: &ProvisionError) -> u8 {
    match error {
        ProvisionError::MalformedRange(_) | ProvisionError::InvalidConfiguration(_) => 2,
        ProvisionError::ZoneNotFound(_)
        | ProvisionError::TargetNotFound(_)
        | ProvisionError::NameNotFound(_) => 3,
        ProvisionError::NoAvailableAddress { .. } => 4,
        ProvisionError::DuplicateName(_) | ProvisionError::DependentAlias { .. } => 5,
        ProvisionError::Config(_) | ProvisionError::Store(_) => 1,
    }
}

fn default_text() -> String {
    format!(
        "created by powerglove on {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(GloveConfig::default_path)
}

fn open_provisioner(cli: &Cli) -> ProvisionResult<(Provisioner<SqlStore>, GloveConfig)> {
    let path = config_path(cli);
    let url = GloveConfig::connect_string(cli.connect.as_deref(), path.as_deref())?;
    let config = match &path {
        Some(path) => GloveConfig::load_or_default(path)?,
        None => GloveConfig::default(),
    };

    let store = SqlStore::connect(&url)?;
    let provisioner = Provisioner::new(store)
        .with_zone_ranges(config.zone_ranges()?)
        .with_policy(config.policy());
    Ok((provisioner, config))
}

fn run(cli: &Cli, printer: &Printer) -> ProvisionResult<ExitCode> {
    match &cli.command {
        Commands::Add(args) => {
            let (mut provisioner, config) = open_provisioner(cli)?;

            let mut request = AddressRequest::new(&args.hostname)
                .range(args.range.iter().cloned())
                .ttl(args.ttl.unwrap_or(config.default_ttl));
            if let Some(zone) = &args.zone {
                request = request.zone(zone);
            }
            if !args.no_text {
                let text = args.text.clone().unwrap_or_else(default_text);
                request = request.text(&text);
            }

            let (fqdn, addr) = provisioner.add_address_record(&request)?;
            printer.print_success(&format!("{} {}", fqdn, addr));
        }
        Commands::Alias { alias, target } => {
            let (mut provisioner, _) = open_provisioner(cli)?;
            let (alias, target) = provisioner.add_alias_record(alias, target)?;
            printer.print_success(&format!("{} -> {}", alias, target));
        }
        Commands::Remove { name } => {
            let (mut provisioner, _) = open_provisioner(cli)?;
            let deleted = provisioner.remove_name(name)?;
            printer.print_success(&format!("removed {} record(s) for {}", deleted.len(), name));
            printer.print_records(&deleted);
        }
        Commands::Present { name, assert } => {
            let (provisioner, _) = open_provisioner(cli)?;
            if *assert {
                provisioner.assert_present(name)?;
                println!("true");
            } else {
                let present = provisioner.is_present(name)?;
                println!("{}", present);
                if !present {
                    return Ok(ExitCode::from(1));
                }
            }
        }
        Commands::Config { action } => {
            let path = config_path(cli).ok_or_else(|| {
                ProvisionError::InvalidConfiguration(
                    "no home directory found; pass --config".to_string(),
                )
            })?;

            match action {
                ConfigCommands::Set { key, value } => {
                    set_config(&path, key, value)?;
                    printer.print_success(&format!("{} = {}", key, value));
                }
                ConfigCommands::Show => {
                    let config = GloveConfig::load_or_default(&path)?;
                    printer.print_config(&path, &config);
                    log::debug!("allowed keys: {}", ALLOWED_KEYS.join(", "));
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&LoggerConfig {
        level: cli.log_level,
        json_format: cli.log_json,
    });

    let printer = Printer::new(cli.no_color);
    match run(&cli, &printer) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("command failed: {:?}", e);
            printer.print_error(&e.to_string());
            ExitCode::from(exit_code(&e))
        }
    }
}
