//! DiagLock command-line interface for inspecting and auditing the diag command lock.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use diaglock_core::{
    config::{bootstrap_template_for, DiagLockConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH},
    identity::{BootOverride, VendorRecord, VENDOR_RECORD_LEN},
    logging,
    policy::{all_allow_lists, AllowList, BuildProfile, CarrierVariant, Opcode},
    provider::{BoardInfo, Operator, SharedMemory, StaticBoard},
    service::{BootReport, DiagLockService},
};
use diaglock_smem::{CmdlineBoardInfo, SystemSharedMemory};
use log::warn;
use schemars::schema_for;
use serde_json::to_string_pretty;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "diaglock",
    version,
    about = "Inspect and audit the diagnostic command lock policy."
)]
struct Cli {
    /// Path to the DiagLock configuration file.
    #[arg(short, long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the lock from the live system and report its state.
    Status,

    /// Classify one or more opcodes against the current policy.
    Check {
        /// Opcodes to classify (`0x29` or decimal).
        #[arg(required = true)]
        opcodes: Vec<Opcode>,

        /// Pretend the board reports this operator (e.g. SPR, VZW_PREPAID).
        #[arg(long)]
        operator: Option<String>,

        /// Pretend the board booted through the factory path.
        #[arg(long)]
        factory_boot: Option<bool>,

        /// Classify as if `diag_enable` had been set to 1.
        #[arg(long)]
        unlocked: bool,
    },

    /// Print the allow-lists that apply while the interface is locked.
    Policy {
        /// Only print the list for this variant (default, verizon, sprint, ...).
        #[arg(long)]
        variant: Option<CarrierVariant>,
    },

    /// Decode the vendor identity record.
    Identity {
        /// Read the record from this file instead of the configured region.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Validate a configuration file or emit the config schema.
    Validate {
        /// Path to the configuration file to validate.
        #[arg(short = 'f', long, default_value = DEFAULT_CONFIG_PATH)]
        file: PathBuf,

        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },

    /// Bootstrap helpers for installers and provisioning scripts.
    Bootstrap {
        #[command(subcommand)]
        command: BootstrapCommands,
    },
}

#[derive(Subcommand, Debug)]
enum BootstrapCommands {
    /// Emit the bootstrap configuration template.
    Template {
        /// Profile to pre-select in the template.
        #[arg(long, default_value = "generic")]
        profile: BuildProfile,
    },
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Dispatch to the requested subcommand.
fn run() -> Result<()> {
    logging::init("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let config = load_cli_config(&cli.config)?;
            let board = board_from_config(&config, None, None)?;
            let service = boot_service(config, board)?;
            print_status(&service);
        }
        Commands::Check {
            opcodes,
            operator,
            factory_boot,
            unlocked,
        } => {
            let config = load_cli_config(&cli.config)?;
            let board = board_from_config(&config, operator.as_deref(), factory_boot)?;
            let service = boot_service(config, board)?;
            if unlocked {
                service
                    .attribute()
                    .store("1")
                    .context("apply diag_enable override")?;
            }

            let variant = service.carrier_variant();
            println!(
                "Profile {} | variant {} | state {}{}",
                service.boot_report().profile,
                variant,
                service.lock_state(),
                if service.engine().factory_exempt() {
                    " | factory exempt"
                } else {
                    ""
                }
            );
            let list = variant.allow_list();
            for opcode in opcodes {
                let allowed = service.is_command_allowed(Some(opcode));
                println!("  {}", verdict_line(opcode, allowed, list));
            }
        }
        Commands::Policy { variant } => match variant {
            Some(variant) => print_allow_list(&variant.to_string(), variant.allow_list()),
            None => {
                for list in all_allow_lists() {
                    print_allow_list(list.name(), list);
                }
            }
        },
        Commands::Identity { file } => {
            let bytes = match file {
                Some(path) => fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let config = load_cli_config(&cli.config)?;
                    let region = SystemSharedMemory::from_config(&config);
                    let entry = config.identity_entry();
                    region.entry(entry)?.with_context(|| {
                        format!(
                            "smem entry {entry} not present under {}",
                            region.root().display()
                        )
                    })?
                }
            };
            if bytes.len() != VENDOR_RECORD_LEN {
                warn!(
                    "record is {} bytes; expected {}",
                    bytes.len(),
                    VENDOR_RECORD_LEN
                );
            }
            let record = VendorRecord::parse(&bytes)?;
            print_vendor_record(&record);
        }
        Commands::Validate { file, schema } => {
            if schema {
                let schema = schema_for!(DiagLockConfig);
                println!("{}", to_string_pretty(&schema)?);
                return Ok(());
            }

            let config = DiagLockConfig::load(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("{} is valid", file.display());
            } else {
                println!("{} has {} issue(s):", file.display(), issues.len());
                for issue in &issues {
                    println!("  - {issue}");
                }
                if !config.fatal_issues().is_empty() {
                    bail!("configuration is not usable");
                }
            }
        }
        Commands::Bootstrap {
            command: BootstrapCommands::Template { profile },
        } => {
            print!("{}", bootstrap_template_for(profile));
        }
    }

    Ok(())
}

fn load_cli_config(path: &Path) -> Result<DiagLockConfig> {
    let config = DiagLockConfig::load_or_bootstrap(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    if config.path != path {
        println!(
            "Using bootstrap configuration at {} (set {CONFIG_PATH_ENV} to replace).",
            config.path.display()
        );
    }

    Ok(config)
}

/// Resolve board identity, letting command-line overrides win.
fn board_from_config(
    config: &DiagLockConfig,
    operator: Option<&str>,
    factory_boot: Option<bool>,
) -> Result<StaticBoard> {
    let mut config = config.clone();
    if let Some(code) = operator {
        config.board.operator = Some(code.to_string());
    }
    if factory_boot.is_some() {
        config.board.factory_boot = factory_boot;
    }

    let board = CmdlineBoardInfo::from_config(&config).context("resolve board identity")?;
    Ok(StaticBoard::new(board.factory_boot(), board.operator()))
}

fn boot_service(config: DiagLockConfig, board: StaticBoard) -> Result<DiagLockService<StaticBoard>> {
    let region = SystemSharedMemory::from_config(&config);
    DiagLockService::boot(Arc::new(config), board, &region).context("boot diag lock")
}

fn print_status(service: &DiagLockService<StaticBoard>) {
    let report = service.boot_report();
    let board = service.engine().board();
    println!("Diag lock status");
    println!("  Config: {}", service.config().path.display());
    println!("  Profile: {}", report.profile);
    println!("  Operator: {}", board.operator);
    println!("  Factory boot: {}", board.factory_boot);
    println!("  Carrier variant: {}", service.carrier_variant());
    println!("  Boot source: {}", describe_boot(report));
    println!("  Lock state: {}", service.lock_state());
    println!("  diag_enable: {}", service.attribute().show());
    println!(
        "  Interface open: {}",
        yes_no(service.is_unlocked_or_factory_exempt())
    );
    println!("  Mutator exported: {}", yes_no(report.mutator_exported));
}

fn describe_boot(report: &BootReport) -> String {
    match &report.boot_override {
        BootOverride::NotApplicable => "built-in default (profile does not read identity)".into(),
        BootOverride::Applied {
            diag_enable,
            size_mismatch,
            ..
        } => {
            let mut line = format!("identity record (diag_enable={diag_enable})");
            if *size_mismatch {
                line.push_str(", record size mismatch");
            }
            line
        }
        BootOverride::RecordMissing => "built-in default (identity record missing)".into(),
        BootOverride::Unusable(reason) => format!("built-in default ({reason})"),
    }
}

fn print_allow_list(title: &str, list: &AllowList) {
    println!("{title} ({} opcodes)", list.len());
    for entry in list.entries() {
        println!("  {}  {}", entry.opcode, entry.meaning);
    }
}

fn print_vendor_record(record: &VendorRecord) {
    println!("Vendor identity record ({} bytes)", record.raw_len);
    println!("  sku_rev: {}", record.sku_rev);
    println!("  hw_rev: {}", record.hw_rev);
    println!("  sub_rev: {}", record.sub_rev);
    println!("  vari_mem: {}", record.vari_mem);
    println!("  vari_main: {}", record.vari_main);
    println!("  ant_rev: {}", record.ant_rev);
    println!("  model_name: {}", record.model_name);
    println!("  sw_version: {}", record.sw_version);
    println!("  operator_name: {}", record.operator_name);
    println!("  modem_name: {}", record.modem_name);
    println!("  sim_num: {}", record.sim_num);
    println!("  flag_gpio: {:#x}", record.flag_gpio);
    println!(
        "  diag_enable: {} ({})",
        record.diag_enable,
        record.lock_state()
    );
    if !record.operator_name.is_empty() {
        println!(
            "  operator (parsed): {}",
            Operator::from_code(&record.operator_name)
        );
    }
}

fn verdict_line(opcode: Opcode, allowed: bool, list: &AllowList) -> String {
    let verdict = if allowed { "allow" } else { "deny " };
    match list.describe(opcode) {
        Some(meaning) => format!("{opcode}  {verdict}  {meaning}"),
        None => format!("{opcode}  {verdict}"),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
