//! vocabkeep-admin: provisioning tool for license keys.
//!
//! Usage:
//!   vocabkeep-admin create --max-activations 3 --expires 2026-12-31
//!   vocabkeep-admin list
//!   vocabkeep-admin revoke VOC-A2B3-C4D5-E6F7-G8H9
//!   vocabkeep-admin release VOC-A2B3-C4D5-E6F7-G8H9 --machine <MACHINE_ID>
//!
//! Built only with `--features admin`.

use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::debug;

use vocabkeep::admin::{CreateLicenseOptions, LicenseAdmin};
use vocabkeep::config::get_config;
use vocabkeep::hardware::MachineId;
use vocabkeep::license_key::LicenseKeyConfig;
use vocabkeep::logging::init_logging;
use vocabkeep::store::Database;
use vocabkeep::VocabResult;

#[derive(Parser, Debug)]
#[command(name = "vocabkeep-admin")]
#[command(about = "Provision and manage vocabkeep license keys")]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision a new license key
    Create {
        /// Use this key instead of generating one
        #[arg(long)]
        key: Option<String>,
        /// Last valid day (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<NaiveDate>,
        #[arg(long)]
        max_activations: Option<u32>,
        /// Pin the key to one machine id
        #[arg(long)]
        pin: Option<String>,
    },
    List,
    /// Revoke a key for good
    Revoke { key: String },
    /// Free the activation a machine holds on a key
    Release {
        key: String,
        #[arg(long)]
        machine: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match get_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.enabled = true;
        logging.level = "debug".to_string();
    }
    init_logging(&logging);

    let admin = match Database::new().await {
        Ok(db) => LicenseAdmin::new(
            db,
            LicenseKeyConfig::from(&config.license),
            config.license.default_max_activations,
        ),
        Err(e) => {
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &admin).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command failed: {e:?}");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, admin: &LicenseAdmin) -> VocabResult<()> {
    match command {
        Command::Create {
            key,
            expires,
            max_activations,
            pin,
        } => {
            let license = admin
                .create_license(CreateLicenseOptions {
                    license_key: key,
                    expiry_date: expires,
                    max_activations,
                    pinned_to: pin.map(MachineId::new),
                })
                .await?;
            println!("{}", license.license_key);
        }
        Command::List => {
            for summary in admin.list_licenses().await? {
                let license = &summary.license;
                let expiry = license
                    .expiry_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<8} expires {:<10}  {}/{} activations",
                    license.license_key,
                    license.status,
                    expiry,
                    summary.activated_count,
                    license.max_activations
                );
            }
        }
        Command::Revoke { key } => {
            admin.revoke_license(&key).await?;
            println!("Revoked {key}.");
        }
        Command::Release { key, machine } => {
            let machine = MachineId::new(machine);
            admin.release_activation(&key, &machine).await?;
            println!("Released {key} from {}.", machine.short());
        }
    }

    Ok(())
}
