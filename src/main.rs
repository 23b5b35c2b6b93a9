//! vocabkeep command-line front-end.
//!
//! Usage:
//!   vocabkeep activate VOC-A2B3-C4D5-E6F7-G8H9
//!   vocabkeep words add ephemeral
//!   vocabkeep status
//!
//! Word commands only run on a machine holding a valid activation. Keys are
//! provisioned with `vocabkeep-admin`, which is not part of this binary.

use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::debug;

use vocabkeep::config::{get_config, VocabConfig};
use vocabkeep::dictionary::DictionaryClient;
use vocabkeep::hardware::current_machine_id;
use vocabkeep::logging::init_logging;
use vocabkeep::store::Database;
use vocabkeep::validator::LicenseValidator;
use vocabkeep::{VocabError, VocabResult};

#[derive(Parser, Debug)]
#[command(name = "vocabkeep")]
#[command(about = "Personal vocabulary manager with machine-bound licensing")]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Activate this machine with a license key
    Activate { key: String },
    /// Show the licenses this machine has activated
    Status,
    /// Print this machine's identifier
    MachineId,
    /// Manage your vocabulary
    Words {
        #[command(subcommand)]
        command: WordsCommand,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Subcommand, Debug)]
enum WordsCommand {
    /// Add a word; the meaning is looked up online when omitted
    Add { word: String, meaning: Option<String> },
    List,
    Search { term: String },
    /// Change the word or meaning of an entry
    Edit {
        id: i64,
        #[arg(long)]
        word: Option<String>,
        #[arg(long)]
        meaning: Option<String>,
    },
    Delete { id: i64 },
    /// Look a word up in the online dictionary
    Define { word: String },
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Check that the database is reachable
    Check,
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

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            debug!("Command failed: {e:?}");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &VocabConfig) -> VocabResult<ExitCode> {
    let machine = current_machine_id();

    match command {
        Command::MachineId => {
            println!("{machine}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Activate { key } => {
            let validator = LicenseValidator::new(Database::new().await?, machine);
            match validator.validate(&key).await {
                Ok(admission) => {
                    println!("{}", admission.message());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Status => {
            let validator = LicenseValidator::new(Database::new().await?, machine);
            let reports = validator.status_report().await?;
            if reports.is_empty() {
                println!("This machine has no activated license.");
            }
            for report in reports {
                println!("{}\n", report.summary());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Words { command } => {
            let db = Database::new().await?;
            let validator = LicenseValidator::new(db.clone(), machine);
            if !validator.is_machine_activated().await? {
                eprintln!(
                    "This machine is not activated. Run `vocabkeep activate <KEY>` first."
                );
                return Ok(ExitCode::FAILURE);
            }
            run_words(command, &db, config).await
        }
        Command::Db {
            command: DbCommand::Check,
        } => {
            let db = Database::new().await?;
            db.check_connection().await?;
            println!("Database ({}) is reachable.", db.backend_name());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_words(
    command: WordsCommand,
    db: &Database,
    config: &VocabConfig,
) -> VocabResult<ExitCode> {
    let now = Utc::now().naive_utc();

    match command {
        WordsCommand::Add { word, meaning } => {
            let meaning = match meaning {
                Some(meaning) => meaning,
                None => {
                    let dictionary = DictionaryClient::new(&config.dictionary)?;
                    match dictionary.fetch_meaning(&word).await? {
                        Some(meaning) => meaning,
                        None => {
                            eprintln!(
                                "No meaning found for '{}'. Please provide one.",
                                word.trim()
                            );
                            return Ok(ExitCode::FAILURE);
                        }
                    }
                }
            };
            let entry = db.add_word(&word, &meaning, now).await?;
            println!("Added '{}': {}", entry.word, entry.meaning);
        }
        WordsCommand::List => print_entries(&db.list_words().await?),
        WordsCommand::Search { term } => print_entries(&db.search_words(&term).await?),
        WordsCommand::Edit { id, word, meaning } => {
            let current = db.get_word(id).await?.ok_or(VocabError::WordNotFound(id))?;
            let word = word.unwrap_or(current.word);
            let meaning = meaning.unwrap_or(current.meaning);
            let entry = db.update_word(id, &word, &meaning, now).await?;
            println!("Updated '{}': {}", entry.word, entry.meaning);
        }
        WordsCommand::Delete { id } => {
            db.delete_word(id).await?;
            println!("Deleted entry {id}.");
        }
        WordsCommand::Define { word } => {
            let dictionary = DictionaryClient::new(&config.dictionary)?;
            let definitions = dictionary.fetch_definitions(&word).await?;
            if definitions.is_empty() {
                println!("No definitions found for '{}'.", word.trim());
            }
            for (i, def) in definitions.iter().enumerate() {
                match &def.part_of_speech {
                    Some(pos) => println!("{}. ({pos}) {}", i + 1, def.definition),
                    None => println!("{}. {}", i + 1, def.definition),
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_entries(entries: &[vocabkeep::store::VocabularyEntry]) {
    if entries.is_empty() {
        println!("No words found.");
        return;
    }
    for entry in entries {
        println!("{:>4}  {}: {}", entry.id, entry.word, entry.meaning);
    }
}
