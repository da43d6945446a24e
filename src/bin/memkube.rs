//! File-driven frontend for the merge engine: validate documents,
//! apply strategic merge patches, and run server-side apply, all
//! against a merge schema.

use clap::{Parser, Subcommand};
use memkube::apply::{ManagedFields, Updater};
use memkube::patch::strategic_merge;
use memkube::schema::Schema;
use memkube::typed::ParseableType;
use memkube::Error;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "memkube", version, about = "Schema-aware merge operations on YAML/JSON files")]
struct Cli {
    /// Schema file (YAML). Defaults to the built-in server schema.
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Name of the type in the schema to interpret documents as.
    #[arg(short, long)]
    type_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a document against the schema.
    Validate { file: PathBuf },
    /// Apply a strategic merge patch to a document.
    Merge {
        /// Document being patched.
        #[arg(long)]
        live: PathBuf,
        /// The patch to apply.
        #[arg(long)]
        patch: PathBuf,
    },
    /// Server-side apply a config on behalf of a field manager.
    Apply {
        /// Current object; omit to create from the config alone.
        #[arg(long)]
        live: Option<PathBuf>,
        /// The full intent document.
        #[arg(long)]
        config: PathBuf,
        /// Field manager applying the config.
        #[arg(long)]
        manager: String,
        /// Take ownership of conflicting fields.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = match &cli.schema {
        Some(path) => {
            let schema = Schema::from_yaml(&fs::read_to_string(path)?)?;
            if schema.find_named_type(&cli.type_name).is_none() {
                return Err(format!("schema has no type named {:?}", cli.type_name).into());
            }
            ParseableType::new(
                Arc::new(schema),
                memkube::schema::TypeRef::named(&cli.type_name),
            )
        }
        None => ParseableType::builtin(&cli.type_name),
    };

    match cli.command {
        Command::Validate { file } => {
            descriptor.from_value(load(&file)?)?;
            println!("{} is valid", file.display());
        }
        Command::Merge { live, patch } => {
            let merged = strategic_merge(&descriptor, &load(&live)?, &load(&patch)?)?;
            print_yaml(&merged)?;
        }
        Command::Apply {
            live,
            config,
            manager,
            force,
        } => {
            let live_doc = match &live {
                Some(path) => load(path)?,
                None => Value::Object(Default::default()),
            };
            let mut managers = ManagedFields::from_object(&live_doc)?;
            let live_tv = descriptor.from_value_unvalidated(live_doc);
            let config_tv = descriptor.from_value(load(&config)?)?;

            let updater = Updater::new();
            match updater.apply(&live_tv, &config_tv, "v1", &mut managers, &manager, force) {
                Ok(Some(merged)) => print_yaml(merged.value())?,
                Ok(None) => println!("no changes"),
                Err(err @ Error::Conflict(_)) => {
                    eprintln!("{}", err);
                    eprintln!("re-run with --force to take ownership");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

fn print_yaml(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}
