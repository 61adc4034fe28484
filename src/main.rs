use clap::{Args, Parser, Subcommand};
use polydb::config::AppConfig;
use polydb::core::record::parse_record;
use polydb::core::{Backend, Result, Target};
use polydb::db;
use polydb::export::ExportFormat;
use polydb::repl::{run_interactive, Prompter};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "polydb")]
#[command(about = "Manage MongoDB, MySQL and SQLite databases from one terminal client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to <config dir>/polydb/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Backend and database a command runs against
#[derive(Args)]
struct TargetArgs {
    /// Database type
    #[arg(long, value_enum)]
    backend: Backend,

    /// Database name (SQLite: file name or path)
    #[arg(long, default_value = "")]
    db: String,
}

impl TargetArgs {
    fn target(&self) -> Target {
        Target::new(self.backend, self.db.trim())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Guided menu session (the default)
    Interactive,

    /// Create a database
    CreateDb {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List collections or tables
    List {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Create a collection or table
    CreateCollection {
        #[command(flatten)]
        target: TargetArgs,

        /// Collection or table name
        name: String,

        /// Column definitions for relational backends, e.g. "id INTEGER PRIMARY KEY, name TEXT"
        #[arg(long, default_value = "")]
        schema: String,
    },

    /// Insert one record given as a JSON object
    Insert {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        record: String,
    },

    /// Print every record of a collection as JSON
    Read {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,
    },

    /// Update the record with the given ID
    Update {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        id: String,

        /// Fields to set, as a JSON object
        changes: String,
    },

    /// Delete the record with the given ID
    Delete {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        id: String,
    },

    /// Describe a collection's fields and indexes
    Schema {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a collection to <collection>.csv or <collection>.json
    Export {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output directory (defaults to the configured export directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Insert records from a CSV or JSON file
    Import {
        #[command(flatten)]
        target: TargetArgs,

        collection: String,

        file: PathBuf,
    },

    /// Back up the database with the backend's dump tool
    Backup {
        #[command(flatten)]
        target: TargetArgs,

        /// Output directory (defaults to the configured backup directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(configured).unwrap_or(Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_logging(cli.verbose, &config.logging.level);

    info!("Starting polydb...");
    if let Err(e) = run(cli.command.unwrap_or(Command::Interactive), &config).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Interactive => {
            let stdin = io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), io::stdout());
            run_interactive(config, &mut prompter).await?;
        }
        Command::CreateDb { target } => {
            let target = db::create_database(config, target.backend, &target.db).await?;
            println!("Database {} created.", target.database);
        }
        Command::List { target } => {
            for name in db::list_collections(config, &target.target()).await? {
                println!("{}", name);
            }
        }
        Command::CreateCollection { target, name, schema } => {
            let target = target.target();
            db::create_collection(config, &target, &name, &schema).await?;
            println!("Created {} {}.", target.backend.collection_noun(), name);
        }
        Command::Insert {
            target,
            collection,
            record,
        } => {
            let record = parse_record(&record)?;
            db::create_record(config, &target.target(), &collection, &record).await?;
            println!("Record inserted.");
        }
        Command::Read { target, collection } => {
            let records = db::read_records(config, &target.target(), &collection).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Update {
            target,
            collection,
            id,
            changes,
        } => {
            let changes = parse_record(&changes)?;
            let matched = db::update_record(config, &target.target(), &collection, &id, &changes).await?;
            println!("{} record(s) updated.", matched);
        }
        Command::Delete { target, collection, id } => {
            let deleted = db::delete_record(config, &target.target(), &collection, &id).await?;
            println!("{} record(s) deleted.", deleted);
        }
        Command::Schema {
            target,
            collection,
            json,
        } => {
            let report = db::generate_schema_report(config, &target.target(), &collection).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
        }
        Command::Export {
            target,
            collection,
            format,
            out_dir,
        } => {
            let summary =
                db::export_data(config, &target.target(), &collection, format, out_dir.as_deref()).await?;
            println!("Exported {} records to {}.", summary.records, summary.path.display());
        }
        Command::Import {
            target,
            collection,
            file,
        } => {
            let imported = db::import_data(config, &target.target(), &collection, &file).await?;
            println!("Imported {} records into {}.", imported, collection);
        }
        Command::Backup { target, out_dir } => {
            let artifact = db::backup_database(config, &target.target(), out_dir.as_deref()).await?;
            println!("Backup completed: {}", artifact.display());
        }
    }
    Ok(())
}
