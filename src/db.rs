/// Database Operations
///
/// Entry points shared by the interactive session and the command line. Every
/// operation opens a connection for the target, performs one request, closes
/// the connection and returns the result. Failures are logged here and then
/// handed back to the caller.

use crate::backup::{self, plan_backup};
use crate::config::AppConfig;
use crate::core::db::mongo::MongoAdapter;
use crate::core::db::mysql::MySqlAdapter;
use crate::core::db::{self, DatabaseAdapter, SchemaReport};
use crate::core::{Backend, PolydbError, Record, Result, Target};
use crate::export::{self, ExportFormat, ExportSummary};
use crate::import;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Closes the adapter and returns the operation's result.
///
/// A close failure is only reported when the operation itself succeeded.
async fn finish<T>(adapter: Box<dyn DatabaseAdapter>, result: Result<T>) -> Result<T> {
    let closed = adapter.close().await;
    let value = result?;
    closed?;
    Ok(value)
}

async fn logged<T, F>(action: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = operation.await;
    if let Err(e) = &result {
        error!("Error {}: {}", action, e);
    }
    result
}

/// Creates a database and returns it as the session target.
pub async fn create_database(config: &AppConfig, backend: Backend, name: &str) -> Result<Target> {
    logged("creating database", async {
        match backend {
            Backend::Mongodb => MongoAdapter::create_database(&config.mongodb, name).await?,
            Backend::Mysql => MySqlAdapter::create_database(&config.mysql, name).await?,
            Backend::Sqlite => {
                let path = config.sqlite.resolve(name)?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let adapter = db::sqlite::SqliteAdapter::open(&path)?;
                Box::new(adapter).close().await?;
            }
        }
        info!("Database {} created ({})", name, backend);
        Ok(Target::new(backend, name.trim()))
    })
    .await
}

/// Verifies that a database can be opened and returns it as the session target.
pub async fn select_database(config: &AppConfig, backend: Backend, name: &str) -> Result<Target> {
    let target = Target::new(backend, name.trim());
    logged("selecting database", async {
        if backend == Backend::Sqlite {
            let path = config.sqlite.resolve(&target.database)?;
            if path != Path::new(":memory:") && !path.exists() {
                warn!("SQLite file {} does not exist yet and will be created", path.display());
            }
        }
        let mut adapter = db::open(config, &target).await?;
        let result = match backend {
            Backend::Mongodb => adapter.list_collections().await.map(|names| {
                if names.is_empty() {
                    warn!("Database {} is empty or does not exist", target.database);
                }
            }),
            _ => Ok(()),
        };
        finish(adapter, result).await?;
        info!("Using {} database {:?}", backend, target.database);
        Ok(target.clone())
    })
    .await
}

pub async fn list_collections(config: &AppConfig, target: &Target) -> Result<Vec<String>> {
    logged(&format!("listing {}s", target.backend.collection_noun()), async {
        let mut adapter = db::open(config, target).await?;
        let names = adapter.list_collections().await;
        finish(adapter, names).await
    })
    .await
}

pub async fn create_collection(
    config: &AppConfig,
    target: &Target,
    name: &str,
    definition: &str,
) -> Result<()> {
    logged(&format!("creating {}", target.backend.collection_noun()), async {
        let mut adapter = db::open(config, target).await?;
        let created = adapter.create_collection(name.trim(), definition).await;
        finish(adapter, created).await?;
        info!("{} {} created", target.backend.collection_noun(), name.trim());
        Ok(())
    })
    .await
}

pub async fn create_record(
    config: &AppConfig,
    target: &Target,
    collection: &str,
    record: &Record,
) -> Result<()> {
    logged("inserting record", async {
        let mut adapter = db::open(config, target).await?;
        let inserted = adapter.insert(collection, record).await;
        finish(adapter, inserted).await?;
        info!("Record inserted into {}", collection);
        Ok(())
    })
    .await
}

pub async fn read_records(config: &AppConfig, target: &Target, collection: &str) -> Result<Vec<Record>> {
    logged("reading records", async {
        let mut adapter = db::open(config, target).await?;
        let records = adapter.find_all(collection).await;
        finish(adapter, records).await
    })
    .await
}

/// Applies `changes` to the record with identifier `id`; returns how many
/// records matched.
pub async fn update_record(
    config: &AppConfig,
    target: &Target,
    collection: &str,
    id: &str,
    changes: &Record,
) -> Result<u64> {
    logged("updating record", async {
        let mut adapter = db::open(config, target).await?;
        let matched = adapter.update(collection, id, changes).await;
        let matched = finish(adapter, matched).await?;
        if matched == 0 {
            warn!("No record with id {} in {}", id, collection);
        }
        Ok(matched)
    })
    .await
}

pub async fn delete_record(config: &AppConfig, target: &Target, collection: &str, id: &str) -> Result<u64> {
    logged("deleting record", async {
        let mut adapter = db::open(config, target).await?;
        let deleted = adapter.delete(collection, id).await;
        let deleted = finish(adapter, deleted).await?;
        if deleted == 0 {
            warn!("No record with id {} in {}", id, collection);
        }
        Ok(deleted)
    })
    .await
}

pub async fn generate_schema_report(
    config: &AppConfig,
    target: &Target,
    collection: &str,
) -> Result<SchemaReport> {
    logged("generating schema report", async {
        let mut adapter = db::open(config, target).await?;
        let report = adapter.describe(collection).await;
        finish(adapter, report).await
    })
    .await
}

/// Writes every record of `collection` to a file; `out_dir` defaults to the
/// configured export directory.
pub async fn export_data(
    config: &AppConfig,
    target: &Target,
    collection: &str,
    format: ExportFormat,
    out_dir: Option<&Path>,
) -> Result<ExportSummary> {
    logged("exporting data", async {
        let mut adapter = db::open(config, target).await?;
        let records = adapter.find_all(collection).await;
        let records = finish(adapter, records).await?;

        let dir = out_dir.unwrap_or(config.export.directory.as_path());
        let summary = export::write_export(&records, collection, format, dir)?;
        info!("Exported {} records to {}", summary.records, summary.path.display());
        Ok(summary)
    })
    .await
}

/// Loads records from a CSV or JSON file and inserts them as one batch.
pub async fn import_data(config: &AppConfig, target: &Target, collection: &str, path: &Path) -> Result<u64> {
    logged("importing data", async {
        let records = import::load_records(path)?;
        let mut adapter = db::open(config, target).await?;
        let inserted = adapter.insert_many(collection, &records).await;
        let inserted = finish(adapter, inserted).await?;
        info!("Imported {} records into {}", inserted, collection);
        Ok(inserted)
    })
    .await
}

/// Runs the backend's dump tool and returns the path of what it wrote.
pub async fn backup_database(config: &AppConfig, target: &Target, out_dir: Option<&Path>) -> Result<PathBuf> {
    logged("backing up database", async {
        if target.backend == Backend::Sqlite {
            let path = config.sqlite.resolve(&target.database)?;
            if !path.exists() {
                return Err(PolydbError::NotFound {
                    noun: "database file",
                    name: path.display().to_string(),
                });
            }
        }
        let plan = plan_backup(config, target, out_dir)?;
        let artifact = backup::run_backup(&plan).await?;
        info!("Backup written to {}", artifact.display());
        Ok(artifact)
    })
    .await
}
