/// Backup Module
///
/// Backups are delegated to each backend's own dump tool:
///
/// - MongoDB: `mongodump`, writing a directory per database
/// - MySQL: `mysqldump`, writing `mysql-backup.sql`
/// - SQLite: the `sqlite3` shell's `.backup` command, writing `sqlite-backup.db`
///
/// Planning is separate from running so the exact command line can be
/// inspected without the tools installed.

use crate::config::AppConfig;
use crate::core::{Backend, PolydbError, Result, Target};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A fully resolved dump command
#[derive(Debug, Clone, PartialEq)]
pub struct BackupPlan {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child; keeps secrets out of argv
    pub envs: Vec<(String, String)>,
    pub output_dir: PathBuf,
    /// File or directory the tool produces
    pub artifact: PathBuf,
}

/// Builds the dump command for `target`; `out_dir` defaults to the configured
/// backup directory.
pub fn plan_backup(config: &AppConfig, target: &Target, out_dir: Option<&Path>) -> Result<BackupPlan> {
    let output_dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.backup.directory.clone());

    let plan = match target.backend {
        Backend::Mongodb => {
            let database = target.database.trim();
            if database.is_empty() {
                return Err(PolydbError::Config("no MongoDB database selected".to_string()));
            }
            BackupPlan {
                program: config.backup.mongodump.clone(),
                args: vec![
                    format!("--uri={}", config.mongodb.uri),
                    format!("--db={}", database),
                    format!("--out={}", output_dir.display()),
                ],
                envs: Vec::new(),
                artifact: output_dir.join(database),
                output_dir,
            }
        }
        Backend::Mysql => {
            let mysql = &config.mysql;
            let database = mysql.resolve_database(&target.database)?;
            let artifact = output_dir.join("mysql-backup.sql");
            let mut envs = Vec::new();
            if !mysql.password.is_empty() {
                envs.push(("MYSQL_PWD".to_string(), mysql.password.clone()));
            }
            BackupPlan {
                program: config.backup.mysqldump.clone(),
                args: vec![
                    "-h".to_string(),
                    mysql.host.clone(),
                    "-P".to_string(),
                    mysql.port.to_string(),
                    "-u".to_string(),
                    mysql.user.clone(),
                    format!("--result-file={}", artifact.display()),
                    database,
                ],
                envs,
                artifact,
                output_dir,
            }
        }
        Backend::Sqlite => {
            let path = config.sqlite.resolve(&target.database)?;
            let artifact = output_dir.join("sqlite-backup.db");
            // The dot-command takes a single-quoted SQL string
            let quoted = artifact.display().to_string().replace('\'', "''");
            BackupPlan {
                program: config.backup.sqlite3.clone(),
                args: vec![path.display().to_string(), format!(".backup '{}'", quoted)],
                envs: Vec::new(),
                artifact,
                output_dir,
            }
        }
    };
    Ok(plan)
}

/// Runs a backup plan and returns the artifact path.
pub async fn run_backup(plan: &BackupPlan) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&plan.output_dir).await?;
    info!("Running {} into {}", plan.program, plan.output_dir.display());

    let output = Command::new(&plan.program)
        .args(&plan.args)
        .envs(plan.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PolydbError::Backup(format!("failed to run {}: {}", plan.program, e)))?;

    debug!("{} finished with {}", plan.program, output.status);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PolydbError::Backup(format!(
            "{} exited with {}: {}",
            plan.program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(plan.artifact.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_mongodb() {
        let config = AppConfig::default();
        let target = Target::new(Backend::Mongodb, "shop");
        let plan = plan_backup(&config, &target, Some(Path::new("/tmp/bk"))).unwrap();
        assert_eq!(plan.program, "mongodump");
        assert_eq!(
            plan.args,
            vec!["--uri=mongodb://localhost:27017", "--db=shop", "--out=/tmp/bk"]
        );
        assert_eq!(plan.artifact, PathBuf::from("/tmp/bk/shop"));
    }

    #[test]
    fn test_plan_mysql_keeps_password_out_of_args() {
        let mut config = AppConfig::default();
        config.mysql.password = "hunter2".to_string();
        let target = Target::new(Backend::Mysql, "shop");
        let plan = plan_backup(&config, &target, None).unwrap();

        assert_eq!(plan.program, "mysqldump");
        assert!(plan.args.iter().all(|a| !a.contains("hunter2")));
        assert_eq!(plan.envs, vec![("MYSQL_PWD".to_string(), "hunter2".to_string())]);
        assert_eq!(plan.args.last().map(String::as_str), Some("shop"));
        assert!(plan.args.contains(&"--result-file=backups/mysql-backup.sql".to_string()));
        assert_eq!(plan.output_dir, PathBuf::from("backups"));
    }

    #[test]
    fn test_plan_sqlite() {
        let mut config = AppConfig::default();
        config.sqlite.directory = PathBuf::from("/data");
        config.backup.sqlite3 = "/opt/sqlite3".to_string();
        let target = Target::new(Backend::Sqlite, "shop");
        let plan = plan_backup(&config, &target, Some(Path::new("/tmp/it's"))).unwrap();

        assert_eq!(plan.program, "/opt/sqlite3");
        assert_eq!(plan.args, vec!["/data/shop.db", ".backup '/tmp/it''s/sqlite-backup.db'"]);
        assert_eq!(plan.artifact, PathBuf::from("/tmp/it's/sqlite-backup.db"));
    }

    #[test]
    fn test_plan_requires_database() {
        let config = AppConfig::default();
        assert!(plan_backup(&config, &Target::new(Backend::Mongodb, " "), None).is_err());
        assert!(plan_backup(&config, &Target::new(Backend::Mysql, ""), None).is_err());
    }

    #[tokio::test]
    async fn test_run_backup_reports_failure() {
        let dir = TempDir::new().unwrap();
        let plan = BackupPlan {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()],
            envs: Vec::new(),
            output_dir: dir.path().join("out"),
            artifact: dir.path().join("out/never"),
        };
        let err = run_backup(&plan).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Backup failed: sh exited with"), "{}", message);
        assert!(message.ends_with("broken"), "{}", message);
        assert!(dir.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn test_run_backup_passes_env() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("env.txt");
        let plan = BackupPlan {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), format!("printf %s \"$MYSQL_PWD\" > '{}'", artifact.display())],
            envs: vec![("MYSQL_PWD".to_string(), "s3cret".to_string())],
            output_dir: dir.path().to_path_buf(),
            artifact: artifact.clone(),
        };
        assert_eq!(run_backup(&plan).await.unwrap(), artifact);
        assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "s3cret");
    }

    #[tokio::test]
    async fn test_run_backup_missing_program() {
        let dir = TempDir::new().unwrap();
        let plan = BackupPlan {
            program: "polydb-no-such-dump-tool".to_string(),
            args: Vec::new(),
            envs: Vec::new(),
            output_dir: dir.path().to_path_buf(),
            artifact: dir.path().to_path_buf(),
        };
        assert!(matches!(run_backup(&plan).await, Err(PolydbError::Backup(_))));
    }
}
