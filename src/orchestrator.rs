// MIT License
//
// Copyright (c) 2021 Hajime Nakagami<nakagami@gmail.com>
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The three operations of the tool: export a schema to scripts, build a
//! new database from scripts, and update an existing one.
//!
//! Build is best effort: every script is tried and the failures are
//! reported together at the end. Update is all or nothing: it runs in
//! one transaction that is rolled back at the first failing script.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::config::{ConnectionString, ServerSettings};
use crate::ddl_extractor::extract_ddl;
use crate::error::{BuildFailure, Error, Result};
use crate::executor::{run_folder, run_phases, ExecutionContext, ExecutionResult, LoadStrategy};
use crate::script::{digest_tree, write_script, ScriptCategory};
use crate::transaction::{Connector, Session};

/// File name of the database created by `build_database`
pub const DATABASE_FILE: &str = "database.fdb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub domains: usize,
    pub tables: usize,
    pub procedures: usize,
    /// Digest of the written tree, see [`digest_tree`]
    pub digest: String,
    pub elapsed: TimeDelta,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} domain(s), {} table(s), {} procedure(s) exported in {} ms (sha256 {})",
            self.domains,
            self.tables,
            self.procedures,
            self.elapsed.num_milliseconds(),
            self.digest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub database: PathBuf,
    /// An existing database file was deleted first
    pub replaced_existing: bool,
    pub executed: usize,
    pub elapsed: TimeDelta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub executed: usize,
    pub elapsed: TimeDelta,
}

/// Progress of `build_database`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    ValidatingInputs,
    DatabaseCreated,
    LoadingDomains,
    LoadingTables,
    LoadingProcedures,
    Done,
    Failed,
}

impl BuildStage {
    fn loading(category: ScriptCategory) -> Self {
        match category {
            ScriptCategory::Domain => BuildStage::LoadingDomains,
            ScriptCategory::Table => BuildStage::LoadingTables,
            ScriptCategory::Procedure => BuildStage::LoadingProcedures,
        }
    }

    fn enter(self) {
        info!(stage = ?self, "Build stage");
    }
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.to_string_lossy().trim().is_empty() {
        return Err(Error::Argument(format!("{} is required", what)));
    }
    Ok(())
}

fn validate_scripts_dir(scripts_dir: &Path) -> Result<()> {
    require_dir(scripts_dir, "--scripts-dir")?;
    if !scripts_dir.is_dir() {
        return Err(Error::NotFound(scripts_dir.to_path_buf()));
    }
    Ok(())
}

/// Write one script per domain, table and procedure of `catalog` under
/// `output_dir`
pub fn export_scripts<C: Catalog + ?Sized>(catalog: &mut C, output_dir: &Path) -> Result<ExportReport> {
    require_dir(output_dir, "--output-dir")?;
    let started = Utc::now();

    for category in ScriptCategory::ALL {
        fs::create_dir_all(category.dir(output_dir))?;
    }

    let (mut domains, mut tables, mut procedures) = (0, 0, 0);
    for ddl in extract_ddl(catalog)? {
        match ddl.category {
            ScriptCategory::Domain => domains += 1,
            ScriptCategory::Table => tables += 1,
            ScriptCategory::Procedure => procedures += 1,
        }
        write_script(output_dir, ddl)?;
    }

    let report = ExportReport {
        domains,
        tables,
        procedures,
        digest: digest_tree(output_dir)?,
        elapsed: Utc::now() - started,
    };
    info!("Export to {} done: {}", output_dir.display(), report);
    Ok(report)
}

/// Connect to `conn` and export its schema to `output_dir`
pub fn export_database<Cn>(connector: &Cn, conn: &ConnectionString, output_dir: &Path) -> Result<ExportReport>
where
    Cn: Connector,
    Cn::Session: Catalog,
{
    require_dir(output_dir, "--output-dir")?;
    info!("Exporting schema of {}", conn);
    let mut session = connector.connect(conn)?;
    export_scripts(&mut session, output_dir)
}

/// Create `<db_dir>/database.fdb` and load the scripts tree into it,
/// statement by statement in autocommit mode.
///
/// Scripts that fail do not stop the build. If any failed, the result is
/// `Error::BuildFailed` listing all of them; the database is left with
/// whatever did load.
pub fn build_database<Cn: Connector>(
    connector: &Cn,
    settings: &ServerSettings,
    db_dir: &Path,
    scripts_dir: &Path,
) -> Result<BuildReport> {
    let started = Utc::now();
    BuildStage::ValidatingInputs.enter();
    require_dir(db_dir, "--db-dir")?;
    validate_scripts_dir(scripts_dir)?;

    fs::create_dir_all(db_dir)?;
    let db_path = std::path::absolute(db_dir.join(DATABASE_FILE))?;
    let conn = settings.connection_for(&db_path)?;
    let replaced_existing = db_path.exists();
    if replaced_existing {
        warn!("Deleting existing database {}", db_path.display());
        fs::remove_file(&db_path)?;
    }

    connector.create_database(&conn)?;
    BuildStage::DatabaseCreated.enter();
    info!("Created database {}", db_path.display());

    let mut session = connector.connect(&conn)?;
    let mut ctx = ExecutionContext::best_effort(&mut session);
    let mut result = ExecutionResult::default();
    for category in ScriptCategory::ALL {
        BuildStage::loading(category).enter();
        let dir = category.dir(scripts_dir);
        result = result.merge(run_folder(&mut ctx, &dir, LoadStrategy::for_category(category))?);
    }

    if !result.is_success() {
        BuildStage::Failed.enter();
        error!("Build finished with {} failed script(s)", result.failures.len());
        return Err(Error::BuildFailed(BuildFailure {
            executed: result.executed,
            failures: result.failures,
        }));
    }

    BuildStage::Done.enter();
    Ok(BuildReport {
        database: db_path,
        replaced_existing,
        executed: result.executed,
        elapsed: Utc::now() - started,
    })
}

/// Apply the scripts tree to an existing database in one transaction.
///
/// The first failing script stops the update and everything executed
/// before it is rolled back.
pub fn update_database<Cn: Connector>(
    connector: &Cn,
    conn: &ConnectionString,
    scripts_dir: &Path,
) -> Result<UpdateReport> {
    let started = Utc::now();
    validate_scripts_dir(scripts_dir)?;

    info!("Updating {} from {}", conn, scripts_dir.display());
    let mut session = connector.connect(conn)?;
    let executed = session.with_transaction(|trans| {
        let outcome = {
            let mut ctx = ExecutionContext::fail_fast(trans.as_sink());
            run_phases(&mut ctx, scripts_dir)
        };

        match outcome {
            Ok(result) => {
                trans.commit()?;
                Ok(result.executed)
            }
            Err(err) => {
                warn!("Update failed, rolling back: {}", err);
                match trans.rollback() {
                    Ok(()) => Err(err),
                    Err(rollback_err) => {
                        error!("Rollback failed: {}", rollback_err);
                        Err(Error::Rollback {
                            cause: rollback_err.to_string(),
                            source: Box::new(err),
                        })
                    }
                }
            }
        }
    })?;

    info!("Update committed, {} script(s) executed", executed);
    Ok(UpdateReport {
        executed,
        elapsed: Utc::now() - started,
    })
}
