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

//! Loading script folders into a database.
//!
//! Files run in ordinal, case-insensitive name order so that a scripts
//! tree always loads the same way. Table and procedure scripts are sent
//! whole (a procedure body must reach the server as one statement);
//! domain scripts are sent line by line.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::script::ScriptCategory;
use crate::transaction::StatementSink;

/// A script that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub path: PathBuf,
    pub message: String,
}

impl ScriptFailure {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    fn from_error(path: &Path, err: Error) -> Self {
        match err {
            Error::ScriptExecution { path, message } => Self { path, message },
            other => Self::new(path, other.to_string()),
        }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.path.display(), self.message)
    }
}

/// Scripts executed and scripts failed, per folder or folded over several
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub executed: usize,
    pub failures: Vec<ScriptFailure>,
}

impl ExecutionResult {
    pub fn merge(mut self, other: ExecutionResult) -> Self {
        self.executed += other.executed;
        self.failures.extend(other.failures);
        self
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// How a file is turned into statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// The whole file is one statement
    WholeFile,
    /// Every non-blank line is one statement
    LineByLine,
}

impl LoadStrategy {
    pub fn for_category(category: ScriptCategory) -> Self {
        match category {
            ScriptCategory::Domain => LoadStrategy::LineByLine,
            ScriptCategory::Table | ScriptCategory::Procedure => LoadStrategy::WholeFile,
        }
    }
}

/// What to do when a script fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and go on with the next script
    BestEffort,
    /// Stop at the first failure and return it
    FailFast,
}

/// Where statements go and how failures are handled
pub struct ExecutionContext<'a> {
    sink: &'a mut dyn StatementSink,
    policy: FailurePolicy,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(sink: &'a mut dyn StatementSink, policy: FailurePolicy) -> Self {
        Self { sink, policy }
    }

    pub fn best_effort(sink: &'a mut dyn StatementSink) -> Self {
        Self::new(sink, FailurePolicy::BestEffort)
    }

    pub fn fail_fast(sink: &'a mut dyn StatementSink) -> Self {
        Self::new(sink, FailurePolicy::FailFast)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

fn ordinal_ignore_case(a: &Path, b: &Path) -> Ordering {
    let ka = a.to_string_lossy().to_uppercase();
    let kb = b.to_string_lossy().to_uppercase();
    ka.cmp(&kb).then_with(|| a.cmp(b))
}

/// `.sql` files of a folder in load order. A missing folder has no scripts.
pub fn list_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_sql = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("sql"))
            .unwrap_or(false);
        if is_sql && path.is_file() {
            scripts.push(path);
        }
    }
    scripts.sort_by(|a, b| ordinal_ignore_case(a, b));
    Ok(scripts)
}

/// Execute one script file. Any failure is reported as `ScriptExecution`
/// for that file.
pub fn run_script(sink: &mut dyn StatementSink, path: &Path, strategy: LoadStrategy) -> Result<()> {
    let sql = fs::read_to_string(path).map_err(|e| Error::script(path, e.to_string()))?;

    match strategy {
        LoadStrategy::WholeFile => {
            if sql.trim().is_empty() {
                return Err(Error::script(path, "script is empty"));
            }
            sink.execute(&sql).map_err(|e| Error::script(path, e.to_string()))
        }
        LoadStrategy::LineByLine => {
            for (no, line) in sql.lines().enumerate() {
                let statement = line.trim();
                if statement.is_empty() {
                    continue;
                }
                sink.execute(statement)
                    .map_err(|e| Error::script(path, format!("line {}: {}", no + 1, e)))?;
            }
            Ok(())
        }
    }
}

/// Run every script of one folder
pub fn run_folder(ctx: &mut ExecutionContext<'_>, dir: &Path, strategy: LoadStrategy) -> Result<ExecutionResult> {
    let mut result = ExecutionResult::default();

    if !dir.is_dir() {
        warn!("Folder {} does not exist, nothing to load", dir.display());
        return Ok(result);
    }

    for path in list_scripts(dir)? {
        match run_script(&mut *ctx.sink, &path, strategy) {
            Ok(()) => {
                debug!("Loaded {}", path.display());
                result.executed += 1;
            }
            Err(err) => match ctx.policy {
                FailurePolicy::FailFast => return Err(err),
                FailurePolicy::BestEffort => {
                    warn!("Failed to load {}: {}", path.display(), err);
                    result.failures.push(ScriptFailure::from_error(&path, err));
                }
            },
        }
    }

    Ok(result)
}

/// Load domains, then tables, then procedures from a scripts tree
pub fn run_phases(ctx: &mut ExecutionContext<'_>, scripts_dir: &Path) -> Result<ExecutionResult> {
    let mut total = ExecutionResult::default();

    for category in ScriptCategory::ALL {
        let dir = category.dir(scripts_dir);
        info!("Loading {} from {}", category.subdir(), dir.display());
        let phase = run_folder(ctx, &dir, LoadStrategy::for_category(category))?;
        info!(
            "{}: {} loaded, {} failed",
            category.subdir(),
            phase.executed,
            phase.failures.len()
        );
        total = total.merge(phase);
    }

    Ok(total)
}
