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

//! Error types for metadata export and script loading.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::executor::ScriptFailure;

/// Main error type of the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid argument (empty path, malformed connection string)
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Scripts directory does not exist
    #[error("Scripts directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A catalog column the export relies on was NULL or empty
    #[error("Unsupported catalog shape: {0}")]
    CatalogIntegrity(String),

    /// A statement from a script file was rejected by the database
    #[error("Script {} failed: {message}", .path.display())]
    ScriptExecution { path: PathBuf, message: String },

    /// Best-effort build finished with at least one failed script
    #[error("{0}")]
    BuildFailed(BuildFailure),

    /// Rolling back the update transaction failed as well. `cause` is the
    /// rollback error, `source` the failure that triggered the rollback.
    #[error("Rollback failed ({cause}) after: {source}")]
    Rollback {
        cause: String,
        #[source]
        source: Box<Error>,
    },

    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Driver(String),

    /// Configuration error (environment, connection settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a ScriptExecution error
    pub fn script(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ScriptExecution {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a driver error. The driver only guarantees `Debug`.
    pub fn driver(err: impl fmt::Debug) -> Self {
        Error::Driver(format!("{:?}", err))
    }

    /// Process exit code: 1 for usage errors, -1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Argument(_) => 1,
            _ => -1,
        }
    }
}

/// Outcome of a best-effort build that did not load every script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    /// Scripts that executed successfully
    pub executed: usize,
    /// Every failed script with its error, in execution order
    pub failures: Vec<ScriptFailure>,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} script(s) failed to load ({} loaded):",
            self.failures.len(),
            self.executed
        )?;
        for failure in &self.failures {
            write!(f, "\n - {}", failure)?;
        }
        Ok(())
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
