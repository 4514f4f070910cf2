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

//! Script files on disk.
//!
//! A scripts tree has three fixed folders, loaded in this order:
//!
//! ```text
//! <root>/domains/domain_<NAME>.sql      one CREATE DOMAIN per line
//! <root>/tables/<NAME>.sql              one CREATE TABLE per file
//! <root>/procedures/procedure_<NAME>.sql one CREATE PROCEDURE per file
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::executor::list_scripts;

/// Object category of a script, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptCategory {
    Domain,
    Table,
    Procedure,
}

impl ScriptCategory {
    /// All categories in load order
    pub const ALL: [ScriptCategory; 3] = [
        ScriptCategory::Domain,
        ScriptCategory::Table,
        ScriptCategory::Procedure,
    ];

    pub fn subdir(self) -> &'static str {
        match self {
            ScriptCategory::Domain => "domains",
            ScriptCategory::Table => "tables",
            ScriptCategory::Procedure => "procedures",
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            ScriptCategory::Domain => "domain_",
            ScriptCategory::Table => "",
            ScriptCategory::Procedure => "procedure_",
        }
    }

    /// File name for an object of this category
    pub fn file_name(self, object_name: &str) -> String {
        format!("{}{}.sql", self.file_prefix(), sanitize_file_name(object_name))
    }

    pub fn dir(self, root: &Path) -> PathBuf {
        root.join(self.subdir())
    }
}

/// DDL of one schema object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDdl {
    pub category: ScriptCategory,
    pub name: String,
    pub sql: String,
}

/// A script written to (or read from) disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub path: PathBuf,
    pub category: ScriptCategory,
    pub sql: String,
}

/// Replace characters that are not allowed in file names on common
/// platforms with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '<' | '>' | '|' | ':' | '*' | '?' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Write one object's DDL under `root`, creating the category folder
pub fn write_script(root: &Path, ddl: ObjectDdl) -> Result<ScriptFile> {
    let dir = ddl.category.dir(root);
    fs::create_dir_all(&dir)?;
    let path = dir.join(ddl.category.file_name(&ddl.name));
    fs::write(&path, ddl.sql.as_bytes())?;
    debug!("Wrote {}", path.display());
    Ok(ScriptFile {
        path,
        category: ddl.category,
        sql: ddl.sql,
    })
}

/// SHA-256 over the relative paths and contents of every script in the
/// tree, in load order. Two exports of the same schema yield the same
/// digest.
pub fn digest_tree(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for category in ScriptCategory::ALL {
        for path in list_scripts(&category.dir(root))? {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(&path)?);
            hasher.update([0u8]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}
