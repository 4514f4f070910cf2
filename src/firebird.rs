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

//! Firebird implementation of the driver seams and of `Catalog`.

use firebirust::Connection;
use tracing::debug;

use crate::catalog::{Catalog, ColumnRow, DomainRow, ParameterDirection, ParameterRow};
use crate::config::ConnectionString;
use crate::error::{Error, Result};
use crate::transaction::{
    Connector, ScriptTransaction, Session, StatementSink, TransactionHandle, TransactionOp,
};
use crate::typemap::ColumnType;

const DOMAINS_SQL: &str = r#"
    SELECT f.RDB$FIELD_NAME, f.RDB$FIELD_TYPE, f.RDB$FIELD_LENGTH,
           f.RDB$CHARACTER_LENGTH, f.RDB$FIELD_SCALE, f.RDB$CHARACTER_SET_ID,
           f.RDB$DEFAULT_SOURCE, f.RDB$VALIDATION_SOURCE, f.RDB$NULL_FLAG
    FROM RDB$FIELDS f
    WHERE COALESCE(f.RDB$SYSTEM_FLAG, 0) = 0
    ORDER BY f.RDB$FIELD_NAME
"#;

const TABLES_SQL: &str = r#"
    SELECT r.RDB$RELATION_NAME
    FROM RDB$RELATIONS r
    WHERE COALESCE(r.RDB$SYSTEM_FLAG, 0) = 0
      AND r.RDB$VIEW_SOURCE IS NULL
    ORDER BY r.RDB$RELATION_NAME
"#;

const COLUMNS_SQL: &str = r#"
    SELECT rf.RDB$FIELD_NAME, rf.RDB$FIELD_SOURCE,
           f.RDB$FIELD_TYPE, f.RDB$FIELD_LENGTH, f.RDB$CHARACTER_LENGTH,
           f.RDB$FIELD_SCALE, f.RDB$CHARACTER_SET_ID,
           rf.RDB$DEFAULT_SOURCE, f.RDB$VALIDATION_SOURCE, rf.RDB$NULL_FLAG
    FROM RDB$RELATION_FIELDS rf
    JOIN RDB$FIELDS f ON rf.RDB$FIELD_SOURCE = f.RDB$FIELD_NAME
    WHERE rf.RDB$RELATION_NAME = ?
    ORDER BY rf.RDB$FIELD_POSITION
"#;

const PROCEDURES_SQL: &str = r#"
    SELECT p.RDB$PROCEDURE_NAME
    FROM RDB$PROCEDURES p
    WHERE COALESCE(p.RDB$SYSTEM_FLAG, 0) = 0
      AND p.RDB$PACKAGE_NAME IS NULL
    ORDER BY p.RDB$PROCEDURE_NAME
"#;

const PARAMETERS_SQL: &str = r#"
    SELECT pp.RDB$PARAMETER_NAME, pp.RDB$FIELD_SOURCE,
           f.RDB$FIELD_TYPE, f.RDB$FIELD_LENGTH, f.RDB$CHARACTER_LENGTH,
           f.RDB$FIELD_SCALE, f.RDB$CHARACTER_SET_ID
    FROM RDB$PROCEDURE_PARAMETERS pp
    JOIN RDB$FIELDS f ON pp.RDB$FIELD_SOURCE = f.RDB$FIELD_NAME
    WHERE pp.RDB$PROCEDURE_NAME = ?
      AND pp.RDB$PACKAGE_NAME IS NULL
      AND pp.RDB$PARAMETER_TYPE = ?
    ORDER BY pp.RDB$PARAMETER_NUMBER
"#;

const SOURCE_SQL: &str = r#"
    SELECT p.RDB$PROCEDURE_SOURCE
    FROM RDB$PROCEDURES p
    WHERE p.RDB$PROCEDURE_NAME = ?
      AND p.RDB$PACKAGE_NAME IS NULL
"#;

// Nullable catalog value; values that do not convert read as NULL
macro_rules! opt {
    ($row:expr, $idx:expr, $t:ty) => {
        $row.get::<Option<$t>>($idx).ok().flatten()
    };
}

/// Type columns starting at `$idx`: type, length, char length, scale, charset
macro_rules! column_type {
    ($row:expr, $idx:expr) => {
        build_column_type(
            opt!($row, $idx, i16),
            opt!($row, $idx + 1, i16),
            opt!($row, $idx + 2, i16),
            opt!($row, $idx + 3, i16),
            opt!($row, $idx + 4, i16),
        )
    };
}

fn build_column_type(
    type_code: Option<i16>,
    length: Option<i16>,
    char_length: Option<i16>,
    scale: Option<i16>,
    charset_id: Option<i16>,
) -> ColumnType {
    let mut ty = ColumnType::new(
        type_code.unwrap_or(0),
        length.unwrap_or(0),
        scale.unwrap_or(0),
    );
    if let Some(len) = char_length {
        ty = ty.char_length(len);
    }
    if let Some(cs) = charset_id {
        ty = ty.charset(cs);
    }
    ty
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FirebirdConnector;

impl Connector for FirebirdConnector {
    type Session = FirebirdSession;

    fn create_database(&self, conn: &ConnectionString) -> Result<()> {
        debug!("Creating database {}", conn);
        Connection::create_database(conn.url())
            .map(|_| ())
            .map_err(Error::driver)
    }

    fn connect(&self, conn: &ConnectionString) -> Result<FirebirdSession> {
        debug!("Connecting to {}", conn);
        let conn = Connection::connect(conn.url()).map_err(Error::driver)?;
        Ok(FirebirdSession { conn })
    }
}

/// An open Firebird connection; dropping it closes the connection
pub struct FirebirdSession {
    conn: Connection,
}

impl FirebirdSession {
    fn names(&mut self, sql: &str) -> Result<Vec<Option<String>>> {
        let mut stmt = self.conn.prepare(sql).map_err(Error::driver)?;
        let rows = stmt.query(()).map_err(Error::driver)?;
        Ok(rows.into_iter().map(|row| opt!(row, 0, String)).collect())
    }
}

impl StatementSink for FirebirdSession {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(Error::driver)
    }
}

impl Session for FirebirdSession {
    fn with_transaction<R, W>(&mut self, work: W) -> Result<R>
    where
        W: FnOnce(&mut dyn TransactionHandle) -> Result<R>,
    {
        let mut trans = self.conn.transaction().map_err(Error::driver)?;
        let mut script = ScriptTransaction::new(|op: TransactionOp<'_>| {
            match op {
                // execute_batch would commit-retain the transaction after each statement
                TransactionOp::Execute(sql) => trans.execute(sql, ()),
                TransactionOp::Commit => trans.commit(),
                TransactionOp::Rollback => trans.rollback(),
            }
            .map_err(Error::driver)
        });
        work(&mut script)
    }
}

impl Catalog for FirebirdSession {
    fn domain_rows(&mut self) -> Result<Vec<DomainRow>> {
        let mut stmt = self.conn.prepare(DOMAINS_SQL).map_err(Error::driver)?;
        let rows = stmt.query(()).map_err(Error::driver)?;
        Ok(rows
            .into_iter()
            .map(|row| DomainRow {
                name: opt!(row, 0, String),
                column_type: column_type!(row, 1),
                default_source: opt!(row, 6, String),
                validation_source: opt!(row, 7, String),
                null_flag: opt!(row, 8, i16),
            })
            .collect())
    }

    fn table_names(&mut self) -> Result<Vec<Option<String>>> {
        self.names(TABLES_SQL)
    }

    fn column_rows(&mut self, table: &str) -> Result<Vec<ColumnRow>> {
        let mut stmt = self.conn.prepare(COLUMNS_SQL).map_err(Error::driver)?;
        let rows = stmt.query((table,)).map_err(Error::driver)?;
        Ok(rows
            .into_iter()
            .map(|row| ColumnRow {
                field_name: opt!(row, 0, String),
                field_source: opt!(row, 1, String),
                column_type: column_type!(row, 2),
                default_source: opt!(row, 7, String),
                validation_source: opt!(row, 8, String),
                null_flag: opt!(row, 9, i16),
            })
            .collect())
    }

    fn procedure_names(&mut self) -> Result<Vec<Option<String>>> {
        self.names(PROCEDURES_SQL)
    }

    fn parameter_rows(
        &mut self,
        procedure: &str,
        direction: ParameterDirection,
    ) -> Result<Vec<ParameterRow>> {
        let mut stmt = self.conn.prepare(PARAMETERS_SQL).map_err(Error::driver)?;
        let rows = stmt
            .query((procedure, i32::from(direction.code())))
            .map_err(Error::driver)?;
        Ok(rows
            .into_iter()
            .map(|row| ParameterRow {
                name: opt!(row, 0, String),
                field_source: opt!(row, 1, String),
                column_type: column_type!(row, 2),
            })
            .collect())
    }

    fn procedure_source(&mut self, procedure: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(SOURCE_SQL).map_err(Error::driver)?;
        let rows = stmt.query((procedure,)).map_err(Error::driver)?;
        Ok(rows.into_iter().map(|row| opt!(row, 0, String)).next().flatten())
    }
}
