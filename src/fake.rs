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

//! In-memory database used by the unit tests.
//!
//! `FakeConnector` hands out sessions over one shared `FakeDatabase`.
//! Autocommitted statements land in `committed` at once; statements of a
//! transaction stay pending until commit, as they do on the server. Any statement containing a
//! pattern registered with `fail_on` is rejected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::{Catalog, ColumnRow, DomainRow, ParameterDirection, ParameterRow};
use crate::config::ConnectionString;
use crate::error::{Error, Result};
use crate::transaction::{
    Connector, ScriptTransaction, Session, StatementSink, TransactionHandle, TransactionOp,
};
use crate::typemap::ColumnType;

#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    pub domains: Vec<DomainRow>,
    pub tables: Vec<Option<String>>,
    pub columns: HashMap<String, Vec<ColumnRow>>,
    pub procedures: Vec<Option<String>>,
    pub parameters: HashMap<(String, ParameterDirection), Vec<ParameterRow>>,
    pub sources: HashMap<String, String>,
}

impl FakeCatalog {
    pub fn domain(&mut self, name: &str, column_type: ColumnType) -> &mut DomainRow {
        self.domains.push(DomainRow {
            name: Some(name.to_string()),
            column_type,
            default_source: None,
            validation_source: None,
            null_flag: None,
        });
        self.domains.last_mut().unwrap()
    }

    pub fn table(&mut self, name: &str) {
        self.tables.push(Some(name.to_string()));
    }

    pub fn column(
        &mut self,
        table: &str,
        name: &str,
        field_source: Option<&str>,
        column_type: ColumnType,
    ) -> &mut ColumnRow {
        let columns = self.columns.entry(table.to_string()).or_default();
        columns.push(ColumnRow {
            field_name: Some(name.to_string()),
            field_source: field_source.map(str::to_string),
            column_type,
            default_source: None,
            validation_source: None,
            null_flag: None,
        });
        columns.last_mut().unwrap()
    }

    pub fn procedure(&mut self, name: &str, source: &str) {
        self.procedures.push(Some(name.to_string()));
        self.sources.insert(name.to_string(), source.to_string());
    }

    pub fn parameter(
        &mut self,
        procedure: &str,
        direction: ParameterDirection,
        name: &str,
        field_source: Option<&str>,
        column_type: ColumnType,
    ) {
        self.parameters
            .entry((procedure.to_string(), direction))
            .or_default()
            .push(ParameterRow {
                name: Some(name.to_string()),
                field_source: field_source.map(str::to_string),
                column_type,
            });
    }
}

impl DomainRow {
    pub fn not_null(&mut self) -> &mut Self {
        self.null_flag = Some(1);
        self
    }
}

// catalog queries order by name
fn by_name(mut names: Vec<Option<String>>) -> Vec<Option<String>> {
    names.sort();
    names
}

impl Catalog for FakeCatalog {
    fn domain_rows(&mut self) -> Result<Vec<DomainRow>> {
        let mut rows = self.domains.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn table_names(&mut self) -> Result<Vec<Option<String>>> {
        Ok(by_name(self.tables.clone()))
    }

    fn column_rows(&mut self, table: &str) -> Result<Vec<ColumnRow>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    fn procedure_names(&mut self) -> Result<Vec<Option<String>>> {
        Ok(by_name(self.procedures.clone()))
    }

    fn parameter_rows(
        &mut self,
        procedure: &str,
        direction: ParameterDirection,
    ) -> Result<Vec<ParameterRow>> {
        Ok(self
            .parameters
            .get(&(procedure.to_string(), direction))
            .cloned()
            .unwrap_or_default())
    }

    fn procedure_source(&mut self, procedure: &str) -> Result<Option<String>> {
        Ok(self.sources.get(procedure).cloned())
    }
}

#[derive(Debug, Default)]
struct FakeDatabase {
    committed: Vec<String>,
    attempted: Vec<String>,
    rollbacks: usize,
    fail_patterns: Vec<String>,
    fail_commit: bool,
    fail_rollback: bool,
    fail_connect: bool,
    created: Vec<String>,
    connections: usize,
    catalog: FakeCatalog,
}

impl FakeDatabase {
    fn attempt(&mut self, sql: &str) -> Result<()> {
        self.attempted.push(sql.to_string());
        match self.fail_patterns.iter().find(|p| sql.contains(p.as_str())) {
            Some(p) => Err(Error::Driver(format!(
                "Dynamic SQL Error: Token unknown - {}",
                p
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    db: Rc<RefCell<FakeDatabase>>,
}

impl FakeConnector {
    pub fn session(&self) -> FakeSession {
        self.db.borrow_mut().connections += 1;
        FakeSession {
            db: Rc::clone(&self.db),
        }
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        let connector = FakeConnector::default();
        connector.db.borrow_mut().catalog = catalog;
        connector
    }

    /// Reject every statement that contains `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.db.borrow_mut().fail_patterns.push(pattern.to_string());
    }

    pub fn fail_commit(&self) {
        self.db.borrow_mut().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.db.borrow_mut().fail_rollback = true;
    }

    pub fn fail_connect(&self) {
        self.db.borrow_mut().fail_connect = true;
    }

    pub fn committed(&self) -> Vec<String> {
        self.db.borrow().committed.clone()
    }

    pub fn attempted(&self) -> Vec<String> {
        self.db.borrow().attempted.clone()
    }

    pub fn rollbacks(&self) -> usize {
        self.db.borrow().rollbacks
    }

    /// Databases created, by `ConnectionString::database()`
    pub fn created(&self) -> Vec<String> {
        self.db.borrow().created.clone()
    }

    pub fn connections(&self) -> usize {
        self.db.borrow().connections
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    fn create_database(&self, conn: &ConnectionString) -> Result<()> {
        self.db.borrow_mut().created.push(conn.database().to_string());
        Ok(())
    }

    fn connect(&self, _conn: &ConnectionString) -> Result<FakeSession> {
        if self.db.borrow().fail_connect {
            return Err(Error::Driver("Unable to complete network request".to_string()));
        }
        Ok(self.session())
    }
}

#[derive(Debug)]
pub struct FakeSession {
    db: Rc<RefCell<FakeDatabase>>,
}

impl StatementSink for FakeSession {
    fn execute(&mut self, sql: &str) -> Result<()> {
        let mut db = self.db.borrow_mut();
        db.attempt(sql)?;
        db.committed.push(sql.to_string());
        Ok(())
    }
}

impl Session for FakeSession {
    fn with_transaction<R, W>(&mut self, work: W) -> Result<R>
    where
        W: FnOnce(&mut dyn TransactionHandle) -> Result<R>,
    {
        let db = Rc::clone(&self.db);
        let mut pending: Vec<String> = Vec::new();
        let mut trans = ScriptTransaction::new(|op: TransactionOp<'_>| {
            let mut db = db.borrow_mut();
            match op {
                TransactionOp::Execute(sql) => {
                    db.attempt(sql)?;
                    pending.push(sql.to_string());
                    Ok(())
                }
                TransactionOp::Commit => {
                    if db.fail_commit {
                        return Err(Error::Driver(
                            "deadlock: update conflicts with concurrent update".to_string(),
                        ));
                    }
                    db.committed.append(&mut pending);
                    Ok(())
                }
                TransactionOp::Rollback => {
                    if db.fail_rollback {
                        return Err(Error::Driver("connection lost during rollback".to_string()));
                    }
                    db.rollbacks += 1;
                    pending.clear();
                    Ok(())
                }
            }
        });
        work(&mut trans)
    }
}

impl Catalog for FakeSession {
    fn domain_rows(&mut self) -> Result<Vec<DomainRow>> {
        self.db.borrow_mut().catalog.domain_rows()
    }

    fn table_names(&mut self) -> Result<Vec<Option<String>>> {
        self.db.borrow_mut().catalog.table_names()
    }

    fn column_rows(&mut self, table: &str) -> Result<Vec<ColumnRow>> {
        self.db.borrow_mut().catalog.column_rows(table)
    }

    fn procedure_names(&mut self) -> Result<Vec<Option<String>>> {
        self.db.borrow_mut().catalog.procedure_names()
    }

    fn parameter_rows(
        &mut self,
        procedure: &str,
        direction: ParameterDirection,
    ) -> Result<Vec<ParameterRow>> {
        self.db.borrow_mut().catalog.parameter_rows(procedure, direction)
    }

    fn procedure_source(&mut self, procedure: &str) -> Result<Option<String>> {
        self.db.borrow_mut().catalog.procedure_source(procedure)
    }
}
