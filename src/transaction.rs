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

//! Seams between the script runner and the database driver.
//!
//! Scripts are sent through a [`StatementSink`]: either a [`Session`]
//! in autocommit mode or the transaction it lends to
//! [`Session::with_transaction`]. [`ScriptTransaction`] drives a
//! transaction through one closure and rolls it back unless it was
//! explicitly committed or rolled back.

use tracing::{debug, warn};

use crate::config::ConnectionString;
use crate::error::Result;

/// Something that executes one SQL statement
pub trait StatementSink {
    fn execute(&mut self, sql: &str) -> Result<()>;
}

/// A transaction lent out by a session
pub trait TransactionHandle: StatementSink {
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Number of statements executed so far
    fn statements(&self) -> usize;

    fn as_sink(&mut self) -> &mut dyn StatementSink;
}

/// An open connection. Statements executed directly are autocommitted.
pub trait Session: StatementSink {
    /// Run `work` inside a new transaction. Whatever `work` leaves
    /// unfinished is rolled back when it returns.
    fn with_transaction<R, W>(&mut self, work: W) -> Result<R>
    where
        W: FnOnce(&mut dyn TransactionHandle) -> Result<R>;
}

/// Opens sessions and creates databases
pub trait Connector {
    type Session: Session;

    /// Create a new, empty database at the location named by `conn`
    fn create_database(&self, conn: &ConnectionString) -> Result<()>;

    fn connect(&self, conn: &ConnectionString) -> Result<Self::Session>;
}

/// One step sent to the driver transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp<'s> {
    Execute(&'s str),
    Commit,
    Rollback,
}

pub struct ScriptTransaction<F>
where
    F: FnMut(TransactionOp<'_>) -> Result<()>,
{
    apply: F,
    statements: usize,
    finished: bool, // true if commit() or rollback() succeeded
}

impl<F> ScriptTransaction<F>
where
    F: FnMut(TransactionOp<'_>) -> Result<()>,
{
    pub fn new(apply: F) -> Self {
        debug!("Transaction started");
        ScriptTransaction {
            apply,
            statements: 0,
            finished: false,
        }
    }
}

impl<F> StatementSink for ScriptTransaction<F>
where
    F: FnMut(TransactionOp<'_>) -> Result<()>,
{
    fn execute(&mut self, sql: &str) -> Result<()> {
        (self.apply)(TransactionOp::Execute(sql))?;
        self.statements += 1;
        Ok(())
    }
}

impl<F> TransactionHandle for ScriptTransaction<F>
where
    F: FnMut(TransactionOp<'_>) -> Result<()>,
{
    fn commit(&mut self) -> Result<()> {
        let result = (self.apply)(TransactionOp::Commit);
        if result.is_ok() {
            self.finished = true;
            debug!("Transaction committed after {} statement(s)", self.statements);
        }
        result
    }

    fn rollback(&mut self) -> Result<()> {
        let result = (self.apply)(TransactionOp::Rollback);
        if result.is_ok() {
            self.finished = true;
            debug!("Transaction rolled back after {} statement(s)", self.statements);
        }
        result
    }

    fn statements(&self) -> usize {
        self.statements
    }

    fn as_sink(&mut self) -> &mut dyn StatementSink {
        self
    }
}

impl<F> Drop for ScriptTransaction<F>
where
    F: FnMut(TransactionOp<'_>) -> Result<()>,
{
    fn drop(&mut self) {
        if !self.finished {
            // Only rollback if commit() or rollback() did not complete
            if let Err(e) = (self.apply)(TransactionOp::Rollback) {
                warn!("Rollback of unfinished transaction failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fake::FakeConnector;

    #[test]
    fn test_commit_makes_statements_visible() {
        let connector = FakeConnector::default();
        let mut session = connector.session();
        session
            .with_transaction(|trans| {
                trans.execute("CREATE DOMAIN D AS INTEGER;")?;
                assert_eq!(trans.statements(), 1);
                assert!(connector.committed().is_empty());
                trans.commit()
            })
            .unwrap();
        assert_eq!(connector.committed(), ["CREATE DOMAIN D AS INTEGER;"]);
    }

    #[test]
    fn test_unfinished_transaction_rolls_back() {
        let connector = FakeConnector::default();
        let mut session = connector.session();
        session
            .with_transaction(|trans| trans.execute("CREATE TABLE T (ID INTEGER);"))
            .unwrap();
        assert!(connector.committed().is_empty());
        assert_eq!(connector.rollbacks(), 1);
    }

    #[test]
    fn test_explicit_rollback_is_not_repeated_on_drop() {
        let connector = FakeConnector::default();
        let mut session = connector.session();
        session
            .with_transaction(|trans| {
                trans.execute("CREATE TABLE T (ID INTEGER);")?;
                trans.rollback()
            })
            .unwrap();
        assert_eq!(connector.rollbacks(), 1);
    }

    #[test]
    fn test_failed_commit_rolls_back_on_drop() {
        let connector = FakeConnector::default();
        connector.fail_commit();
        let mut session = connector.session();
        let result = session.with_transaction(|trans| {
            trans.execute("CREATE TABLE T (ID INTEGER);")?;
            trans.commit()
        });
        assert!(matches!(result, Err(Error::Driver(_))));
        assert!(connector.committed().is_empty());
        assert_eq!(connector.rollbacks(), 1);
    }

    #[test]
    fn test_ops_reach_the_driver_in_order() {
        let mut seen = Vec::new();
        {
            let mut trans = ScriptTransaction::new(|op: TransactionOp<'_>| {
                seen.push(format!("{:?}", op));
                Ok(())
            });
            trans.execute("A").unwrap();
            trans.commit().unwrap();
        }
        assert_eq!(seen, ["Execute(\"A\")", "Commit"]);
    }

    #[test]
    fn test_drop_rolls_back_unfinished_transaction() {
        let mut seen = Vec::new();
        {
            let mut trans = ScriptTransaction::new(|op: TransactionOp<'_>| {
                seen.push(format!("{:?}", op));
                Ok(())
            });
            trans.execute("A").unwrap();
        }
        assert_eq!(seen, ["Execute(\"A\")", "Rollback"]);
    }
}
