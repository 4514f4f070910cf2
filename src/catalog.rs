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

//! Read-only access to the schema catalog.
//!
//! `Catalog` returns raw catalog rows; the `read_*` functions turn them
//! into schema definitions, skipping engine-owned objects and rejecting
//! rows whose shape the export cannot represent.

use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{
    is_system_name, non_blank, ColumnDefinition, DomainDefinition, ParameterDefinition,
    ProcedureDefinition, TableDefinition, TypeRef,
};
use crate::typemap::ColumnType;

/// Row of `RDB$FIELDS` describing a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRow {
    pub name: Option<String>,
    pub column_type: ColumnType,
    pub default_source: Option<String>,
    pub validation_source: Option<String>,
    pub null_flag: Option<i16>,
}

/// Row of `RDB$RELATION_FIELDS` joined with its field source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub field_name: Option<String>,
    pub field_source: Option<String>,
    pub column_type: ColumnType,
    pub default_source: Option<String>,
    pub validation_source: Option<String>,
    pub null_flag: Option<i16>,
}

/// Row of `RDB$PROCEDURE_PARAMETERS` joined with its field source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRow {
    pub name: Option<String>,
    pub field_source: Option<String>,
    pub column_type: ColumnType,
}

/// `RDB$PROCEDURE_PARAMETERS.RDB$PARAMETER_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterDirection {
    Input,
    Output,
}

impl ParameterDirection {
    pub fn code(self) -> i16 {
        match self {
            ParameterDirection::Input => 0,
            ParameterDirection::Output => 1,
        }
    }
}

/// Catalog queries used by the export.
///
/// Implementations return user objects only (system flag 0), domains,
/// tables and procedures ordered by name, columns by field position and
/// parameters by parameter number.
pub trait Catalog {
    fn domain_rows(&mut self) -> Result<Vec<DomainRow>>;

    /// Names of user tables, views excluded
    fn table_names(&mut self) -> Result<Vec<Option<String>>>;

    fn column_rows(&mut self, table: &str) -> Result<Vec<ColumnRow>>;

    fn procedure_names(&mut self) -> Result<Vec<Option<String>>>;

    fn parameter_rows(
        &mut self,
        procedure: &str,
        direction: ParameterDirection,
    ) -> Result<Vec<ParameterRow>>;

    /// `RDB$PROCEDURE_SOURCE`, `None` when the procedure has no stored source
    fn procedure_source(&mut self, procedure: &str) -> Result<Option<String>>;
}

fn trimmed(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string())
}

pub fn read_domains<C: Catalog + ?Sized>(catalog: &mut C) -> Result<Vec<DomainDefinition>> {
    let mut domains = Vec::new();
    for row in catalog.domain_rows()? {
        let name = match trimmed(row.name) {
            Some(n) if !n.is_empty() => n,
            _ => {
                return Err(Error::CatalogIntegrity(
                    "domain name is NULL or empty".to_string(),
                ));
            }
        };
        if is_system_name(&name) {
            continue;
        }
        domains.push(DomainDefinition {
            name,
            column_type: row.column_type,
            default_source: non_blank(row.default_source),
            check_source: non_blank(row.validation_source),
            not_null: row.null_flag.is_some(),
        });
    }
    debug!("Read {} domain(s)", domains.len());
    Ok(domains)
}

pub fn read_tables<C: Catalog + ?Sized>(catalog: &mut C) -> Result<Vec<TableDefinition>> {
    let mut tables = Vec::new();
    for name in catalog.table_names()? {
        let name = match trimmed(name) {
            Some(n) if !n.is_empty() => n,
            _ => {
                return Err(Error::CatalogIntegrity(
                    "table name is NULL or empty".to_string(),
                ));
            }
        };
        if is_system_name(&name) {
            continue;
        }
        let columns = read_columns(catalog, &name)?;
        tables.push(TableDefinition { name, columns });
    }
    debug!("Read {} table(s)", tables.len());
    Ok(tables)
}

fn read_columns<C: Catalog + ?Sized>(catalog: &mut C, table: &str) -> Result<Vec<ColumnDefinition>> {
    let mut columns = Vec::new();
    for row in catalog.column_rows(table)? {
        let field_name = non_blank(row.field_name);
        let field_source = non_blank(row.field_source);
        let name = match (field_name, &field_source) {
            (Some(name), _) => name,
            (None, None) => {
                return Err(Error::CatalogIntegrity(format!(
                    "column of {} has neither a field name nor a field source",
                    table
                )));
            }
            (None, Some(source)) => {
                return Err(Error::CatalogIntegrity(format!(
                    "column of {} with field source {} has no name",
                    table, source
                )));
            }
        };

        let type_ref = TypeRef::resolve(field_source.as_deref(), row.column_type);
        // a domain brings its own CHECK; repeating it on the column is invalid DDL
        let check_source = match type_ref {
            TypeRef::Inline(_) => non_blank(row.validation_source),
            TypeRef::Domain(_) => None,
        };

        columns.push(ColumnDefinition {
            name,
            type_ref,
            default_source: non_blank(row.default_source),
            check_source,
            not_null: row.null_flag.is_some(),
        });
    }
    Ok(columns)
}

pub fn read_procedures<C: Catalog + ?Sized>(catalog: &mut C) -> Result<Vec<ProcedureDefinition>> {
    let mut procedures = Vec::new();
    for name in catalog.procedure_names()? {
        let name = match trimmed(name) {
            Some(n) if !n.is_empty() => n,
            _ => {
                return Err(Error::CatalogIntegrity(
                    "procedure name is NULL".to_string(),
                ));
            }
        };
        if is_system_name(&name) {
            continue;
        }

        let inputs = read_parameters(catalog, &name, ParameterDirection::Input)?;
        let outputs = read_parameters(catalog, &name, ParameterDirection::Output)?;
        let source = catalog
            .procedure_source(&name)?
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        procedures.push(ProcedureDefinition {
            name,
            inputs,
            outputs,
            source,
        });
    }
    debug!("Read {} procedure(s)", procedures.len());
    Ok(procedures)
}

fn read_parameters<C: Catalog + ?Sized>(
    catalog: &mut C,
    procedure: &str,
    direction: ParameterDirection,
) -> Result<Vec<ParameterDefinition>> {
    catalog
        .parameter_rows(procedure, direction)?
        .into_iter()
        .map(|row| {
            let name = non_blank(row.name).ok_or_else(|| {
                Error::CatalogIntegrity(format!("parameter of {} has no name", procedure))
            })?;
            Ok(ParameterDefinition {
                name,
                type_ref: TypeRef::resolve(row.field_source.as_deref(), row.column_type),
            })
        })
        .collect()
}
