//! DDL Extractor for domains, tables and stored procedures
//!
//! Reads the user schema through a [`Catalog`] and renders one CREATE
//! statement per object, in dependency order: domains, tables,
//! procedures. Constraints, indexes, triggers, views and grants are not
//! extracted.

use tracing::info;

use crate::catalog::{read_domains, read_procedures, read_tables, Catalog};
use crate::error::Result;
use crate::schema::{
    ColumnDefinition, DomainDefinition, ParameterDefinition, ProcedureDefinition, TableDefinition,
    TypeRef,
};
use crate::script::{ObjectDdl, ScriptCategory};

/// Extracts the DDL of every user domain, table and procedure
pub fn extract_ddl<C: Catalog + ?Sized>(catalog: &mut C) -> Result<Vec<ObjectDdl>> {
    let mut output = Vec::new();

    list_domains(catalog, &mut output)?;
    list_all_tables(catalog, &mut output)?;
    list_procedures(catalog, &mut output)?;

    Ok(output)
}

// ============================================================================
// DOMAINS
// ============================================================================
fn list_domains<C: Catalog + ?Sized>(catalog: &mut C, output: &mut Vec<ObjectDdl>) -> Result<()> {
    let domains = read_domains(catalog)?;
    info!("Extracting {} domain(s)", domains.len());

    for domain in domains {
        let sql = render_domain(&domain);
        output.push(ObjectDdl {
            category: ScriptCategory::Domain,
            name: domain.name,
            sql,
        });
    }
    Ok(())
}

/// `CREATE DOMAIN` on a single line; domain scripts are loaded line by line
pub fn render_domain(domain: &DomainDefinition) -> String {
    let mut sql = format!(
        "CREATE DOMAIN {} AS {}",
        quote_identifier(&domain.name),
        domain.column_type.sql_type()
    );

    if let Some(charset) = domain.column_type.charset_clause() {
        sql.push_str(&format!("  {}", charset));
    }

    if let Some(ref d) = domain.default_source {
        sql.push_str(&format!("  {}", single_line(d)));
    }

    if let Some(ref c) = domain.check_source {
        sql.push_str(&format!("  {}", single_line(c)));
    }

    if domain.not_null {
        sql.push_str("  NOT NULL");
    }

    sql.push_str(";\n");
    sql
}

// ============================================================================
// TABLES
// ============================================================================
fn list_all_tables<C: Catalog + ?Sized>(catalog: &mut C, output: &mut Vec<ObjectDdl>) -> Result<()> {
    let tables = read_tables(catalog)?;
    info!("Extracting {} table(s)", tables.len());

    for table in tables {
        let sql = render_table(&table);
        output.push(ObjectDdl {
            category: ScriptCategory::Table,
            name: table.name,
            sql,
        });
    }
    Ok(())
}

pub fn render_table(table: &TableDefinition) -> String {
    let col_defs: Vec<String> = table
        .columns
        .iter()
        .map(|col| format!("    {}", render_column(col)))
        .collect();

    format!(
        "CREATE TABLE {} (\n{}\n);\n",
        quote_identifier(&table.name),
        col_defs.join(",\n")
    )
}

/// One column definition, e.g. `NAME VARCHAR(50) CHARACTER SET UTF8 NOT NULL`
pub fn render_column(col: &ColumnDefinition) -> String {
    let mut col_def = format!("{} {}", quote_identifier(&col.name), render_type(&col.type_ref));

    if let Some(ref d) = col.default_source {
        col_def.push_str(&format!(" {}", d));
    }

    if let Some(ref c) = col.check_source {
        col_def.push_str(&format!(" {}", c));
    }

    if col.not_null {
        col_def.push_str(" NOT NULL");
    }

    col_def
}

/// Domain name, or the inline type with its character set
fn render_type(type_ref: &TypeRef) -> String {
    match type_ref {
        TypeRef::Domain(name) => quote_identifier(name),
        TypeRef::Inline(ty) => match ty.charset_clause() {
            Some(charset) => format!("{} {}", ty.sql_type(), charset),
            None => ty.sql_type(),
        },
    }
}

// ============================================================================
// PROCEDURES
// ============================================================================
fn list_procedures<C: Catalog + ?Sized>(catalog: &mut C, output: &mut Vec<ObjectDdl>) -> Result<()> {
    let procedures = read_procedures(catalog)?;
    info!("Extracting {} procedure(s)", procedures.len());

    for procedure in procedures {
        let sql = render_procedure(&procedure);
        output.push(ObjectDdl {
            category: ScriptCategory::Procedure,
            name: procedure.name,
            sql,
        });
    }
    Ok(())
}

pub fn render_procedure(procedure: &ProcedureDefinition) -> String {
    let mut sql = format!("CREATE PROCEDURE {}\n", quote_identifier(&procedure.name));

    if !procedure.inputs.is_empty() {
        sql.push_str(&format!("(\n{}\n)\n", render_parameters(&procedure.inputs)));
    }

    if !procedure.outputs.is_empty() {
        sql.push_str(&format!("RETURNS (\n{}\n)\n", render_parameters(&procedure.outputs)));
    }

    sql.push_str("AS\n");
    sql.push_str(procedure.source.trim());

    if !sql.trim_end().ends_with(';') {
        sql.push(';');
    }
    sql.push('\n');
    sql
}

fn render_parameters(params: &[ParameterDefinition]) -> String {
    params
        .iter()
        .map(|p| format!("    {} {}", quote_identifier(&p.name), render_type(&p.type_ref)))
        .collect::<Vec<_>>()
        .join(",\n")
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Quote SQL identifier if needed
pub fn quote_identifier(name: &str) -> String {
    // Check if needs quoting
    if name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !is_reserved_word(name)
    {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_reserved_word(word: &str) -> bool {
    // Words most likely to appear as quoted column or table names
    let reserved = [
        "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "ORDER", "GROUP", "BY",
        "TABLE", "INDEX", "CREATE", "DATE", "TIME", "TIMESTAMP", "USER", "VALUE", "CHAR",
        "CHARACTER", "VARCHAR", "INTEGER", "COUNT", "POSITION", "SET", "START", "END",
        "BEGIN", "DEFAULT", "CHECK", "NULL", "NOT", "AND", "OR", "AS", "ON", "TO",
    ];
    reserved.contains(&word.to_uppercase().as_str())
}

/// Fold a multi-line source fragment onto one line
fn single_line(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
