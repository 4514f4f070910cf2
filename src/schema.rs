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

//! Schema objects read from the catalog.

use crate::typemap::ColumnType;

/// Prefix of engine-owned objects in the Firebird catalog
pub const SYSTEM_PREFIX: &str = "RDB$";

/// True for names owned by the engine (`RDB$...`, any case)
pub fn is_system_name(name: &str) -> bool {
    name.get(..SYSTEM_PREFIX.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(SYSTEM_PREFIX))
        .unwrap_or(false)
}

/// Type of a column or parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A user domain, referenced by name
    Domain(String),
    /// A system-generated field source, rendered from its descriptor
    Inline(ColumnType),
}

impl TypeRef {
    /// Resolve a field source: user domains are referenced, system
    /// generated sources (`RDB$nnn`) are inlined.
    pub fn resolve(field_source: Option<&str>, column_type: ColumnType) -> TypeRef {
        match field_source.map(str::trim) {
            Some(source) if !source.is_empty() && !is_system_name(source) => {
                TypeRef::Domain(source.to_string())
            }
            _ => TypeRef::Inline(column_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub default_source: Option<String>,
    pub check_source: Option<String>,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_ref: TypeRef,
    pub default_source: Option<String>,
    /// Field-level validation, only carried for inline types
    pub check_source: Option<String>,
    pub not_null: bool,
}

/// A table with its columns in `RDB$FIELD_POSITION` order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefinition {
    pub name: String,
    pub type_ref: TypeRef,
}

/// A stored procedure; parameter order is positional and must be kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDefinition {
    pub name: String,
    pub inputs: Vec<ParameterDefinition>,
    pub outputs: Vec<ParameterDefinition>,
    pub source: String,
}

/// Trimmed, non-empty text or nothing
pub(crate) fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
