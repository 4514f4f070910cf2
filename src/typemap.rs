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

//! Catalog type codes to SQL type names.
//!
//! `RDB$FIELDS` describes every column type as a numeric code plus
//! length, character length and scale. The mapping here is total: codes
//! this tool does not model (blobs, booleans, int128, decfloat, ...) fall
//! back to `BLOB` so that an unusual column never aborts an export.

/// Field type codes from `RDB$FIELDS.RDB$FIELD_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    SmallInt,
    Integer,
    Float,
    Date,
    Time,
    Char,
    BigInt,
    Double,
    Timestamp,
    VarChar,
    CString,
    /// Anything else, rendered as BLOB
    Other(i16),
}

impl FieldType {
    pub fn from_code(code: i16) -> FieldType {
        match code {
            7 => FieldType::SmallInt,
            8 => FieldType::Integer,
            10 => FieldType::Float,
            12 => FieldType::Date,
            13 => FieldType::Time,
            14 => FieldType::Char,
            16 => FieldType::BigInt,
            27 => FieldType::Double,
            35 => FieldType::Timestamp,
            37 => FieldType::VarChar,
            40 => FieldType::CString,
            other => FieldType::Other(other),
        }
    }

    pub fn code(self) -> i16 {
        match self {
            FieldType::SmallInt => 7,
            FieldType::Integer => 8,
            FieldType::Float => 10,
            FieldType::Date => 12,
            FieldType::Time => 13,
            FieldType::Char => 14,
            FieldType::BigInt => 16,
            FieldType::Double => 27,
            FieldType::Timestamp => 35,
            FieldType::VarChar => 37,
            FieldType::CString => 40,
            FieldType::Other(code) => code,
        }
    }
}

/// Type descriptor of one catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnType {
    /// RDB$FIELD_TYPE
    pub type_code: i16,
    /// RDB$FIELD_LENGTH, in bytes
    pub length: i16,
    /// RDB$CHARACTER_LENGTH
    pub char_length: Option<i16>,
    /// RDB$FIELD_SCALE, zero or negative
    pub scale: i16,
    /// RDB$CHARACTER_SET_ID
    pub charset_id: Option<i16>,
}

impl ColumnType {
    pub fn new(type_code: i16, length: i16, scale: i16) -> Self {
        Self {
            type_code,
            length,
            char_length: None,
            scale,
            charset_id: None,
        }
    }

    /// Set the character length
    pub fn char_length(mut self, char_length: i16) -> Self {
        self.char_length = Some(char_length);
        self
    }

    /// Set the character set id
    pub fn charset(mut self, charset_id: i16) -> Self {
        self.charset_id = Some(charset_id);
        self
    }

    pub fn field_type(&self) -> FieldType {
        FieldType::from_code(self.type_code)
    }

    /// SQL type expression, e.g. `NUMERIC(4, 2)` or `VARCHAR(50)`
    pub fn sql_type(&self) -> String {
        format_data_type(self.type_code, self.length, self.char_length, self.scale)
    }

    /// `CHARACTER SET <name>` for a positive charset id, otherwise nothing
    pub fn charset_clause(&self) -> Option<String> {
        match self.charset_id {
            Some(id) if id > 0 => Some(format!("CHARACTER SET {}", charset_name(id))),
            _ => None,
        }
    }
}

/// Format a Firebird data type from its catalog representation
pub fn format_data_type(type_code: i16, length: i16, char_length: Option<i16>, scale: i16) -> String {
    // NULL character length (and the -1 some tools store) means "use the byte length"
    let chars = match char_length {
        Some(l) if l > 0 => l,
        _ => length,
    };

    match FieldType::from_code(type_code) {
        FieldType::SmallInt => {
            if scale < 0 {
                format!("NUMERIC({}, {})", length, -scale)
            } else {
                "SMALLINT".to_string()
            }
        }
        FieldType::Integer => {
            if scale < 0 {
                format!("NUMERIC({}, {})", length, -scale)
            } else {
                "INTEGER".to_string()
            }
        }
        FieldType::Float => "FLOAT".to_string(),
        FieldType::Date => "DATE".to_string(),
        FieldType::Time => "TIME".to_string(),
        FieldType::Char => format!("CHAR({})", chars),
        FieldType::BigInt => {
            if scale < 0 {
                format!("DECIMAL({}, {})", length, -scale)
            } else {
                "BIGINT".to_string()
            }
        }
        FieldType::Double => "DOUBLE PRECISION".to_string(),
        FieldType::Timestamp => "TIMESTAMP".to_string(),
        FieldType::VarChar => format!("VARCHAR({})", chars),
        FieldType::CString => "CSTRING".to_string(),
        FieldType::Other(_) => "BLOB".to_string(),
    }
}

/// Get character set name by ID. Unknown ids map to NONE.
pub fn charset_name(id: i16) -> &'static str {
    match id {
        0 => "NONE",
        1 => "ASCII",
        2 => "BIG_5",
        3 => "CYRL",
        4 => "DOS437",
        5 => "DOS850",
        6 => "DOS865",
        8 => "ISO8859_1",
        21 => "UTF8",
        _ => "NONE",
    }
}
