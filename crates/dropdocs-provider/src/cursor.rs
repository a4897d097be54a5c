//! Tabular query results.
//!
//! Every query returns a [`Cursor`] over a projection of a fixed column set.
//! Values for columns outside the projection are dropped when a row is
//! built, so callers can add every value unconditionally.

use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

/// One cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absent value
    Null,
    /// Integer value (sizes, flags, unix millis)
    Int(i64),
    /// Text value
    Text(String),
}

impl Value {
    /// Integer content, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A column of a fixed column set.
pub trait Column: Copy + Eq + fmt::Debug + 'static {
    /// Every column in declaration order.
    const ALL: &'static [Self];

    /// Projection used when the caller asks for none.
    const DEFAULT_PROJECTION: &'static [Self];

    /// Host-facing column name.
    fn name(self) -> &'static str;

    /// Look a column up by its host-facing name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// Columns of a document row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentColumn {
    /// Document id (the remote path)
    DocumentId,
    /// Display name
    DisplayName,
    /// MIME type
    MimeType,
    /// Last modification, unix millis (files only)
    LastModified,
    /// Capability flags
    Flags,
    /// Size in bytes (files only)
    Size,
    /// Icon reference
    Icon,
}

impl Column for DocumentColumn {
    const ALL: &'static [Self] = &[
        DocumentColumn::DocumentId,
        DocumentColumn::DisplayName,
        DocumentColumn::MimeType,
        DocumentColumn::LastModified,
        DocumentColumn::Flags,
        DocumentColumn::Size,
        DocumentColumn::Icon,
    ];

    const DEFAULT_PROJECTION: &'static [Self] = &[
        DocumentColumn::DocumentId,
        DocumentColumn::MimeType,
        DocumentColumn::DisplayName,
        DocumentColumn::LastModified,
        DocumentColumn::Flags,
        DocumentColumn::Size,
    ];

    fn name(self) -> &'static str {
        match self {
            DocumentColumn::DocumentId => "document_id",
            DocumentColumn::DisplayName => "_display_name",
            DocumentColumn::MimeType => "mime_type",
            DocumentColumn::LastModified => "last_modified",
            DocumentColumn::Flags => "flags",
            DocumentColumn::Size => "_size",
            DocumentColumn::Icon => "icon",
        }
    }
}

/// Columns of a root row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootColumn {
    /// Root id
    RootId,
    /// MIME filter
    MimeTypes,
    /// Capability flags
    Flags,
    /// Icon reference
    Icon,
    /// Title
    Title,
    /// Summary (account email)
    Summary,
    /// Document id of the root folder
    DocumentId,
    /// Free space in bytes
    AvailableBytes,
}

impl Column for RootColumn {
    const ALL: &'static [Self] = &[
        RootColumn::RootId,
        RootColumn::MimeTypes,
        RootColumn::Flags,
        RootColumn::Icon,
        RootColumn::Title,
        RootColumn::Summary,
        RootColumn::DocumentId,
        RootColumn::AvailableBytes,
    ];

    const DEFAULT_PROJECTION: &'static [Self] = Self::ALL;

    fn name(self) -> &'static str {
        match self {
            RootColumn::RootId => "root_id",
            RootColumn::MimeTypes => "mime_types",
            RootColumn::Flags => "flags",
            RootColumn::Icon => "icon",
            RootColumn::Title => "title",
            RootColumn::Summary => "summary",
            RootColumn::DocumentId => "document_id",
            RootColumn::AvailableBytes => "available_bytes",
        }
    }
}

macro_rules! impl_from_str {
    ($($ty:ty),*) => {$(
        impl FromStr for $ty {
            type Err = ProviderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty as Column>::from_name(s)
                    .ok_or_else(|| ProviderError::InvalidArgument(format!("unknown column: {s}")))
            }
        }
    )*};
}

impl_from_str!(DocumentColumn, RootColumn);

/// Rows over a projection of columns `C`.
#[derive(Debug, Clone)]
pub struct Cursor<C: Column> {
    columns: Vec<C>,
    rows: Vec<Vec<Value>>,
}

/// Cursor over document rows.
pub type DocumentCursor = Cursor<DocumentColumn>;

/// Cursor over root rows.
pub type RootCursor = Cursor<RootColumn>;

impl<C: Column> Cursor<C> {
    /// Create an empty cursor; `None` selects the default projection.
    pub fn new(projection: Option<&[C]>) -> Self {
        Self {
            columns: projection.unwrap_or(C::DEFAULT_PROJECTION).to_vec(),
            rows: Vec::new(),
        }
    }

    /// Start a new row with every cell `Null`.
    pub fn new_row(&mut self) -> RowBuilder<'_, C> {
        self.rows.push(vec![Value::Null; self.columns.len()]);
        let last = self.rows.len() - 1;
        RowBuilder {
            columns: &self.columns,
            row: &mut self.rows[last],
        }
    }

    /// Projected columns.
    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    /// All rows, cells in projection order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the cursor has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` for `column`, if the column is projected.
    pub fn get(&self, row: usize, column: C) -> Option<&Value> {
        let index = self.columns.iter().position(|c| *c == column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Text cell shortcut.
    pub fn text(&self, row: usize, column: C) -> Option<&str> {
        self.get(row, column).and_then(Value::as_text)
    }

    /// Integer cell shortcut.
    pub fn int(&self, row: usize, column: C) -> Option<i64> {
        self.get(row, column).and_then(Value::as_int)
    }
}

/// Builder filling one row of a cursor.
pub struct RowBuilder<'a, C: Column> {
    columns: &'a [C],
    row: &'a mut Vec<Value>,
}

impl<C: Column> RowBuilder<'_, C> {
    /// Set `column` if it is part of the projection.
    pub fn add(&mut self, column: C, value: impl Into<Value>) -> &mut Self {
        if let Some(index) = self.columns.iter().position(|c| *c == column) {
            self.row[index] = value.into();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_document_projection() {
        let mut cursor = DocumentCursor::new(None);
        cursor
            .new_row()
            .add(DocumentColumn::DocumentId, "/a.txt")
            .add(DocumentColumn::Icon, "ic_launcher")
            .add(DocumentColumn::Size, 3u64);
        assert_eq!(cursor.columns().len(), 6);
        assert_eq!(cursor.text(0, DocumentColumn::DocumentId), Some("/a.txt"));
        assert_eq!(cursor.int(0, DocumentColumn::Size), Some(3));
        assert_eq!(cursor.get(0, DocumentColumn::Icon), None);
        assert_eq!(cursor.get(0, DocumentColumn::LastModified), Some(&Value::Null));
    }

    #[test]
    fn test_explicit_projection_order() {
        let projection = [RootColumn::Title, RootColumn::RootId];
        let mut cursor = RootCursor::new(Some(&projection));
        cursor
            .new_row()
            .add(RootColumn::RootId, "root")
            .add(RootColumn::Summary, "me@example.com")
            .add(RootColumn::Title, "Dropbox");
        assert_eq!(
            cursor.rows()[0],
            vec![Value::from("Dropbox"), Value::from("root")]
        );
    }

    #[test]
    fn test_root_default_projection_is_all_columns() {
        assert_eq!(RootCursor::new(None).columns(), RootColumn::ALL);
    }

    #[test]
    fn test_column_names_parse() {
        assert_eq!("_size".parse::<DocumentColumn>().unwrap(), DocumentColumn::Size);
        assert_eq!(
            "available_bytes".parse::<RootColumn>().unwrap(),
            RootColumn::AvailableBytes
        );
        assert!("nope".parse::<DocumentColumn>().is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(None::<u64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
        assert_eq!(Value::from(u64::MAX), Value::Int(i64::MAX));
        assert_eq!(Value::Null.to_string(), "");
    }
}
