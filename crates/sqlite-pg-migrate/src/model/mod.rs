//! Typed records for the five migrated tables.
//!
//! A source row arrives as a [`RawRow`] (column name to loosely typed
//! [`RawValue`]). [`Record::from_row`] turns it into one of a closed set of
//! record shapes, normalizing audit timestamps to UTC on the way. Records are
//! never mutated afterwards; the loader only reads them through
//! [`Record::values`].

mod records;
pub mod timestamp;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::schema::TableKind;
use crate::core::value::SqlValue;
use crate::error::Result;

pub use records::{FilmWork, Genre, GenreFilmWork, Person, PersonFilmWork, TableRecord};
pub use timestamp::{normalize_timestamp, parse_timestamp};

/// A column value as stored in the source, before typing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// An instant that has already been normalized.
    Timestamp(DateTime<Utc>),
}

impl RawValue {
    /// Storage class name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Null => "NULL",
            RawValue::Integer(_) => "INTEGER",
            RawValue::Real(_) => "REAL",
            RawValue::Text(_) => "TEXT",
            RawValue::Blob(_) => "BLOB",
            RawValue::Timestamp(_) => "TIMESTAMP",
        }
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Real(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RawValue::Null, Into::into)
    }
}

/// One source row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: HashMap<String, RawValue>,
}

impl RawRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.values.insert(column.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Value of a column, if the row has it.
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// A typed record of any migrated table.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    FilmWork(FilmWork),
    Genre(Genre),
    Person(Person),
    GenreFilmWork(GenreFilmWork),
    PersonFilmWork(PersonFilmWork),
}

impl Record {
    /// Build the record for `table` from one source row.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRow`](crate::MigrateError::MalformedRow) if a
    /// required column is missing, NULL, or cannot be converted.
    pub fn from_row(table: TableKind, row: &RawRow) -> Result<Self> {
        Ok(match table {
            TableKind::FilmWork => Record::FilmWork(FilmWork::from_row(row)?),
            TableKind::Genre => Record::Genre(Genre::from_row(row)?),
            TableKind::Person => Record::Person(Person::from_row(row)?),
            TableKind::GenreFilmWork => Record::GenreFilmWork(GenreFilmWork::from_row(row)?),
            TableKind::PersonFilmWork => Record::PersonFilmWork(PersonFilmWork::from_row(row)?),
        })
    }

    /// Table this record belongs to.
    pub fn table(&self) -> TableKind {
        match self {
            Record::FilmWork(_) => FilmWork::TABLE,
            Record::Genre(_) => Genre::TABLE,
            Record::Person(_) => Person::TABLE,
            Record::GenreFilmWork(_) => GenreFilmWork::TABLE,
            Record::PersonFilmWork(_) => PersonFilmWork::TABLE,
        }
    }

    /// Source-assigned identifier.
    pub fn id(&self) -> Uuid {
        match self {
            Record::FilmWork(r) => r.id,
            Record::Genre(r) => r.id,
            Record::Person(r) => r.id,
            Record::GenreFilmWork(r) => r.id,
            Record::PersonFilmWork(r) => r.id,
        }
    }

    /// Column values in the table's target column order.
    pub fn values(&self) -> Vec<SqlValue<'_>> {
        match self {
            Record::FilmWork(r) => r.values(),
            Record::Genre(r) => r.values(),
            Record::Person(r) => r.values(),
            Record::GenreFilmWork(r) => r.values(),
            Record::PersonFilmWork(r) => r.values(),
        }
    }
}

macro_rules! impl_from_record {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Record {
                fn from(r: $variant) -> Self {
                    Record::$variant(r)
                }
            }
        )*
    };
}

impl_from_record!(FilmWork, Genre, Person, GenreFilmWork, PersonFilmWork);
