//! SQL value types handed from records to the target writer.

use std::borrow::Cow;
use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

/// Type hint for NULL values, kept for diagnostics and row previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    F64,
    String,
    Uuid,
    Date,
    Timestamp,
}

/// A single column value of a record, in target column order.
///
/// Text borrows from the record it was taken from, so building a batch's
/// parameter list does not copy string data.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Double precision float.
    F64(f64),

    /// Text data.
    Text(Cow<'a, str>),

    /// UUID value.
    Uuid(Uuid),

    /// Calendar date.
    Date(NaiveDate),

    /// Absolute instant, always UTC.
    Timestamp(DateTime<Utc>),
}

impl<'a> SqlValue<'a> {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Create a text value from a borrowed string slice.
    #[must_use]
    pub fn text(s: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(s))
    }

    /// Text value, or a typed NULL when absent.
    #[must_use]
    pub fn opt_text(s: Option<&'a str>) -> Self {
        s.map_or(SqlValue::Null(SqlNullType::String), SqlValue::text)
    }

    /// Float value, or a typed NULL when absent.
    #[must_use]
    pub fn opt_f64(v: Option<f64>) -> Self {
        v.map_or(SqlValue::Null(SqlNullType::F64), SqlValue::F64)
    }

    /// Date value, or a typed NULL when absent.
    #[must_use]
    pub fn opt_date(v: Option<NaiveDate>) -> Self {
        v.map_or(SqlValue::Null(SqlNullType::Date), SqlValue::Date)
    }
}

impl From<Uuid> for SqlValue<'static> {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue<'static> {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl ToSql for SqlValue<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        // Inner values check compatibility with the column type themselves.
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::F64(v) => v.to_sql_checked(ty, out),
            SqlValue::Text(v) => {
                let s: &str = v;
                s.to_sql_checked(ty, out)
            }
            SqlValue::Uuid(v) => v.to_sql_checked(ty, out),
            SqlValue::Date(v) => v.to_sql_checked(ty, out),
            SqlValue::Timestamp(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
