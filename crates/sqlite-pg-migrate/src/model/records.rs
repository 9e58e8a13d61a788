//! Record shapes for each table and their row conversions.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::timestamp::{normalize_timestamp, parse_timestamp};
use super::{RawRow, RawValue};
use crate::core::schema::TableKind;
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// A record type bound to exactly one table.
pub trait TableRecord: Sized {
    /// Table the record is read from and written to.
    const TABLE: TableKind;

    /// Build the record from a source row, normalizing timestamps.
    fn from_row(row: &RawRow) -> Result<Self>;

    /// Column values in the table's target column order.
    fn values(&self) -> Vec<SqlValue<'_>>;
}

/// Film work (movie or show).
#[derive(Debug, Clone, PartialEq)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub rating: Option<f64>,
    /// Stored in the `type` column.
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Genre.
#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Person taking part in film works.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Genre ↔ film work link.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreFilmWork {
    pub id: Uuid,
    pub genre_id: Uuid,
    pub film_work_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Person ↔ film work link with the person's role.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TableRecord for FilmWork {
    const TABLE: TableKind = TableKind::FilmWork;

    fn from_row(row: &RawRow) -> Result<Self> {
        let f = Fields::new(Self::TABLE, row);
        Ok(Self {
            id: f.uuid("id")?,
            title: f.text("title")?,
            description: f.opt_text("description")?,
            creation_date: f.opt_date("creation_date")?,
            rating: f.opt_f64("rating")?,
            kind: f.text("type")?,
            created_at: f.timestamp("created_at")?,
            updated_at: f.timestamp("updated_at")?,
        })
    }

    fn values(&self) -> Vec<SqlValue<'_>> {
        vec![
            self.id.into(),
            SqlValue::text(&self.title),
            SqlValue::opt_text(self.description.as_deref()),
            SqlValue::opt_date(self.creation_date),
            SqlValue::opt_f64(self.rating),
            SqlValue::text(&self.kind),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

impl TableRecord for Genre {
    const TABLE: TableKind = TableKind::Genre;

    fn from_row(row: &RawRow) -> Result<Self> {
        let f = Fields::new(Self::TABLE, row);
        Ok(Self {
            id: f.uuid("id")?,
            name: f.text("name")?,
            description: f.opt_text("description")?,
            created_at: f.timestamp("created_at")?,
            updated_at: f.timestamp("updated_at")?,
        })
    }

    fn values(&self) -> Vec<SqlValue<'_>> {
        vec![
            self.id.into(),
            SqlValue::text(&self.name),
            SqlValue::opt_text(self.description.as_deref()),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

impl TableRecord for Person {
    const TABLE: TableKind = TableKind::Person;

    fn from_row(row: &RawRow) -> Result<Self> {
        let f = Fields::new(Self::TABLE, row);
        Ok(Self {
            id: f.uuid("id")?,
            full_name: f.text("full_name")?,
            created_at: f.timestamp("created_at")?,
            updated_at: f.timestamp("updated_at")?,
        })
    }

    fn values(&self) -> Vec<SqlValue<'_>> {
        vec![
            self.id.into(),
            SqlValue::text(&self.full_name),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

impl TableRecord for GenreFilmWork {
    const TABLE: TableKind = TableKind::GenreFilmWork;

    fn from_row(row: &RawRow) -> Result<Self> {
        let f = Fields::new(Self::TABLE, row);
        Ok(Self {
            id: f.uuid("id")?,
            genre_id: f.uuid("genre_id")?,
            film_work_id: f.uuid("film_work_id")?,
            created_at: f.timestamp("created_at")?,
        })
    }

    fn values(&self) -> Vec<SqlValue<'_>> {
        vec![
            self.id.into(),
            self.genre_id.into(),
            self.film_work_id.into(),
            self.created_at.into(),
        ]
    }
}

impl TableRecord for PersonFilmWork {
    const TABLE: TableKind = TableKind::PersonFilmWork;

    fn from_row(row: &RawRow) -> Result<Self> {
        let f = Fields::new(Self::TABLE, row);
        Ok(Self {
            id: f.uuid("id")?,
            film_work_id: f.uuid("film_work_id")?,
            person_id: f.uuid("person_id")?,
            role: f.text("role")?,
            created_at: f.timestamp("created_at")?,
        })
    }

    fn values(&self) -> Vec<SqlValue<'_>> {
        vec![
            self.id.into(),
            self.film_work_id.into(),
            self.person_id.into(),
            SqlValue::text(&self.role),
            self.created_at.into(),
        ]
    }
}

/// Typed column access over a raw row, reporting failures against a table.
struct Fields<'r> {
    table: TableKind,
    row: &'r RawRow,
}

impl<'r> Fields<'r> {
    fn new(table: TableKind, row: &'r RawRow) -> Self {
        Self { table, row }
    }

    fn error(&self, column: &str, message: impl std::fmt::Display) -> MigrateError {
        MigrateError::malformed(self.table.name(), format!("column '{}': {}", column, message))
    }

    /// Present, non-NULL value.
    fn required(&self, column: &str) -> Result<&'r RawValue> {
        match self.row.get(column) {
            None => Err(self.error(column, "missing")),
            Some(RawValue::Null) => Err(self.error(column, "is NULL")),
            Some(value) => Ok(value),
        }
    }

    /// Present value, `None` when NULL.
    fn optional(&self, column: &str) -> Result<Option<&'r RawValue>> {
        match self.row.get(column) {
            None => Err(self.error(column, "missing")),
            Some(RawValue::Null) => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }

    fn uuid(&self, column: &str) -> Result<Uuid> {
        match self.required(column)? {
            RawValue::Text(s) => {
                Uuid::parse_str(s.trim()).map_err(|e| self.error(column, format!("invalid UUID: {}", e)))
            }
            RawValue::Blob(b) => {
                Uuid::from_slice(b).map_err(|e| self.error(column, format!("invalid UUID: {}", e)))
            }
            other => Err(self.error(column, format!("expected UUID, got {}", other.kind_name()))),
        }
    }

    fn text(&self, column: &str) -> Result<String> {
        let value = self.required(column)?;
        self.as_text(column, value)
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>> {
        self.optional(column)?
            .map(|value| self.as_text(column, value))
            .transpose()
    }

    fn as_text(&self, column: &str, value: &RawValue) -> Result<String> {
        match value {
            RawValue::Text(s) => Ok(s.clone()),
            other => Err(self.error(column, format!("expected TEXT, got {}", other.kind_name()))),
        }
    }

    fn opt_f64(&self, column: &str) -> Result<Option<f64>> {
        match self.optional(column)? {
            None => Ok(None),
            Some(RawValue::Real(v)) => Ok(Some(*v)),
            Some(RawValue::Integer(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(self.error(column, format!("expected REAL, got {}", other.kind_name()))),
        }
    }

    fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.optional(column)? {
            None => Ok(None),
            Some(RawValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.date_naive()))
                .map(Some)
                .ok_or_else(|| self.error(column, format!("unrecognised date '{}'", s))),
            Some(RawValue::Timestamp(ts)) => Ok(Some(ts.date_naive())),
            Some(other) => Err(self.error(column, format!("expected date, got {}", other.kind_name()))),
        }
    }

    fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        normalize_timestamp(self.required(column)?).map_err(|reason| self.error(column, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FILM_ID: &str = "3d825f60-9fff-4dfe-b294-1a45fa1e115d";
    const PERSON_ID: &str = "26e83050-29ef-4163-a99d-b546cac208f8";

    fn film_row() -> RawRow {
        RawRow::new()
            .with("id", FILM_ID)
            .with("title", "Star Wars: Episode IV - A New Hope")
            .with("description", "The Imperial Forces hold Princess Leia hostage.")
            .with("creation_date", RawValue::Null)
            .with("rating", 8.6)
            .with("type", "movie")
            .with("created_at", "2021-06-16 20:14:09.221838+00")
            .with("updated_at", "2021-06-16 20:14:09.221855+00")
    }

    #[test]
    fn test_film_work_from_row() {
        let film = FilmWork::from_row(&film_row()).unwrap();
        assert_eq!(film.id, Uuid::parse_str(FILM_ID).unwrap());
        assert_eq!(film.kind, "movie");
        assert_eq!(film.rating, Some(8.6));
        assert_eq!(film.creation_date, None);
        assert_eq!(film.created_at.timezone(), Utc);
    }

    #[test]
    fn test_film_work_values_follow_column_order() {
        let film = FilmWork::from_row(&film_row()).unwrap();
        let values = film.values();
        assert_eq!(values.len(), TableKind::FilmWork.spec().column_count());
        assert_eq!(values[0], SqlValue::Uuid(film.id));
        assert_eq!(values[1], SqlValue::text("Star Wars: Episode IV - A New Hope"));
        assert!(values[3].is_null());
        assert_eq!(values[4], SqlValue::F64(8.6));
        assert_eq!(values[5], SqlValue::text("movie"));
        assert_eq!(values[6], SqlValue::Timestamp(film.created_at));
        assert_eq!(values[7], SqlValue::Timestamp(film.updated_at));
    }

    #[test]
    fn test_nullable_columns_accept_null() {
        let row = film_row()
            .with("description", RawValue::Null)
            .with("rating", RawValue::Null);
        let film = FilmWork::from_row(&row).unwrap();
        assert_eq!(film.description, None);
        assert_eq!(film.rating, None);
    }

    #[test]
    fn test_integer_rating_widens() {
        let film = FilmWork::from_row(&film_row().with("rating", 7_i64)).unwrap();
        assert_eq!(film.rating, Some(7.0));
    }

    #[test]
    fn test_creation_date_parsing() {
        let film = FilmWork::from_row(&film_row().with("creation_date", "1977-05-25")).unwrap();
        assert_eq!(film.creation_date, NaiveDate::from_ymd_opt(1977, 5, 25));

        let film =
            FilmWork::from_row(&film_row().with("creation_date", "1977-05-25 00:00:00+00")).unwrap();
        assert_eq!(film.creation_date, NaiveDate::from_ymd_opt(1977, 5, 25));

        let err = FilmWork::from_row(&film_row().with("creation_date", "May 1977")).unwrap_err();
        assert!(err.to_string().contains("creation_date"));
    }

    #[test]
    fn test_missing_required_column() {
        let full = film_row();
        let row: RawRow = [
            "id",
            "description",
            "creation_date",
            "rating",
            "type",
            "created_at",
            "updated_at",
        ]
        .into_iter()
        .map(|c| (c, full.get(c).cloned().unwrap()))
        .collect();
        let err = FilmWork::from_row(&row).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed row in table film_work: column 'title': missing"
        );
    }

    #[test]
    fn test_null_required_column() {
        let err = Genre::from_row(
            &RawRow::new()
                .with("id", FILM_ID)
                .with("name", RawValue::Null)
                .with("description", RawValue::Null)
                .with("created_at", "2021-06-16 20:14:09+00")
                .with("updated_at", "2021-06-16 20:14:09+00"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("column 'name': is NULL"));
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let err = FilmWork::from_row(&film_row().with("title", 42_i64)).unwrap_err();
        assert!(err.to_string().contains("expected TEXT, got INTEGER"));

        let err = FilmWork::from_row(&film_row().with("id", "not-a-uuid")).unwrap_err();
        assert!(err.to_string().contains("invalid UUID"));

        let err = FilmWork::from_row(&film_row().with("created_at", "soon")).unwrap_err();
        assert!(err.to_string().contains("unrecognised timestamp"));
    }

    #[test]
    fn test_uuid_from_blob() {
        let id = Uuid::parse_str(PERSON_ID).unwrap();
        let mut row = RawRow::new()
            .with("full_name", "Harrison Ford")
            .with("created_at", "2021-06-16 20:14:09+00")
            .with("updated_at", "2021-06-16 20:14:09+00");
        row.insert("id", RawValue::Blob(id.as_bytes().to_vec()));
        assert_eq!(Person::from_row(&row).unwrap().id, id);
    }

    #[test]
    fn test_person_film_work_values() {
        let link = PersonFilmWork::from_row(
            &RawRow::new()
                .with("id", "00af52ec-9345-4d66-adbe-50eb917f463a")
                .with("film_work_id", FILM_ID)
                .with("person_id", PERSON_ID)
                .with("role", "actor")
                .with("created_at", "2021-06-16 20:14:09.222016+00"),
        )
        .unwrap();
        let values = link.values();
        assert_eq!(values.len(), 5);
        assert_eq!(values[3], SqlValue::text("actor"));
    }

    #[test]
    fn test_normalizing_a_built_record_again_changes_nothing() {
        let person = Person::from_row(
            &RawRow::new()
                .with("id", PERSON_ID)
                .with("full_name", "Harrison Ford")
                .with("created_at", "2021-06-16 23:14:09.310212+03")
                .with("updated_at", "2021-06-16 20:14:09")
        )
        .unwrap();
        assert_eq!(
            person.created_at,
            Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).unwrap()
                + chrono::Duration::microseconds(310_212)
        );

        let rebuilt = Person::from_row(
            &RawRow::new()
                .with("id", PERSON_ID)
                .with("full_name", "Harrison Ford")
                .with("created_at", RawValue::Timestamp(person.created_at))
                .with("updated_at", RawValue::Timestamp(person.updated_at)),
        )
        .unwrap();
        assert_eq!(rebuilt, person);
    }
}
