//! Static table metadata for the five migrated tables.
//!
//! The set of tables is fixed, so every per-table lookup (source columns,
//! target columns, conflict key) is resolved through [`TableKind`] instead of
//! string-keyed maps.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// One of the migrated tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    FilmWork,
    Genre,
    Person,
    GenreFilmWork,
    PersonFilmWork,
}

impl TableKind {
    /// All tables, parents first, so join tables are loaded after the rows
    /// they reference.
    pub const MIGRATION_ORDER: [TableKind; 5] = [
        TableKind::FilmWork,
        TableKind::Genre,
        TableKind::Person,
        TableKind::GenreFilmWork,
        TableKind::PersonFilmWork,
    ];

    /// Table name, identical in source and target.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Static metadata for this table.
    pub fn spec(self) -> &'static TableSpec {
        match self {
            TableKind::FilmWork => &FILM_WORK,
            TableKind::Genre => &GENRE,
            TableKind::Person => &PERSON,
            TableKind::GenreFilmWork => &GENRE_FILM_WORK,
            TableKind::PersonFilmWork => &PERSON_FILM_WORK,
        }
    }

    /// Full-scan SELECT of the source columns, without ORDER BY.
    pub fn select_sql(self) -> &'static str {
        static SELECTS: OnceLock<Vec<String>> = OnceLock::new();
        let selects = SELECTS.get_or_init(|| {
            TableKind::MIGRATION_ORDER
                .iter()
                .map(|t| {
                    let spec = t.spec();
                    format!("SELECT {} FROM {}", spec.source_columns.join(", "), spec.name)
                })
                .collect()
        });
        &selects[self as usize]
    }

    /// Row count query for the source table.
    pub fn count_sql(self) -> &'static str {
        static COUNTS: OnceLock<Vec<String>> = OnceLock::new();
        let counts = COUNTS.get_or_init(|| {
            TableKind::MIGRATION_ORDER
                .iter()
                .map(|t| format!("SELECT COUNT(*) FROM {}", t.name()))
                .collect()
        });
        &counts[self as usize]
    }

    /// Resolve a table by name.
    pub fn from_name(name: &str) -> Result<Self> {
        TableKind::MIGRATION_ORDER
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| MigrateError::UnknownTable(name.to_string()))
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        TableKind::from_name(s)
    }
}

/// Column layout and conflict handling for one table.
///
/// `source_columns[i]` is loaded into `target_columns[i]`; both lists follow
/// the field order of the matching record type.
#[derive(Debug)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Columns selected from SQLite.
    pub source_columns: &'static [&'static str],
    /// Columns written to PostgreSQL (audit columns are `created`/`modified` there).
    pub target_columns: &'static [&'static str],
    /// Target columns of the unique constraint used by `ON CONFLICT`.
    pub conflict_key: &'static [&'static str],
}

impl TableSpec {
    /// Number of values each record of this table contributes to an INSERT.
    pub fn column_count(&self) -> usize {
        self.target_columns.len()
    }
}

static FILM_WORK: TableSpec = TableSpec {
    name: "film_work",
    source_columns: &[
        "id",
        "title",
        "description",
        "creation_date",
        "rating",
        "type",
        "created_at",
        "updated_at",
    ],
    target_columns: &[
        "id",
        "title",
        "description",
        "creation_date",
        "rating",
        "type",
        "created",
        "modified",
    ],
    conflict_key: &["id"],
};

static GENRE: TableSpec = TableSpec {
    name: "genre",
    source_columns: &["id", "name", "description", "created_at", "updated_at"],
    target_columns: &["id", "name", "description", "created", "modified"],
    conflict_key: &["id"],
};

static PERSON: TableSpec = TableSpec {
    name: "person",
    source_columns: &["id", "full_name", "created_at", "updated_at"],
    target_columns: &["id", "full_name", "created", "modified"],
    conflict_key: &["id"],
};

static GENRE_FILM_WORK: TableSpec = TableSpec {
    name: "genre_film_work",
    source_columns: &["id", "genre_id", "film_work_id", "created_at"],
    target_columns: &["id", "genre_id", "film_work_id", "created"],
    conflict_key: &["id"],
};

static PERSON_FILM_WORK: TableSpec = TableSpec {
    name: "person_film_work",
    source_columns: &["id", "film_work_id", "person_id", "role", "created_at"],
    target_columns: &["id", "film_work_id", "person_id", "role", "created"],
    conflict_key: &["film_work_id", "person_id", "role"],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_order_puts_parents_first() {
        let names: Vec<_> = TableKind::MIGRATION_ORDER.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "film_work",
                "genre",
                "person",
                "genre_film_work",
                "person_film_work"
            ]
        );
    }

    #[test]
    fn test_source_and_target_columns_line_up() {
        for table in TableKind::MIGRATION_ORDER {
            let spec = table.spec();
            assert_eq!(
                spec.source_columns.len(),
                spec.target_columns.len(),
                "{} column lists differ in length",
                table
            );
        }
    }

    #[test]
    fn test_select_follows_source_columns() {
        assert_eq!(
            TableKind::Person.select_sql(),
            "SELECT id, full_name, created_at, updated_at FROM person"
        );
        assert_eq!(
            TableKind::PersonFilmWork.count_sql(),
            "SELECT COUNT(*) FROM person_film_work"
        );
        for (idx, table) in TableKind::MIGRATION_ORDER.into_iter().enumerate() {
            assert_eq!(table as usize, idx);
            let sql = table.select_sql();
            assert!(sql.ends_with(&format!("FROM {}", table.name())), "{}", sql);
            assert_eq!(
                sql.matches(", ").count() + 1,
                table.spec().source_columns.len()
            );
        }
    }

    #[test]
    fn test_conflict_keys() {
        assert_eq!(
            TableKind::PersonFilmWork.spec().conflict_key,
            &["film_work_id", "person_id", "role"]
        );
        for table in [
            TableKind::FilmWork,
            TableKind::Genre,
            TableKind::Person,
            TableKind::GenreFilmWork,
        ] {
            assert_eq!(table.spec().conflict_key, &["id"]);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(TableKind::from_name("genre").unwrap(), TableKind::Genre);
        assert_eq!(
            "person_film_work".parse::<TableKind>().unwrap(),
            TableKind::PersonFilmWork
        );
        assert!(matches!(
            TableKind::from_name("film_work_person"),
            Err(MigrateError::UnknownTable(name)) if name == "film_work_person"
        ));
    }
}
