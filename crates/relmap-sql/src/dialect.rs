//! SQL dialect differences: placeholders, quoting and column types.

use relmap_core::ColumnKind;

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl Dialect {
    /// Dialect name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Placeholder for the 1-based parameter `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", identifier.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", identifier.replace('`', "``")),
        }
    }

    /// Database type for a column kind.
    pub fn column_type(self, kind: &ColumnKind) -> &'static str {
        match (self, kind) {
            (_, ColumnKind::Text) => "TEXT",
            (Dialect::Postgres, ColumnKind::Integer) => "BIGINT",
            (Dialect::Mysql, ColumnKind::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnKind::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnKind::Decimal) => "REAL",
            (_, ColumnKind::Decimal) => "NUMERIC",
            (Dialect::Postgres, ColumnKind::Boolean) => "BOOLEAN",
            (Dialect::Mysql, ColumnKind::Boolean) => "TINYINT(1)",
            (Dialect::Sqlite, ColumnKind::Boolean) => "INTEGER",
            (Dialect::Sqlite, ColumnKind::Date | ColumnKind::Datetime) => "TEXT",
            (_, ColumnKind::Date) => "DATE",
            (Dialect::Postgres, ColumnKind::Datetime) => "TIMESTAMP",
            (Dialect::Mysql, ColumnKind::Datetime) => "DATETIME",
            (Dialect::Postgres, ColumnKind::Reference { .. }) => "BIGINT",
            (Dialect::Mysql, ColumnKind::Reference { .. }) => "BIGINT",
            (Dialect::Sqlite, ColumnKind::Reference { .. }) => "INTEGER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
        assert_eq!(Dialect::Sqlite.placeholder(7), "?");
    }

    #[test]
    fn quoting() {
        assert_eq!(Dialect::Postgres.quote("users"), "\"users\"");
        assert_eq!(Dialect::Mysql.quote("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote("od\"d"), "\"od\"\"d\"");
        assert_eq!(Dialect::Mysql.quote("od`d"), "`od``d`");
    }

    #[test]
    fn column_types() {
        assert_eq!(Dialect::Postgres.column_type(&ColumnKind::Integer), "BIGINT");
        assert_eq!(Dialect::Sqlite.column_type(&ColumnKind::Integer), "INTEGER");
        assert_eq!(Dialect::Mysql.column_type(&ColumnKind::Boolean), "TINYINT(1)");
    }
}
