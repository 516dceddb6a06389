//! User store access for the auth layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};

use super::principal::Role;

/// One row of the users table as the auth layer sees it.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

/// Read seam between the auth layer and the user store.
///
/// The server wires in [`PgUserStore`]; tests substitute an in-memory double.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let query = "SELECT id, username, password, email, role FROM users WHERE username = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by username")?;

        row.map(|row| record_from_row(&row)).transpose()
    }
}

fn record_from_row(row: &PgRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    let role =
        Role::parse(&role).with_context(|| format!("unknown role in users table: {role}"))?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
        email: row.try_get("email")?,
        role,
    })
}

/// Name of the violated unique constraint, if `err` is a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().is_some_and(|code| code.as_ref() == "23505") =>
        {
            Some(db_err.constraint().unwrap_or("").to_string())
        }
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_reports_the_constraint() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
            constraint: Some("users_username_key"),
        }));
        assert_eq!(
            unique_violation(&err).as_deref(),
            Some("users_username_key")
        );
    }

    #[test]
    fn other_database_errors_are_not_unique_violations() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("42501"),
            constraint: None,
        }));
        assert_eq!(unique_violation(&err), None);
        assert_eq!(unique_violation(&sqlx::Error::RowNotFound), None);
    }

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }

    #[tokio::test]
    async fn pg_store_surfaces_backend_failures() {
        let store = PgUserStore::new(unreachable_pool());
        let result = store.find_by_username("alice").await;
        assert!(result.is_err());
    }
}
