//! PostgreSQL user directory
//!
//! Stores user accounts using SQLx and PostgreSQL. Selected at startup when a
//! database URL is configured; the table is created if it does not exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::directory::{DirectoryError, UserDirectory};
use crate::models::{normalize_email, NewUser, Page, SortOrder, User, UserChanges, UserFilter, UserQuery};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, is_email_verified, created_at, updated_at";

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// PostgreSQL-backed user directory
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Connect and make sure the `users` table exists
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, DirectoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size.max(1))
            .connect(database_url)
            .await
            .map_err(|e| backend("PostgreSQL connection failed", e))?;

        let directory = Self::from_pool(pool);
        directory.ensure_schema().await?;
        Ok(directory)
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| backend("Failed to create users table", e))?;
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    is_email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            // Unknown role strings degrade to the least privileged role
            role: row.role.parse().unwrap_or_default(),
            is_email_verified: row.is_email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn backend(context: &str, err: sqlx::Error) -> DirectoryError {
    DirectoryError::Backend(format!("{context}: {err}"))
}

/// Map a write error, reporting unique-email violations as `EmailTaken`
fn write_error(context: &str, err: sqlx::Error) -> DirectoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::EmailTaken,
        _ => backend(context, err),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE TRUE");
    if let Some(name) = &filter.name {
        builder.push(" AND name = ").push_bind(name.clone());
    }
    if let Some(email) = &filter.email {
        builder.push(" AND email = ").push_bind(normalize_email(email));
    }
    if let Some(role) = filter.role {
        builder.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(verified) = filter.is_email_verified {
        builder.push(" AND is_email_verified = ").push_bind(verified);
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| backend("Failed to fetch user", e))?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| backend("Failed to fetch user", e))?;

        Ok(row.map(User::from))
    }

    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, is_email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(normalize_email(&user.email))
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("Failed to create user", e))?;

        Ok(row.into())
    }

    async fn email_taken(
        &self,
        email: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DirectoryError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(normalize_email(email))
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| backend("Failed to check email", e))?;

        Ok(taken)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, DirectoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                is_email_verified = COALESCE($6, is_email_verified),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email.as_deref().map(normalize_email))
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.is_email_verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error("Failed to update user", e))?;

        row.map(User::from).ok_or(DirectoryError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<User, DirectoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("Failed to delete user", e))?;

        row.map(User::from).ok_or(DirectoryError::NotFound)
    }

    async fn query(&self, query: &UserQuery) -> Result<Page<User>, DirectoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut count, &query.filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| backend("Failed to count users", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut select, &query.filter);
        match query.sort_by {
            Some(field) => {
                let direction = match query.sort_order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                select.push(format!(" ORDER BY {} {direction}", field.column()));
            }
            None => {
                select.push(" ORDER BY created_at DESC");
            }
        }
        select
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit.max(1)))
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows: Vec<UserRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("Failed to list users", e))?;

        Ok(Page::new(
            rows.into_iter().map(User::from).collect(),
            query,
            total.max(0) as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            role: role.to_string(),
            is_email_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_row_conversion() {
        let user = User::from(row("admin"));
        assert_eq!(user.role, Role::Admin);
        assert!(user.is_email_verified);

        // Unknown roles never grant privileges
        assert_eq!(User::from(row("superuser")).role, Role::User);
    }

    #[test]
    fn test_filter_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(
            &mut builder,
            &UserFilter {
                role: Some(Role::Admin),
                is_email_verified: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM users WHERE TRUE AND role = $1 AND is_email_verified = $2"
        );
    }
}
