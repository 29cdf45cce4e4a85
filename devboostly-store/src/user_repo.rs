use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devboostly_order::account::{normalize_email, Role, User};
use devboostly_order::numbering::SequenceKind;
use devboostly_order::repository::{RepoResult, RepositoryError, SequenceRepository, UserRepository};
use uuid::Uuid;
use crate::database::{corrupt, db_error, DbClient};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| corrupt("users.role", &row.role))?;
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl UserRepository for DbClient {
    async fn insert_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE LOWER(email) = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(User::try_from).collect()
    }
}

#[async_trait]
impl SequenceRepository for DbClient {
    async fn next_value(&self, kind: SequenceKind, year: i32) -> RepoResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (kind, year, value) VALUES ($1, $2, 1)
            ON CONFLICT (kind, year) DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(kind.prefix())
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(value)
    }
}
