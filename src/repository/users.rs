//! Users repository: accounts and their reader profiles

use sqlx::{Pool, Postgres};

use super::books::like_pattern;
use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        pagination,
        user::{User, UserQuery, UserShort},
    },
};

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.is_staff,
           r.phone_number, u.created_at
    FROM users u
    LEFT JOIN readers r ON r.user_id = u.id
"#;

/// Fields for a new account
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub phone_number: Option<&'a str>,
    pub is_staff: bool,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("{} WHERE u.id = $1", USER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{} WHERE u.username = $1", USER_SELECT))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Create an account and its reader profile in one transaction
    pub async fn create(&self, user: &NewUser<'_>) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO users (username, email, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' is already taken", user.username))
            } else {
                AppError::Database(e)
            }
        })?;

        sqlx::query("INSERT INTO readers (user_id, phone_number) VALUES ($1, $2)")
            .bind(id)
            .bind(user.phone_number.unwrap_or(""))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Update email, phone number and optionally the password hash
    pub async fn update_profile(
        &self,
        id: i32,
        email: Option<&str>,
        phone_number: Option<&str>,
        password_hash: Option<&str>,
    ) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($1, email),
                password_hash = COALESCE($2, password_hash)
            WHERE id = $3
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        if let Some(phone) = phone_number {
            sqlx::query(
                r#"
                INSERT INTO readers (user_id, phone_number) VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET phone_number = EXCLUDED.phone_number
                "#,
            )
            .bind(id)
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Grant or revoke the staff tier
    pub async fn set_staff(&self, id: i32, is_staff: bool) -> AppResult<User> {
        let updated = sqlx::query("UPDATE users SET is_staff = $1 WHERE id = $2")
            .bind(is_staff)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        self.get_by_id(id).await
    }

    /// Reset the password of an existing account and make it staff
    pub async fn promote_with_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, is_staff = TRUE WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Search users with pagination, including outstanding loan counts
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let (_, per_page, offset) = pagination(query.page, query.per_page);
        let name = query
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR username ILIKE $1)",
        )
        .bind(name.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT u.id, u.username, u.is_staff,
                   COUNT(l.id) AS nb_loans,
                   COUNT(l.id) FILTER (WHERE l.due_date < CURRENT_DATE) AS nb_late_loans
            FROM users u
            LEFT JOIN loans l ON l.reader_id = u.id AND l.return_date IS NULL
            WHERE ($1::text IS NULL OR u.username ILIKE $1)
            GROUP BY u.id
            ORDER BY u.username
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(name.as_deref())
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }
}
