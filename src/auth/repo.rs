use crate::auth::repo_types::{NewUser, User, UserChanges};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash, google_id, picture,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Find a user by primary key.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash, google_id, picture,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Find a user by the federated provider's subject id.
    pub async fn find_by_google_id(
        db: &PgPool,
        subject: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash, google_id, picture,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE google_id = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(db)
        .await
    }

    /// Find the user holding an unexpired reset token with this digest.
    pub async fn find_by_reset_token(
        db: &PgPool,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash, google_id, picture,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE reset_token_hash = $1
              AND reset_token_expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(db)
        .await
    }

    /// Create a new user. The unique email index is the last word on
    /// duplicates.
    pub async fn create(db: &PgPool, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
        match new_user {
            NewUser::Local {
                name,
                email,
                phone,
                password_hash,
            } => {
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (name, email, phone, password_hash)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, name, email, phone, password_hash, google_id, picture,
                              reset_token_hash, reset_token_expires_at, created_at, updated_at
                    "#,
                )
                .bind(name)
                .bind(email)
                .bind(phone)
                .bind(password_hash)
                .fetch_one(db)
                .await
            }
            NewUser::Federated {
                name,
                email,
                subject,
                picture,
            } => {
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (name, email, google_id, picture)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, name, email, phone, password_hash, google_id, picture,
                              reset_token_hash, reset_token_expires_at, created_at, updated_at
                    "#,
                )
                .bind(name)
                .bind(email)
                .bind(subject)
                .bind(picture)
                .fetch_one(db)
                .await
            }
        }
    }

    /// Attach a federated subject to an existing account. An already
    /// stored picture wins over the provider's.
    pub async fn link_google(
        db: &PgPool,
        id: Uuid,
        subject: &str,
        picture: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET google_id = $2,
                picture = COALESCE(picture, $3),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, phone, password_hash, google_id, picture,
                      reset_token_hash, reset_token_expires_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(subject)
        .bind(picture)
        .fetch_one(db)
        .await
    }

    /// Store a reset token digest and its expiry, replacing any earlier
    /// unused token.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2,
                reset_token_expires_at = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Drop the pending reset token, if any.
    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Install a new password digest and consume the reset token in the
    /// same statement.
    pub async fn reset_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    /// List all users, newest first.
    pub async fn list(db: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash, google_id, picture,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Apply a partial update; absent fields keep their stored values.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                password_hash = COALESCE($5, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, phone, password_hash, google_id, picture,
                      reset_token_hash, reset_token_expires_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.phone.as_deref())
        .bind(changes.password_hash.as_deref())
        .fetch_optional(db)
        .await
    }

    /// Delete a user. Returns whether a row was removed.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// These hit a real database; run with `cargo test -- --ignored` and a
// DATABASE_URL pointing at a migratable Postgres.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::reset;
    use crate::error::ApiError;
    use sqlx::postgres::PgPoolOptions;
    use time::Duration;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL for ignored tests");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    fn unique_email() -> String {
        format!("{}@example.com", Uuid::new_v4())
    }

    async fn create_local_user(db: &PgPool, email: &str) -> User {
        User::create(
            db,
            NewUser::Local {
                name: "Jane",
                email,
                phone: "+10000000000",
                password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$ZGlnZXN0",
            },
        )
        .await
        .expect("create user")
    }

    #[tokio::test]
    #[ignore]
    async fn duplicate_email_is_rejected_by_the_unique_index() {
        let db = test_pool().await;
        let email = unique_email();
        let first = create_local_user(&db, &email).await;

        let err = User::create(
            &db,
            NewUser::Local {
                name: "Janet",
                email: &email,
                phone: "+10000000001",
                password_hash: "other-digest",
            },
        )
        .await
        .unwrap_err();
        let api = ApiError::from(err);
        assert!(matches!(api, ApiError::Conflict(msg) if msg.contains("email")));

        assert!(User::delete(&db, first.id).await.expect("cleanup"));
    }

    #[tokio::test]
    #[ignore]
    async fn issuing_a_new_token_invalidates_the_previous_one() {
        let db = test_pool().await;
        let user = create_local_user(&db, &unique_email()).await;

        let first = reset::issue();
        User::set_reset_token(&db, user.id, &first.token_hash, first.expires_at)
            .await
            .expect("store first token");
        let second = reset::issue();
        User::set_reset_token(&db, user.id, &second.token_hash, second.expires_at)
            .await
            .expect("store second token");

        let now = OffsetDateTime::now_utc();
        assert!(User::find_by_reset_token(&db, &first.token_hash, now)
            .await
            .expect("lookup first")
            .is_none());
        let found = User::find_by_reset_token(&db, &second.token_hash, now)
            .await
            .expect("lookup second")
            .expect("second token resolves");
        assert_eq!(found.id, user.id);

        User::delete(&db, user.id).await.expect("cleanup");
    }

    #[tokio::test]
    #[ignore]
    async fn expired_token_does_not_resolve() {
        let db = test_pool().await;
        let user = create_local_user(&db, &unique_email()).await;

        let issued = reset::issue();
        let already_expired = OffsetDateTime::now_utc() - Duration::minutes(1);
        User::set_reset_token(&db, user.id, &issued.token_hash, already_expired)
            .await
            .expect("store token");

        assert!(
            User::find_by_reset_token(&db, &issued.token_hash, OffsetDateTime::now_utc())
                .await
                .expect("lookup")
                .is_none()
        );

        User::delete(&db, user.id).await.expect("cleanup");
    }

    #[tokio::test]
    #[ignore]
    async fn reset_password_clears_token_state() {
        let db = test_pool().await;
        let user = create_local_user(&db, &unique_email()).await;

        let issued = reset::issue();
        User::set_reset_token(&db, user.id, &issued.token_hash, issued.expires_at)
            .await
            .expect("store token");
        User::reset_password(&db, user.id, "fresh-digest")
            .await
            .expect("reset password");

        let reloaded = User::find_by_id(&db, user.id)
            .await
            .expect("reload")
            .expect("user still exists");
        assert_eq!(reloaded.password_hash.as_deref(), Some("fresh-digest"));
        assert!(reloaded.reset_token_hash.is_none());
        assert!(reloaded.reset_token_expires_at.is_none());
        assert!(
            User::find_by_reset_token(&db, &issued.token_hash, OffsetDateTime::now_utc())
                .await
                .expect("lookup")
                .is_none()
        );

        User::delete(&db, user.id).await.expect("cleanup");
    }
}
