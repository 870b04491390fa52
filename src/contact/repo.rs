use crate::contact::repo_types::Contact;
use sqlx::PgPool;

impl Contact {
    /// Store a contact-form submission.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<Contact, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (name, email, message)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, message, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(message)
        .fetch_one(db)
        .await
    }
}
