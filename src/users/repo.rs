use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::ApiResult;

const USER_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, \
                            birthday, biography, favorite_number, profile_picture, created_at";

/// User row as persisted. The password hash never serializes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: OffsetDateTime,
    pub biography: String,
    pub favorite_number: i64,
    pub profile_picture: String,
    pub created_at: OffsetDateTime,
}

/// Field set for an INSERT; `id` and `created_at` are assigned by the
/// database.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: OffsetDateTime,
    pub biography: String,
    pub favorite_number: i64,
    pub profile_picture: String,
}

impl User {
    pub async fn find_by_username(db: &PgPool, username: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Inserts a new row. The unique indexes on username and email are the
    /// last line of defense against registration races; a violation comes
    /// back as `Conflict`.
    pub async fn create(db: &PgPool, new: &NewUser) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (username, password_hash, email, first_name, last_name, birthday, \
              biography, favorite_number, profile_picture) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.email)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.birthday)
        .bind(&new.biography)
        .bind(new.favorite_number)
        .bind(&new.profile_picture)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Writes the already-merged record back in a single statement;
    /// `id` and `created_at` are never touched.
    pub async fn update(db: &PgPool, merged: &User) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
             username = $1, password_hash = $2, email = $3, first_name = $4, \
             last_name = $5, birthday = $6, biography = $7, favorite_number = $8, \
             profile_picture = $9 \
             WHERE id = $10 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&merged.username)
        .bind(&merged.password_hash)
        .bind(&merged.email)
        .bind(&merged.first_name)
        .bind(&merged.last_name)
        .bind(merged.birthday)
        .bind(&merged.biography)
        .bind(merged.favorite_number)
        .bind(&merged.profile_picture)
        .bind(merged.id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_user() -> User {
        User {
            id: 1,
            username: "ann".into(),
            password_hash: "$argon2id$fake".into(),
            email: "ann@x.com".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            birthday: datetime!(2000-01-01 00:00 UTC),
            biography: "hi".into(),
            favorite_number: 7,
            profile_picture: "/images/default.jpg".into(),
            created_at: datetime!(2024-05-01 12:00 UTC),
        }
    }

    #[test]
    fn serialized_user_never_exposes_password_hash() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ann");
    }
}
