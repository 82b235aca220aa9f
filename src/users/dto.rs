use std::collections::HashMap;

use axum::extract::Multipart;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

use super::repo::User;
use crate::error::{ApiError, ApiResult};
use crate::pictures::UploadedImage;

/// Everything the client may see: the persisted record minus the
/// password hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub birthday: OffsetDateTime,
    pub biography: String,
    pub favorite_number: i64,
    pub profile_picture: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            birthday: u.birthday,
            biography: u.biography,
            favorite_number: u.favorite_number,
            profile_picture: u.profile_picture,
            created_at: u.created_at,
        }
    }
}

/// Multipart body of `POST /users`; all fields required except the image.
#[derive(Debug)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: OffsetDateTime,
    pub biography: String,
    pub favorite_number: i64,
    pub picture: Option<UploadedImage>,
}

/// Multipart body of `PATCH /users/me`; merge-patch, so everything is
/// optional and absent fields stay untouched.
#[derive(Debug, Default)]
pub struct UpdateForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthday: Option<OffsetDateTime>,
    pub biography: Option<String>,
    pub favorite_number: Option<i64>,
    pub picture: Option<UploadedImage>,
}

/// Resolved changes ready to merge into an existing row. Password and
/// picture arrive here already hashed/stored by the workflow.
#[derive(Debug, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthday: Option<OffsetDateTime>,
    pub biography: Option<String>,
    pub favorite_number: Option<i64>,
    pub profile_picture: Option<String>,
}

impl UserPatch {
    /// Applies only the supplied fields; `id` and `created_at` are not
    /// reachable from a patch.
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.first_name {
            user.first_name = v;
        }
        if let Some(v) = self.last_name {
            user.last_name = v;
        }
        if let Some(v) = self.birthday {
            user.birthday = v;
        }
        if let Some(v) = self.biography {
            user.biography = v;
        }
        if let Some(v) = self.favorite_number {
            user.favorite_number = v;
        }
        if let Some(v) = self.profile_picture {
            user.profile_picture = v;
        }
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_birthday(raw: &str) -> ApiResult<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format)
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| {
            ApiError::InvalidInput(format!(
                "birthday '{raw}' is not an RFC 3339 timestamp or YYYY-MM-DD date"
            ))
        })
}

struct Collected {
    text: HashMap<String, String>,
    picture: Option<UploadedImage>,
}

/// Drains a multipart stream into text fields plus the optional
/// `profile_picture` file part. Unknown fields are ignored.
async fn collect(mut multipart: Multipart) -> ApiResult<Collected> {
    let mut text = HashMap::new();
    let mut picture = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "profile_picture" && field.file_name().is_some() {
            let filename = field.file_name().unwrap_or("upload.jpg").to_string();
            let content_type = field.content_type().map(str::to_string);
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidInput(format!("could not read upload: {e}")))?;
            // Browsers send an empty file part when nothing was selected.
            if !body.is_empty() {
                picture = Some(UploadedImage {
                    filename,
                    content_type,
                    body,
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::InvalidInput(format!("could not read field: {e}")))?;
            text.insert(name, value);
        }
    }

    Ok(Collected { text, picture })
}

fn required(text: &mut HashMap<String, String>, field: &str) -> ApiResult<String> {
    text.remove(field)
        .ok_or_else(|| ApiError::InvalidInput(format!("missing field '{field}'")))
}

fn parse_favorite_number(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::InvalidInput("favorite_number must be an integer".into()))
}

impl RegisterForm {
    pub async fn from_multipart(multipart: Multipart) -> ApiResult<Self> {
        let Collected { mut text, picture } = collect(multipart).await?;

        Ok(Self {
            username: required(&mut text, "username")?,
            password: required(&mut text, "password")?,
            email: required(&mut text, "email")?,
            first_name: required(&mut text, "first_name")?,
            last_name: required(&mut text, "last_name")?,
            birthday: parse_birthday(&required(&mut text, "birthday")?)?,
            biography: text.remove("biography").unwrap_or_default(),
            favorite_number: parse_favorite_number(&required(&mut text, "favorite_number")?)?,
            picture,
        })
    }
}

impl UpdateForm {
    pub async fn from_multipart(multipart: Multipart) -> ApiResult<Self> {
        let Collected { mut text, picture } = collect(multipart).await?;

        let birthday = match text.remove("birthday") {
            Some(raw) => Some(parse_birthday(&raw)?),
            None => None,
        };
        let favorite_number = match text.remove("favorite_number") {
            Some(raw) => Some(parse_favorite_number(&raw)?),
            None => None,
        };

        Ok(Self {
            username: text.remove("username"),
            password: text.remove("password"),
            email: text.remove("email"),
            first_name: text.remove("first_name"),
            last_name: text.remove("last_name"),
            birthday,
            biography: text.remove("biography"),
            favorite_number,
            picture,
        })
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
    fn patch_applies_only_supplied_fields() {
        let mut user = sample_user();
        let patch = UserPatch {
            biography: Some("new bio".into()),
            ..Default::default()
        };
        patch.apply(&mut user);

        assert_eq!(user.biography, "new bio");
        assert_eq!(user.username, "ann");
        assert_eq!(user.email, "ann@x.com");
        assert_eq!(user.password_hash, "$argon2id$fake");
        assert_eq!(user.favorite_number, 7);
    }

    #[test]
    fn patch_can_change_favorite_number_alone() {
        let mut user = sample_user();
        UserPatch {
            favorite_number: Some(42),
            ..Default::default()
        }
        .apply(&mut user);

        assert_eq!(user.favorite_number, 42);
        assert_eq!(user.biography, "hi");
    }

    #[test]
    fn public_user_excludes_password() {
        let json = serde_json::to_value(PublicUser::from(sample_user())).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["id"], 1);
        assert_eq!(json["profile_picture"], "/images/default.jpg");
    }

    #[test]
    fn birthday_accepts_date_and_rfc3339() {
        assert_eq!(
            parse_birthday("2000-01-01").unwrap(),
            datetime!(2000-01-01 00:00 UTC)
        );
        assert_eq!(
            parse_birthday("2000-01-01T12:30:00Z").unwrap(),
            datetime!(2000-01-01 12:30 UTC)
        );
        assert!(parse_birthday("January 1st").is_err());
    }
}
