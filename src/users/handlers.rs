use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{PublicUser, RegisterForm, UpdateForm, UserPatch};
use super::repo::{NewUser, User};
use super::validate;
use crate::auth::extractors::CurrentUser;
use crate::auth::password::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::pictures::{UploadedImage, DEFAULT_PROFILE_PICTURE};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/me", get(read_me).patch(update_me))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}

fn require_jpeg(image: &UploadedImage) -> ApiResult<()> {
    if image.is_jpeg() {
        Ok(())
    } else {
        warn!(filename = %image.filename, "rejected non-JPEG upload");
        Err(ApiError::InvalidInput(
            "profile picture must be a JPEG image".into(),
        ))
    }
}

#[instrument(skip(state, multipart))]
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<PublicUser>> {
    let form = RegisterForm::from_multipart(multipart).await?;

    let username = validate::validate_username(&form.username)?;
    let email = validate::validate_email(&form.email)?;
    let first_name = validate::non_empty("first_name", &form.first_name)?;
    let last_name = validate::non_empty("last_name", &form.last_name)?;
    let biography = validate::validate_biography(&form.biography)?;
    validate::validate_password(&form.password)?;

    if User::find_by_username(&state.db, &username).await?.is_some() {
        warn!(%username, "registration conflict on username");
        return Err(ApiError::Conflict(format!(
            "user with username '{username}' already exists"
        )));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "registration conflict on email");
        return Err(ApiError::Conflict(format!("{email} is already in use")));
    }

    let password_hash = hash_password(&form.password).map_err(ApiError::Internal)?;

    // Validate before any byte hits the disk.
    let profile_picture = match &form.picture {
        Some(image) => {
            require_jpeg(image)?;
            state.pictures.store(image).await.map_err(ApiError::Internal)?
        }
        None => DEFAULT_PROFILE_PICTURE.to_string(),
    };

    let user = User::create(
        &state.db,
        &NewUser {
            username,
            password_hash,
            email,
            first_name,
            last_name,
            birthday: form.birthday,
            biography,
            favorite_number: form.favorite_number,
            profile_picture,
        },
    )
    .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(user.into()))
}

#[instrument(skip_all)]
pub async fn read_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<PublicUser>> {
    let form = UpdateForm::from_multipart(multipart).await?;
    let mut patch = UserPatch::default();

    if let Some(raw) = &form.username {
        let username = validate::validate_username(raw)?;
        // A user keeping (or re-submitting) their own username is not a
        // conflict; only other rows count.
        if let Some(existing) = User::find_by_username(&state.db, &username).await? {
            if existing.id != user.id {
                return Err(ApiError::Conflict(format!(
                    "user with username '{username}' already exists"
                )));
            }
        }
        patch.username = Some(username);
    }

    if let Some(raw) = &form.email {
        let email = validate::validate_email(raw)?;
        if let Some(existing) = User::find_by_email(&state.db, &email).await? {
            if existing.id != user.id {
                return Err(ApiError::Conflict(format!("{email} is already in use")));
            }
        }
        patch.email = Some(email);
    }

    if let Some(password) = &form.password {
        validate::validate_password(password)?;
        patch.password_hash = Some(hash_password(password).map_err(ApiError::Internal)?);
    }

    if let Some(raw) = &form.first_name {
        patch.first_name = Some(validate::non_empty("first_name", raw)?);
    }
    if let Some(raw) = &form.last_name {
        patch.last_name = Some(validate::non_empty("last_name", raw)?);
    }
    if let Some(raw) = &form.biography {
        patch.biography = Some(validate::validate_biography(raw)?);
    }
    patch.birthday = form.birthday;
    patch.favorite_number = form.favorite_number;

    if let Some(image) = &form.picture {
        require_jpeg(image)?;
        let url = state
            .pictures
            .replace(&user.profile_picture, image)
            .await
            .map_err(ApiError::Internal)?;
        patch.profile_picture = Some(url);
    }

    let mut merged = user.clone();
    patch.apply(&mut merged);
    let updated = User::update(&state.db, &merged).await?;

    info!(user_id = updated.id, "user profile updated");
    Ok(Json(updated.into()))
}
