use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::users::{LoginRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    models::User,
    response::ApiResponse,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        username,
        password,
        email,
    } = payload;
    let username = username.trim().to_string();
    let email = email.trim().to_string();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request(
            "username, password and email are required",
        ));
    }

    let exist = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::bad_request("Username already exists"));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match err.sql_err() {
        // lost a race with a concurrent registration
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::bad_request("Username already exists")
        }
        _ => AppError::from(err),
    })?;

    tracing::info!(user_id = %user.id, "user registered");
    record(
        &state.orm,
        Some(user.id),
        AuditAction::UserRegister,
        serde_json::json!({ "username": user.username }),
    )
    .await;

    Ok(ApiResponse::success("User created", user_from_entity(user), None))
}

pub async fn login_user(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<User>> {
    let LoginRequest { username, password } = payload;
    let user = Users::find()
        .filter(UserCol::Username.eq(username.trim()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::bad_request(INVALID_CREDENTIALS)),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    }

    record(
        &state.orm,
        Some(user.id),
        AuditAction::UserLogin,
        serde_json::json!({ "username": user.username }),
    )
    .await;

    Ok(ApiResponse::success("Logged in", user_from_entity(user), None))
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<ApiResponse<User>> {
    let user = find_user(&state.orm, id).await?;
    Ok(ApiResponse::success("User", user_from_entity(user), None))
}

/// Loads a user or fails with 404.
pub(crate) async fn find_user<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<UserModel> {
    match Users::find_by_id(id).one(db).await? {
        Some(user) => Ok(user),
        None => Err(AppError::not_found("User")),
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter2").expect("hash");
        let second = hash_password("hunter2").expect("hash");
        assert_ne!(first, second);
        assert!(!first.contains("hunter2"));
        assert!(verify_password("hunter2", &first).expect("verify"));
        assert!(!verify_password("hunter3", &first).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_internal_error() {
        let err = verify_password("pw", "plaintext").expect_err("not a phc string");
        assert!(matches!(err, AppError::Internal(_)));
    }
}
