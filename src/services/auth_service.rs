use crate::{
    config::{AppConfig, JwtConfig},
    models::{Address, UserProfile, UserRecord},
    store::UserStore,
    utils::AppError,
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub token_type: String, // "access" | "refresh"
    pub iat: usize,         // issued at
    pub exp: usize,         // expiration
    pub jti: String,        // JWT ID
    pub aud: String,        // audience
    pub iss: String,        // issuer
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub gender: String,
    pub date_of_birth: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

fn issue_token(
    jwt: &JwtConfig,
    user_id: &str,
    email: &str,
    token_type: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        token_type: token_type.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: jwt.audience.clone(),
        iss: jwt.issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token of the expected type
pub fn verify_token(jwt: &JwtConfig, token: &str, expected_type: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[jwt.audience.as_str()]);

    let mut issuers = HashSet::new();
    issuers.insert(jwt.issuer.clone());
    validation.iss = Some(issuers);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::NotAuthenticated(format!("Invalid token: {}", e)))?;

    if claims.token_type != expected_type {
        return Err(AppError::NotAuthenticated(format!(
            "Expected {} token",
            expected_type
        )));
    }

    Ok(claims)
}

fn auth_response(jwt: &JwtConfig, user: &UserRecord) -> Result<AuthResponse, AppError> {
    let token = issue_token(
        jwt,
        &user.user_id,
        &user.email,
        ACCESS_TOKEN,
        Duration::hours(jwt.access_ttl_hours),
    )?;
    let refresh_token = issue_token(
        jwt,
        &user.user_id,
        &user.email,
        REFRESH_TOKEN,
        Duration::days(jwt.refresh_ttl_days),
    )?;

    Ok(AuthResponse {
        success: true,
        token,
        refresh_token,
        user: UserProfile::from(user),
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AppError> {
    let required = [
        ("first name", &request.first_name),
        ("last name", &request.last_name),
        ("email", &request.email),
        ("password", &request.password),
        ("password confirmation", &request.confirm_password),
        ("gender", &request.gender),
        ("date of birth", &request.date_of_birth),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(AppError::ValidationFailed(format!("{} is required", field)));
    }

    let email = normalize_email(&request.email);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => {
            return Err(AppError::ValidationFailed(
                "Please enter a valid email".to_string(),
            ))
        }
    }

    if request.password != request.confirm_password {
        return Err(AppError::ValidationFailed("Passwords do not match".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationFailed(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(())
}

// User registration
pub async fn register(
    store: &dyn UserStore,
    config: &AppConfig,
    request: &RegisterRequest,
) -> Result<AuthResponse, AppError> {
    validate_registration(request)?;

    let email = normalize_email(&request.email);

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("This email is already in use".to_string()));
    }

    let hashed_password = hash(&request.password, config.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let now = Utc::now().timestamp();
    let new_user = UserRecord {
        id: None,
        user_id: ObjectId::new().to_hex(),
        email,
        password: Some(hashed_password),
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        gender: request.gender.trim().to_string(),
        date_of_birth: Some(request.date_of_birth.trim().to_string()),
        phone: request.phone.clone().filter(|p| !p.trim().is_empty()),
        address: request.address.clone().unwrap_or_default(),
        reviews: vec![],
        avg_rating: 0.0,
        total_reviews: 0,
        review_version: 0,
        last_review_update: None,
        created_at: now,
        updated_at: now,
    };

    store.insert_user(&new_user).await?;

    log::info!("✅ User registered successfully: {}", new_user.email);

    auth_response(&config.jwt, &new_user)
}

// User login
pub async fn login(
    store: &dyn UserStore,
    config: &AppConfig,
    request: &LoginRequest,
) -> Result<AuthResponse, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::ValidationFailed(
            "Please enter both email and password".to_string(),
        ));
    }

    let invalid = || AppError::NotAuthenticated("Invalid credentials".to_string());

    let user = store
        .find_user_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(invalid)?;

    let stored_password = user.password.as_deref().ok_or_else(invalid)?;

    let valid = verify(&request.password, stored_password)
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))?;

    if !valid {
        return Err(invalid());
    }

    auth_response(&config.jwt, &user)
}

// Refresh token
pub async fn refresh_token(
    store: &dyn UserStore,
    config: &AppConfig,
    request: &RefreshTokenRequest,
) -> Result<AuthResponse, AppError> {
    let claims = verify_token(&config.jwt, &request.refresh_token, REFRESH_TOKEN)?;

    let user = store
        .find_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::NotAuthenticated("User not found".to_string()))?;

    auth_response(&config.jwt, &user)
}

// Get current user
pub async fn current_user(store: &dyn UserStore, user_id: &str) -> Result<UserProfile, AppError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(UserProfile::from(&user))
}
