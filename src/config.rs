use std::env;
use std::str::FromStr;

/// JWT settings shared by the token issuer and the auth middleware.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_days: i64,
}

/// Process-wide configuration, built once in `main` and handed to every
/// component that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_name: String,
    pub mongo_max_pool_size: u32,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub import_legacy_reviews: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("⚠️  JWT_SECRET not set, using development secret");
            "default-secret-change-me".to_string()
        });

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3002)?,
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| database_name_from_uri(&database_url)),
            database_url,
            mongo_max_pool_size: parse_var("MONGO_MAX_POOL_SIZE", 20)?,
            jwt: JwtConfig {
                secret: jwt_secret,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "roommate-review-service".to_string()),
                audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "roommate-review-api".to_string()),
                access_ttl_hours: parse_var("JWT_ACCESS_TTL_HOURS", 24)?,
                refresh_ttl_days: parse_var("JWT_REFRESH_TTL_DAYS", 30)?,
            },
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            cors_origins,
            import_legacy_reviews: parse_var("IMPORT_LEGACY_REVIEWS", false)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Takes the path segment of a MongoDB URI as the database name.
fn database_name_from_uri(uri: &str) -> String {
    let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    without_scheme
        .split_once('/')
        .and_then(|(_, path)| path.split('?').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("roommate_reviews")
        .to_string()
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "mongodb://localhost:27017/roommate_reviews_test".to_string(),
            database_name: "roommate_reviews_test".to_string(),
            mongo_max_pool_size: 2,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: "roommate-review-service".to_string(),
                audience: "roommate-review-api".to_string(),
                access_ttl_hours: 1,
                refresh_ttl_days: 1,
            },
            bcrypt_cost: 4, // bcrypt minimum
            cors_origins: vec![],
            import_legacy_reviews: false,
        }
    }
}
