use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::review::{Review, ReviewAggregates};

/// Documento da collection "users"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String, // PRIMARY IDENTIFIER
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>, // bcrypt hash
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub avg_rating: f64,
    #[serde(default)]
    pub total_reviews: i64,
    /// Bumped on every review-list write; guards compare-and-swap updates.
    #[serde(default)]
    pub review_version: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_review_update: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn aggregates(&self) -> ReviewAggregates {
        ReviewAggregates {
            avg_rating: self.avg_rating,
            total_reviews: self.total_reviews,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub locality: String,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub avg_rating: f64,
    pub total_reviews: i64,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        UserProfile {
            id: user.user_id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            gender: user.gender.clone(),
            date_of_birth: user.date_of_birth.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            avg_rating: user.avg_rating,
            total_reviews: user.total_reviews,
        }
    }
}

/// Directory row: profile plus what the viewer may do with it
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_self: bool,
    pub can_review: bool,
}

/// Profile page: user, embedded reviews and aggregates recomputed from them
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProfileWithReviews {
    pub user: UserProfile,
    pub reviews: Vec<Review>,
    pub aggregates: ReviewAggregates,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ScoreboardEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub avg_rating: f64,
    pub total_reviews: i64,
}

#[cfg(test)]
impl UserRecord {
    pub fn sample(user_id: &str, first_name: &str, gender: &str) -> Self {
        UserRecord {
            id: None,
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            password: None,
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            gender: gender.to_string(),
            date_of_birth: Some("01/01/2000".to_string()),
            phone: None,
            address: Address::default(),
            reviews: vec![],
            avg_rating: 0.0,
            total_reviews: 0,
            review_version: 0,
            last_review_update: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_review_fields_default_on_decode() {
        let doc = mongodb::bson::doc! {
            "user_id": "u1",
            "email": "u1@example.com",
            "first_name": "Ana",
            "last_name": "Silva",
            "gender": "female",
            "created_at": 0_i64,
            "updated_at": 0_i64,
        };
        let user: UserRecord = mongodb::bson::from_document(doc).unwrap();
        assert!(user.reviews.is_empty());
        assert_eq!(user.avg_rating, 0.0);
        assert_eq!(user.total_reviews, 0);
        assert_eq!(user.review_version, 0);
    }

    #[test]
    fn test_profile_drops_password() {
        let mut user = UserRecord::sample("u1", "Ana", "female");
        user.password = Some("$2b$04$hash".to_string());
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["id"], "u1");
    }

    #[test]
    fn test_display_name_trims() {
        let mut user = UserRecord::sample("u1", "Ana", "female");
        user.last_name = String::new();
        assert_eq!(user.display_name(), "Ana");
    }
}
