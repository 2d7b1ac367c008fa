use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

pub type Id = i64;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String, // argon2 PHC string, never leaves the server
    pub role: Role,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: String,
}

/// Admin user listing filter; `None` fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoardingType {
    Room,
    House,
    Shared,
}

impl BoardingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardingType::Room => "room",
            BoardingType::House => "house",
            BoardingType::Shared => "shared",
        }
    }
}

impl fmt::Display for BoardingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown boarding type '{0}'")]
pub struct UnknownBoardingType(pub String);

impl FromStr for BoardingType {
    type Err = UnknownBoardingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "room" => Ok(BoardingType::Room),
            "house" => Ok(BoardingType::House),
            "shared" => Ok(BoardingType::Shared),
            other => Err(UnknownBoardingType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Boarding {
    pub id: Id,
    pub owner_id: Id,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: BoardingType,
    pub university: String,
    pub town: String,
    pub price: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub facilities: Vec<String>,
    pub contact_phone: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated, mutable fields of a boarding listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardingInput {
    pub title: String,
    pub description: String,
    pub kind: BoardingType,
    pub university: String,
    pub town: String,
    pub price: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub facilities: Vec<String>,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardingDetail {
    #[serde(flatten)]
    pub boarding: Boarding,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteBoarding {
    #[serde(flatten)]
    pub boarding: Boarding,
    pub favorited_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OwnerStats {
    pub total_boardings: i64,
    pub total_rooms: i64,
    pub total_income: f64,
    pub total_bathrooms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Service {
    pub id: Id,
    pub provider_id: Id,
    pub service_type: String,
    pub university: String,
    pub town: String,
    pub name: String,
    pub contact_number: String,
    pub description: String,
    pub image: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub provider_name: Option<String>, // joined from users
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInput {
    pub service_type: String,
    pub university: String,
    pub town: String,
    pub name: String,
    pub contact_number: String,
    pub description: String,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedId {
    pub id: Id,
}
