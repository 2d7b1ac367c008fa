//! Request payloads and their validation into store inputs.
//!
//! Payload fields are optional so a missing field produces one
//! "Missing required fields" message listing all of them, rather than the
//! extractor rejecting the first one it trips over.

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::Role;
use crate::error::ApiError;
use crate::models::{BoardingInput, BoardingType, Id, ServiceInput};

pub const MIN_PHONE_LEN: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Drop markup tags, keeping the text between them.
pub fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.trim().chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            other => out.push(other),
        }
    }
    out.trim().to_string()
}

/// Strip markup tags, then escape what is left for safe HTML embedding.
/// Search terms go through here too so they compare equal to stored text.
pub fn sanitize_text(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn blank_value(v: &Option<Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn require(missing: Vec<&str>) -> Result<(), ApiError> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Missing required fields: {}", missing.join(", "))))
    }
}

fn text(v: &Option<String>) -> String {
    v.as_deref().map(sanitize_text).unwrap_or_default()
}

/// JSON number or numeric string.
fn number(v: &Option<Value>) -> Option<f64> {
    let n = match v.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn non_negative(field: &str, v: &Option<Value>) -> Result<f64, ApiError> {
    number(v).filter(|n| *n >= 0.0).ok_or_else(|| ApiError::Validation(format!("Invalid {field} value")))
}

fn count(field: &str, v: &Option<Value>) -> Result<i32, ApiError> {
    let n = non_negative(field, v)?;
    if n.fract() != 0.0 || n > f64::from(i32::MAX) {
        return Err(ApiError::Validation(format!("Invalid {field} value")));
    }
    Ok(n as i32)
}

/// Positive id from a query string value.
pub fn parse_id(field: &str, raw: Option<&str>) -> Result<Id, ApiError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let raw = raw.ok_or_else(|| ApiError::Validation(format!("{field} is required")))?;
    raw.parse::<Id>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::Validation(format!("Invalid {field}")))
}

/// Positive id from a JSON body value (number or numeric string).
pub fn id_from_value(field: &str, v: &Option<Value>) -> Result<Id, ApiError> {
    match v {
        Some(Value::Number(n)) => n
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::Validation(format!("Invalid {field}"))),
        Some(Value::String(s)) => parse_id(field, Some(s)),
        _ => Err(ApiError::Validation(format!("{field} is required"))),
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BoardingPayload {
    /// Required for updates only.
    #[schema(value_type = Option<i64>)]
    pub id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[schema(value_type = Option<BoardingType>)]
    pub kind: Option<String>,
    pub university: Option<String>,
    pub town: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Value>,
    #[schema(value_type = Option<i32>)]
    pub bedrooms: Option<Value>,
    #[schema(value_type = Option<i32>)]
    pub bathrooms: Option<Value>,
    pub facilities: Option<Vec<String>>,
    pub contact_phone: Option<String>,
}

impl BoardingPayload {
    pub fn validate(&self) -> Result<BoardingInput, ApiError> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("type", &self.kind),
            ("university", &self.university),
            ("town", &self.town),
        ] {
            if blank(value) {
                missing.push(name);
            }
        }
        for (name, value) in [("price", &self.price), ("bedrooms", &self.bedrooms), ("bathrooms", &self.bathrooms)] {
            if blank_value(value) {
                missing.push(name);
            }
        }
        if blank(&self.contact_phone) {
            missing.push("contact_phone");
        }
        require(missing)?;

        let kind = self
            .kind
            .as_deref()
            .unwrap_or_default()
            .parse::<BoardingType>()
            .map_err(|_| ApiError::Validation("Invalid type value".into()))?;
        let price = non_negative("price", &self.price)?;
        let bedrooms = count("bedrooms", &self.bedrooms)?;
        let bathrooms = count("bathrooms", &self.bathrooms)?;
        let contact_phone = text(&self.contact_phone);
        if contact_phone.chars().count() < MIN_PHONE_LEN {
            return Err(ApiError::Validation("Invalid phone number".into()));
        }
        let facilities = self
            .facilities
            .iter()
            .flatten()
            .map(|f| strip_tags(f))
            .filter(|f| !f.is_empty())
            .collect();

        Ok(BoardingInput {
            title: text(&self.title),
            description: text(&self.description),
            kind,
            university: text(&self.university),
            town: text(&self.town),
            price,
            bedrooms,
            bathrooms,
            facilities,
            contact_phone,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ServicePayload {
    /// Required for updates only.
    #[schema(value_type = Option<i64>)]
    pub id: Option<Value>,
    pub service_type: Option<String>,
    pub university: Option<String>,
    pub town: Option<String>,
    pub name: Option<String>,
    pub contact_number: Option<String>,
    pub description: Option<String>,
}

impl ServicePayload {
    pub fn validate(&self) -> Result<ServiceInput, ApiError> {
        let missing = [
            ("service_type", &self.service_type),
            ("university", &self.university),
            ("town", &self.town),
            ("name", &self.name),
            ("contact_number", &self.contact_number),
        ]
        .into_iter()
        .filter(|(_, v)| blank(v))
        .map(|(name, _)| name)
        .collect();
        require(missing)?;
        Ok(ServiceInput {
            service_type: text(&self.service_type),
            university: text(&self.university),
            town: text(&self.town),
            name: text(&self.name),
            contact_number: text(&self.contact_number),
            description: text(&self.description),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RegisterPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[schema(value_type = Option<Role>)]
    pub role: Option<String>,
    pub phone: Option<String>,
}

/// A registration that passed validation; the password is still plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: String,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl RegisterPayload {
    /// `admin_emails` are the addresses allowed to self-register as admin.
    pub fn validate(&self, admin_emails: &[String]) -> Result<Registration, ApiError> {
        let missing = [("name", &self.name), ("email", &self.email), ("password", &self.password), ("role", &self.role)]
            .into_iter()
            .filter(|(_, v)| blank(v))
            .map(|(name, _)| name)
            .collect();
        require(missing)?;

        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ApiError::Validation("Invalid email address".into()));
        }
        let password = self.password.clone().unwrap_or_default();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let role = self
            .role
            .as_deref()
            .unwrap_or_default()
            .parse::<Role>()
            .map_err(|_| ApiError::Validation("Invalid role".into()))?;
        if role == Role::Admin && !admin_emails.iter().any(|a| normalize_email(a) == email) {
            return Err(ApiError::Forbidden("Admin accounts cannot be self-registered".into()));
        }

        Ok(Registration {
            name: text(&self.name),
            email,
            password,
            role,
            phone: text(&self.phone),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    /// Normalized email and the raw password.
    pub fn credentials(&self) -> Result<(String, &str), ApiError> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(e), Some(p)) if !e.trim().is_empty() && !p.is_empty() => Ok((normalize_email(e), p)),
            _ => Err(ApiError::Validation("Email and password are required".into())),
        }
    }
}
