use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// A registered account from the `users` table. `id` is the ownership key for posts.
/// The bcrypt hash is loaded for credential checks but never serialised.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
}

/// GeoKind
///
/// The only geometry this service stores. Serialised as the GeoJSON `"Point"` tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub enum GeoKind {
    #[default]
    Point,
}

/// Geolocation
///
/// GeoJSON-style point: `{ "type": "Point", "coordinates": [lon, lat] }`.
/// Persisted as a JSONB document alongside the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Geolocation {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
}

impl Geolocation {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates: [longitude, latitude],
        }
    }
}

/// Post
///
/// A post record from the `posts` table. `created_by` is set once at creation and
/// every read or write against a post is filtered by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_by: Uuid,
    // Stored with default `true`; no operation filters on it.
    pub active: bool,
    #[sqlx(json)]
    pub geolocation: Geolocation,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// LoginRequest
///
/// Input payload for `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// GeolocationPayload
///
/// Unvalidated geolocation as received on the wire. Fields are optional so a
/// malformed point is reported as a validation error rather than a JSON rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GeolocationPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub coordinates: Option<Vec<f64>>,
}

/// PostPayload
///
/// Body of `POST /posts` and `PUT /posts/{id}`. Creation requires every field;
/// an update only touches the fields that are present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeolocationPayload>,
}

/// NewPost
///
/// A validated creation request, ready for the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub geolocation: Geolocation,
}

/// PostChanges
///
/// A validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub geolocation: Option<Geolocation>,
}

impl GeolocationPayload {
    /// Checks the point shape: type `"Point"` and exactly two finite numbers
    /// in longitude/latitude range.
    pub fn validate(self) -> Result<Geolocation, ApiError> {
        match self.kind.as_deref() {
            Some("Point") => {}
            Some(other) => {
                return Err(ApiError::Validation(format!(
                    "geolocation.type: `{other}` is not a valid enum value, expected `Point`"
                )));
            }
            None => {
                return Err(ApiError::Validation(
                    "geolocation.type: Path `type` is required.".to_string(),
                ));
            }
        }

        let coordinates = self.coordinates.ok_or_else(|| {
            ApiError::Validation("geolocation.coordinates: Path `coordinates` is required.".to_string())
        })?;

        let &[longitude, latitude] = coordinates.as_slice() else {
            return Err(ApiError::Validation(format!(
                "geolocation.coordinates: expected [longitude, latitude], got {} values",
                coordinates.len()
            )));
        };

        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::Validation(format!(
                "geolocation.coordinates: longitude {longitude} out of range"
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::Validation(format!(
                "geolocation.coordinates: latitude {latitude} out of range"
            )));
        }

        Ok(Geolocation::point(longitude, latitude))
    }
}

fn required_text(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ApiError::Validation(format!(
            "{field}: Path `{field}` is required."
        ))),
    }
}

impl PostPayload {
    /// Validation for creation: title, body and geolocation are all required.
    pub fn into_new_post(self) -> Result<NewPost, ApiError> {
        let title = required_text("title", self.title)?;
        let body = required_text("body", self.body)?;
        let geolocation = self
            .geolocation
            .ok_or_else(|| {
                ApiError::Validation("geolocation: Path `geolocation` is required.".to_string())
            })?
            .validate()?;

        Ok(NewPost {
            title,
            body,
            geolocation,
        })
    }

    /// Validation for update: absent fields are skipped, present ones must be valid.
    pub fn into_changes(self) -> Result<PostChanges, ApiError> {
        let title = self
            .title
            .map(|t| required_text("title", Some(t)))
            .transpose()?;
        let body = self
            .body
            .map(|b| required_text("body", Some(b)))
            .transpose()?;
        let geolocation = self.geolocation.map(GeolocationPayload::validate).transpose()?;

        Ok(PostChanges {
            title,
            body,
            geolocation,
        })
    }
}

// --- Response Envelopes (Output Schemas) ---

/// UserResponse
///
/// `POST /register` success body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

/// TokenResponse
///
/// `POST /login` success body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// PostResponse
///
/// Success body for create and update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostResponse {
    pub success: bool,
    pub post: Post,
}

/// PostListResponse
///
/// `GET /posts` success body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostListResponse {
    pub success: bool,
    pub posts: Vec<Post>,
}

/// MessageResponse
///
/// Envelope carrying only a human-readable message. Used for delete success
/// and for every JSON error (`success: false`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
