use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UserProfileSchema {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewRoomSchema {
    /// The room's id, doubling as its slug
    #[validate(length(min = 1, max = 32))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub title: String,
    #[validate(nested)]
    pub host: UserProfileSchema,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRoomSchema {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QueueAddSchema {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    /// A video link or bare video id
    #[validate(length(min = 1, max = 200))]
    pub input: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatSchema {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 500))]
    pub body: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MemberMediaSchema {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaybackSchema {
    pub item_id: Option<String>,
    pub playing: bool,
    #[validate(range(min = 0.0))]
    pub position: f32,
    #[validate(length(min = 1, max = 64))]
    pub updated_by: String,
}

/// A request body that is rejected when it fails validation.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        value
            .validate()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        Ok(Self(value))
    }
}
