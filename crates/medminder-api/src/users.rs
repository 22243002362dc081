use axum::{Extension, Json, extract::State};

use medminder_types::api::Claims;
use medminder_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user))
}
