use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use medminder_db::DoseUpdate;
use medminder_types::api::{Claims, UpdateDoseStatusRequest};
use medminder_types::models::{Dose, DoseStatus};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

#[derive(Debug, Deserialize)]
pub struct DoseQuery {
    pub status: Option<DoseStatus>,
}

pub async fn list_doses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<DoseQuery>, QueryRejection>,
) -> Result<Json<Vec<Dose>>, ApiError> {
    let Query(query) = query?;
    let doses = with_db(&state, move |db| db.list_doses(claims.sub, query.status)).await?;
    Ok(Json(doses))
}

pub async fn update_dose(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateDoseStatusRequest>, JsonRejection>,
) -> Result<Json<Dose>, ApiError> {
    let Json(req) = payload?;
    let next = req.status;

    match with_db(&state, move |db| db.update_dose_status(claims.sub, id, next)).await? {
        DoseUpdate::Updated(dose) => {
            info!("Dose {} marked {}", dose.id, dose.status);
            Ok(Json(dose))
        }
        DoseUpdate::NotFound => Err(ApiError::NotFound("Dose")),
        DoseUpdate::Rejected { current } => Err(ApiError::Conflict(format!(
            "Dose is {} and cannot be marked {}",
            current, next
        ))),
    }
}
