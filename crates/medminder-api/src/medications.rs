use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use medminder_reminders::SweepReport;
use medminder_types::api::{Claims, CreateMedicationRequest, MessageResponse, UpdateMedicationRequest};
use medminder_types::models::Medication;
use medminder_types::schedule::validate_schedule;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

pub async fn add_medication(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateMedicationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Medication name is required".into()));
    }
    validate_schedule(&req.reminder_times, &req.days_of_week)?;

    let med = Medication {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        name: req.name.trim().to_string(),
        dosage: req.dosage,
        instruction: req.instruction,
        reminder_times: req.reminder_times,
        start_date: req.start_date,
        days_of_week: req.days_of_week,
        notified_today: false,
        created_at: chrono::Utc::now(),
    };

    // Return what was stored, timestamps truncated and all
    let (user_id, id) = (med.user_id, med.id);
    let stored = with_db(&state, move |db| {
        db.insert_medication(&med)?;
        db.get_medication(user_id, id)?
            .ok_or_else(|| anyhow::anyhow!("Medication {} vanished after insert", id))
    })
    .await?;

    info!("User {} added medication {} ({})", user_id, stored.name, stored.id);
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn list_medications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let meds = with_db(&state, move |db| db.list_medications(claims.sub)).await?;
    Ok(Json(meds))
}

pub async fn update_medication(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateMedicationRequest>, JsonRejection>,
) -> Result<Json<Medication>, ApiError> {
    let Json(req) = payload?;
    let user_id = claims.sub;

    let mut med = with_db(&state, move |db| db.get_medication(user_id, id))
        .await?
        .ok_or(ApiError::NotFound("Medication"))?;

    apply_update(&mut med, req)?;

    let updated = med.clone();
    let found = with_db(&state, move |db| db.update_medication(&updated)).await?;
    if !found {
        return Err(ApiError::NotFound("Medication"));
    }
    Ok(Json(med))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = with_db(&state, move |db| db.delete_medication(claims.sub, id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Medication"));
    }
    info!("User {} deleted medication {}", claims.sub, id);
    Ok(Json(MessageResponse {
        message: "Medication deleted successfully".into(),
    }))
}

/// Run a reminder sweep now and report what it did.
pub async fn run_reminders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<SweepReport> {
    info!("Manual reminder sweep requested by {}", claims.sub);
    Json(state.scheduler.trigger_now().await)
}

fn apply_update(med: &mut Medication, req: UpdateMedicationRequest) -> Result<(), ApiError> {
    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("Medication name is required".into()));
        }
        med.name = name.trim().to_string();
    }
    if let Some(dosage) = req.dosage {
        med.dosage = dosage;
    }
    if let Some(instruction) = req.instruction {
        med.instruction = instruction;
    }
    if let Some(times) = req.reminder_times {
        med.reminder_times = times;
    }
    if let Some(start) = req.start_date {
        med.start_date = start;
    }
    if let Some(days) = req.days_of_week {
        med.days_of_week = days;
    }
    validate_schedule(&med.reminder_times, &med.days_of_week)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn med() -> Medication {
        Medication {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Lisinopril".into(),
            dosage: "10mg".into(),
            instruction: "morning".into(),
            reminder_times: vec!["07:30".into()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days_of_week: vec!["Monday".into()],
            notified_today: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let mut m = med();
        apply_update(
            &mut m,
            UpdateMedicationRequest {
                dosage: Some("20mg".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(m.dosage, "20mg");
        assert_eq!(m.name, "Lisinopril");
        assert_eq!(m.reminder_times, vec!["07:30".to_string()]);
    }

    #[test]
    fn update_rejects_bad_schedule() {
        let mut m = med();
        let err = apply_update(
            &mut m,
            UpdateMedicationRequest {
                days_of_week: Some(vec!["Funday".into()]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidSchedule(_)));

        let err = apply_update(
            &mut med(),
            UpdateMedicationRequest {
                reminder_times: Some(Vec::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
