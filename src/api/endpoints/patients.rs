//! Patient registry endpoints.
//!
//! - `POST /api/patients`: register a patient
//! - `PUT /api/patients/:id`: edit registration details
//! - `GET /api/patients/:id/history`: the patient with every recorded dose

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::patients::{edit_patient, register_patient, Patient, PatientForm, PatientScreen};
use crate::vaccinations::{self, Vaccination, VaccinationScreen};

const LABEL: &str = "Patient";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientHistory {
    pub patient: Patient,
    pub vaccinations: Vec<Vaccination>,
}

pub async fn register(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<PatientForm>,
) -> Result<Json<Patient>, ApiError> {
    let today = core.today();
    let patient = core.mutate::<PatientScreen, _, ApiError>(LABEL, |patients, ctx, _| {
        Ok(register_patient(patients, ctx, form, today, Utc::now())?)
    })?;
    Ok(Json(patient))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<PatientForm>,
) -> Result<Json<Patient>, ApiError> {
    let today = core.today();
    let patient = core.mutate::<PatientScreen, _, ApiError>(LABEL, |patients, ctx, _| {
        Ok(edit_patient(patients, ctx, &id, form, today)?)
    })?;
    Ok(Json(patient))
}

pub async fn history(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<PatientHistory>, ApiError> {
    let patient = core
        .records::<PatientScreen>()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id} not found")))?;
    let doses = core.records::<VaccinationScreen>()?;
    Ok(Json(PatientHistory {
        vaccinations: vaccinations::history(&doses, &patient.id),
        patient,
    }))
}
