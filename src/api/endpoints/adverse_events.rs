//! Adverse event endpoints.
//!
//! - `POST /api/adverse-events`: report a new event
//! - `PUT /api/adverse-events/:id`: edit the reported fields
//! - `GET /api/adverse-events/:id/causality`: prefilled assessment form
//! - `POST /api/adverse-events/:id/causality`: record an assessment

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use crate::analysis::adverse_events::{
    apply_causality, edit_event, report_event, AdverseEvent, AdverseEventForm,
    CausalityAssessment,
};
use crate::analysis::AdverseEventScreen;
use crate::api::error::ApiError;
use crate::core_state::CoreState;

const LABEL: &str = "Adverse event";

pub async fn report(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<AdverseEventForm>,
) -> Result<Json<AdverseEvent>, ApiError> {
    let event = core.mutate::<AdverseEventScreen, _, ApiError>(LABEL, |events, ctx, _| {
        Ok(report_event(events, ctx, form, Utc::now())?)
    })?;
    Ok(Json(event))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<AdverseEventForm>,
) -> Result<Json<AdverseEvent>, ApiError> {
    let event = core.mutate::<AdverseEventScreen, _, ApiError>(LABEL, |events, ctx, _| {
        Ok(edit_event(events, ctx, &id, form, Utc::now())?)
    })?;
    Ok(Json(event))
}

/// The assessment form as it opens: existing score spread over the criteria.
pub async fn causality_form(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<CausalityAssessment>, ApiError> {
    let events = core.records::<AdverseEventScreen>()?;
    let event = events
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("Adverse event {id} not found")))?;
    Ok(Json(CausalityAssessment::prefill(event)))
}

pub async fn assess(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(assessment): Json<CausalityAssessment>,
) -> Result<Json<AdverseEvent>, ApiError> {
    let event = core.mutate::<AdverseEventScreen, _, ApiError>(LABEL, |events, ctx, _| {
        Ok(apply_causality(events, ctx, &id, &assessment, Utc::now())?)
    })?;
    Ok(Json(event))
}
