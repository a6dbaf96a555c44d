//! Dose schedule endpoints: schedule editing, optimization and
//! scenario simulation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::analysis::dose_schedule::{
    create_schedule, edit_schedule, load_scenarios, optimize, run_simulation, DoseSchedule,
    DoseScheduleFilter, ScenarioForm, ScenarioSimulation, ScheduleForm,
};
use crate::analysis::DoseScheduleScreen;
use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::pipeline::filter_records;

const LABEL: &str = "Schedule";

/// `POST /api/dose-schedules/simulate` body. The scenario runs against the
/// doses of the schedules the filter admits.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulateRequest {
    pub scenario: ScenarioForm,
    pub filter: DoseScheduleFilter,
}

pub async fn create(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<ScheduleForm>,
) -> Result<Json<DoseSchedule>, ApiError> {
    let today = core.today();
    let schedule = core.mutate::<DoseScheduleScreen, _, ApiError>(LABEL, |schedules, ctx, _| {
        Ok(create_schedule(schedules, ctx, form, today)?)
    })?;
    Ok(Json(schedule))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<ScheduleForm>,
) -> Result<Json<DoseSchedule>, ApiError> {
    let schedule = core.mutate::<DoseScheduleScreen, _, ApiError>(LABEL, |schedules, ctx, _| {
        Ok(edit_schedule(schedules, ctx, &id, form)?)
    })?;
    Ok(Json(schedule))
}

/// `POST /api/dose-schedules/:id/optimize`
pub async fn optimize_schedule(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<DoseSchedule>, ApiError> {
    let schedule = core.mutate::<DoseScheduleScreen, _, ApiError>(LABEL, |schedules, ctx, _| {
        Ok(optimize(schedules, ctx, &id)?)
    })?;
    Ok(Json(schedule))
}

pub async fn simulate(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<ScenarioSimulation>, ApiError> {
    let scenario = core.mutate::<DoseScheduleScreen, _, ApiError>(LABEL, |schedules, ctx, _| {
        let filtered = filter_records(schedules.records(), &request.filter);
        Ok(run_simulation(ctx, &request.scenario, &filtered, Utc::now())?)
    })?;
    Ok(Json(scenario))
}

/// `GET /api/dose-schedules/scenarios`: every stored simulation, oldest first.
pub async fn scenarios(
    State(core): State<Arc<CoreState>>,
) -> Result<Json<Vec<ScenarioSimulation>>, ApiError> {
    let scenarios = core.with_conn(|conn| load_scenarios(conn).map_err(ApiError::from))?;
    Ok(Json(scenarios))
}
