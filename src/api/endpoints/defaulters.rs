//! `POST /api/defaulters/query`: patients with an overdue next dose.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{QueryRequest, QueryResponse};
use crate::core_state::CoreState;
use crate::defaulters::{self, Defaulter, DefaulterFilter, DefaulterSummary};
use crate::patients::PatientScreen;
use crate::pipeline::{filter_records, paginate};
use crate::vaccinations::VaccinationScreen;

/// Summary counts cover the filtered set.
pub async fn query(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<QueryRequest<DefaulterFilter>>,
) -> Result<Json<QueryResponse<Defaulter, DefaulterSummary>>, ApiError> {
    let patients = core.records::<PatientScreen>()?;
    let doses = core.records::<VaccinationScreen>()?;
    let all = defaulters::find_defaulters(&patients, &doses, core.today());
    let filtered = filter_records(&all, &request.filter);
    Ok(Json(QueryResponse {
        stats: defaulters::summary(&filtered),
        page: paginate(&filtered, &request.page),
    }))
}
