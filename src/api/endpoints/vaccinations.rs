//! `POST /api/vaccinations`: record an administered dose.
//!
//! Listing and export go through the generic screen routes.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::api::error::ApiError;
use crate::campaigns::CampaignScreen;
use crate::core_state::CoreState;
use crate::inventory::InventoryScreen;
use crate::patients::PatientScreen;
use crate::vaccinations::{
    record_vaccination, DoseLedger, Vaccination, VaccinationForm, VaccinationScreen,
};

pub async fn record(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<VaccinationForm>,
) -> Result<Json<Vaccination>, ApiError> {
    let vaccination = core.with_workspace::<_, ApiError>(|ws| {
        let patients = ws.collection::<PatientScreen>("Patient")?;
        let mut batches = ws.collection::<InventoryScreen>("Vaccine batch")?;
        let mut campaigns = ws.collection::<CampaignScreen>("Campaign")?;
        let mut vaccinations = ws.collection::<VaccinationScreen>("Vaccination")?;
        let ledger = DoseLedger {
            vaccinations: &mut vaccinations,
            batches: &mut batches,
            campaigns: &mut campaigns,
        };
        Ok(record_vaccination(
            ledger,
            patients.records(),
            &ws.ctx(),
            form,
            Utc::now(),
        )?)
    })?;
    Ok(Json(vaccination))
}
