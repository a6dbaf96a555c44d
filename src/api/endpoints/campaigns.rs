//! Immunization campaign endpoints.
//!
//! - `POST /api/campaigns`: plan a campaign
//! - `PUT /api/campaigns/:id`: edit it
//! - `POST /api/campaigns/:id/status`: start, complete or cancel
//! - `GET /api/campaigns/active[?facilityId=]`: campaigns running today

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::campaigns::{
    self, create_campaign, edit_campaign, set_status, Campaign, CampaignForm, CampaignScreen,
};
use crate::core_state::CoreState;
use crate::models::CampaignStatus;

const LABEL: &str = "Campaign";

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuery {
    pub facility_id: Option<String>,
}

pub async fn create(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<CampaignForm>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = core.mutate::<CampaignScreen, _, ApiError>(LABEL, |campaigns, ctx, _| {
        Ok(create_campaign(campaigns, ctx, form, Utc::now())?)
    })?;
    Ok(Json(campaign))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<CampaignForm>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = core.mutate::<CampaignScreen, _, ApiError>(LABEL, |campaigns, ctx, _| {
        Ok(edit_campaign(campaigns, ctx, &id, form)?)
    })?;
    Ok(Json(campaign))
}

pub async fn status(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = core.mutate::<CampaignScreen, _, ApiError>(LABEL, |campaigns, ctx, _| {
        Ok(set_status(campaigns, ctx, &id, request.status)?)
    })?;
    Ok(Json(campaign))
}

pub async fn active(
    State(core): State<Arc<CoreState>>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let all = core.records::<CampaignScreen>()?;
    let facility = query.facility_id.as_deref().filter(|f| !f.trim().is_empty());
    Ok(Json(campaigns::active_campaigns(&all, facility, core.today())))
}
