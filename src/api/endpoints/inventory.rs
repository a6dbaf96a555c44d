//! Vaccine inventory endpoints.
//!
//! Batch edits go through the generic screen routes for listing and
//! deletion; everything that moves stock lives here and is journalled.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::inventory::{
    self, adjust_stock, create_batch, deduct_for_vaccine, deduct_from_batch, receive_stock,
    update_batch, AdjustForm, BatchForm, Deduction, InventoryScreen, ReceiveForm, StockLevel,
    StockMovement, VaccineBatch,
};

const LABEL: &str = "Vaccine batch";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductRequest {
    pub facility_id: String,
    pub vaccine_name: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeductRequest {
    pub quantity: u32,
}

/// Receipt body: the facility plus the receive form fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveRequest {
    pub facility_id: String,
    #[serde(flatten)]
    pub form: ReceiveForm,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub facility_id: String,
    #[serde(flatten)]
    pub form: AdjustForm,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityQuery {
    pub facility_id: Option<String>,
    pub batch_number: Option<String>,
}

impl FacilityQuery {
    fn require_facility(&self) -> Result<&str, ApiError> {
        self.facility_id
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ApiError::BadRequest("facilityId is required".into()))
    }
}

pub async fn create(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<BatchForm>,
) -> Result<Json<VaccineBatch>, ApiError> {
    let today = core.today();
    let batch = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(create_batch(batches, ctx, form, today, Utc::now())?)
    })?;
    Ok(Json(batch))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<BatchForm>,
) -> Result<Json<VaccineBatch>, ApiError> {
    let batch = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(update_batch(batches, ctx, &id, form)?)
    })?;
    Ok(Json(batch))
}

/// `POST /api/inventory/deduct`: first-expiry-first-out deduction.
pub async fn deduct(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<DeductRequest>,
) -> Result<Json<Deduction>, ApiError> {
    if request.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".into()));
    }
    let today = core.today();
    let deduction = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(deduct_for_vaccine(
            batches,
            ctx,
            &request.facility_id,
            &request.vaccine_name,
            request.quantity,
            today,
        )?)
    })?;
    Ok(Json(deduction))
}

/// `POST /api/inventory/batches/:id/deduct`
pub async fn deduct_batch(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(request): Json<BatchDeductRequest>,
) -> Result<Json<Deduction>, ApiError> {
    if request.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".into()));
    }
    let deduction = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(deduct_from_batch(batches, ctx, &id, request.quantity)?)
    })?;
    Ok(Json(deduction))
}

pub async fn receive(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<ReceiveRequest>,
) -> Result<Json<VaccineBatch>, ApiError> {
    let today = core.today();
    let batch = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(receive_stock(
            batches,
            ctx,
            &request.facility_id,
            request.form,
            today,
            Utc::now(),
        )?)
    })?;
    Ok(Json(batch))
}

pub async fn adjust(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<VaccineBatch>, ApiError> {
    let batch = core.mutate::<InventoryScreen, _, ApiError>(LABEL, |batches, ctx, _| {
        Ok(adjust_stock(batches, ctx, &request.facility_id, request.form)?)
    })?;
    Ok(Json(batch))
}

/// `GET /api/inventory/stock-levels[?facilityId=]`: all facilities when absent.
pub async fn stock_levels(
    State(core): State<Arc<CoreState>>,
    Query(query): Query<FacilityQuery>,
) -> Result<Json<Vec<StockLevel>>, ApiError> {
    let batches = core.records::<InventoryScreen>()?;
    Ok(Json(inventory::stock_levels(
        &batches,
        query.facility_id.as_deref(),
        core.today(),
    )))
}

/// `GET /api/inventory/expiring?facilityId=`
pub async fn expiring(
    State(core): State<Arc<CoreState>>,
    Query(query): Query<FacilityQuery>,
) -> Result<Json<Vec<VaccineBatch>>, ApiError> {
    let facility = query.require_facility()?;
    let batches = core.records::<InventoryScreen>()?;
    let soon: Vec<VaccineBatch> = inventory::expiring_soon(&batches, facility, core.today())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(soon))
}

/// `GET /api/inventory/expired?facilityId=`
pub async fn expired(
    State(core): State<Arc<CoreState>>,
    Query(query): Query<FacilityQuery>,
) -> Result<Json<Vec<VaccineBatch>>, ApiError> {
    let facility = query.require_facility()?;
    let batches = core.records::<InventoryScreen>()?;
    let expired: Vec<VaccineBatch> = inventory::expired_batches(&batches, facility, core.today())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(expired))
}

/// `GET /api/inventory/movements?facilityId=[&batchNumber=]`
pub async fn movements(
    State(core): State<Arc<CoreState>>,
    Query(query): Query<FacilityQuery>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    let facility = query.require_facility()?;
    let movements = core.with_conn(|conn| {
        inventory::list_movements(conn, facility, query.batch_number.as_deref())
            .map_err(ApiError::from)
    })?;
    Ok(Json(movements))
}
