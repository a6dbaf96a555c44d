//! Vaccine allocation endpoints.
//!
//! Approve and cancel take effect on request; the caller has already
//! confirmed by sending it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::allocation::{
    approve_allocation, cancel_allocation, create_allocation, edit_allocation, update_tracking,
    AllocationForm, AllocationScreen, TrackingForm, VaccineAllocation,
};
use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::notify::AutoConfirm;

const LABEL: &str = "Allocation";

pub async fn create(
    State(core): State<Arc<CoreState>>,
    Json(form): Json<AllocationForm>,
) -> Result<Json<VaccineAllocation>, ApiError> {
    let today = core.today();
    let allocation = core.mutate::<AllocationScreen, _, ApiError>(LABEL, |allocations, ctx, _| {
        Ok(create_allocation(allocations, ctx, form, today)?)
    })?;
    Ok(Json(allocation))
}

pub async fn edit(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<AllocationForm>,
) -> Result<Json<VaccineAllocation>, ApiError> {
    let allocation = core.mutate::<AllocationScreen, _, ApiError>(LABEL, |allocations, ctx, _| {
        Ok(edit_allocation(allocations, ctx, &id, form)?)
    })?;
    Ok(Json(allocation))
}

/// `PUT /api/vaccine-allocations/:id/tracking`
pub async fn tracking(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    Json(form): Json<TrackingForm>,
) -> Result<Json<VaccineAllocation>, ApiError> {
    let allocation = core.mutate::<AllocationScreen, _, ApiError>(LABEL, |allocations, ctx, _| {
        Ok(update_tracking(allocations, ctx, &id, form)?)
    })?;
    Ok(Json(allocation))
}

pub async fn approve(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<VaccineAllocation>, ApiError> {
    let allocation =
        core.mutate::<AllocationScreen, _, ApiError>(LABEL, |allocations, ctx, rng| {
            Ok(approve_allocation(allocations, ctx, &id, &AutoConfirm(true), rng)?)
        })?;
    Ok(Json(allocation))
}

pub async fn cancel(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<VaccineAllocation>, ApiError> {
    let allocation = core.mutate::<AllocationScreen, _, ApiError>(LABEL, |allocations, ctx, _| {
        Ok(cancel_allocation(allocations, ctx, &id, &AutoConfirm(true))?)
    })?;
    Ok(Json(allocation))
}
