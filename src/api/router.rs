//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Every screen gets the same table routes under `/api/screens/<name>`;
//! feature actions sit beside them under their own prefixes.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7). Static
//! segments such as `/dose-schedules/simulate` or `/campaigns/active` win
//! over the `:id` routes beside them.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::activity_log::ActivityLogScreen;
use crate::allocation::AllocationScreen;
use crate::analysis::{
    AdverseEventScreen, CoverageGapScreen, DoseScheduleScreen, GeographicScreen,
    UtilizationScreen,
};
use crate::api::endpoints::{
    adverse_events, allocations, campaigns, defaulters, dose_schedules, health, inventory,
    patients, screens, vaccinations,
};
use crate::campaigns::CampaignScreen;
use crate::core_state::CoreState;
use crate::crud::Record;
use crate::inventory::InventoryScreen;
use crate::patients::PatientScreen;
use crate::pipeline::Screen;
use crate::vaccinations::VaccinationScreen;

type ApiRouter = Router<Arc<CoreState>>;

/// Build the API router with every endpoint under `/api/`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let api = Router::new()
        .route("/health", get(health::check))
        .route("/status", get(health::status))
        .merge(screen_routes::<ActivityLogScreen>())
        .merge(screen_routes::<CoverageGapScreen>())
        .merge(screen_routes::<GeographicScreen>())
        .merge(screen_routes::<UtilizationScreen>())
        .merge(screen_routes::<VaccinationScreen>())
        .merge(editable_screen_routes::<AdverseEventScreen>())
        .merge(editable_screen_routes::<AllocationScreen>())
        .merge(editable_screen_routes::<CampaignScreen>())
        .merge(editable_screen_routes::<DoseScheduleScreen>())
        .merge(editable_screen_routes::<InventoryScreen>())
        .merge(editable_screen_routes::<PatientScreen>())
        .merge(feature_routes());

    Router::new()
        .nest("/api", api)
        .with_state(core)
        .layer(CorsLayer::permissive())
}

/// Query, export, regenerate and insights for one screen.
fn screen_routes<S: Screen + 'static>() -> ApiRouter {
    let base = format!("/screens/{}", S::NAME);
    Router::new()
        .route(&format!("{base}/query"), post(screens::query::<S>))
        .route(&format!("{base}/export"), get(screens::export::<S>))
        .route(&format!("{base}/regenerate"), post(screens::regenerate::<S>))
        .route(&format!("{base}/insights"), get(screens::insights::<S>))
}

/// [`screen_routes`] plus record deletion.
fn editable_screen_routes<S>() -> ApiRouter
where
    S: Screen + 'static,
    S::Record: Record,
{
    let path = format!("/screens/{}/records/:id", S::NAME);
    screen_routes::<S>().route(&path, delete(screens::delete::<S>))
}

fn feature_routes() -> ApiRouter {
    Router::new()
        .route("/adverse-events", post(adverse_events::report))
        .route("/adverse-events/:id", put(adverse_events::edit))
        .route(
            "/adverse-events/:id/causality",
            get(adverse_events::causality_form).post(adverse_events::assess),
        )
        .route("/dose-schedules", post(dose_schedules::create))
        .route("/dose-schedules/:id", put(dose_schedules::edit))
        .route(
            "/dose-schedules/:id/optimize",
            post(dose_schedules::optimize_schedule),
        )
        .route("/dose-schedules/simulate", post(dose_schedules::simulate))
        .route("/dose-schedules/scenarios", get(dose_schedules::scenarios))
        .route("/vaccine-allocations", post(allocations::create))
        .route("/vaccine-allocations/:id", put(allocations::edit))
        .route("/vaccine-allocations/:id/tracking", put(allocations::tracking))
        .route("/vaccine-allocations/:id/approve", post(allocations::approve))
        .route("/vaccine-allocations/:id/cancel", post(allocations::cancel))
        .route("/inventory/batches", post(inventory::create))
        .route("/inventory/batches/:id", put(inventory::edit))
        .route("/inventory/batches/:id/deduct", post(inventory::deduct_batch))
        .route("/inventory/deduct", post(inventory::deduct))
        .route("/inventory/receive", post(inventory::receive))
        .route("/inventory/adjust", post(inventory::adjust))
        .route("/inventory/stock-levels", get(inventory::stock_levels))
        .route("/inventory/expiring", get(inventory::expiring))
        .route("/inventory/expired", get(inventory::expired))
        .route("/inventory/movements", get(inventory::movements))
        .route("/patients", post(patients::register))
        .route("/patients/:id", put(patients::edit))
        .route("/patients/:id/history", get(patients::history))
        .route("/vaccinations", post(vaccinations::record))
        .route("/campaigns", post(campaigns::create))
        .route("/campaigns/active", get(campaigns::active))
        .route("/campaigns/:id", put(campaigns::edit))
        .route("/campaigns/:id/status", post(campaigns::status))
        .route("/defaulters/query", post(defaulters::query))
}
