//! Generic record-table endpoints, instantiated once per screen.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{CountResponse, ExportParams, NoticeResponse, QueryRequest, QueryResponse};
use crate::core_state::CoreState;
use crate::crud::Record;
use crate::export::{export_records, ExportFormat, ExportOutcome};
use crate::notify::AutoConfirm;
use crate::pipeline::{filter_records, Page, Screen, ScreenState};

/// `POST /api/screens/:screen/query`: filter, summarise and page.
pub async fn query<S: Screen + 'static>(
    State(core): State<Arc<CoreState>>,
    Json(request): Json<QueryRequest<S::Filter>>,
) -> Result<Json<QueryResponse<S::Record, S::Stats>>, ApiError> {
    let mut screen = ScreenState::<S>::new(core.records::<S>()?);
    screen.set_filter(request.filter);
    screen.set_page(request.page);
    let page: Page<S::Record> = screen.page();
    Ok(Json(QueryResponse {
        page,
        stats: screen.stats(core.today()),
    }))
}

/// `GET /api/screens/:screen/export?format=csv|json|pdf&filter={...}`
pub async fn export<S: Screen + 'static>(
    State(core): State<Arc<CoreState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = params
        .format
        .as_deref()
        .unwrap_or("csv")
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}; expected csv, json or pdf")))?;
    let filter: S::Filter = match params.filter.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid filter: {e}")))?,
        _ => S::Filter::default(),
    };

    let filtered = filter_records(&core.records::<S>()?, &filter);
    let stem = S::export_stem(core.today());
    let key = format!("export:{}", S::NAME);

    core.loader.show();
    let outcome = core
        .operations
        .run_delayed(&key, core.settings.simulated_latency, move || {
            export_records(&filtered, format, &stem)
        })
        .await??;

    match outcome {
        ExportOutcome::File(file) => {
            core.notices
                .success(format!("Data exported as {}", format.as_str().to_uppercase()));
            let disposition = format!("attachment; filename=\"{}\"", file.file_name);
            Ok((
                [
                    (header::CONTENT_TYPE, file.content_type.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                file.body,
            )
                .into_response())
        }
        ExportOutcome::Notice(notice) => {
            core.notices.info(notice.clone());
            Ok(Json(NoticeResponse { notice }).into_response())
        }
    }
}

/// `POST /api/screens/:screen/regenerate`: replace the stored set.
pub async fn regenerate<S: Screen + 'static>(
    State(core): State<Arc<CoreState>>,
) -> Result<Json<CountResponse>, ApiError> {
    let key = format!("regenerate:{}", S::NAME);
    let worker = Arc::clone(&core);

    core.loader.show();
    let records = core
        .operations
        .run_delayed(&key, core.settings.simulated_latency, move || {
            worker.regenerate::<S>()
        })
        .await??;

    core.notices.success("Data refreshed successfully");
    Ok(Json(CountResponse {
        count: records.len(),
    }))
}

/// `GET /api/screens/:screen/insights`: secondary tables and charts.
pub async fn insights<S: Screen + 'static>(
    State(core): State<Arc<CoreState>>,
) -> Result<Json<S::Insights>, ApiError> {
    let records = core.records::<S>()?;
    Ok(Json(core.insights::<S>(&records)?))
}

/// `DELETE /api/screens/:screen/records/:id`. The request itself is the
/// confirmation.
pub async fn delete<S>(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<S::Record>, ApiError>
where
    S: Screen + 'static,
    S::Record: Record,
{
    let removed = core.mutate::<S, _, ApiError>(S::LABEL, |records, ctx, _| {
        Ok(records.delete(ctx, &id, &AutoConfirm(true))?)
    })?;
    Ok(Json(removed))
}
