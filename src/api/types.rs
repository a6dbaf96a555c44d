//! Request and response bodies shared by the endpoint handlers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::notify::Notification;
use crate::pipeline::{Page, PageRequest};

/// `POST /api/screens/:screen/query` body. Both parts are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(bound(deserialize = "F: DeserializeOwned + Default"))]
pub struct QueryRequest<F> {
    #[serde(default)]
    pub filter: F,
    #[serde(default)]
    pub page: PageRequest,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse<R, S> {
    pub page: Page<R>,
    pub stats: S,
}

/// `GET /api/screens/:screen/export` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    /// Filter as a JSON object, same shape as the query body's `filter`.
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoticeResponse {
    pub notice: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

/// `GET /api/status`: busy indicator plus live notices.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub loading: bool,
    pub in_flight: Vec<String>,
    pub notifications: Vec<Notification>,
}
