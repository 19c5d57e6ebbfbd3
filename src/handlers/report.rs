//! Report endpoint handlers
//!
//! Both forms hand the raw filter text to the report service; the HTTP
//! status always mirrors the envelope status.

use crate::auth::JwtAuth;
use crate::dto::{ReportQueryParams, ReportResponse};
use crate::error_handling::ReportError;
use axum::{
    extract::{
        rejection::{QueryRejection, StringRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::AppState;

/// `POST /api/v1/report` with the filter object as the request body
pub async fn post_report(
    State(state): State<AppState>,
    JwtAuth { claims }: JwtAuth,
    body: Result<String, StringRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return ReportError::malformed(format!("invalid request body: {}", rejection.body_text()))
                .into_response()
        }
    };

    let response = state
        .report_service
        .get_report(&body, &claims, state.data_source.as_ref())
        .await;
    envelope(response)
}

/// `GET /api/v1/report?filter=<json>`
pub async fn get_report_query(
    State(state): State<AppState>,
    JwtAuth { claims }: JwtAuth,
    params: Result<Query<ReportQueryParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return ReportError::malformed(format!("invalid query string: {}", rejection.body_text()))
                .into_response()
        }
    };

    let response = state
        .report_service
        .get_report(&params.filter, &claims, state.data_source.as_ref())
        .await;
    envelope(response)
}

fn envelope(response: ReportResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
