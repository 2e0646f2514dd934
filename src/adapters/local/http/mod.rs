//! HTTP submission API.
//!
//! Thin axum layer over `Submission`: it decodes requests, maps errors to
//! status codes and never touches the store directly.

use crate::application::submission::{
    JobView, Listing, RecordRequest, RegularRecordRequest, Submission,
};
use crate::error::SubmissionError;
use crate::ports::store::JobStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Serialize)]
pub struct Submitted {
    pub keys: Vec<String>,
}

type ApiError = (StatusCode, String);

pub fn router<S: JobStore + 'static>(submission: Arc<Submission<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/records", get(list_jobs::<S>).post(create_record::<S>))
        .route("/regular", post(create_regular::<S>))
        .route("/records/:name", get(job_status::<S>).delete(delete_job::<S>))
        .layer(cors)
        .with_state(submission)
}

fn rejected(err: SubmissionError) -> ApiError {
    let status = match &err {
        SubmissionError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionError::Duplicate(_) => StatusCode::CONFLICT,
        SubmissionError::Store(e) => {
            tracing::error!(error = %e, "store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, err.to_string())
}

async fn create_record<S: JobStore>(
    State(submission): State<Arc<Submission<S>>>,
    Json(request): Json<RecordRequest>,
) -> Result<(StatusCode, Json<Submitted>), ApiError> {
    let keys = submission.submit(request).await.map_err(rejected)?;
    Ok((
        StatusCode::CREATED,
        Json(Submitted {
            keys: keys.iter().map(ToString::to_string).collect(),
        }),
    ))
}

async fn create_regular<S: JobStore>(
    State(submission): State<Arc<Submission<S>>>,
    Json(request): Json<RegularRecordRequest>,
) -> Result<(StatusCode, Json<Submitted>), ApiError> {
    let keys = submission.submit_regular(request).await.map_err(rejected)?;
    Ok((
        StatusCode::CREATED,
        Json(Submitted {
            keys: keys.iter().map(ToString::to_string).collect(),
        }),
    ))
}

async fn list_jobs<S: JobStore>(
    State(submission): State<Arc<Submission<S>>>,
) -> Result<Json<Listing>, ApiError> {
    let listing = submission.list().await.map_err(|e| rejected(e.into()))?;
    Ok(Json(listing))
}

async fn job_status<S: JobStore>(
    State(submission): State<Arc<Submission<S>>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let views = submission
        .status(&name)
        .await
        .map_err(|e| rejected(e.into()))?;
    if views.is_empty() {
        return Err((StatusCode::NOT_FOUND, format!("no job named {}", name)));
    }
    Ok(Json(views))
}

async fn delete_job<S: JobStore>(
    State(submission): State<Arc<Submission<S>>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    match submission.remove(&name).await.map_err(|e| rejected(e.into()))? {
        0 => Err((StatusCode::NOT_FOUND, format!("no job named {}", name))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::memory::MemoryStore;
    use crate::ports::clock::Clock;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 4, 20)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        }
    }

    fn state() -> State<Arc<Submission<MemoryStore>>> {
        State(Arc::new(Submission::new(
            MemoryStore::new(),
            Arc::new(FixedClock),
            30,
        )))
    }

    fn record() -> RecordRequest {
        serde_json::from_value(json!({
            "path": "videos",
            "name": "cam1",
            "rtsp_url": "rtsp://cam1/stream",
            "fpm": 60,
            "config": {},
            "intervals": [{"date_from": "2024-04-20T09:00:00", "date_to": "2024-04-20T09:02:00"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn submit_query_and_delete() {
        let state = state();

        let (status, Json(body)) = create_record(state.clone(), Json(record())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.keys, vec!["videos:cam1:0"]);

        let err = create_record(state.clone(), Json(record())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        let Json(views) = job_status(state.clone(), Path("cam1".into())).await.unwrap();
        assert_eq!(views[0].key, "videos:cam1:0");

        assert_eq!(
            delete_job(state.clone(), Path("cam1".into())).await.unwrap(),
            StatusCode::NO_CONTENT
        );
        let err = job_status(state, Path("cam1".into())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_every_stored_job() {
        let state = state();
        let Json(empty) = list_jobs(state.clone()).await.unwrap();
        assert!(empty.records.is_empty() && empty.regular_records.is_empty());

        create_record(state.clone(), Json(record())).await.unwrap();
        let Json(listing) = list_jobs(state).await.unwrap();
        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.records[0].key, "videos:cam1:0");
        assert!(listing.regular_records.is_empty());
    }

    #[tokio::test]
    async fn invalid_submissions_are_unprocessable() {
        let mut request = record();
        request.base.rtsp_url = "ftp://cam1".into();
        let err = create_record(state(), Json(request)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
