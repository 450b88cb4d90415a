//! `/import` (§6, §4.7 CSV bulk import): kick off an import job and stream
//! its progress over SSE.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportStartedResponse {
    job_id: u64,
}

/// `POST /import/csv`: accepts the raw CSV body and starts an import job,
/// returning immediately with the job id; progress is read from the SSE
/// stream rather than the response body.
async fn start_import(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> Json<ImportStartedResponse> {
    let job_id = state.import_jobs.start(state.db.clone(), body.to_vec());
    Json(ImportStartedResponse { job_id })
}

/// `GET /import/stream`: SSE stream for the most recently started import.
/// There is no job-id parameter — this is a single-operator tool and only
/// one import is ever in flight at a time.
async fn stream_import(State(state): State<Arc<AppState>>) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.import_jobs.subscribe_latest();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        let Some((_job_id, mut rx)) = subscription else {
            return;
        };
        while let Ok(message) = rx.recv().await {
            yield Ok(Event::default().event(message.event_name()).data(message.to_json()));
        }
    };

    Sse::new(stream)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/import/csv", post(start_import))
        .route("/import/stream", get(stream_import))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use revisit_db::Database;
    use tower::ServiceExt;

    #[tokio::test]
    async fn starting_an_import_returns_a_job_id() {
        let db = Database::new_in_memory().await.unwrap();
        let state = AppState::new(db, crate::config::Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            env_tag: "test".into(),
            database_url: None,
            jwt_secret: "secret".into(),
            default_weights: revisit_core::WeightVector::default().into(),
            csv_bundle_path: None,
        });
        let app = router().with_state(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/import/csv")
                    .body(axum::body::Body::from("title,difficulty\nTwo Sum,easy\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
