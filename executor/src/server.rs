//! HTTP and WebSocket surface of [`ExecutorService`].
//!
//! - `POST /executor/v1/process_batch`: one request, one response. A request
//!   that cannot be parsed or validated is cancelled with `400 Bad Request`
//!   and an empty body.
//! - `GET /executor/v1/flush_status`: the store's flush status.
//! - `GET /executor/v1/process_batch_stream`: WebSocket carrying one JSON
//!   request per message, answered in order, until the first failure.

use std::future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseCode, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error};

use crate::service::{ExecutorService, ProcessBatchError, StreamTermination};
use crate::wire::{ProcessBatchRequest, ProcessBatchResponse};

pub const PROCESS_BATCH_PATH: &str = "/executor/v1/process_batch";
pub const FLUSH_STATUS_PATH: &str = "/executor/v1/flush_status";
pub const PROCESS_BATCH_STREAM_PATH: &str = "/executor/v1/process_batch_stream";

pub type ParseError = serde_path_to_error::Error<serde_json::Error>;

#[derive(Debug, thiserror::Error)]
enum StreamReadError {
    #[error("transport: {0}")]
    Transport(#[from] axum::Error),
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),
}

pub fn router(service: Arc<ExecutorService>) -> Router {
    Router::new()
        .route(PROCESS_BATCH_PATH, post(process_batch))
        .route(FLUSH_STATUS_PATH, get(flush_status))
        .route(PROCESS_BATCH_STREAM_PATH, get(process_batch_stream))
        .with_state(service)
}

/// Parses a request, reporting the path of the offending field on failure.
pub fn parse_request(body: &[u8]) -> Result<ProcessBatchRequest, ParseError> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de)
}

/// Reports an unknown error tag and stops the process. Answering would
/// risk a caller reading an unmapped failure as success.
pub fn exit_on_integration_defect(e: &ProcessBatchError) -> ! {
    error!("{e}, exiting");
    std::process::exit(1)
}

async fn process_batch(
    State(service): State<Arc<ExecutorService>>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("ProcessBatch() got malformed request: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    match service.process_batch_blocking(request).await {
        Ok(response) => Json(response).into_response(),
        Err(ProcessBatchError::Cancelled(_)) => StatusCode::BAD_REQUEST.into_response(),
        Err(e @ ProcessBatchError::IntegrationDefect(_)) => exit_on_integration_defect(&e),
        Err(e @ ProcessBatchError::Worker(_)) => {
            error!("ProcessBatch() {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn flush_status(State(service): State<Arc<ExecutorService>>) -> impl IntoResponse {
    Json(service.get_flush_status())
}

async fn process_batch_stream(
    State(service): State<Arc<ExecutorService>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, service))
}

async fn handle_websocket(socket: WebSocket, service: Arc<ExecutorService>) {
    let (mut sink, stream) = socket.split();
    let requests = stream
        .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => {
                    Some(parse_request(text.as_bytes()).map_err(StreamReadError::from))
                }
                Ok(Message::Binary(bytes)) => {
                    Some(parse_request(&bytes).map_err(StreamReadError::from))
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_)) => None,
                Err(e) => Some(Err(StreamReadError::from(e))),
            })
        });
    let responses = (&mut sink).with(|response: ProcessBatchResponse| {
        future::ready(
            serde_json::to_string(&response)
                .map(Message::Text)
                .map_err(axum::Error::new),
        )
    });

    let termination = service.process_batch_stream(requests, responses).await;
    if let StreamTermination::ProcessFailed {
        source: e @ ProcessBatchError::IntegrationDefect(_),
        ..
    } = &termination
    {
        exit_on_integration_defect(e)
    }
    let close = Message::Close(Some(CloseFrame {
        code: close_code_for(&termination),
        reason: termination.to_string().into(),
    }));
    if let Err(e) = sink.send(close).await {
        debug!("could not send close frame: {e}");
    }
}

/// Only a stream the peer ended itself closes normally.
fn close_code_for(termination: &StreamTermination) -> CloseCode {
    match termination {
        StreamTermination::Closed { .. } => close_code::NORMAL,
        StreamTermination::ReadFailed { .. }
        | StreamTermination::ProcessFailed { .. }
        | StreamTermination::WriteFailed { .. } => close_code::ERROR,
    }
}
