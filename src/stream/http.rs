//! HTTP front end: one MJPEG endpoint per camera

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::StreamError;
use crate::pipeline::FrameManager;
use crate::stream::multipart::STREAM_CONTENT_TYPE;
use crate::stream::server::{StreamServer, StreamSettings};
use crate::stream::sink::{ChannelSink, FrameSink};

/// Parts that may queue between a stream server and the socket
const SINK_DEPTH: usize = 1;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<FrameManager>,
    pub settings: StreamSettings,
    pub use_cache: bool,
    /// Parent of every stream's cancellation; cancelled on process shutdown
    pub shutdown: CancellationToken,
}

/// `GET /<camera>` for every configured camera; anything else is 404
pub fn router(state: AppState) -> Router {
    let mut router = Router::new();
    for name in state.manager.camera_names() {
        let camera: Arc<str> = Arc::from(name);
        let handler_state = state.clone();
        router = router.route(
            &format!("/{name}"),
            get(move || stream_camera(handler_state.clone(), camera.clone())),
        );
    }
    router.layer(TraceLayer::new_for_http())
}

async fn stream_camera(state: AppState, camera: Arc<str>) -> Response {
    let shutdown = state.shutdown.child_token();

    let server = if state.use_cache {
        state
            .manager
            .cache(&camera)
            .map(|cache| StreamServer::cached(&*camera, cache.clone(), state.settings.clone(), shutdown))
    } else {
        state
            .manager
            .fetcher(&camera)
            .map(|fetcher| StreamServer::direct(fetcher.clone(), state.settings.clone(), shutdown))
    };

    let Some(server) = server else {
        let err = StreamError::UnknownCamera(camera.to_string());
        return (StatusCode::NOT_FOUND, err.to_string()).into_response();
    };

    let (sink, body) = ChannelSink::new(SINK_DEPTH);
    start_stream(server, sink, Body::from_stream(body))
}

/// Spawn the stream and answer with the multipart response, or a 500 if the sink can't stream
pub(crate) fn start_stream<S>(server: StreamServer, sink: S, body: Body) -> Response
where
    S: FrameSink + 'static,
{
    match server.begin(sink) {
        Ok(stream) => {
            tokio::spawn(stream);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
                    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
                    (header::PRAGMA, "no-cache"),
                    (header::EXPIRES, "0"),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
