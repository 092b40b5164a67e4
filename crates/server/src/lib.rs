mod handlers;
mod state;

#[cfg(test)]
mod tests;

pub use handlers::{
    build_router, run_http_server, HealthResponse, HttpServerError, AUDIO_FIELD, UPLOAD_LIMIT,
};
pub use state::{stage_upload, AppState};
