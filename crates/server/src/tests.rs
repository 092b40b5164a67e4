use std::io::Cursor;
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use emotion_audio::FeatureExtractor;
use emotion_domain::LabelEncoder;
use emotion_inference::{FixedClassifier, LoadedModel};
use emotion_recognizer::EmotionRecognizer;
use emotion_render::Visualizer;

use super::*;

const BOUNDARY: &str = "emotion-test-boundary";

fn make_router(upload_dir: &Path, static_dir: &Path) -> Router {
    let encoder = LabelEncoder::new(vec!["neutral".to_string(), "surprised".to_string()])
        .expect("encoder");
    let classifier = FixedClassifier::new(vec![0.25, 0.75]).expecting(40);
    let recognizer = EmotionRecognizer::new(
        FeatureExtractor::new(22_050, 40).expect("extractor"),
        LoadedModel::new(Box::new(classifier), encoder),
        Visualizer::without_text(),
    );
    build_router(AppState::new(
        recognizer,
        upload_dir.to_path_buf(),
        static_dir.to_path_buf(),
    ))
}

fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec).expect("wav writer");
        for n in 0..8_000 {
            let t = n as f32 / 16_000.0;
            let sample = (2.0 * std::f32::consts::PI * 300.0 * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).expect("sample");
        }
        writer.finalize().expect("finalize wav");
    }
    buffer
}

fn multipart_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/predict-emotion")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("upload request")
}

async fn response_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let dirs = tempfile::tempdir().expect("tempdir");
    let (status, json) = response_json(
        make_router(dirs.path(), dirs.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("health request"))
            .await
            .expect("health call"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn upload_is_classified_and_cleaned_up() {
    let uploads = tempfile::tempdir().expect("upload dir");
    let (status, json) = response_json(
        make_router(uploads.path(), uploads.path())
            .oneshot(multipart_request(AUDIO_FIELD, "clip.wav", &wav_bytes()))
            .await
            .expect("predict call"),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {json}");
    assert_eq!(json["emotion"], "surprised");
    assert_eq!(json["probabilities"]["neutral"], 25.0);
    assert!(!json["melSpectrogramBase64"].as_str().unwrap_or_default().is_empty());
    assert!(!json["polarPlotBase64"].as_str().unwrap_or_default().is_empty());
    assert_eq!(std::fs::read_dir(uploads.path()).expect("read uploads").count(), 0);
}

#[tokio::test]
async fn missing_audio_field_is_bad_request() {
    let uploads = tempfile::tempdir().expect("upload dir");
    let (status, json) = response_json(
        make_router(uploads.path(), uploads.path())
            .oneshot(multipart_request("document", "notes.txt", b"hello"))
            .await
            .expect("predict call"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded.");
}

#[tokio::test]
async fn undecodable_upload_is_unprocessable() {
    let uploads = tempfile::tempdir().expect("upload dir");
    let (status, json) = response_json(
        make_router(uploads.path(), uploads.path())
            .oneshot(multipart_request(AUDIO_FIELD, "clip.wav", b"definitely not a wav file"))
            .await
            .expect("predict call"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "feature_extraction");
    assert_eq!(std::fs::read_dir(uploads.path()).expect("read uploads").count(), 0);
}

#[tokio::test]
async fn static_files_are_served() {
    let uploads = tempfile::tempdir().expect("upload dir");
    let assets = tempfile::tempdir().expect("static dir");
    std::fs::write(assets.path().join("index.html"), "<h1>emotion</h1>").expect("write asset");
    let response = make_router(uploads.path(), assets.path())
        .oneshot(
            Request::builder()
                .uri("/static/index.html")
                .body(Body::empty())
                .expect("static request"),
        )
        .await
        .expect("static call");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&bytes[..], b"<h1>emotion</h1>");
}

#[test]
fn staged_upload_keeps_extension_and_is_removed_on_drop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let staged = stage_upload(dir.path(), Some("take 3.FLAC"), b"data").expect("stage");
    let path = staged.path().to_path_buf();
    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("FLAC"));
    assert_eq!(std::fs::read(&path).expect("read staged"), b"data");
    drop(staged);
    assert!(!path.exists());
}

#[test]
fn suspicious_extensions_are_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let staged = stage_upload(dir.path(), Some("clip.w/av"), b"x").expect("stage");
    assert!(staged.path().extension().is_none());
}
