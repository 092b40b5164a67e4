use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn predict(args: &[&str]) -> (Value, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_predict-emotion"))
        .args(args)
        .env_remove("EMOTION_CONFIG")
        .env_remove("EMOTION_MODEL_PATH")
        .env_remove("EMOTION_LABEL_ENCODER_PATH")
        .output()
        .expect("run predict-emotion");
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let json = serde_json::from_str(&stdout).expect("stdout is one JSON object");
    (json, output.status.success())
}

fn write_tone(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (seconds * spec.sample_rate as f32) as usize;
    for n in 0..total {
        let t = n as f32 / spec.sample_rate as f32;
        let sample = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Dense network that ignores its input and always favours class 1.
fn write_model(dir: &Path) -> (String, String) {
    let weights = vec![vec![0.0f32; 3]; 40];
    let model = serde_json::json!({
        "layers": [{"weights": weights, "bias": [0.1, 2.0, 0.5], "activation": "softmax"}]
    });
    let model_path = dir.join("model.json");
    let encoder_path = dir.join("labels.json");
    std::fs::write(&model_path, model.to_string()).unwrap();
    std::fs::write(&encoder_path, r#"["angry", "happy", "sad"]"#).unwrap();
    (
        model_path.display().to_string(),
        encoder_path.display().to_string(),
    )
}

#[test]
fn no_arguments_prints_error_json() {
    let (json, success) = predict(&[]);
    assert!(success);
    assert_eq!(json["error"], "Audio file path not provided.");
    assert_eq!(json["kind"], "missing_audio_path");
}

#[test]
fn missing_audio_prints_not_found() {
    let (json, success) = predict(&["/no/such/recording.wav"]);
    assert!(success);
    assert!(json["error"].as_str().unwrap().contains("not found"));
    assert_eq!(json["kind"], "audio_not_found");
}

#[test]
fn missing_model_is_reported_after_audio_check() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("clip.wav");
    write_tone(&audio, 0.5);
    let (json, _) = predict(&[
        audio.to_str().unwrap(),
        "--model-path",
        "/no/such/model.json",
    ]);
    assert_eq!(json["kind"], "model_load");
}

#[test]
fn classifies_a_recording() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("clip.wav");
    write_tone(&audio, 1.0);
    let (model, encoder) = write_model(dir.path());

    let (json, success) = predict(&[
        audio.to_str().unwrap(),
        "--model-path",
        &model,
        "--label-encoder-path",
        &encoder,
        "--compact",
    ]);
    assert!(success);
    assert!(json.get("error").is_none(), "unexpected error: {json}");
    assert_eq!(json["emotion"], "happy");

    let probabilities = json["probabilities"].as_object().unwrap();
    let keys: Vec<&str> = probabilities.keys().map(String::as_str).collect();
    assert_eq!(keys, ["angry", "happy", "sad"]);
    let total: f64 = probabilities.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 100.0).abs() < 1e-3);

    for key in ["melSpectrogramBase64", "polarPlotBase64"] {
        assert!(!json[key].as_str().unwrap().is_empty());
    }
}
