use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::debug;

use emotion_recognizer::EmotionRecognizer;

#[derive(Clone)]
pub struct AppState {
    recognizer: Arc<EmotionRecognizer>,
    upload_dir: PathBuf,
    static_dir: PathBuf,
}

impl AppState {
    pub fn new(recognizer: EmotionRecognizer, upload_dir: PathBuf, static_dir: PathBuf) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            upload_dir,
            static_dir,
        }
    }

    pub fn recognizer(&self) -> Arc<EmotionRecognizer> {
        Arc::clone(&self.recognizer)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}

/// Writes an upload to a temporary file that is deleted when dropped.
///
/// The client's file extension is kept so the decoder can use it as a
/// format hint.
pub fn stage_upload(
    dir: &Path,
    file_name: Option<&str>,
    bytes: &[u8],
) -> std::io::Result<NamedTempFile> {
    let suffix = file_name
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(OsStr::to_str)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    debug!(path = %file.path().display(), bytes = bytes.len(), "staged upload");
    Ok(file)
}
