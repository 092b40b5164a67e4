//! Process-wide TrueType font registration for chart text.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ab_glyph::FontRef;
use plotters::style::{register_font, FontStyle};
use tracing::{debug, info, warn};

/// Family name charts ask plotters for.
pub const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Registers a font under [`FONT_FAMILY`] the first time it is called and
/// reports whether text can be drawn. Later calls return the first outcome,
/// whatever path they pass.
pub fn ensure_font(configured: Option<&Path>) -> bool {
    REGISTERED
        .get_or_init(|| register_first(configured))
        .is_some()
}

/// Font file in use, if any.
pub fn registered_font() -> Option<&'static Path> {
    REGISTERED.get().and_then(|path| path.as_deref())
}

fn register_first(configured: Option<&Path>) -> Option<PathBuf> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from));
    for candidate in candidates {
        let is_configured = Some(candidate.as_path()) == configured;
        let Some(bytes) = load_font(&candidate, is_configured) else {
            continue;
        };
        match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
            Ok(()) => {
                info!(path = %candidate.display(), "registered chart font");
                return Some(candidate);
            }
            Err(_) => debug!(path = %candidate.display(), "plotters rejected font"),
        }
    }
    warn!("no TrueType font found, charts will be rendered without text");
    None
}

/// Reads and parses a font file. Only data that parses is leaked, since
/// plotters keeps registered fonts for the rest of the process.
fn load_font(path: &Path, configured: bool) -> Option<&'static [u8]> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            if configured {
                warn!(path = %path.display(), error = %err, "configured font unreadable");
            }
            return None;
        }
    };
    if let Err(err) = FontRef::try_from_slice(&bytes) {
        if configured {
            warn!(path = %path.display(), error = %err, "configured font is not TrueType");
        } else {
            debug!(path = %path.display(), "not a usable TrueType font");
        }
        return None;
    }
    Some(Box::leak(bytes.into_boxed_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_font_is_rejected_before_registration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"not a font at all").unwrap();
        assert!(load_font(&path, true).is_none());
        assert!(load_font(&dir.path().join("absent.ttf"), false).is_none());
    }

    #[test]
    fn system_font_parses_when_installed() {
        let Some(path) = SYSTEM_FONTS.iter().map(Path::new).find(|path| path.is_file()) else {
            return;
        };
        assert!(load_font(path, false).is_some());
    }
}
