use colorgrad::Gradient;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, instrument};

use emotion_audio::MelSpectrogram;

use crate::error::RenderError;
use crate::fonts::FONT_FAMILY;
use crate::surface::{render_base64, DrawResult};

pub const SPECTROGRAM_WIDTH: u32 = 1000;
pub const SPECTROGRAM_HEIGHT: u32 = 400;

const COLORBAR_WIDTH: u32 = 110;
/// Upper bound on drawn time columns; longer clips are decimated.
const MAX_COLUMNS: usize = 880;

fn shade(gradient: &Gradient, t: f64) -> RGBColor {
    let [r, g, b, _] = gradient.at(t.clamp(0.0, 1.0)).to_rgba8();
    RGBColor(r, g, b)
}

/// Renders the mel spectrogram as a 1000x400 heat map with a dB colour bar.
#[instrument(skip_all, fields(bands = spectrogram.n_mels(), frames = spectrogram.n_frames()))]
pub fn render_mel_spectrogram(
    spectrogram: &MelSpectrogram,
    text: bool,
) -> Result<String, RenderError> {
    render_base64(SPECTROGRAM_WIDTH, SPECTROGRAM_HEIGHT, |root| {
        root.fill(&WHITE)?;
        let (plot, bar) = root.split_horizontally((SPECTROGRAM_WIDTH - COLORBAR_WIDTH) as i32);
        let (low, high) = db_range(spectrogram);
        let gradient = colorgrad::magma();
        draw_heatmap(&plot, &gradient, spectrogram, (low, high), text)?;
        draw_colorbar(&bar, &gradient, (low, high), text)
    })
}

fn db_range(spectrogram: &MelSpectrogram) -> (f64, f64) {
    let low = spectrogram.min_db() as f64;
    let high = spectrogram.max_db() as f64;
    if !low.is_finite() || !high.is_finite() {
        return (-80.0, 0.0);
    }
    if high - low < 1e-6 {
        (low - 1.0, high)
    } else {
        (low, high)
    }
}

fn draw_heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    gradient: &Gradient,
    spectrogram: &MelSpectrogram,
    (low, high): (f64, f64),
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let frames = spectrogram.n_frames();
    let bands = spectrogram.n_mels();
    let duration = spectrogram.duration_secs().max(f64::EPSILON);

    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if text {
        builder
            .caption("Mel Spectrogram", (FONT_FAMILY, 22))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(0f64..duration, 0f64..bands as f64)?;

    if text {
        let edges = spectrogram.band_edges_hz();
        let band_to_hz = |band: &f64| {
            let index = (band.round().max(0.0) as usize).min(edges.len().saturating_sub(1));
            format!("{:.0}", edges.get(index).copied().unwrap_or(0.0))
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Time (s)")
            .y_desc("Hz")
            .x_label_formatter(&|t| format!("{t:.1}"))
            .y_label_formatter(&band_to_hz)
            .label_style((FONT_FAMILY, 13))
            .axis_desc_style((FONT_FAMILY, 15))
            .draw()?;
    }

    let columns = frames.min(MAX_COLUMNS).max(1);
    let column_secs = duration / columns as f64;
    let span = (high - low).max(f64::EPSILON);
    let db = &spectrogram.db;
    chart.draw_series((0..columns).flat_map(|column| {
        let frame = (column * frames / columns).min(frames.saturating_sub(1));
        let t0 = column as f64 * column_secs;
        (0..bands).map(move |band| {
            let value = db[[band, frame]] as f64;
            Rectangle::new(
                [(t0, band as f64), (t0 + column_secs, band as f64 + 1.0)],
                shade(gradient, (value - low) / span).filled(),
            )
        })
    }))?;
    debug!(columns, bands, "drew spectrogram cells");
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    gradient: &Gradient,
    (low, high): (f64, f64),
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let mut builder = ChartBuilder::on(area);
    builder.margin_top(42).margin_bottom(50).margin_right(10);
    if text {
        builder.y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(0f64..1f64, low..high)?;
    if text {
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_label_formatter(&|db| format!("{db:+2.0} dB"))
            .label_style((FONT_FAMILY, 13))
            .draw()?;
    }

    const STEPS: usize = 128;
    let step = (high - low) / STEPS as f64;
    chart.draw_series((0..STEPS).map(|index| {
        let y0 = low + index as f64 * step;
        Rectangle::new(
            [(0.0, y0), (1.0, y0 + step)],
            shade(gradient, (index as f64 + 0.5) / STEPS as f64).filled(),
        )
    }))?;
    Ok(())
}
