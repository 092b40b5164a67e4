use std::f64::consts::TAU;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::instrument;

use emotion_domain::ProbabilityMap;

use crate::error::RenderError;
use crate::fonts::FONT_FAMILY;
use crate::surface::{render_base64, DrawResult};

pub const POLAR_SIZE: u32 = 800;

const GRID_LEVELS: [f64; 4] = [20.0, 40.0, 60.0, 80.0];
const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const DARK_BLUE: RGBColor = RGBColor(0, 0, 139);
const GRID_GRAY: RGBColor = RGBColor(200, 200, 200);
const LABEL_GRAY: RGBColor = RGBColor(128, 128, 128);

/// Position on the chart for `radius` along the spoke at `angle` radians.
fn polar_point(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.cos(), radius * angle.sin())
}

/// Spoke angles for `count` labels, equally spaced counter-clockwise from 0.
pub fn spoke_angles(count: usize) -> Vec<f64> {
    (0..count).map(|index| TAU * index as f64 / count as f64).collect()
}

/// Closed outline of the probability polygon; the first vertex is repeated
/// at the end.
pub fn outline(probabilities: &ProbabilityMap) -> Vec<(f64, f64)> {
    let angles = spoke_angles(probabilities.len());
    let mut points: Vec<(f64, f64)> = probabilities
        .iter()
        .zip(&angles)
        .map(|((_, value), angle)| polar_point(*angle, value.max(0.0)))
        .collect();
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    points
}

fn circle(radius: f64) -> Vec<(f64, f64)> {
    (0..=120)
        .map(|step| polar_point(TAU * step as f64 / 120.0, radius))
        .collect()
}

/// Renders the per-label percentages as a filled 800x800 radar chart.
#[instrument(skip_all, fields(labels = probabilities.len()))]
pub fn render_polar(probabilities: &ProbabilityMap, text: bool) -> Result<String, RenderError> {
    render_base64(POLAR_SIZE, POLAR_SIZE, |root| draw_polar(root, probabilities, text))
}

fn draw_polar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    probabilities: &ProbabilityMap,
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    area.fill(&WHITE)?;
    // Unnormalized scores may exceed 100 %; widen the chart instead of clipping.
    let outer = probabilities
        .iter()
        .map(|(_, value)| value)
        .fold(100.0f64, f64::max);
    let limit = outer * 1.25;

    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if text {
        builder.caption(
            "Emotion Probabilities",
            (FONT_FAMILY, 26).into_font().color(&DARK_BLUE),
        );
    }
    let mut chart = builder.build_cartesian_2d(-limit..limit, -limit..limit)?;

    let angles = spoke_angles(probabilities.len());
    let grid = GRID_GRAY.stroke_width(1);
    for level in GRID_LEVELS.iter().copied().chain(std::iter::once(outer)) {
        chart.draw_series(std::iter::once(PathElement::new(circle(level), grid)))?;
    }
    chart.draw_series(angles.iter().map(|angle| {
        PathElement::new(vec![(0.0, 0.0), polar_point(*angle, outer)], grid)
    }))?;

    let points = outline(probabilities);
    if !points.is_empty() {
        chart.draw_series(std::iter::once(Polygon::new(
            points.clone(),
            SKY_BLUE.mix(0.4).filled(),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            points,
            BLUE.stroke_width(2),
        )))?;
    }

    if text {
        let centered = Pos::new(HPos::Center, VPos::Center);
        let ring_style = TextStyle::from((FONT_FAMILY, 14).into_font())
            .color(&LABEL_GRAY)
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        // Ring labels sit just off the first spoke, slightly rotated upward.
        chart.draw_series(GRID_LEVELS.iter().map(|level| {
            Text::new(
                format!("{level:.0}%"),
                polar_point(0.12, *level),
                ring_style.clone(),
            )
        }))?;

        let label_style = TextStyle::from((FONT_FAMILY, 18).into_font())
            .color(&DARK_BLUE)
            .pos(centered);
        chart.draw_series(probabilities.labels().zip(&angles).map(|(label, angle)| {
            Text::new(
                label.to_string(),
                polar_point(*angle, outer * 1.12),
                label_style.clone(),
            )
        }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn probabilities() -> ProbabilityMap {
        let mut map = ProbabilityMap::new();
        map.insert("angry", 10.0);
        map.insert("happy", 60.0);
        map.insert("neutral", 20.0);
        map.insert("sad", 10.0);
        map
    }

    #[test]
    fn outline_closes_the_loop() {
        let points = outline(&probabilities());
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], points[4]);
        assert_abs_diff_eq!(points[0].0, 10.0, epsilon = 1e-9);
        // Second label sits a quarter turn counter-clockwise.
        assert_abs_diff_eq!(points[1].0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(points[1].1, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn spokes_are_equally_spaced() {
        let angles = spoke_angles(3);
        assert_abs_diff_eq!(angles[1] - angles[0], TAU / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angles[2] - angles[1], TAU / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn renders_png() {
        let encoded = render_polar(&probabilities(), false).unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn empty_map_renders_grid_only() {
        assert!(outline(&ProbabilityMap::new()).is_empty());
        assert!(render_polar(&ProbabilityMap::new(), false).is_ok());
    }
}
