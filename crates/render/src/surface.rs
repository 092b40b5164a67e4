use std::error::Error;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use plotters::coord::Shift;
use plotters::prelude::{BitMapBackend, DrawingArea, IntoDrawingArea};
use png::{BitDepth, ColorType, Encoder};
use tracing::trace;

use crate::error::RenderError;

pub type DrawResult = Result<(), Box<dyn Error>>;

/// RGB pixel buffer owned for the duration of one render.
///
/// The buffer is only lent to the bitmap backend inside [`RenderSurface::draw`],
/// so the backend is gone before encoding starts and the pixels are freed
/// when the surface drops, on success and on error alike.
pub struct RenderSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptySurface { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn draw<F>(&mut self, paint: F) -> Result<(), RenderError>
    where
        F: for<'a> FnOnce(&DrawingArea<BitMapBackend<'a>, Shift>) -> DrawResult,
    {
        let size = (self.width, self.height);
        let root = BitMapBackend::with_buffer(&mut self.pixels, size).into_drawing_area();
        paint(&root).map_err(|err| RenderError::Drawing(err.to_string()))?;
        root.present()
            .map_err(|err| RenderError::Drawing(err.to_string()))
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        {
            let mut encoder = Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(ColorType::Rgb);
            encoder.set_depth(BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
        }
        Ok(bytes)
    }

    pub fn to_base64_png(&self) -> Result<String, RenderError> {
        Ok(STANDARD.encode(self.to_png()?))
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        trace!(width = self.width, height = self.height, "released render surface");
    }
}

/// Acquires a surface, paints it and returns the base64 PNG.
pub fn render_base64<F>(width: u32, height: u32, paint: F) -> Result<String, RenderError>
where
    F: for<'a> FnOnce(&DrawingArea<BitMapBackend<'a>, Shift>) -> DrawResult,
{
    let mut surface = RenderSurface::new(width, height)?;
    surface.draw(paint)?;
    surface.to_base64_png()
}
