//! Drawing surface abstraction and the default CPU rasterizer.

use crate::stroke::{PenStyle, Point};
use image::{Rgba, RgbaImage};

/// The low-level raster the recorder paints into.
///
/// Coordinates handed to `paint_stroke` are logical pixels; the
/// implementation applies the transform scale set by `resize_backing`
/// so ink lands on the physical pixel grid at native crispness.
pub trait DrawingSurface {
    fn paint_stroke(&mut self, points: &[Point], style: &PenStyle);
    fn clear(&mut self);
    /// Replace the backing raster. Destroys existing pixels; the
    /// recorder is expected to replay afterwards (or to have been
    /// cleared, for the destructive pad resize).
    fn resize_backing(&mut self, pixel_width: u32, pixel_height: u32, transform_scale: f32);
    fn read_raster(&self) -> RgbaImage;
}

/// CPU implementation stamping round pen dabs along stroke segments.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    raster: RgbaImage,
    transform_scale: f32,
    background: Rgba<u8>,
}

impl RasterSurface {
    pub fn new(pixel_width: u32, pixel_height: u32, transform_scale: f32) -> Self {
        Self::with_background(
            pixel_width,
            pixel_height,
            transform_scale,
            Rgba([0xff, 0xff, 0xff, 0xff]),
        )
    }

    pub fn with_background(
        pixel_width: u32,
        pixel_height: u32,
        transform_scale: f32,
        background: Rgba<u8>,
    ) -> Self {
        Self {
            raster: RgbaImage::from_pixel(pixel_width.max(1), pixel_height.max(1), background),
            transform_scale: transform_scale.max(1.0),
            background,
        }
    }

    pub fn pixel_dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn transform_scale(&self) -> f32 {
        self.transform_scale
    }

    /// Fill a disc centred at (cx, cy) physical pixels.
    fn stamp(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        let (width, height) = self.raster.dimensions();
        let radius = radius.max(0.5);

        let x0 = ((cx - radius).floor().max(0.0)) as i64;
        let y0 = ((cy - radius).floor().max(0.0)) as i64;
        let x1 = ((cx + radius).ceil() as i64).min(width as i64 - 1);
        let y1 = ((cy + radius).ceil() as i64).min(height as i64 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    self.raster.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    /// Stamp dabs along the segment from (ax, ay) to (bx, by), both in
    /// physical pixels, spaced at half the pen radius.
    fn stamp_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, radius: f32, color: Rgba<u8>) {
        let dist = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
        let step = (radius * 0.5).max(0.25);
        let steps = ((dist / step).ceil() as u32).max(1);

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(ax + (bx - ax) * t, ay + (by - ay) * t, radius, color);
        }
    }
}

/// Velocity of the segment in logical px/ms, zero when either point
/// lacks a timestamp.
fn segment_velocity(a: &Point, b: &Point) -> f32 {
    match (a.time, b.time) {
        (Some(ta), Some(tb)) if tb > ta => a.distance_to(b) / (tb - ta) as f32,
        _ => 0.0,
    }
}

impl DrawingSurface for RasterSurface {
    fn paint_stroke(&mut self, points: &[Point], style: &PenStyle) {
        let scale = self.transform_scale;

        match points {
            [] => {}
            [only] => {
                let radius = style.dot_size() / 2.0 * scale;
                self.stamp(only.x * scale, only.y * scale, radius, style.color);
            }
            _ => {
                let mut filtered_velocity = 0.0;
                for pair in points.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    filtered_velocity = style.velocity_filter_weight * segment_velocity(a, b)
                        + (1.0 - style.velocity_filter_weight) * filtered_velocity;
                    let radius = style.width_for_velocity(filtered_velocity) / 2.0 * scale;

                    self.stamp_segment(
                        a.x * scale,
                        a.y * scale,
                        b.x * scale,
                        b.y * scale,
                        radius,
                        style.color,
                    );
                }
            }
        }
    }

    fn clear(&mut self) {
        let background = self.background;
        for pixel in self.raster.pixels_mut() {
            *pixel = background;
        }
    }

    fn resize_backing(&mut self, pixel_width: u32, pixel_height: u32, transform_scale: f32) {
        self.raster =
            RgbaImage::from_pixel(pixel_width.max(1), pixel_height.max(1), self.background);
        self.transform_scale = transform_scale.max(1.0);
    }

    fn read_raster(&self) -> RgbaImage {
        self.raster.clone()
    }
}
