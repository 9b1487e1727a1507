//! Operator preview window with the recognition overlay.

use crate::recognition::Sighting;
use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use minifb::{Key, Window, WindowOptions};
use rollcall_hw::Frame;
use std::convert::Infallible;

const BOX_COLOR: Rgb888 = Rgb888::new(0, 200, 0);
const TEXT_COLOR: Rgb888 = Rgb888::new(255, 255, 255);
const STROKE_WIDTH: u32 = 2;
const LABEL_STRIP_HEIGHT: u32 = 24;
const UNKNOWN_LABEL: &str = "Unknown";

/// The preview window, sized to the camera frame.
pub struct Preview {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Preview {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, minifb::Error> {
        let (width, height) = (width as usize, height as usize);
        let mut window = Window::new(title, width, height, WindowOptions::default())?;
        // Cap the refresh rate; the camera dictates the actual pace.
        window.limit_update_rate(Some(std::time::Duration::from_micros(16_600)));
        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    /// True while the window is open and the operator has not quit.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
            && !self.window.is_key_down(Key::Q)
            && !self.window.is_key_down(Key::Escape)
    }

    /// Draw the frame with its overlay and refresh the window.
    pub fn present(&mut self, frame: &Frame, sightings: &[Sighting]) -> Result<(), minifb::Error> {
        let mut rgb = frame.rgb.clone();
        draw_overlay(&mut rgb, frame.width, frame.height, sightings);

        for (slot, px) in self.buffer.iter_mut().zip(rgb.chunks_exact(3)) {
            *slot = u32::from_be_bytes([0, px[0], px[1], px[2]]);
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
    }
}

/// Draw a stroked box, a filled label strip along its bottom edge, and the
/// resolved name for every sighting. Pixels outside the frame are clipped.
fn draw_overlay(rgb: &mut [u8], width: u32, height: u32, sightings: &[Sighting]) {
    let mut canvas = Canvas { rgb, width, height };
    let text_style = MonoTextStyle::new(&FONT_10X20, TEXT_COLOR);

    for sighting in sightings {
        let face = &sighting.face;
        let (x, y) = (face.x.round() as i32, face.y.round() as i32);
        let w = face.width.round().max(0.0) as u32;
        let h = face.height.round().max(0.0) as u32;
        let bottom = y + h as i32;

        let outline = Rectangle::new(Point::new(x, y), Size::new(w, h));
        discharge(
            outline
                .into_styled(PrimitiveStyle::with_stroke(BOX_COLOR, STROKE_WIDTH))
                .draw(&mut canvas),
        );

        let strip = Rectangle::new(
            Point::new(x, bottom - LABEL_STRIP_HEIGHT as i32),
            Size::new(w, LABEL_STRIP_HEIGHT),
        );
        discharge(
            strip
                .into_styled(PrimitiveStyle::with_fill(BOX_COLOR))
                .draw(&mut canvas),
        );

        let label = sighting.name.as_deref().unwrap_or(UNKNOWN_LABEL);
        discharge(Text::new(label, Point::new(x + 6, bottom - 6), text_style).draw(&mut canvas));
    }
}

/// Drawing on the in-memory canvas cannot fail.
fn discharge<T>(result: Result<T, Infallible>) {
    match result {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// DrawTarget over a packed RGB8 buffer, clipping at the frame bounds.
struct Canvas<'a> {
    rgb: &'a mut [u8],
    width: u32,
    height: u32,
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x >= self.width || y >= self.height {
                continue;
            }
            let i = ((y * self.width + x) * 3) as usize;
            self.rgb[i] = color.r();
            self.rgb[i + 1] = color.g();
            self.rgb[i + 2] = color.b();
        }
        Ok(())
    }
}
