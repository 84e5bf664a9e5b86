//! Image pipeline from raw payload bytes to a packed 1-bit panel frame.
//!
//! Drawings and QR codes arrive as encoded images of arbitrary size. Before
//! they reach the panel they are:
//!
//! 1. decoded (any format the `image` crate recognises)
//! 2. letterboxed to the panel size, preserving aspect ratio, centred on white
//! 3. rotated 180° because the panel is mounted upside down
//! 4. dithered to black and white and packed 8 pixels per byte
//!
//! ```rust
//! use epaper_frame::render::Renderer;
//!
//! let renderer = Renderer::new(250, 122);
//! let png = {
//!     let img = image::GrayImage::from_pixel(500, 244, image::Luma([0u8]));
//!     let mut out = std::io::Cursor::new(Vec::new());
//!     img.write_to(&mut out, image::ImageFormat::Png).unwrap();
//!     out.into_inner()
//! };
//!
//! let frame = renderer.render(&png).unwrap();
//! assert_eq!((frame.width(), frame.height()), (250, 122));
//! assert!(frame.is_black(0, 0));
//! ```

use image::imageops::{self, BiLevel, FilterType};
use image::{DynamicImage, GrayImage, Luma};

use crate::error::DisplayError;

const WHITE: Luma<u8> = Luma([255]);

/// Packed 1-bit frame, rows padded to whole bytes, most significant bit first.
///
/// A set bit is a white pixel, matching what e-paper controllers expect in
/// their RAM, so an all-`0xFF` buffer is a blank panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Creates an all-white frame.
    pub fn white(width: u32, height: u32) -> Self {
        let len = Self::row_bytes(width) * height as usize;
        Self {
            width,
            height,
            data: vec![0xFF; len],
        }
    }

    /// Packs a grayscale image, treating anything below mid-gray as black.
    pub fn from_luma(image: &GrayImage) -> Self {
        let mut bitmap = Self::white(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0[0] < 128 {
                bitmap.set_black(x, y);
            }
        }
        bitmap
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw packed bytes, `ceil(width / 8)` per row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if the pixel at `(x, y)` is black.
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        let (index, mask) = self.locate(x, y);
        self.data[index] & mask == 0
    }

    /// Expands the frame back to an 8-bit grayscale image.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.is_black(x, y) {
                Luma([0])
            } else {
                WHITE
            }
        })
    }

    fn set_black(&mut self, x: u32, y: u32) {
        let (index, mask) = self.locate(x, y);
        self.data[index] &= !mask;
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let index = y as usize * Self::row_bytes(self.width) + (x / 8) as usize;
        (index, 0x80 >> (x % 8))
    }

    fn row_bytes(width: u32) -> usize {
        width.div_ceil(8) as usize
    }
}

/// Turns encoded image bytes into frames for a panel of a fixed size.
#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    width: u32,
    height: u32,
}

impl Renderer {
    /// Creates a renderer for a `width` x `height` panel.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Decodes `bytes` and produces a frame ready for [`EpaperPanel::draw`].
    ///
    /// [`EpaperPanel::draw`]: crate::traits::EpaperPanel::draw
    pub fn render(&self, bytes: &[u8]) -> Result<Bitmap, DisplayError> {
        let decoded = image::load_from_memory(bytes)?;
        let mut frame = imageops::rotate180(&self.letterbox(&decoded));
        imageops::dither(&mut frame, &BiLevel);
        Ok(Bitmap::from_luma(&frame))
    }

    /// Scales `image` to fit the panel and centres it on a white background.
    ///
    /// The scale factor is chosen from the height first and only falls back
    /// to the width when the height-based result would be too wide. Images
    /// already at panel size pass through untouched.
    pub fn letterbox(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        if gray.width() == self.width && gray.height() == self.height {
            return gray;
        }

        let (src_w, src_h) = (gray.width().max(1) as f64, gray.height().max(1) as f64);
        let mut scale = self.height as f64 / src_h;
        if (src_w * scale).trunc() > self.width as f64 {
            scale = self.width as f64 / src_w;
        }
        let new_w = ((src_w * scale).trunc() as u32).clamp(1, self.width);
        let new_h = ((src_h * scale).trunc() as u32).clamp(1, self.height);

        let scaled = imageops::resize(&gray, new_w, new_h, FilterType::Triangle);
        if new_w == self.width && new_h == self.height {
            return scaled;
        }

        let mut canvas = GrayImage::from_pixel(self.width, self.height, WHITE);
        let x = (self.width - new_w) / 2;
        let y = (self.height - new_h) / 2;
        imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(image: &GrayImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn white_bitmap_is_all_ones() {
        let bitmap = Bitmap::white(250, 122);
        // 250 px -> 32 bytes per row
        assert_eq!(bitmap.data().len(), 32 * 122);
        assert!(bitmap.data().iter().all(|b| *b == 0xFF));
        assert!(!bitmap.is_black(249, 121));
    }

    #[test]
    fn from_luma_packs_msb_first() {
        let mut image = GrayImage::from_pixel(10, 2, WHITE);
        image.put_pixel(0, 0, Luma([0]));
        image.put_pixel(9, 1, Luma([0]));

        let bitmap = Bitmap::from_luma(&image);
        assert_eq!(bitmap.data(), &[0x7F, 0xFF, 0xFF, 0xBF]);
        assert!(bitmap.is_black(0, 0));
        assert!(bitmap.is_black(9, 1));
        assert!(!bitmap.is_black(1, 0));
    }

    #[test]
    fn to_luma_round_trips_pixels() {
        let mut image = GrayImage::from_pixel(16, 4, WHITE);
        image.put_pixel(3, 2, Luma([0]));
        let back = Bitmap::from_luma(&image).to_luma();
        assert_eq!(back, image);
    }

    #[test]
    fn letterbox_keeps_exact_size() {
        let renderer = Renderer::new(250, 122);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(250, 122, Luma([0])));
        let boxed = renderer.letterbox(&image);
        assert_eq!(boxed.dimensions(), (250, 122));
        assert_eq!(boxed.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn letterbox_square_image_pads_sides() {
        let renderer = Renderer::new(250, 122);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, Luma([0])));
        let boxed = renderer.letterbox(&image);

        assert_eq!(boxed.dimensions(), (250, 122));
        // 122x122 centred: columns 64..186 are content
        assert_eq!(boxed.get_pixel(0, 61).0[0], 255);
        assert_eq!(boxed.get_pixel(249, 61).0[0], 255);
        assert_eq!(boxed.get_pixel(125, 61).0[0], 0);
    }

    #[test]
    fn letterbox_wide_image_falls_back_to_width() {
        let renderer = Renderer::new(250, 122);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(1000, 100, Luma([0])));
        let boxed = renderer.letterbox(&image);

        // Scaled to 250x25, centred vertically
        assert_eq!(boxed.get_pixel(125, 0).0[0], 255);
        assert_eq!(boxed.get_pixel(125, 61).0[0], 0);
        assert_eq!(boxed.get_pixel(125, 121).0[0], 255);
    }

    #[test]
    fn render_rotates_upside_down() {
        let renderer = Renderer::new(16, 8);
        let mut image = GrayImage::from_pixel(16, 8, WHITE);
        for y in 0..4 {
            for x in 0..8 {
                image.put_pixel(x, y, Luma([0]));
            }
        }

        let frame = renderer.render(&encode_png(&image)).unwrap();
        // Top-left block ends up bottom-right
        assert!(frame.is_black(15, 7));
        assert!(frame.is_black(8, 4));
        assert!(!frame.is_black(0, 0));
    }

    #[test]
    fn render_rejects_garbage() {
        let renderer = Renderer::new(250, 122);
        let result = renderer.render(b"definitely not an image");
        assert!(matches!(result, Err(DisplayError::Decode(_))));
    }
}
