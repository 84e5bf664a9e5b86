//! Desktop stand-in for the e-paper panel.
//!
//! Each refresh rewrites a single PNG file with the current frame, which is
//! enough to watch the controller work without hardware attached.

use std::path::{Path, PathBuf};

use image::error::{ParameterError, ParameterErrorKind};
use image::{GrayImage, ImageError, ImageFormat, Luma};
use tracing::debug;

use crate::render::Bitmap;
use crate::traits::EpaperPanel;

/// Panel that writes frames to a PNG file.
///
/// Like a real panel it must be woken with `init()` before it accepts a
/// draw or clear.
#[derive(Debug)]
pub struct PngPanel {
    path: PathBuf,
    width: u32,
    height: u32,
    awake: bool,
}

impl PngPanel {
    /// Creates a `width` x `height` panel writing to `path`.
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            awake: false,
        }
    }

    /// File the frames are written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, image: &GrayImage) -> Result<(), ImageError> {
        if !self.awake {
            return Err(parameter_error(ParameterErrorKind::Generic(
                "panel is asleep".into(),
            )));
        }
        image.save_with_format(&self.path, ImageFormat::Png)?;
        debug!(path = %self.path.display(), "frame written");
        Ok(())
    }
}

impl EpaperPanel for PngPanel {
    type Error = ImageError;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn init(&mut self) -> Result<(), Self::Error> {
        self.awake = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.write(&GrayImage::from_pixel(self.width, self.height, Luma([255])))
    }

    fn draw(&mut self, frame: &Bitmap) -> Result<(), Self::Error> {
        if (frame.width(), frame.height()) != (self.width, self.height) {
            return Err(parameter_error(ParameterErrorKind::DimensionMismatch));
        }
        self.write(&frame.to_luma())
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        self.awake = false;
        Ok(())
    }
}

fn parameter_error(kind: ParameterErrorKind) -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(kind))
}
