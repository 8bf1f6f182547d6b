//! Letterbox and pillarbox removal, and fixed aspect-ratio center crops.
//!
//! Border detection works on a whole set of keyframes at once so that every
//! exported image loses the same border: strips at opposite edges are
//! sampled across all images and grown inward while their mean luma stays
//! below [`BORDER_LUMA_THRESHOLD`].

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use image::{DynamicImage, GenericImageView, GrayImage};

use crate::error::KeyshotError;

/// Largest top/bottom border, as a fraction of the image height.
pub const MAX_VERTICAL_BORDER: f64 = 0.25;

/// Largest left/right border, as a fraction of the image width.
pub const MAX_HORIZONTAL_BORDER: f64 = 0.15;

/// Edge strips with a mean luma below this are treated as border.
pub const BORDER_LUMA_THRESHOLD: u64 = 50;

/// A target aspect ratio such as `16:9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    horizontal: u32,
    vertical: u32,
}

impl AspectRatio {
    /// Create an aspect ratio of `horizontal:vertical`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::InvalidAspectRatio`] if either part is zero.
    pub fn new(horizontal: u32, vertical: u32) -> Result<Self, KeyshotError> {
        if horizontal == 0 || vertical == 0 {
            return Err(KeyshotError::InvalidAspectRatio(format!(
                "{horizontal}:{vertical} (both parts must be greater than zero)"
            )));
        }
        Ok(Self {
            horizontal,
            vertical,
        })
    }

    /// Horizontal part.
    pub fn horizontal(&self) -> u32 {
        self.horizontal
    }

    /// Vertical part.
    pub fn vertical(&self) -> u32 {
        self.vertical
    }
}

impl Display for AspectRatio {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.horizontal, self.vertical)
    }
}

impl FromStr for AspectRatio {
    type Err = KeyshotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (horizontal, vertical) = value
            .split_once(':')
            .ok_or_else(|| KeyshotError::InvalidAspectRatio(format!("{value} (expected W:H)")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|error| KeyshotError::InvalidAspectRatio(format!("{value} ({error})")))
        };
        Self::new(parse(horizontal)?, parse(vertical)?)
    }
}

/// Height of the uniform top/bottom border shared by `images`.
///
/// Returns 0 for an empty set or when the images differ in size.
pub fn detect_vertical_border(images: &[DynamicImage]) -> u32 {
    let Some((width, height, lumas)) = uniform_lumas(images) else {
        return 0;
    };
    let limit = (f64::from(height) * MAX_VERTICAL_BORDER) as u32;
    let strip_size = 2 * u64::from(width) * lumas.len() as u64;

    grow_border(limit, strip_size, |i| {
        lumas
            .iter()
            .map(|luma| row_sum(luma, i - 1) + row_sum(luma, height - i))
            .sum()
    })
}

/// Width of the uniform left/right border shared by `images`.
///
/// Returns 0 for an empty set or when the images differ in size.
pub fn detect_horizontal_border(images: &[DynamicImage]) -> u32 {
    let Some((width, height, lumas)) = uniform_lumas(images) else {
        return 0;
    };
    let limit = (f64::from(width) * MAX_HORIZONTAL_BORDER) as u32;
    let strip_size = 2 * u64::from(height) * lumas.len() as u64;

    grow_border(limit, strip_size, |i| {
        lumas
            .iter()
            .map(|luma| column_sum(luma, i - 1) + column_sum(luma, width - i))
            .sum()
    })
}

/// Remove the shared letterbox from every image. Returns the border height.
pub fn crop_borders_vertical(images: &mut [DynamicImage]) -> u32 {
    let border = detect_vertical_border(images);
    if border > 0 {
        log::debug!("Cropping {border}px letterbox from {} image(s)", images.len());
        for image in images.iter_mut() {
            let (width, height) = image.dimensions();
            *image = image.crop_imm(0, border, width, height - 2 * border);
        }
    }
    border
}

/// Remove the shared pillarbox from every image. Returns the border width.
pub fn crop_borders_horizontal(images: &mut [DynamicImage]) -> u32 {
    let border = detect_horizontal_border(images);
    if border > 0 {
        log::debug!("Cropping {border}px pillarbox from {} image(s)", images.len());
        for image in images.iter_mut() {
            let (width, height) = image.dimensions();
            *image = image.crop_imm(border, 0, width - 2 * border, height);
        }
    }
    border
}

/// Center crop to `ratio`, keeping the full width when it fits and the full
/// height otherwise.
pub fn aspect_crop(image: &DynamicImage, ratio: AspectRatio) -> DynamicImage {
    let (width, height) = image.dimensions();
    let horizontal = u64::from(ratio.horizontal);
    let vertical = u64::from(ratio.vertical);

    let fit_height = u64::from(width) * vertical / horizontal;
    let (crop_width, crop_height) = if fit_height <= u64::from(height) {
        (width, fit_height as u32)
    } else {
        ((u64::from(height) * horizontal / vertical) as u32, height)
    };

    image.crop_imm(
        (width - crop_width) / 2,
        (height - crop_height) / 2,
        crop_width,
        crop_height,
    )
}

/// Grow a border while the mean luma of the next strip pair stays dark.
fn grow_border(limit: u32, strip_size: u64, strip_sum: impl Fn(u32) -> u64) -> u32 {
    if strip_size == 0 {
        return 0;
    }
    let mut border = 0;
    for i in 1..=limit {
        if strip_sum(i) / strip_size < BORDER_LUMA_THRESHOLD {
            border = i;
        } else {
            break;
        }
    }
    border
}

fn uniform_lumas(images: &[DynamicImage]) -> Option<(u32, u32, Vec<GrayImage>)> {
    let (width, height) = images.first()?.dimensions();
    if images.iter().any(|image| image.dimensions() != (width, height)) {
        log::warn!("Keyframes differ in size; skipping border detection");
        return None;
    }
    Some((width, height, images.iter().map(DynamicImage::to_luma8).collect()))
}

fn row_sum(luma: &GrayImage, y: u32) -> u64 {
    let width = luma.width() as usize;
    let start = y as usize * width;
    luma.as_raw()[start..start + width]
        .iter()
        .map(|&value| u64::from(value))
        .sum()
}

fn column_sum(luma: &GrayImage, x: u32) -> u64 {
    let width = luma.width() as usize;
    luma.as_raw()
        .iter()
        .skip(x as usize)
        .step_by(width.max(1))
        .map(|&value| u64::from(value))
        .sum()
}
