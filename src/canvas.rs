use std::fmt;

use image::{RgbImage, RgbaImage, GrayImage, imageops};
use rayon::prelude::*;

// ============================================================================
// MASK GRID – full-resolution 8-bit mask raster
// ============================================================================

/// Error for a grid access outside `[0,width)×[0,height)`.
///
/// Engine code bounds-checks coordinates *before* touching the grid, so this
/// is an internal invariant check; it must never surface to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid access ({}, {}) outside {}×{}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl std::error::Error for OutOfBounds {}

/// A rectangular grid of 8-bit mask intensities, row-major, sized to the
/// *original* (undownscaled) image. Tools only ever write 0 (unmarked) or
/// 255 (marked); intermediate values from externally-authored masks are
/// preserved until touched.
///
/// `Clone` is the snapshot primitive: a clone is a deep copy that shares no
/// storage with the source, which is what undo correctness depends on.
#[derive(Clone, PartialEq, Eq)]
pub struct MaskGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MaskGrid {
    /// Create a grid of the given dimensions, zero-filled (all unmarked).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when (x, y) lies inside the grid.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Result<u8, OutOfBounds> {
        if !self.contains(x, y) {
            return Err(self.oob(x, y));
        }
        Ok(self.data[y as usize * self.width as usize + x as usize])
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) -> Result<(), OutOfBounds> {
        if !self.contains(x, y) {
            return Err(self.oob(x, y));
        }
        self.data[y as usize * self.width as usize + x as usize] = value;
        Ok(())
    }

    /// Unchecked-by-contract write for rasterizer inner loops whose ranges
    /// are already clamped to the grid.
    pub(crate) fn put(&mut self, x: u32, y: u32, value: u8) {
        debug_assert!(self.contains(x, y));
        self.data[y as usize * self.width as usize + x as usize] = value;
    }

    /// Unchecked-by-contract read, same contract as [`MaskGrid::put`].
    pub(crate) fn value(&self, x: u32, y: u32) -> u8 {
        debug_assert!(self.contains(x, y));
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set every cell to `value`.
    pub fn fill_all(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Nearest-neighbor resample into a new grid. Integer index math
    /// (`src = dst * src_len / dst_len`), so upscaling by 2 duplicates each
    /// source cell into a 2×2 block and no intermediate values are invented.
    pub fn resize_nearest(&self, new_width: u32, new_height: u32) -> MaskGrid {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }
        let mut out = MaskGrid::new(new_width, new_height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..new_height {
            let sy = (y as u64 * self.height as u64 / new_height as u64) as u32;
            let src_row = sy as usize * self.width as usize;
            let dst_row = y as usize * new_width as usize;
            for x in 0..new_width {
                let sx = (x as u64 * self.width as u64 / new_width as u64) as usize;
                out.data[dst_row + x as usize] = self.data[src_row + sx];
            }
        }
        out
    }

    /// Raw row-major bytes, length `width * height`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Wrap a decoded grayscale image. Dimensions are taken from the image.
    pub fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
        }
    }

    /// Copy out as a grayscale image for encoding.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    fn oob(&self, x: u32, y: u32) -> OutOfBounds {
        OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }
}

impl fmt::Debug for MaskGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

// ============================================================================
// VIEW STATE – independent fit-to-view and user zoom scales
// ============================================================================

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;
pub const MIN_DISPLAY_SIZE: u32 = 400;
pub const MAX_DISPLAY_SIZE: u32 = 1200;
pub const DEFAULT_DISPLAY_SIZE: u32 = 800;

/// Per-session scale factors between view (widget) space and original image
/// space.
///
/// `fit_scale` downsizes large images so the longest edge fits inside
/// `max_display_size` (never upscales). `zoom` is the user-controlled
/// multiplier on top of it. The effective view→image divisor is their
/// product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub max_display_size: u32,
    pub fit_scale: f32,
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            max_display_size: DEFAULT_DISPLAY_SIZE,
            fit_scale: 1.0,
            zoom: 1.0,
        }
    }
}

impl ViewState {
    /// Recompute `fit_scale` for an image of the given dimensions. Called on
    /// image select and whenever `max_display_size` changes.
    pub fn refit(&mut self, image_width: u32, image_height: u32) {
        if image_width == 0 || image_height == 0 {
            self.fit_scale = 1.0;
            return;
        }
        let max = self.max_display_size as f32;
        self.fit_scale = (max / image_width as f32)
            .min(max / image_height as f32)
            .min(1.0);
    }

    /// Effective view→image scale: `fit_scale × zoom`.
    pub fn scale(&self) -> f32 {
        self.fit_scale * self.zoom
    }

    /// Multiply the zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    /// Dimensions of the fit-scaled display image (before user zoom).
    pub fn display_dimensions(&self, image_width: u32, image_height: u32) -> (u32, u32) {
        (
            ((image_width as f32 * self.fit_scale) as u32).max(1),
            ((image_height as f32 * self.fit_scale) as u32).max(1),
        )
    }

    /// Map a view-space point to original-image pixel coordinates.
    ///
    /// The result may legitimately lie outside the grid near image edges at
    /// high zoom; callers bounds-check before writing.
    pub fn to_image_space(&self, view_x: f32, view_y: f32) -> (i64, i64) {
        let s = self.scale();
        if s <= 0.0 {
            return (0, 0);
        }
        ((view_x / s).floor() as i64, (view_y / s).floor() as i64)
    }

    /// Inverse of [`ViewState::to_image_space`]; used only by the renderer
    /// and the shell (painting itself always works in image space).
    pub fn to_view_space(&self, image_x: u32, image_y: u32) -> (f32, f32) {
        let s = self.scale();
        (image_x as f32 * s, image_y as f32 * s)
    }
}

// ============================================================================
// COMPOSITE RENDERER – mask overlay blended over the fit-scaled base image
// ============================================================================

/// Fixed overlay tint for marked pixels. Any nonzero mask value renders
/// fully tinted; intermediate values do not get a gradient.
pub const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];

/// Produce the fit-scaled display copy of the source image (smooth filter,
/// since this is the photo, not the mask).
pub fn make_display_image(source: &RgbImage, view: &ViewState) -> RgbImage {
    let (dw, dh) = view.display_dimensions(source.width(), source.height());
    if (dw, dh) == source.dimensions() {
        return source.clone();
    }
    imageops::resize(source, dw, dh, imageops::FilterType::Lanczos3)
}

/// Blend the mask over the display image and apply the user zoom.
///
/// Two-stage resampling is deliberate: the mask is nearest-resampled to the
/// display resolution (hard edges, no anti-aliasing blur misrepresenting
/// covered pixels), then the composited result is zoom-scaled with a smooth
/// filter.
pub fn composite_overlay(
    display_base: &RgbImage,
    mask: &MaskGrid,
    mask_visible: bool,
    opacity: f32,
    zoom: f32,
) -> RgbaImage {
    let (dw, dh) = display_base.dimensions();

    // Base → RGBA
    let mut out = vec![0u8; dw as usize * dh as usize * 4];
    let src = display_base.as_raw();
    for (dst, s) in out.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
        dst[0] = s[0];
        dst[1] = s[1];
        dst[2] = s[2];
        dst[3] = 255;
    }

    if mask_visible {
        // Stage 1: mask at display resolution, nearest-neighbor.
        let resized;
        let mask_view = if mask.dimensions() == (dw, dh) {
            mask
        } else {
            resized = mask.resize_nearest(dw, dh);
            &resized
        };

        let a = opacity.clamp(0.0, 1.0);
        let [tr, tg, tb] = OVERLAY_COLOR;
        let row_len = dw as usize * 4;
        out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            let y = y as u32;
            for x in 0..dw {
                if mask_view.value(x, y) == 0 {
                    continue;
                }
                let px = &mut row[x as usize * 4..x as usize * 4 + 4];
                px[0] = (px[0] as f32 * (1.0 - a) + tr as f32 * a) as u8;
                px[1] = (px[1] as f32 * (1.0 - a) + tg as f32 * a) as u8;
                px[2] = (px[2] as f32 * (1.0 - a) + tb as f32 * a) as u8;
            }
        });
    }

    let composited = RgbaImage::from_raw(dw, dh, out)
        .unwrap_or_else(|| RgbaImage::new(dw, dh));

    // Stage 2: user zoom with a smooth filter.
    if (zoom - 1.0).abs() < f32::EPSILON {
        return composited;
    }
    let zw = ((dw as f32 * zoom) as u32).max(1);
    let zh = ((dh as f32 * zoom) as u32).max(1);
    imageops::resize(&composited, zw, zh, imageops::FilterType::Lanczos3)
}

// ============================================================================
// TESTS
// ============================================================================
