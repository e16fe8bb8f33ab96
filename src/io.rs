use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{GrayImage, ImageFormat, RgbImage};

use crate::canvas::MaskGrid;

// ============================================================================
// IO ERRORS
// ============================================================================

/// Error type for image and mask file operations. None of these are fatal:
/// the in-memory mask and history are untouched when an operation fails, so
/// the user can retry.
#[derive(Debug)]
pub enum IoError {
    /// Input image or mask file unreadable / unsupported.
    Decode(String),
    /// Mask could not be written (unwritable path, encoder failure).
    Encode(String),
    Io(std::io::Error),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Decode(e) => write!(f, "decode error: {}", e),
            IoError::Encode(e) => write!(f, "encode error: {}", e),
            IoError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e)
    }
}

impl From<image::ImageError> for IoError {
    fn from(e: image::ImageError) -> Self {
        IoError::Decode(e.to_string())
    }
}

// ============================================================================
// IMAGE DECODING
// ============================================================================

/// Decode a source image to RGB at full resolution.
///
/// TIFF goes through the tiff crate so multi-page stacks decode their first
/// page deterministically (falling back to the generic decoder on failure);
/// everything else goes through `image::open`. RGBA input is normalized to
/// RGB by dropping the alpha channel.
pub fn decode_image(path: &Path) -> Result<RgbImage, IoError> {
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            e == "tif" || e == "tiff"
        })
        .unwrap_or(false);

    if is_tiff {
        match decode_tiff_first_page(path) {
            Ok(img) => return Ok(img),
            Err(IoError::Io(e)) => return Err(IoError::Io(e)),
            Err(_) => {} // odd TIFF variant; let the generic decoder try
        }
    }

    let img = image::open(path).map_err(|e| IoError::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Decode the first page (IFD 0) of a TIFF file to RGB.
fn decode_tiff_first_page(path: &Path) -> Result<RgbImage, IoError> {
    use tiff::ColorType;
    use tiff::decoder::{Decoder, DecodingResult};

    let err_map = |e: tiff::TiffError| IoError::Decode(format!("TIFF decode error: {}", e));

    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(err_map)?;
    let (width, height) = decoder.dimensions().map_err(err_map)?;
    let color_type = decoder.colortype().map_err(err_map)?;
    let result = decoder.read_image().map_err(err_map)?;

    // Normalize to 8-bit samples first.
    let samples: Vec<u8> = match result {
        DecodingResult::U8(data) => data,
        DecodingResult::U16(data) => data.iter().map(|&v| (v >> 8) as u8).collect(),
        _ => {
            return Err(IoError::Decode(
                "unsupported TIFF sample format (expected 8- or 16-bit)".to_string(),
            ));
        }
    };

    let pixel_count = width as usize * height as usize;
    let rgb: Vec<u8> = match color_type {
        ColorType::Gray(_) => {
            if samples.len() < pixel_count {
                return Err(IoError::Decode("TIFF gray buffer too short".to_string()));
            }
            samples[..pixel_count]
                .iter()
                .flat_map(|&v| [v, v, v])
                .collect()
        }
        ColorType::RGB(_) => {
            if samples.len() < pixel_count * 3 {
                return Err(IoError::Decode("TIFF RGB buffer too short".to_string()));
            }
            samples[..pixel_count * 3].to_vec()
        }
        ColorType::RGBA(_) => {
            if samples.len() < pixel_count * 4 {
                return Err(IoError::Decode("TIFF RGBA buffer too short".to_string()));
            }
            // Alpha is dropped, per the decoder contract.
            samples[..pixel_count * 4]
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect()
        }
        other => {
            return Err(IoError::Decode(format!(
                "unsupported TIFF color type: {:?}",
                other
            )));
        }
    };

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| IoError::Decode("TIFF buffer does not match dimensions".to_string()))
}

// ============================================================================
// MASK PERSISTENCE – single-channel 8-bit grayscale PNG
// ============================================================================

/// Write the mask as an 8-bit grayscale PNG at the original image
/// resolution. 0 = unmarked, 255 = marked; intermediate values (from loaded
/// external masks) are written through unchanged.
pub fn save_mask_png(mask: &MaskGrid, path: &Path) -> Result<(), IoError> {
    mask.to_gray()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| IoError::Encode(e.to_string()))
}

/// Decode an externally-authored mask as 8-bit luma. Values are *not*
/// binarized; resampling to the current image dimensions is the caller's
/// job (`MaskGrid::resize_nearest`).
pub fn load_mask_gray(path: &Path) -> Result<GrayImage, IoError> {
    let img = image::open(path).map_err(|e| IoError::Decode(e.to_string()))?;
    Ok(img.to_luma8())
}

/// Default export filename for a source image: `mask_<stem>.png`.
pub fn default_mask_filename(image_path: &Path) -> String {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("mask_{}.png", stem)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};
    use std::path::PathBuf;

    #[test]
    fn default_mask_filename_uses_the_stem() {
        assert_eq!(
            default_mask_filename(&PathBuf::from("/data/scans/slide_01.tif")),
            "mask_slide_01.png"
        );
        assert_eq!(
            default_mask_filename(&PathBuf::from("photo.ome.tiff")),
            "mask_photo.ome.png"
        );
    }

    #[test]
    fn mask_png_round_trip_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");

        let mut mask = MaskGrid::new(16, 9);
        mask.set(0, 0, 255).unwrap();
        mask.set(5, 5, 128).unwrap(); // intermediate value must survive
        mask.set(15, 8, 1).unwrap();

        save_mask_png(&mask, &path).unwrap();
        let loaded = MaskGrid::from_gray(&load_mask_gray(&path).unwrap());
        assert_eq!(loaded, mask);
    }

    #[test]
    fn decode_drops_the_alpha_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");

        let img = RgbaImage::from_fn(4, 4, |x, _| Rgba([x as u8 * 10, 7, 9, 33]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();

        let rgb = decode_image(&path).unwrap();
        assert_eq!(rgb.dimensions(), (4, 4));
        assert_eq!(rgb.get_pixel(3, 0).0, [30, 7, 9]);
    }

    #[test]
    fn decode_reads_the_first_tiff_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.tif");

        let img = RgbImage::from_fn(6, 3, |x, y| Rgb([x as u8, y as u8, 200]));
        img.save_with_format(&path, ImageFormat::Tiff).unwrap();

        let decoded = decode_image(&path).unwrap();
        assert_eq!(decoded.dimensions(), (6, 3));
        assert_eq!(decoded.get_pixel(5, 2).0, [5, 2, 200]);
    }

    #[test]
    fn decode_missing_file_is_an_error() {
        let err = decode_image(Path::new("/no/such/file.tif")).unwrap_err();
        match err {
            IoError::Decode(_) | IoError::Io(_) => {}
            other => panic!("unexpected error variant: {other}"),
        }
    }

    #[test]
    fn save_to_unwritable_path_is_an_encode_error() {
        let mask = MaskGrid::new(2, 2);
        let err = save_mask_png(&mask, Path::new("/no/such/dir/mask.png")).unwrap_err();
        match err {
            IoError::Encode(_) => {}
            other => panic!("unexpected error variant: {other}"),
        }
    }
}
