// ============================================================================
// MaskPaint CLI: headless batch overlay export via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskpaint --input slide.tif --mask mask_slide.png --output check.png
//   maskpaint -i scans/*.tif --output-dir overlays/        (masks found beside inputs)
//   maskpaint -i photo.tif --opacity 50 -v
//
// For each input image the matching mask (explicit --mask, else
// `mask_<stem>.png` next to the image, else an empty mask) is composited as
// a red overlay at full resolution and written as PNG, for a quick QA pass
// over finished labels. No GUI is opened in CLI mode.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::ImageFormat;

use crate::canvas::{MaskGrid, composite_overlay};
use crate::io::{self, IoError};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskPaint headless overlay exporter.
///
/// Composite segmentation masks over their source images without opening
/// the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "maskpaint",
    about = "MaskPaint headless mask-overlay exporter",
    long_about = "Blend grayscale segmentation masks over their source images and write\n\
                  the result as PNG, without opening the GUI. Masks are located via\n\
                  --mask, or as mask_<stem>.png beside each input.\n\n\
                  Example:\n  \
                  maskpaint --input slide.tif --mask mask_slide.png --output check.png\n  \
                  maskpaint -i scans/*.tif --output-dir overlays/"
)]
pub struct CliArgs {
    /// Input image file(s). Glob patterns accepted (e.g. "*.tif").
    /// Multi-page TIFF inputs use their first page.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Mask file to overlay. Only valid for single-file input; batch runs
    /// look for `mask_<stem>.png` beside each image instead.
    #[arg(short, long, value_name = "MASK.png")]
    pub mask: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here as `<stem>_overlay.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Overlay opacity in percent (10–100, default 80).
    #[arg(long, default_value_t = 80, value_name = "10-100")]
    pub opacity: u32,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments. Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.mask.is_some() {
        eprintln!(
            "error: --mask only applies to a single input file.\n\
             Batch runs look for mask_<stem>.png beside each image."
        );
        return ExitCode::FAILURE;
    }

    let opacity = args.opacity.clamp(10, 100) as f32 / 100.0;

    let mut failures = 0usize;
    for input in &inputs {
        let started = Instant::now();
        let out_path = output_path_for(input, args.output.as_deref(), args.output_dir.as_deref());
        match export_overlay(input, args.mask.as_deref(), &out_path, opacity) {
            Ok(()) => {
                if args.verbose {
                    println!(
                        "{} -> {} ({} ms)",
                        input.display(),
                        out_path.display(),
                        started.elapsed().as_millis()
                    );
                }
            }
            Err(e) => {
                eprintln!("error: {}: {}", input.display(), e);
                failures += 1;
            }
        }
    }

    if args.verbose {
        println!("{}/{} files succeeded", inputs.len() - failures, inputs.len());
    }
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ============================================================================
// Per-file processing
// ============================================================================

/// Decode one image, locate its mask, composite, and write the PNG.
fn export_overlay(
    image_path: &Path,
    mask_override: Option<&Path>,
    out_path: &Path,
    opacity: f32,
) -> Result<(), IoError> {
    let source = io::decode_image(image_path)?;
    let (w, h) = source.dimensions();

    let mask_path = mask_path_for(image_path, mask_override);
    let mask = if mask_path.is_file() {
        let mut grid = MaskGrid::from_gray(&io::load_mask_gray(&mask_path)?);
        if grid.dimensions() != (w, h) {
            grid = grid.resize_nearest(w, h);
        }
        grid
    } else if mask_override.is_some() {
        // An explicitly named mask that doesn't exist is an error, not an
        // empty overlay.
        return Err(IoError::Decode(format!(
            "mask file not found: {}",
            mask_path.display()
        )));
    } else {
        MaskGrid::new(w, h)
    };

    // Full resolution, no zoom: the overlay aligns pixel-for-pixel with the
    // source.
    let overlay = composite_overlay(&source, &mask, true, opacity, 1.0);
    overlay
        .save_with_format(out_path, ImageFormat::Png)
        .map_err(|e| IoError::Encode(e.to_string()))?;
    Ok(())
}

/// The mask beside an image: `--mask` when given, else `mask_<stem>.png`
/// in the image's directory.
fn mask_path_for(image_path: &Path, mask_override: Option<&Path>) -> PathBuf {
    if let Some(explicit) = mask_override {
        return explicit.to_path_buf();
    }
    let file_name = io::default_mask_filename(image_path);
    match image_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Where the overlay lands: `--output` > `--output-dir/<stem>_overlay.png` >
/// sibling `<stem>_overlay.png`.
fn output_path_for(image_path: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let file_name = format!("{}_overlay.png", stem);
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => match image_path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        },
    }
}

/// Expand glob patterns and literal paths into a concrete file list.
/// Unmatched patterns are reported and skipped.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for pattern in patterns {
        let looks_like_glob = pattern.contains(['*', '?', '[']);
        if looks_like_glob {
            match glob::glob(pattern) {
                Ok(paths) => {
                    let mut any = false;
                    for entry in paths.flatten() {
                        if entry.is_file() {
                            inputs.push(entry);
                            any = true;
                        }
                    }
                    if !any {
                        eprintln!("warning: pattern matched no files: {}", pattern);
                    }
                }
                Err(e) => eprintln!("warning: bad glob pattern {}: {}", pattern, e),
            }
        } else {
            inputs.push(PathBuf::from(pattern));
        }
    }
    inputs
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn mask_path_defaults_to_sibling_mask_file() {
        let p = mask_path_for(Path::new("/data/slide_3.tif"), None);
        assert_eq!(p, PathBuf::from("/data/mask_slide_3.png"));
        let p = mask_path_for(Path::new("/data/slide_3.tif"), Some(Path::new("/tmp/m.png")));
        assert_eq!(p, PathBuf::from("/tmp/m.png"));
    }

    #[test]
    fn output_path_prefers_explicit_then_dir_then_sibling() {
        let img = Path::new("/data/slide.tif");
        assert_eq!(
            output_path_for(img, Some(Path::new("/tmp/x.png")), None),
            PathBuf::from("/tmp/x.png")
        );
        assert_eq!(
            output_path_for(img, None, Some(Path::new("/out"))),
            PathBuf::from("/out/slide_overlay.png")
        );
        assert_eq!(
            output_path_for(img, None, None),
            PathBuf::from("/data/slide_overlay.png")
        );
    }

    #[test]
    fn literal_inputs_pass_through_unglobbed() {
        let inputs = resolve_inputs(&["/data/one.tif".to_string(), "two.png".to_string()]);
        assert_eq!(
            inputs,
            vec![PathBuf::from("/data/one.tif"), PathBuf::from("two.png")]
        );
    }

    #[test]
    fn export_composites_the_sibling_mask() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("tissue.png");
        let mask_path = dir.path().join("mask_tissue.png");
        let out_path = dir.path().join("tissue_overlay.png");

        let img = RgbImage::from_fn(8, 8, |_, _| Rgb([0, 0, 0]));
        img.save_with_format(&img_path, ImageFormat::Png).unwrap();
        let mut mask = MaskGrid::new(8, 8);
        mask.set(2, 2, 255).unwrap();
        io::save_mask_png(&mask, &mask_path).unwrap();

        export_overlay(&img_path, None, &out_path, 1.0).unwrap();
        let overlay = image::open(&out_path).unwrap().to_rgba8();
        assert_eq!(overlay.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(overlay.get_pixel(5, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn export_without_a_mask_writes_the_plain_image() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("plain.png");
        let out_path = dir.path().join("plain_overlay.png");

        let img = RgbImage::from_fn(4, 4, |_, _| Rgb([9, 8, 7]));
        img.save_with_format(&img_path, ImageFormat::Png).unwrap();

        export_overlay(&img_path, None, &out_path, 0.8).unwrap();
        let overlay = image::open(&out_path).unwrap().to_rgba8();
        assert_eq!(overlay.get_pixel(0, 0).0, [9, 8, 7, 255]);
    }

    #[test]
    fn missing_explicit_mask_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("img.png");
        let img = RgbImage::from_fn(2, 2, |_, _| Rgb([1, 1, 1]));
        img.save_with_format(&img_path, ImageFormat::Png).unwrap();

        let err = export_overlay(
            &img_path,
            Some(Path::new("/no/such/mask.png")),
            &dir.path().join("out.png"),
            0.8,
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Decode(_)));
    }
}
