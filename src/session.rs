use std::fmt;
use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};

use crate::canvas::{self, MaskGrid, ViewState};
use crate::components::history::HistoryManager;
use crate::io::{self, IoError};
use crate::ops::brush;
use crate::ops::fill::{self, FILL_TOLERANCE};

// ============================================================================
// TOOLS & PARAMETERS
// ============================================================================

/// Active painting tool. Brush and Eraser share the stroke rasterizer and
/// differ only in the value they write; Fill is a single atomic click.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Fill,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Fill => "Fill",
        }
    }

    /// Mask value written by stroke tools.
    fn stroke_value(&self) -> u8 {
        match self {
            Tool::Eraser => 0,
            _ => 255,
        }
    }
}

pub const MIN_BRUSH_RADIUS: u32 = 1;
pub const MAX_BRUSH_RADIUS: u32 = 100;
pub const DEFAULT_BRUSH_RADIUS: u32 = 15;

pub const MIN_OPACITY_PCT: u32 = 10;
pub const MAX_OPACITY_PCT: u32 = 100;
pub const DEFAULT_OPACITY_PCT: u32 = 80;

// ============================================================================
// SESSION ERRORS
// ============================================================================

/// Command-level failures surfaced to the shell. Every failure leaves the
/// session (image, mask, history) exactly as it was.
#[derive(Debug)]
pub enum SessionError {
    /// An action that needs a loaded image was invoked with none selected.
    NoImageSelected,
    Io(IoError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoImageSelected => write!(f, "select an image first"),
            SessionError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<IoError> for SessionError {
    fn from(e: IoError) -> Self {
        SessionError::Io(e)
    }
}

// ============================================================================
// MASK EDIT SESSION
// ============================================================================

/// Pointer-gesture state. `Stroking` is only entered by Brush/Eraser
/// pointer-downs; Fill clicks stay in `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum GesturePhase {
    #[default]
    Idle,
    Stroking,
}

/// The decoded source plus its fit-scaled display copy.
struct LoadedImage {
    path: PathBuf,
    source: RgbImage,
    display: RgbImage,
}

/// One image's mask-editing session: the current mask grid, tool parameters,
/// view transform, undo/redo history, and the gesture state machine that
/// dispatches pointer events onto the painting algorithms.
///
/// The shell owns exactly one session and routes every UI event through it;
/// there is no process-wide mutable state. Switching images discards the
/// grid and its history; each image's editing session stands alone.
pub struct MaskEditSession {
    images: Vec<PathBuf>,
    current_index: Option<usize>,
    image: Option<LoadedImage>,
    mask: Option<MaskGrid>,
    history: HistoryManager,

    tool: Tool,
    brush_radius: u32,
    opacity_pct: u32,
    mask_visible: bool,
    view: ViewState,

    phase: GesturePhase,
    /// Last visited image-space position of the active stroke; `None` at
    /// gesture start so the first dab is a lone disk.
    last_stroke_pos: Option<(u32, u32)>,

    /// Composite needs re-rendering (mask, view, or image changed).
    dirty: bool,
}

impl Default for MaskEditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskEditSession {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            current_index: None,
            image: None,
            mask: None,
            history: HistoryManager::new(),
            tool: Tool::Brush,
            brush_radius: DEFAULT_BRUSH_RADIUS,
            opacity_pct: DEFAULT_OPACITY_PCT,
            mask_visible: true,
            view: ViewState::default(),
            phase: GesturePhase::Idle,
            last_stroke_pos: None,
            dirty: false,
        }
    }

    // ---- accessors ---------------------------------------------------------

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image.as_ref().map(|img| img.path.as_path())
    }

    /// Original (undownscaled) image dimensions.
    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.source.dimensions())
    }

    /// Fit-scaled display dimensions (before user zoom).
    pub fn display_dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.display.dimensions())
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn brush_radius(&self) -> u32 {
        self.brush_radius
    }

    pub fn opacity_pct(&self) -> u32 {
        self.opacity_pct
    }

    /// Overlay opacity as a fraction in [0.10, 1.00].
    pub fn opacity(&self) -> f32 {
        self.opacity_pct as f32 / 100.0
    }

    pub fn mask_visible(&self) -> bool {
        self.mask_visible
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn mask(&self) -> Option<&MaskGrid> {
        self.mask.as_ref()
    }

    /// True once after every state change that affects the composite.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Default export filename for the current image (`mask_<stem>.png`).
    pub fn default_mask_filename(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|img| io::default_mask_filename(&img.path))
    }

    // ---- image list commands ----------------------------------------------

    /// Replace the image list and select the first entry. An empty list is a
    /// no-op. On decode failure the previous list and session state stay.
    pub fn load_images(&mut self, paths: Vec<PathBuf>) -> Result<(), SessionError> {
        if paths.is_empty() {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.images, paths);
        match self.select_image(0) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.images = previous;
                Err(e)
            }
        }
    }

    /// Decode and activate the image at `index`. The first TIFF page is
    /// used; RGBA flattens to RGB. A fresh zero mask is allocated, both
    /// history stacks are cleared, and zoom resets, all committed only
    /// after the decode succeeded. An out-of-range index is a no-op.
    pub fn select_image(&mut self, index: usize) -> Result<(), SessionError> {
        let Some(path) = self.images.get(index).cloned() else {
            return Ok(());
        };
        let source = io::decode_image(&path)?;
        self.install_image(index, path, source);
        Ok(())
    }

    fn install_image(&mut self, index: usize, path: PathBuf, source: RgbImage) {
        let (w, h) = source.dimensions();
        self.view.reset_zoom();
        self.view.refit(w, h);
        let display = canvas::make_display_image(&source, &self.view);
        self.image = Some(LoadedImage { path, source, display });
        self.current_index = Some(index);
        self.mask = Some(MaskGrid::new(w, h));
        self.history.clear();
        self.phase = GesturePhase::Idle;
        self.last_stroke_pos = None;
        self.dirty = true;
    }

    // ---- tool & view commands ---------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        // A tool change mid-drag ends the gesture.
        self.phase = GesturePhase::Idle;
        self.last_stroke_pos = None;
    }

    /// Toggle between Brush and Eraser (the `E` shortcut).
    pub fn toggle_eraser(&mut self) {
        let next = if self.tool == Tool::Eraser {
            Tool::Brush
        } else {
            Tool::Eraser
        };
        self.set_tool(next);
    }

    pub fn set_brush_radius(&mut self, px: u32) {
        self.brush_radius = px.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
    }

    pub fn set_opacity_pct(&mut self, pct: u32) {
        self.opacity_pct = pct.clamp(MIN_OPACITY_PCT, MAX_OPACITY_PCT);
        self.dirty = true;
    }

    /// Change the fit-to-view size limit and rebuild the display image.
    /// The mask and history are untouched; only the view changes.
    pub fn set_max_display_size(&mut self, px: u32) {
        self.view.max_display_size = px.clamp(canvas::MIN_DISPLAY_SIZE, canvas::MAX_DISPLAY_SIZE);
        if let Some(img) = &mut self.image {
            let (w, h) = img.source.dimensions();
            self.view.refit(w, h);
            img.display = canvas::make_display_image(&img.source, &self.view);
            self.dirty = true;
        }
    }

    pub fn toggle_mask_visible(&mut self) {
        self.mask_visible = !self.mask_visible;
        self.dirty = true;
    }

    /// Multiply the zoom by `factor`, clamped to [0.1, 5.0].
    pub fn set_zoom(&mut self, factor: f32) {
        self.view.zoom_by(factor);
        self.dirty = true;
    }

    pub fn reset_zoom(&mut self) {
        self.view.reset_zoom();
        self.dirty = true;
    }

    pub fn zoom_percent(&self) -> i32 {
        (self.view.zoom * 100.0).round() as i32
    }

    // ---- history commands --------------------------------------------------

    /// Returns true when a state was restored.
    pub fn undo(&mut self) -> bool {
        let Some(mask) = &self.mask else { return false };
        match self.history.undo(mask) {
            Some(restored) => {
                self.mask = Some(restored);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(mask) = &self.mask else { return false };
        match self.history.redo(mask) {
            Some(restored) => {
                self.mask = Some(restored);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Reset every cell to unmarked, as one undoable gesture.
    pub fn clear_mask(&mut self) {
        let Some(mask) = &mut self.mask else { return };
        self.history.push_undo(mask);
        mask.fill_all(0);
        self.dirty = true;
    }

    // ---- mask persistence commands ----------------------------------------

    pub fn save_mask(&self, path: &Path) -> Result<(), SessionError> {
        let mask = self.mask.as_ref().ok_or(SessionError::NoImageSelected)?;
        io::save_mask_png(mask, path)?;
        Ok(())
    }

    /// Load an externally-authored mask, nearest-resampled to the current
    /// image dimensions when they differ. Intermediate gray values pass
    /// through unbinarized. One undo snapshot is pushed, after the decode
    /// succeeded, so a failed load changes nothing.
    pub fn load_mask(&mut self, path: &Path) -> Result<(), SessionError> {
        let (w, h) = self
            .image_dimensions()
            .ok_or(SessionError::NoImageSelected)?;
        let gray = io::load_mask_gray(path)?;
        let mut incoming = MaskGrid::from_gray(&gray);
        if incoming.dimensions() != (w, h) {
            incoming = incoming.resize_nearest(w, h);
        }
        if let Some(current) = &self.mask {
            self.history.push_undo(current);
        }
        self.mask = Some(incoming);
        self.dirty = true;
        Ok(())
    }

    // ---- pointer gesture state machine ------------------------------------

    /// Map a view-space position into image-space, `None` when no image is
    /// loaded or the point resolves outside the grid.
    fn pointer_to_image(&self, view_x: f32, view_y: f32) -> Option<(u32, u32)> {
        let (w, h) = self.image_dimensions()?;
        let (ix, iy) = self.view.to_image_space(view_x, view_y);
        if ix < 0 || iy < 0 || ix >= w as i64 || iy >= h as i64 {
            return None;
        }
        Some((ix as u32, iy as u32))
    }

    /// Pointer-down. Brush/Eraser: snapshot, enter `Stroking`, one dab at
    /// the down position. Fill: delegates to [`Self::on_fill_click`], never
    /// entering `Stroking`. Out-of-bounds or image-less clicks are silent
    /// no-ops.
    pub fn on_pointer_down(&mut self, view_x: f32, view_y: f32) {
        if self.tool == Tool::Fill {
            self.on_fill_click(view_x, view_y);
            return;
        }
        let Some(pos) = self.pointer_to_image(view_x, view_y) else {
            return;
        };
        let value = self.tool.stroke_value();
        let radius = self.brush_radius;
        let Some(mask) = &mut self.mask else { return };

        self.history.push_undo(mask);
        self.phase = GesturePhase::Stroking;
        self.last_stroke_pos = None;
        brush::stroke_segment(mask, None, pos, radius, value);
        self.last_stroke_pos = Some(pos);
        self.dirty = true;
    }

    /// Pointer-move while `Stroking`: connect the last visited position to
    /// the current one. No additional snapshot: a drag is one gesture.
    /// Positions resolving outside the grid are skipped without updating
    /// the stroke anchor, so the stroke reconnects on re-entry.
    pub fn on_pointer_move(&mut self, view_x: f32, view_y: f32) {
        if self.phase != GesturePhase::Stroking {
            return;
        }
        let Some(pos) = self.pointer_to_image(view_x, view_y) else {
            return;
        };
        let value = self.tool.stroke_value();
        let radius = self.brush_radius;
        let last = self.last_stroke_pos;
        let Some(mask) = &mut self.mask else { return };

        brush::stroke_segment(mask, last, pos, radius, value);
        self.last_stroke_pos = Some(pos);
        self.dirty = true;
    }

    /// Pointer-up ends the gesture regardless of position.
    pub fn on_pointer_up(&mut self, _view_x: f32, _view_y: f32) {
        self.phase = GesturePhase::Idle;
        self.last_stroke_pos = None;
    }

    /// Atomic flood-fill click (Fill tool only): snapshot, then grow the
    /// tolerance region from the seed over the *source image* colors and
    /// mark it in the mask. The session stays `Idle`; there is no drag.
    pub fn on_fill_click(&mut self, view_x: f32, view_y: f32) {
        if self.tool != Tool::Fill {
            return;
        }
        let Some(seed) = self.pointer_to_image(view_x, view_y) else {
            return;
        };
        let Some(img) = &self.image else { return };
        let Some(mask) = &mut self.mask else { return };

        self.history.push_undo(mask);
        fill::flood_fill(mask, &img.source, seed, FILL_TOLERANCE, 255);
        self.dirty = true;
    }

    // ---- rendering ---------------------------------------------------------

    /// Composite the current mask over the display image at the current
    /// zoom. `None` when no image is loaded.
    pub fn render(&self) -> Option<RgbaImage> {
        let img = self.image.as_ref()?;
        let mask = self.mask.as_ref()?;
        Some(canvas::composite_overlay(
            &img.display,
            mask,
            self.mask_visible,
            self.opacity(),
            self.view.zoom,
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================
