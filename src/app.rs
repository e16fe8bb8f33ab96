use eframe::egui;
use egui::{Color32, ColorImage, TextureFilter, TextureOptions};

use crate::components::tools::{PanelRequest, ToolsPanel};
use crate::session::MaskEditSession;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// APPLICATION SHELL – window layout and event routing into the session
// ============================================================================

/// The eframe application. All editing state lives in the owned
/// [`MaskEditSession`]; the shell only routes UI events into it and shows
/// the composited result.
pub struct MaskPaintApp {
    session: MaskEditSession,
    tools_panel: ToolsPanel,
    /// GPU texture holding the current composite; re-uploaded when the
    /// session reports itself dirty.
    texture: Option<egui::TextureHandle>,
    /// Transient message for the status bar.
    status: String,
}

impl MaskPaintApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            session: MaskEditSession::new(),
            tools_panel: ToolsPanel::default(),
            texture: None,
            status: "Select images to start labeling".to_string(),
        }
    }

    // ---- dialogs -----------------------------------------------------------

    fn open_images(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("TIFF images", &["tif", "tiff"])
            .add_filter(
                "All images",
                &["tif", "tiff", "png", "jpg", "jpeg", "bmp", "webp"],
            )
            .pick_files();
        let Some(paths) = picked else { return };

        match self.session.load_images(paths) {
            Ok(()) => {
                let count = self.session.image_paths().len();
                self.status = format!("Loaded {} image(s)", count);
                log_info!("loaded {} image(s)", count);
            }
            Err(e) => {
                log_err!("image load failed: {}", e);
                show_error("Could not load image", &e.to_string());
            }
        }
    }

    fn save_mask_dialog(&mut self) {
        let Some(default_name) = self.session.default_mask_filename() else {
            log_warn!("mask save requested with no image selected");
            show_warning("Select an image first");
            return;
        };
        let picked = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name(&default_name)
            .save_file();
        let Some(path) = picked else { return };

        match self.session.save_mask(&path) {
            Ok(()) => {
                self.status = format!("Mask saved to {}", path.display());
                log_info!("mask saved to {}", path.display());
            }
            Err(e) => {
                log_err!("mask save failed: {}", e);
                show_error("Could not save mask", &e.to_string());
            }
        }
    }

    fn load_mask_dialog(&mut self) {
        if !self.session.has_image() {
            log_warn!("mask load requested with no image selected");
            show_warning("Select an image first");
            return;
        }
        let picked = rfd::FileDialog::new()
            .add_filter(
                "Mask images",
                &["png", "jpg", "jpeg", "bmp", "tif", "tiff"],
            )
            .pick_file();
        let Some(path) = picked else { return };

        match self.session.load_mask(&path) {
            Ok(()) => {
                self.status = format!("Mask loaded from {}", path.display());
                log_info!("mask loaded from {}", path.display());
            }
            Err(e) => {
                log_err!("mask load failed: {}", e);
                show_error("Could not load mask", &e.to_string());
            }
        }
    }

    // ---- keyboard ----------------------------------------------------------

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Z)) {
            self.session.undo();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Y)) {
            self.session.redo();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::E)) {
            self.session.toggle_eraser();
        }
    }

    // ---- texture upload ----------------------------------------------------

    /// Re-composite and upload when the session changed. Nearest
    /// magnification keeps mask edges hard when the user zooms in.
    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if !self.session.take_dirty() {
            return;
        }
        match self.session.render() {
            Some(img) => {
                let size = [img.width() as usize, img.height() as usize];
                let pixels = img.into_raw();
                let color_image = ColorImage::from_rgba_unmultiplied(size, &pixels);
                let options = TextureOptions {
                    magnification: TextureFilter::Nearest,
                    minification: TextureFilter::Linear,
                    ..Default::default()
                };
                match &mut self.texture {
                    Some(tex) => tex.set(color_image, options),
                    None => {
                        self.texture = Some(ctx.load_texture("composite", color_image, options));
                    }
                }
            }
            None => self.texture = None,
        }
        ctx.request_repaint();
    }

    // ---- panels ------------------------------------------------------------

    fn show_image_list(&mut self, ui: &mut egui::Ui) {
        let names: Vec<String> = self
            .session
            .image_paths()
            .iter()
            .map(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("(unnamed)")
                    .to_string()
            })
            .collect();
        if names.is_empty() {
            ui.weak("No images loaded");
            return;
        }
        let current = self.session.current_index();
        for (i, name) in names.iter().enumerate() {
            if ui
                .selectable_label(current == Some(i), name.as_str())
                .clicked()
                && current != Some(i)
            {
                if let Err(e) = self.session.select_image(i) {
                    log_err!("image select failed: {}", e);
                    show_error("Could not load image", &e.to_string());
                } else {
                    self.status = format!("Selected {}", name);
                }
            }
        }
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = &self.texture else {
            ui.centered_and_justified(|ui| {
                ui.weak("Open TIFF images to start painting a mask");
            });
            return;
        };

        let size = texture.size_vec2();
        let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(texture.id(), response.rect, uv, Color32::WHITE);

        // Pointer events in view space, relative to the image origin.
        if let Some(pos) = response.interact_pointer_pos() {
            let local = pos - response.rect.min;
            if response.drag_started() {
                self.session.on_pointer_down(local.x, local.y);
            } else if response.dragged() {
                self.session.on_pointer_move(local.x, local.y);
            }
            if response.drag_released() {
                self.session.on_pointer_up(local.x, local.y);
            }
            if response.secondary_clicked() {
                self.session.on_fill_click(local.x, local.y);
            }
        }

        // Ctrl+wheel (or pinch) zoom in discrete steps, like the original
        // tool's wheel handler.
        if response.hovered() {
            let zoom_delta = ui.input(|i| i.zoom_delta());
            if zoom_delta > 1.0 {
                self.session.set_zoom(1.1);
            } else if zoom_delta < 1.0 {
                self.session.set_zoom(0.9);
            }
        }
    }

    fn status_line(&self) -> String {
        let s = &self.session;
        match (s.image_path(), s.image_dimensions(), s.display_dimensions()) {
            (Some(path), Some((w, h)), Some((dw, dh))) => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("(unnamed)");
                let fit_pct = (s.view().fit_scale * 100.0).round() as i32;
                let index = s.current_index().map(|i| i + 1).unwrap_or(0);
                format!(
                    "image: {} | original: {}×{} | display: {}×{} ({}%) | {}/{} | zoom {}%",
                    name,
                    w,
                    h,
                    dw,
                    dh,
                    fit_pct,
                    index,
                    s.image_paths().len(),
                    s.zoom_percent(),
                )
            }
            _ => self.status.clone(),
        }
    }
}

impl eframe::App for MaskPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("open_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("📁 Open images…").clicked() {
                    self.open_images();
                }
                ui.separator();
                ui.label("MaskPaint: segmentation mask labeling");
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status_line());
                if self.session.has_image() {
                    ui.separator();
                    ui.weak(self.status.as_str());
                }
            });
        });

        let mut request: Option<PanelRequest> = None;
        egui::SidePanel::right("tools_panel")
            .default_width(300.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Images");
                    self.show_image_list(ui);
                    ui.separator();
                    ui.heading("Tools");
                    request = self.tools_panel.show(ui, &mut self.session);
                });
            });
        match request {
            Some(PanelRequest::SaveMask) => self.save_mask_dialog(),
            Some(PanelRequest::LoadMask) => self.load_mask_dialog(),
            None => {}
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                self.show_canvas(ui);
            });
        });

        // Upload a fresh composite at frame end so the next paint shows it.
        self.refresh_texture(ctx);
    }
}

// ============================================================================
// MESSAGE DIALOGS
// ============================================================================

fn show_error(title: &str, message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .show();
}

fn show_warning(message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title("MaskPaint")
        .set_description(message)
        .show();
}
