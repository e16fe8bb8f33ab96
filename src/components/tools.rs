use eframe::egui;

use crate::canvas::{MAX_DISPLAY_SIZE, MIN_DISPLAY_SIZE};
use crate::components::history::HistoryPanel;
use crate::session::{
    MAX_BRUSH_RADIUS, MAX_OPACITY_PCT, MIN_BRUSH_RADIUS, MIN_OPACITY_PCT, MaskEditSession, Tool,
};

// ============================================================================
// TOOLS PANEL – tool selection, brush parameters, actions, zoom controls
// ============================================================================

/// Actions that need a native file dialog; the app owns those, so the panel
/// only reports the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelRequest {
    SaveMask,
    LoadMask,
}

#[derive(Default)]
pub struct ToolsPanel {
    history_panel: HistoryPanel,
}

impl ToolsPanel {
    /// Render the panel and apply every immediate change to the session.
    /// Returns a request when a dialog-backed action was clicked.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        session: &mut MaskEditSession,
    ) -> Option<PanelRequest> {
        let mut request = None;

        // ---- tool selection ------------------------------------------------
        ui.label("Tool");
        let mut tool = session.tool();
        let changed = ui.radio_value(&mut tool, Tool::Brush, "Brush").changed()
            | ui.radio_value(&mut tool, Tool::Eraser, "Eraser (E)").changed()
            | ui.radio_value(&mut tool, Tool::Fill, "Fill").changed();
        if changed {
            session.set_tool(tool);
        }

        ui.separator();

        // ---- brush parameters ----------------------------------------------
        let mut radius = session.brush_radius();
        if ui
            .add(
                egui::Slider::new(&mut radius, MIN_BRUSH_RADIUS..=MAX_BRUSH_RADIUS)
                    .suffix(" px")
                    .text("Brush size"),
            )
            .changed()
        {
            session.set_brush_radius(radius);
        }

        let mut opacity = session.opacity_pct();
        if ui
            .add(
                egui::Slider::new(&mut opacity, MIN_OPACITY_PCT..=MAX_OPACITY_PCT)
                    .suffix(" %")
                    .text("Opacity"),
            )
            .changed()
        {
            session.set_opacity_pct(opacity);
        }

        let mut max_size = session.view().max_display_size;
        if ui
            .add(
                egui::Slider::new(&mut max_size, MIN_DISPLAY_SIZE..=MAX_DISPLAY_SIZE)
                    .suffix(" px")
                    .text("Max display size"),
            )
            .changed()
        {
            session.set_max_display_size(max_size);
        }

        ui.separator();

        // ---- actions -------------------------------------------------------
        ui.horizontal(|ui| {
            if ui
                .add_enabled(
                    session.history().can_undo(),
                    egui::Button::new("Undo (Ctrl+Z)"),
                )
                .clicked()
            {
                session.undo();
            }
            if ui
                .add_enabled(
                    session.history().can_redo(),
                    egui::Button::new("Redo (Ctrl+Y)"),
                )
                .clicked()
            {
                session.redo();
            }
        });

        let has_image = session.has_image();
        if ui
            .add_enabled(has_image, egui::Button::new("Clear mask"))
            .clicked()
        {
            session.clear_mask();
        }
        if ui.button("Save mask").clicked() {
            request = Some(PanelRequest::SaveMask);
        }
        if ui.button("Load mask").clicked() {
            request = Some(PanelRequest::LoadMask);
        }
        let toggle_label = if session.mask_visible() {
            "Hide mask"
        } else {
            "Show mask"
        };
        if ui.button(toggle_label).clicked() {
            session.toggle_mask_visible();
        }

        ui.separator();

        // ---- zoom ----------------------------------------------------------
        ui.label("Zoom");
        ui.horizontal(|ui| {
            if ui.button("−").clicked() {
                session.set_zoom(0.8);
            }
            ui.label(format!("{}%", session.zoom_percent()));
            if ui.button("＋").clicked() {
                session.set_zoom(1.2);
            }
        });
        if ui.button("Reset zoom").clicked() {
            session.reset_zoom();
        }

        ui.separator();
        self.history_panel.show(ui, session.history());

        request
    }
}
