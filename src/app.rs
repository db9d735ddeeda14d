use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use image::{Rgb, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use pfp_composer::export::{EXPORT_FILE_NAME, write_png};
use pfp_composer::settings::AppSettings;
use pfp_composer::worker::RenderWorker;
use pfp_composer::{
    Category, Compositor, DirAssetSource, ImageCache, RenderRequest, SelectionState, TraitCatalog,
    log_err, log_info,
};

use crate::components::{ACCENT, CanvasAction, CanvasView, GridAction, OptionGrid, PANEL_BG, Thumbnails};

/// Seconds a status line stays visible.
const STATUS_SECS: f64 = 4.0;

pub struct PfpComposerApp {
    settings: AppSettings,
    state: SelectionState,
    worker: RenderWorker,
    thumbnails: Thumbnails,
    grid: OptionGrid,
    canvas: CanvasView,
    /// Last surface received from the worker; this is what gets saved.
    latest_image: Option<RgbaImage>,
    /// Selection changed since the last render request.
    dirty: bool,
    status: Option<(String, f64)>,
    rng: StdRng,
}

impl PfpComposerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        apply_theme(&cc.egui_ctx);

        let cache = Arc::new(ImageCache::new(
            DirAssetSource::new(&settings.asset_root),
            settings.asset_layout(),
        ));
        let compositor = Arc::new(Compositor::new(Arc::clone(&cache), settings.canvas_size));
        let state = SelectionState::with_default_color(
            Arc::new(TraitCatalog::builtin()),
            settings.default_background_color,
        );
        log_info!(
            "Composer ready: {}px canvas, assets in {}",
            settings.canvas_size,
            settings.asset_root.display()
        );

        Self {
            settings,
            state,
            worker: RenderWorker::new(compositor),
            thumbnails: Thumbnails::new(cache),
            grid: OptionGrid::default(),
            canvas: CanvasView::default(),
            latest_image: None,
            dirty: true,
            status: None,
            rng: StdRng::from_entropy(),
        }
    }

    fn set_status(&mut self, ctx: &egui::Context, msg: impl Into<String>) {
        self.status = Some((msg.into(), ctx.input(|i| i.time)));
    }

    fn apply_grid_action(&mut self, action: GridAction) {
        match action {
            GridAction::Pick(category, option) => self.state.set_trait(category, option),
            GridAction::Clear(category) => self.state.set_trait(category, ""),
        }
        self.dirty = true;
    }

    fn apply_canvas_action(&mut self, ctx: &egui::Context, action: CanvasAction) {
        match action {
            CanvasAction::Save => self.save(ctx),
            CanvasAction::Random => {
                self.state.randomize(&mut self.rng);
                self.dirty = true;
            }
            CanvasAction::Reset => {
                self.state.reset();
                self.dirty = true;
            }
        }
    }

    /// Ask where to write the current surface and export it as PNG.
    fn save(&mut self, ctx: &egui::Context) {
        let Some(image) = &self.latest_image else {
            self.set_status(ctx, "Nothing rendered yet");
            return;
        };

        let mut dialog = rfd::FileDialog::new()
            .set_file_name(EXPORT_FILE_NAME)
            .add_filter("PNG", &["png"]);
        if let Some(dir) = &self.settings.last_export_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else { return };

        match write_png(image, &path) {
            Ok(()) => {
                log_info!("Exported {}", path.display());
                self.settings.last_export_dir = path.parent().map(PathBuf::from);
                self.settings.save();
                self.set_status(ctx, format!("Saved {}", path.display()));
            }
            Err(e) => {
                log_err!("Export to {} failed: {}", path.display(), e);
                self.set_status(ctx, format!("Save failed: {}", e));
            }
        }
    }

    fn backdrop_controls(&mut self, ui: &mut egui::Ui) {
        let style = self.state.background();
        let Rgb([r, g, b]) = style.color();
        let mut rgb = [r, g, b];
        let mut alpha = style.alpha();

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("COLOR").color(ACCENT));
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                self.state.set_background_color(Rgb(rgb));
                self.dirty = true;
            }
            ui.add_space(12.0);
            ui.label(egui::RichText::new("OPACITY").color(ACCENT));
            if ui
                .add(egui::Slider::new(&mut alpha, 0.0..=1.0).step_by(0.1).fixed_decimals(1))
                .changed()
            {
                self.state.set_background_alpha(alpha);
                self.dirty = true;
            }
        });
    }
}

impl eframe::App for PfpComposerApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll finished render passes ---
        if let Some(result) = self.worker.poll() {
            log_info!(
                "Pass {} composited in {:.1}ms",
                result.generation,
                result.elapsed.as_secs_f64() * 1000.0
            );
            self.canvas.set_image(ctx, &result.image);
            self.latest_image = Some(result.image);
        }
        self.thumbnails.poll(ctx);

        let now = ctx.input(|i| i.time);
        if matches!(&self.status, Some((_, at)) if now - at > STATUS_SECS) {
            self.status = None;
        }

        egui::TopBottomPanel::bottom("status_bar")
            .frame(egui::Frame::none().fill(PANEL_BG).inner_margin(6.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let summary: Vec<String> = self
                        .state
                        .selection()
                        .iter()
                        .filter(|(_, v)| !v.is_empty())
                        .map(|(c, v)| format!("{} {}", c.dir_name(), v))
                        .collect();
                    ui.label(egui::RichText::new(summary.join(" · ")).weak());
                    if let Some((msg, _)) = &self.status {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(egui::RichText::new(msg).color(ACCENT));
                        });
                    }
                });
            });

        egui::SidePanel::right("options_panel")
            .resizable(true)
            .default_width(460.0)
            .frame(egui::Frame::none().fill(PANEL_BG).inner_margin(12.0))
            .show(ctx, |ui| {
                let action = self.grid.show(ui, &self.state, &mut self.thumbnails);
                if let Some(action) = action {
                    self.apply_grid_action(action);
                }
                if self.grid.current == Category::Background {
                    ui.separator();
                    self.backdrop_controls(ui);
                }
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK).inner_margin(16.0))
            .show(ctx, |ui| {
                let loading = self.worker.is_loading() || !self.canvas.has_image();
                if let Some(action) = self.canvas.show(ui, loading) {
                    self.apply_canvas_action(ctx, action);
                }
            });

        if self.dirty {
            self.dirty = false;
            self.worker.request(RenderRequest::from_state(&self.state));
        }

        // Results arrive from the rayon pool; keep polling while anything is out.
        if self.worker.is_loading() || self.thumbnails.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}

fn apply_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = PANEL_BG;
    visuals.window_fill = PANEL_BG;
    visuals.selection.bg_fill = ACCENT.linear_multiply(0.35);
    visuals.selection.stroke = egui::Stroke::new(1.0, ACCENT);
    visuals.hyperlink_color = ACCENT;
    ctx.set_visuals(visuals);
}
