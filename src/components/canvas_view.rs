use std::time::Duration;

use eframe::egui;
use egui::{Align2, Color32, ColorImage, FontId, Pos2, Rect, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use super::{ACCENT, TILE_BG};

/// How long an action button stays lit after a click.
const PRESS_FLASH: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasAction {
    Save,
    Random,
    Reset,
}

impl CanvasAction {
    fn label(self) -> &'static str {
        match self {
            CanvasAction::Save => "SAVE",
            CanvasAction::Random => "RANDOM",
            CanvasAction::Reset => "RESET",
        }
    }
}

/// The composed avatar, its busy overlay and the action buttons.
#[derive(Default)]
pub struct CanvasView {
    texture: Option<TextureHandle>,
    /// Button lit by the last click, with the egui time of the click.
    pressed: Option<(CanvasAction, f64)>,
}

impl CanvasView {
    /// Replace the displayed surface with a finished pass.
    pub fn set_image(&mut self, ctx: &egui::Context, image: &RgbaImage) {
        let color_image = ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("pfp_canvas", color_image, TextureOptions::LINEAR));
            }
        }
    }

    pub fn has_image(&self) -> bool {
        self.texture.is_some()
    }

    pub fn show(&mut self, ui: &mut egui::Ui, loading: bool) -> Option<CanvasAction> {
        let button_row = 44.0;
        let avail = ui.available_size();
        let side = (avail.x).min(avail.y - button_row - 12.0).max(64.0);

        let mut action = None;
        ui.vertical_centered(|ui| {
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(side), egui::Sense::hover());
            self.paint_surface(ui, rect, loading);
            ui.add_space(12.0);
            action = self.buttons(ui, side);
        });
        action
    }

    fn paint_surface(&self, ui: &egui::Ui, rect: Rect, loading: bool) {
        let painter = ui.painter();
        painter.rect_filled(rect, 8.0, TILE_BG);
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        if loading {
            painter.rect_filled(rect, 8.0, Color32::from_black_alpha(150));
            let spinner = Rect::from_center_size(rect.center() - Vec2::new(0.0, 28.0), Vec2::splat(32.0));
            egui::Spinner::new().size(32.0).color(ACCENT).paint_at(ui, spinner);
            painter.text(
                rect.center() + Vec2::new(0.0, 12.0),
                Align2::CENTER_CENTER,
                "GENERATING...",
                FontId::proportional(22.0),
                ACCENT,
            );
        }
    }

    fn buttons(&mut self, ui: &mut egui::Ui, width: f32) -> Option<CanvasAction> {
        let now = ui.input(|i| i.time);
        if let Some((_, at)) = self.pressed {
            let left = PRESS_FLASH - (now - at);
            if left <= 0.0 {
                self.pressed = None;
            } else {
                ui.ctx().request_repaint_after(Duration::from_secs_f64(left));
            }
        }

        let actions = [CanvasAction::Save, CanvasAction::Random, CanvasAction::Reset];
        let spacing = ui.spacing().item_spacing.x;
        let button_w = (width - spacing * (actions.len() as f32 - 1.0)) / actions.len() as f32;

        let mut clicked = None;
        ui.allocate_ui_with_layout(
            Vec2::new(width, 40.0),
            egui::Layout::left_to_right(egui::Align::Center),
            |ui| {
                for act in actions {
                    let lit = matches!(self.pressed, Some((a, _)) if a == act);
                    let (fill, text_color) = if lit {
                        (ACCENT, Color32::BLACK)
                    } else {
                        (Color32::BLACK, ACCENT)
                    };
                    let button = egui::Button::new(
                        egui::RichText::new(act.label()).size(16.0).strong().color(text_color),
                    )
                    .fill(fill)
                    .stroke(egui::Stroke::new(1.5, ACCENT))
                    .min_size(Vec2::new(button_w, 40.0));
                    if ui.add(button).clicked() {
                        self.pressed = Some((act, now));
                        clicked = Some(act);
                    }
                }
            },
        );
        clicked
    }
}
