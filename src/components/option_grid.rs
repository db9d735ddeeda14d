use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, TextureId, Vec2};

use pfp_composer::{Category, SelectionState};

use super::thumbnails::{THUMBNAIL_SIZE, ThumbnailSlot, Thumbnails};
use super::{ACCENT, TILE_BG};

const TILE_PAD: f32 = 6.0;

/// What the user asked for in the option grid this frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridAction {
    Pick(Category, String),
    Clear(Category),
}

enum TileImage {
    Texture(TextureId),
    Loading,
    Missing,
}

/// Category tabs plus the option tiles of the active category.
pub struct OptionGrid {
    pub current: Category,
}

impl Default for OptionGrid {
    fn default() -> Self {
        Self { current: Category::Background }
    }
}

impl OptionGrid {
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        state: &SelectionState,
        thumbnails: &mut Thumbnails,
    ) -> Option<GridAction> {
        self.category_tabs(ui, state, thumbnails);
        ui.add_space(8.0);
        ui.separator();

        let mut action = None;
        let category = self.current;
        let selected = state.selection().get(category);

        egui::ScrollArea::vertical()
            .id_source("option_grid_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = Vec2::splat(TILE_PAD);

                    if Self::none_tile(ui, selected.is_none()).clicked() && selected.is_some() {
                        action = Some(GridAction::Clear(category));
                    }

                    for option in state.catalog().options(category) {
                        let image = match thumbnails.get(category, option) {
                            ThumbnailSlot::Ready(texture) => TileImage::Texture(texture.id()),
                            ThumbnailSlot::Loading => TileImage::Loading,
                            ThumbnailSlot::Missing => TileImage::Missing,
                        };
                        let is_selected = selected == Some(option.as_str());
                        let response = Self::option_tile(ui, option, image, is_selected)
                            .on_hover_text(format!("{} {}", category.label(), option));
                        if response.clicked() && !is_selected {
                            action = Some(GridAction::Pick(category, option.clone()));
                        }
                    }
                });
            });

        action
    }

    fn category_tabs(&mut self, ui: &mut egui::Ui, state: &SelectionState, thumbnails: &mut Thumbnails) {
        ui.horizontal_wrapped(|ui| {
            for &category in Category::all() {
                let mut text = egui::RichText::new(category.label()).size(13.0).strong();
                if state.selection().get(category).is_some() {
                    text = text.color(ACCENT);
                }
                if ui.selectable_label(self.current == category, text).clicked() && self.current != category {
                    self.current = category;
                    thumbnails.retry_missing(category);
                }
            }
        });
    }

    fn tile_rect(ui: &mut egui::Ui) -> (Rect, egui::Response) {
        let side = THUMBNAIL_SIZE as f32;
        ui.allocate_exact_size(Vec2::splat(side), Sense::click())
    }

    fn paint_frame(ui: &egui::Ui, rect: Rect, response: &egui::Response, selected: bool) {
        let painter = ui.painter();
        painter.rect_filled(rect, 6.0, TILE_BG);
        let stroke = if selected {
            Stroke::new(2.5, ACCENT)
        } else if response.hovered() {
            Stroke::new(1.0, Color32::from_gray(140))
        } else {
            Stroke::new(1.0, Color32::from_gray(50))
        };
        painter.rect_stroke(rect, 6.0, stroke);
    }

    fn none_tile(ui: &mut egui::Ui, selected: bool) -> egui::Response {
        let (rect, response) = Self::tile_rect(ui);
        Self::paint_frame(ui, rect, &response, selected);
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            "NONE",
            FontId::proportional(14.0),
            Color32::from_gray(160),
        );
        response
    }

    fn option_tile(ui: &mut egui::Ui, option: &str, image: TileImage, selected: bool) -> egui::Response {
        let (rect, response) = Self::tile_rect(ui);
        Self::paint_frame(ui, rect, &response, selected);
        let inner = rect.shrink(3.0);
        match image {
            TileImage::Texture(id) => {
                ui.painter().image(
                    id,
                    inner,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            TileImage::Loading => {
                egui::Spinner::new()
                    .size(18.0)
                    .paint_at(ui, Rect::from_center_size(rect.center(), Vec2::splat(18.0)));
            }
            TileImage::Missing => {
                ui.painter().text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    option,
                    FontId::proportional(20.0),
                    Color32::from_gray(120),
                );
            }
        }
        response
    }
}
