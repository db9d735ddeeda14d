pub mod canvas_view;
pub mod option_grid;
pub mod thumbnails;

pub use canvas_view::{CanvasAction, CanvasView};
pub use option_grid::{GridAction, OptionGrid};
pub use thumbnails::Thumbnails;

use eframe::egui::Color32;

/// Accent used for selection outlines and pressed buttons.
pub const ACCENT: Color32 = Color32::from_rgb(0xFF, 0xD4, 0x47);
pub const PANEL_BG: Color32 = Color32::from_rgb(0x0B, 0x0B, 0x0B);
pub const TILE_BG: Color32 = Color32::from_rgb(0x1A, 0x1A, 0x1A);
