use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use image::RgbaImage;
use image::imageops::FilterType;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;

use pfp_composer::{AssetVariant, Category, ImageCache};

/// Edge of the square option thumbnails, in pixels.
pub const THUMBNAIL_SIZE: u32 = 96;

pub enum ThumbnailSlot {
    Loading,
    Ready(TextureHandle),
    Missing,
}

type ThumbnailKey = (Category, String);

/// Option-grid thumbnails, decoded on the rayon pool through the shared
/// image cache and uploaded as textures when they arrive.
pub struct Thumbnails {
    cache: Arc<ImageCache>,
    slots: HashMap<ThumbnailKey, ThumbnailSlot>,
    sender: mpsc::Sender<(ThumbnailKey, Option<RgbaImage>)>,
    receiver: mpsc::Receiver<(ThumbnailKey, Option<RgbaImage>)>,
}

impl Thumbnails {
    pub fn new(cache: Arc<ImageCache>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            cache,
            slots: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Upload finished thumbnails.  Returns true if anything changed.
    pub fn poll(&mut self, ctx: &egui::Context) -> bool {
        let mut changed = false;
        while let Ok((key, img)) = self.receiver.try_recv() {
            let slot = match img {
                Some(img) => {
                    let color_image = ColorImage::from_rgba_unmultiplied(
                        [img.width() as usize, img.height() as usize],
                        img.as_raw(),
                    );
                    let texture = ctx.load_texture(
                        format!("thumb_{}_{}", key.0, key.1),
                        color_image,
                        TextureOptions::LINEAR,
                    );
                    ThumbnailSlot::Ready(texture)
                }
                None => ThumbnailSlot::Missing,
            };
            self.slots.insert(key, slot);
            changed = true;
        }
        changed
    }

    pub fn is_loading(&self) -> bool {
        self.slots.values().any(|s| matches!(s, ThumbnailSlot::Loading))
    }

    /// Forget failed thumbnails of `category` so the next [`get`](Self::get)
    /// fetches them again.
    pub fn retry_missing(&mut self, category: Category) {
        self.slots
            .retain(|(c, _), slot| *c != category || !matches!(slot, ThumbnailSlot::Missing));
    }

    /// Thumbnail state for `option`, queueing a load on first request.
    pub fn get(&mut self, category: Category, option: &str) -> &ThumbnailSlot {
        let key = (category, option.to_string());
        if !self.slots.contains_key(&key) {
            self.spawn_load(key.clone());
        }
        self.slots.entry(key).or_insert(ThumbnailSlot::Loading)
    }

    fn spawn_load(&self, key: ThumbnailKey) {
        let cache = Arc::clone(&self.cache);
        let sender = self.sender.clone();
        rayon::spawn(move || {
            let (category, option) = (key.0, key.1.as_str());
            let mut img = cache.resolve(category, option, AssetVariant::Preview);
            if img.is_none() && cache.layout().has_distinct_preview() {
                img = cache.resolve(category, option, AssetVariant::Full);
            }
            let thumb = img.map(|full| fit_square(&full, THUMBNAIL_SIZE));
            let _ = sender.send((key, thumb));
        });
    }
}

/// Uniform scale into a `size`×`size` transparent square, centered.
fn fit_square(src: &RgbaImage, size: u32) -> RgbaImage {
    let (w, h) = src.dimensions();
    let scale = size as f32 / w.max(h).max(1) as f32;
    let fit_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let fit_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let scaled = image::imageops::resize(src, fit_w, fit_h, FilterType::Triangle);

    let mut out = RgbaImage::new(size, size);
    let off_x = (size - fit_w) / 2;
    let off_y = (size - fit_h) / 2;
    image::imageops::overlay(&mut out, &scaled, off_x as i64, off_y as i64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pfp_composer::{AssetLayout, MemoryAssetSource};

    fn thumbnails() -> Thumbnails {
        Thumbnails::new(Arc::new(ImageCache::new(MemoryAssetSource::new(), AssetLayout::default())))
    }

    #[test]
    fn retry_missing_only_drops_failed_slots_of_that_category() {
        let mut t = thumbnails();
        t.slots.insert((Category::Eyes, "1".into()), ThumbnailSlot::Missing);
        t.slots.insert((Category::Eyes, "2".into()), ThumbnailSlot::Loading);
        t.slots.insert((Category::Mouth, "1".into()), ThumbnailSlot::Missing);

        t.retry_missing(Category::Eyes);
        assert!(!t.slots.contains_key(&(Category::Eyes, "1".to_string())));
        assert!(t.slots.contains_key(&(Category::Eyes, "2".to_string())));
        assert!(t.slots.contains_key(&(Category::Mouth, "1".to_string())));

        // The next lookup queues a fresh load.
        assert!(matches!(t.get(Category::Eyes, "1"), ThumbnailSlot::Loading));
    }

    #[test]
    fn fit_square_letterboxes_wide_images() {
        let src = RgbaImage::from_pixel(40, 20, Rgba([9, 9, 9, 255]));
        let out = fit_square(&src, 20);
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(10, 0)[3], 0);
        assert_eq!(out.get_pixel(10, 10), &Rgba([9, 9, 9, 255]));
    }
}
