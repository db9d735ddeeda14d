//! Layer compositor.
//!
//! One *pass* clears the surface and paints every category in
//! [`Category::all`] order.  Passes never diff against the previous result;
//! any change to the selection or background style means a full redraw.
//!
//! Every pass takes a generation number from [`PassGenerations`].  A pass
//! checks it is still the newest before each draw and bails out with
//! [`PassOutcome::Superseded`] otherwise, so a slow pass can never overwrite
//! the result of a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use image::{Rgb, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::assets::{AssetVariant, ImageCache};
use crate::catalog::Category;
use crate::selection::{BackgroundStyle, Selection, SelectionState};
use crate::{log_info, log_warn};

/// Default surface edge in pixels.
pub const DEFAULT_CANVAS_SIZE: u32 = 800;

/// Everything a pass reads, captured at the moment the pass is requested.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub selection: Selection,
    pub background: BackgroundStyle,
}

impl RenderRequest {
    pub fn new(selection: Selection, background: BackgroundStyle) -> Self {
        Self { selection, background }
    }

    pub fn from_state(state: &SelectionState) -> Self {
        Self::new(state.selection().clone(), state.background())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every layer was processed; the surface holds the composite.
    Completed,
    /// A newer pass started; the surface is partial and must be discarded.
    Superseded,
    /// Zero-area surface, nothing drawn.
    NoSurface,
}

// ============================================================================
// LOADING SIGNAL
// ============================================================================

/// Busy flag observed by the UI.  Raised while at least one pass is running.
#[derive(Clone, Debug, Default)]
pub struct LoadingSignal {
    active: Arc<AtomicUsize>,
}

impl LoadingSignal {
    pub fn is_loading(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }

    /// Raise the flag until the returned guard is dropped.
    pub fn begin(&self) -> LoadingGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        LoadingGuard { active: Arc::clone(&self.active) }
    }
}

/// Lowers the [`LoadingSignal`] on drop, including during unwinding.
#[derive(Debug)]
pub struct LoadingGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

// ============================================================================
// PASS GENERATIONS
// ============================================================================

/// Monotonic pass counter shared by every pass of one compositor.
#[derive(Clone, Debug, Default)]
pub struct PassGenerations {
    latest: Arc<AtomicU64>,
}

impl PassGenerations {
    /// Start a new generation; every earlier ticket becomes stale.
    pub fn begin(&self) -> PassTicket {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        PassTicket { generation, latest: Arc::clone(&self.latest) }
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct PassTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl PassTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

pub struct Compositor {
    images: Arc<ImageCache>,
    size: u32,
    loading: LoadingSignal,
    generations: PassGenerations,
}

impl Compositor {
    pub fn new(images: Arc<ImageCache>, size: u32) -> Self {
        Self {
            images,
            size,
            loading: LoadingSignal::default(),
            generations: PassGenerations::default(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn images(&self) -> &Arc<ImageCache> {
        &self.images
    }

    pub fn loading(&self) -> &LoadingSignal {
        &self.loading
    }

    pub fn generations(&self) -> &PassGenerations {
        &self.generations
    }

    /// A blank surface of the configured size.
    pub fn new_surface(&self) -> RgbaImage {
        RgbaImage::new(self.size, self.size)
    }

    pub fn begin_pass(&self) -> PassTicket {
        self.generations.begin()
    }

    /// Run a fresh pass on a new surface.  `None` if it was superseded or the
    /// configured size is zero.
    pub fn render(&self, request: &RenderRequest) -> Option<RgbaImage> {
        let ticket = self.begin_pass();
        let mut surface = self.new_surface();
        match self.render_pass(request, &mut surface, &ticket) {
            PassOutcome::Completed => Some(surface),
            PassOutcome::Superseded | PassOutcome::NoSurface => None,
        }
    }

    /// Paint `request` onto `surface`.  Layers are stretched to the surface's
    /// own dimensions.
    pub fn render_pass(&self, request: &RenderRequest, surface: &mut RgbaImage, ticket: &PassTicket) -> PassOutcome {
        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 {
            return PassOutcome::NoSurface;
        }

        let _busy = self.loading.begin();
        clear(surface);

        for &category in Category::all() {
            if !ticket.is_current() {
                log_info!("Render pass {} superseded before {}", ticket.generation(), category);
                return PassOutcome::Superseded;
            }

            let Some(option) = request.selection.get(category) else {
                if category == Category::Background {
                    fill_solid(surface, request.background.color());
                }
                continue;
            };

            let layer = self.resolve_layer(category, option, width, height);

            // Resolution may block on I/O; re-check before touching pixels.
            if !ticket.is_current() {
                log_info!("Render pass {} superseded at {}", ticket.generation(), category);
                return PassOutcome::Superseded;
            }

            match layer {
                Some(img) => {
                    let opacity = if category == Category::Background {
                        request.background.alpha()
                    } else {
                        1.0
                    };
                    composite_over(surface, &img, opacity);
                }
                None if category == Category::Background => {
                    fill_solid(surface, request.background.color());
                }
                None => {
                    log_warn!("No image for {} {}, layer skipped", category, option);
                }
            }
        }

        PassOutcome::Completed
    }

    /// Full variant first; non-Background layers get one retry with the
    /// preview variant when that is actually a different file.
    fn resolve_layer(&self, category: Category, option: &str, width: u32, height: u32) -> Option<Arc<RgbaImage>> {
        let layout = self.images.layout();
        let primary = layout.path(category, option, AssetVariant::Full);
        if let Some(img) = self.images.load_scaled(&primary, width, height) {
            return Some(img);
        }
        if category == Category::Background || !layout.has_distinct_preview() {
            return None;
        }
        let fallback = layout.path(category, option, AssetVariant::Preview);
        self.images.load_scaled(&fallback, width, height)
    }
}

// ============================================================================
// PIXEL OPERATIONS
// ============================================================================

/// Fully transparent.
pub fn clear(surface: &mut RgbaImage) {
    surface.par_chunks_exact_mut(4).for_each(|px| px.copy_from_slice(&[0, 0, 0, 0]));
}

/// Opaque fill with `color`.
pub fn fill_solid(surface: &mut RgbaImage, color: Rgb<u8>) {
    let px = [color[0], color[1], color[2], 255];
    surface.par_chunks_exact_mut(4).for_each(|dst| dst.copy_from_slice(&px));
}

/// Source-over `layer` onto `surface` with a global `opacity`.
/// `layer` must already match the surface dimensions.
pub fn composite_over(surface: &mut RgbaImage, layer: &RgbaImage, opacity: f32) {
    debug_assert_eq!(surface.dimensions(), layer.dimensions());
    surface
        .par_chunks_exact_mut(4)
        .zip(layer.as_raw().par_chunks_exact(4))
        .for_each(|(dst, src)| {
            let out = blend_pixel(
                Rgba([dst[0], dst[1], dst[2], dst[3]]),
                Rgba([src[0], src[1], src[2], src[3]]),
                opacity,
            );
            dst.copy_from_slice(&out.0);
        });
}

/// Straight-alpha source-over of `top` onto `base`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_a = base[3] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mix = |b: u8, t: u8| -> u8 {
        let b = b as f32 / 255.0;
        let t = t as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        mix(base[0], top[0]),
        mix(base[1], top[1]),
        mix(base[2], top[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetLayout, MemoryAssetSource};

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn compositor_with(files: &[(&str, [u8; 4])]) -> Compositor {
        let mut src = MemoryAssetSource::new();
        for (path, c) in files {
            src.insert_image(*path, &RgbaImage::from_pixel(2, 2, Rgba(*c))).unwrap();
        }
        Compositor::new(Arc::new(ImageCache::new(src, AssetLayout::default())), 8)
    }

    #[test]
    fn blend_extremes() {
        let base = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_pixel(base, Rgba([1, 2, 3, 0]), 1.0), base);
        assert_eq!(blend_pixel(base, Rgba(RED), 1.0), Rgba(RED));
        assert_eq!(blend_pixel(base, Rgba(RED), 0.0), base);
        assert_eq!(blend_pixel(Rgba([0, 0, 0, 0]), Rgba([0, 0, 0, 0]), 0.5), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn half_opacity_over_transparent_keeps_color() {
        let out = blend_pixel(Rgba([0, 0, 0, 0]), Rgba([200, 100, 50, 255]), 0.5);
        assert_eq!(out, Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn half_opacity_over_opaque_mixes() {
        let out = blend_pixel(Rgba([0, 0, 0, 255]), Rgba([200, 100, 50, 255]), 0.5);
        assert_eq!(out, Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn empty_background_is_solid_fill_ignoring_alpha() {
        let comp = compositor_with(&[]);
        let style = BackgroundStyle::new(Rgb([0x19, 0x1C, 0x1E]), 0.2);
        let img = comp.render(&RenderRequest::new(Selection::empty(), style)).unwrap();
        assert!(img.pixels().all(|p| *p == Rgba([0x19, 0x1C, 0x1E, 255])));
    }

    #[test]
    fn background_image_uses_background_alpha() {
        let comp = compositor_with(&[("Background/1.png", RED)]);
        let sel = Selection::empty().with(Category::Background, "1");
        let img = comp
            .render(&RenderRequest::new(sel, BackgroundStyle::new(Rgb([0, 0, 0]), 0.5)))
            .unwrap();
        assert_eq!(img.get_pixel(3, 3), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn missing_background_falls_back_to_fill() {
        let comp = compositor_with(&[]);
        let sel = Selection::empty().with(Category::Background, "4");
        let img = comp
            .render(&RenderRequest::new(sel, BackgroundStyle::new(Rgb([1, 2, 3]), 0.7)))
            .unwrap();
        assert!(img.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn layers_stack_in_paint_order() {
        let comp = compositor_with(&[
            ("Model/1.png", [0, 255, 0, 255]),
            ("Eyes/1.png", [0, 0, 255, 255]),
        ]);
        let sel = Selection::empty()
            .with(Category::Eyes, "1")
            .with(Category::Model, "1");
        let img = comp.render(&RenderRequest::new(sel, BackgroundStyle::default())).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn stale_ticket_is_superseded_and_still_lowers_loading() {
        let comp = compositor_with(&[]);
        let stale = comp.begin_pass();
        let _newer = comp.begin_pass();
        let mut surface = comp.new_surface();
        let outcome = comp.render_pass(
            &RenderRequest::new(Selection::empty(), BackgroundStyle::default()),
            &mut surface,
            &stale,
        );
        assert_eq!(outcome, PassOutcome::Superseded);
        assert!(!comp.loading().is_loading());
        assert!(!stale.is_current());
    }

    #[test]
    fn zero_area_surface_is_a_no_op() {
        let comp = compositor_with(&[]);
        let ticket = comp.begin_pass();
        let mut surface = RgbaImage::new(0, 0);
        let outcome = comp.render_pass(
            &RenderRequest::new(Selection::empty(), BackgroundStyle::default()),
            &mut surface,
            &ticket,
        );
        assert_eq!(outcome, PassOutcome::NoSurface);
    }

    #[test]
    fn loading_guard_counts_nested_passes() {
        let signal = LoadingSignal::default();
        assert!(!signal.is_loading());
        let a = signal.begin();
        let b = signal.begin();
        drop(a);
        assert!(signal.is_loading());
        drop(b);
        assert!(!signal.is_loading());
    }
}
