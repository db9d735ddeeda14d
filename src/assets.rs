//! Asset paths, asset sources, and the decoded image cache.
//!
//! Images live at `{category}/{option}.{ext}` relative to an asset source.
//! [`ImageCache`] memoizes every successful decode by exact path string and
//! never evicts; failed loads are logged and *not* cached, so the next
//! request for the same path fetches again.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::imageops::FilterType;
use image::{Rgba, Rgba32FImage, RgbaImage};

use crate::catalog::Category;
use crate::{log_info, log_warn};

/// Extension used for both variants unless configured otherwise.
pub const DEFAULT_ASSET_EXTENSION: &str = "png";

/// Filter used when stretching a layer to the surface.
const STRETCH_FILTER: FilterType = FilterType::CatmullRom;

/// Resize `src` to `width`×`height` in premultiplied space, so transparent
/// texels carry no color into the edges of opaque ones.
pub fn stretch(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let premultiplied = Rgba32FImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0.map(|c| c as f32 / 255.0);
        Rgba([r * a, g * a, b * a, a])
    });
    let resized = image::imageops::resize(&premultiplied, width, height, STRETCH_FILTER);

    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = resized.get_pixel(x, y).0;
        let a = a.clamp(0.0, 1.0);
        if a <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgba([to_u8(r / a), to_u8(g / a), to_u8(b / a), to_u8(a)])
    })
}

/// Which file of an option to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetVariant {
    /// The image composited onto the surface.
    Full,
    /// The thumbnail shown in the option grid.
    Preview,
}

/// Maps (category, option, variant) to a relative asset path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetLayout {
    pub full_extension: String,
    pub preview_extension: String,
}

impl Default for AssetLayout {
    fn default() -> Self {
        Self {
            full_extension: DEFAULT_ASSET_EXTENSION.to_string(),
            preview_extension: DEFAULT_ASSET_EXTENSION.to_string(),
        }
    }
}

impl AssetLayout {
    pub fn path(&self, category: Category, option: &str, variant: AssetVariant) -> String {
        let ext = match variant {
            AssetVariant::Full => &self.full_extension,
            AssetVariant::Preview => &self.preview_extension,
        };
        format!("{}/{}.{}", category.dir_name(), option, ext.trim_start_matches('.'))
    }

    /// True when preview and full files are different paths, i.e. when
    /// retrying with the other variant can load something new.
    pub fn has_distinct_preview(&self) -> bool {
        self.full_extension.trim_start_matches('.') != self.preview_extension.trim_start_matches('.')
    }
}

// ============================================================================
// ASSET SOURCES
// ============================================================================

/// Error fetching raw asset bytes.
#[derive(Debug)]
pub enum AssetError {
    NotFound(String),
    /// The requested path would leave the asset root.
    OutsideRoot(String),
    Io { path: String, source: std::io::Error },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound(path) => write!(f, "asset not found: {}", path),
            AssetError::OutsideRoot(path) => write!(f, "asset path escapes root: {}", path),
            AssetError::Io { path, source } => write!(f, "I/O error reading {}: {}", path, source),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Something that can hand out encoded image bytes for a relative path.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String {
        "assets".to_string()
    }
}

/// Assets read from a directory on disk.
#[derive(Clone, Debug)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AssetError::OutsideRoot(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetSource for DirAssetSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(path.to_string())
            } else {
                AssetError::Io { path: path.to_string(), source: e }
            }
        })
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Assets held in memory, keyed by relative path.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    /// Store `image` PNG-encoded under `path`.
    pub fn insert_image(&mut self, path: impl Into<String>, image: &RgbaImage) -> Result<(), crate::export::ExportError> {
        let bytes = crate::export::encode_png(image)?;
        self.insert(path, bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.files.len())
    }
}

// ============================================================================
// IMAGE CACHE
// ============================================================================

/// Decoded image cache shared by every render pass.
///
/// Locks are never held across a fetch or a decode: two passes missing the
/// same path at once may both decode it, and the later insert wins.
pub struct ImageCache {
    source: Box<dyn AssetSource>,
    layout: AssetLayout,
    loaded: Mutex<HashMap<String, Arc<RgbaImage>>>,
    /// Stretched copies of `loaded` entries, keyed by (path, width, height).
    scaled: Mutex<HashMap<(String, u32, u32), Arc<RgbaImage>>>,
    fetches: AtomicUsize,
}

impl ImageCache {
    pub fn new(source: impl AssetSource + 'static, layout: AssetLayout) -> Self {
        log_info!("Image cache using {}", source.describe());
        Self {
            source: Box::new(source),
            layout,
            loaded: Mutex::new(HashMap::new()),
            scaled: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Load and decode `path`, from cache when possible.
    /// Returns `None` on any failure; failures are not remembered.
    pub fn load(&self, path: &str) -> Option<Arc<RgbaImage>> {
        if let Some(hit) = self.cached(path) {
            return Some(hit);
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let decoded = self
            .source
            .fetch(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                image::load_from_memory(&bytes)
                    .map(|img| img.into_rgba8())
                    .map_err(|e| format!("decode error: {}", e))
            });

        match decoded {
            Ok(img) => {
                let img = Arc::new(img);
                if let Ok(mut loaded) = self.loaded.lock() {
                    loaded.insert(path.to_string(), Arc::clone(&img));
                }
                Some(img)
            }
            Err(e) => {
                log_warn!("Failed to load image: {} ({})", path, e);
                None
            }
        }
    }

    /// Resolve one option's image.
    pub fn resolve(&self, category: Category, option: &str, variant: AssetVariant) -> Option<Arc<RgbaImage>> {
        self.load(&self.layout.path(category, option, variant))
    }

    /// `path` stretched to exactly `width`×`height`, ignoring aspect ratio.
    pub fn load_scaled(&self, path: &str, width: u32, height: u32) -> Option<Arc<RgbaImage>> {
        let key = (path.to_string(), width, height);
        if let Some(hit) = self.scaled.lock().ok().and_then(|m| m.get(&key).cloned()) {
            return Some(hit);
        }

        let original = self.load(path)?;
        let stretched = if original.dimensions() == (width, height) {
            original
        } else {
            Arc::new(stretch(&original, width, height))
        };
        if let Ok(mut scaled) = self.scaled.lock() {
            scaled.insert(key, Arc::clone(&stretched));
        }
        Some(stretched)
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cached(path).is_some()
    }

    /// Number of decoded images held.
    pub fn len(&self) -> usize {
        self.loaded.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the asset source has been hit (cache misses).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn cached(&self, path: &str) -> Option<Arc<RgbaImage>> {
        self.loaded.lock().ok().and_then(|m| m.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c))
    }

    #[test]
    fn paths_follow_layout() {
        let layout = AssetLayout::default();
        assert_eq!(layout.path(Category::Clothes, "19", AssetVariant::Full), "Clothes/19.png");
        assert_eq!(layout.path(Category::Clothes, "19", AssetVariant::Preview), "Clothes/19.png");
        assert!(!layout.has_distinct_preview());

        let two_tier = AssetLayout {
            full_extension: "png".into(),
            preview_extension: ".webp".into(),
        };
        assert_eq!(two_tier.path(Category::Eyes, "2", AssetVariant::Preview), "Eyes/2.webp");
        assert!(two_tier.has_distinct_preview());
    }

    #[test]
    fn hits_are_memoized() {
        let mut src = MemoryAssetSource::new();
        src.insert_image("Model/1.png", &solid(4, 4, [10, 20, 30, 255])).unwrap();
        let cache = ImageCache::new(src, AssetLayout::default());

        let a = cache.resolve(Category::Model, "1", AssetVariant::Full).unwrap();
        let b = cache.resolve(Category::Model, "1", AssetVariant::Full).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(a.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn misses_are_retried() {
        let cache = ImageCache::new(MemoryAssetSource::new(), AssetLayout::default());
        assert!(cache.load("Eyes/3.png").is_none());
        assert!(cache.load("Eyes/3.png").is_none());
        assert_eq!(cache.fetch_count(), 2);
        assert!(!cache.is_cached("Eyes/3.png"));
        assert!(cache.is_empty());
    }

    #[test]
    fn undecodable_bytes_resolve_to_none() {
        let mut src = MemoryAssetSource::new();
        src.insert("Mouth/1.png", b"not a png".to_vec());
        let cache = ImageCache::new(src, AssetLayout::default());
        assert!(cache.load("Mouth/1.png").is_none());
        assert!(!cache.is_cached("Mouth/1.png"));
    }

    #[test]
    fn scaled_copies_stretch_to_exact_bounds() {
        let mut src = MemoryAssetSource::new();
        src.insert_image("Crown/2.png", &solid(10, 4, [200, 0, 0, 255])).unwrap();
        let cache = ImageCache::new(src, AssetLayout::default());

        let s = cache.load_scaled("Crown/2.png", 16, 16).unwrap();
        assert_eq!(s.dimensions(), (16, 16));
        assert_eq!(s.get_pixel(8, 8), &Rgba([200, 0, 0, 255]));
        let again = cache.load_scaled("Crown/2.png", 16, 16).unwrap();
        assert!(Arc::ptr_eq(&s, &again));
        assert_eq!(cache.fetch_count(), 1);
    }

    #[test]
    fn stretched_edges_keep_their_color() {
        let half = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 0]) }
        });
        let mut src = MemoryAssetSource::new();
        src.insert_image("Eyes/4.png", &half).unwrap();
        let cache = ImageCache::new(src, AssetLayout::default());

        let s = cache.load_scaled("Eyes/4.png", 3, 3).unwrap();
        let edge = s.get_pixel(1, 1);
        assert_eq!(&edge.0[..3], &[255, 255, 255]);
        assert!(edge[3] > 0 && edge[3] < 255, "edge alpha {}", edge[3]);
        assert_eq!(s.get_pixel(0, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(s.get_pixel(2, 1)[3], 0);
    }

    #[test]
    fn dir_source_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = DirAssetSource::new(dir.path());
        assert!(matches!(src.fetch("../secret.png"), Err(AssetError::OutsideRoot(_))));
        assert!(matches!(src.fetch("/etc/passwd"), Err(AssetError::OutsideRoot(_))));
        assert!(matches!(src.fetch("Eyes/1.png"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn dir_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Eyes")).unwrap();
        std::fs::write(dir.path().join("Eyes/1.png"), b"bytes").unwrap();
        let src = DirAssetSource::new(dir.path());
        assert_eq!(src.fetch("Eyes/1.png").unwrap(), b"bytes");
    }
}
