//! Avatar layer composer.
//!
//! Pick one option per [`Category`], composite the chosen layers back to front
//! onto a square surface and export the result as PNG.
//!
//! The pieces, bottom-up:
//! - [`catalog`]: the seven categories and the static option catalog
//! - [`selection`]: the mutable selection + background style
//! - [`assets`]: asset paths, sources and the decoded image cache
//! - [`compositor`]: one render pass, generation counter, loading signal
//! - [`worker`]: background pass scheduling for the GUI
//! - [`export`]: PNG bytes, data URI and file output
//! - [`settings`]: persisted application configuration
//! - [`cli`]: headless rendering

pub mod logger;

pub mod assets;
pub mod catalog;
pub mod cli;
pub mod compositor;
pub mod export;
pub mod selection;
pub mod settings;
pub mod worker;

pub use assets::{AssetError, AssetLayout, AssetSource, AssetVariant, DirAssetSource, ImageCache, MemoryAssetSource};
pub use catalog::{Category, TraitCatalog};
pub use compositor::{Compositor, LoadingSignal, PassOutcome, RenderRequest};
pub use export::{EXPORT_FILE_NAME, ExportError};
pub use selection::{BackgroundStyle, Selection, SelectionState};
