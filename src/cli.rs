// ============================================================================
// PFP Composer CLI: headless rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   pfp-composer -o avatar.png --background 2 --model 3 --clothes 7 --mouth 1 --eyes 5
//   pfp-composer -o random.png --random --seed 42 --assets ./pfp
//   pfp-composer -o plain.png --reset --color "#202020" --size 400
//
// No window is opened in CLI mode; the pass runs on the current thread.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::assets::{DirAssetSource, ImageCache};
use crate::catalog::{Category, TraitCatalog};
use crate::compositor::{Compositor, RenderRequest};
use crate::export::write_png;
use crate::selection::{SelectionState, parse_hex_color};
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PFP Composer headless renderer.
///
/// Composite one avatar from per-category options and write it as PNG.
#[derive(Parser, Debug)]
#[command(
    name = "pfp-composer",
    about = "PFP Composer headless avatar renderer",
    long_about = "Composite avatar layers (Background, Backpack, Model, Crown, Clothes,\n\
                  Mouth, Eyes) without opening the GUI and write the result as PNG.\n\n\
                  Starts from the default selection, then applies --reset, --random,\n\
                  the per-category flags (an empty value clears a layer) and finally\n\
                  --color / --alpha."
)]
pub struct CliArgs {
    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Asset root containing {Category}/{option}.png. Defaults to the configured root.
    #[arg(short, long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Canvas edge in pixels. Defaults to the configured size.
    #[arg(short, long, value_name = "PIXELS")]
    pub size: Option<u32>,

    #[arg(long, value_name = "OPTION")]
    pub background: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub backpack: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub model: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub crown: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub clothes: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub mouth: Option<String>,
    #[arg(long, value_name = "OPTION")]
    pub eyes: Option<String>,

    /// Background fill color as #RRGGBB.
    #[arg(long, value_name = "#RRGGBB")]
    pub color: Option<String>,

    /// Background image opacity (0.0–1.0).
    #[arg(long, value_name = "0-1")]
    pub alpha: Option<f32>,

    /// Pick a random option for every category.
    #[arg(long)]
    pub random: bool,

    /// Seed for --random, for reproducible output.
    #[arg(long, value_name = "N", requires = "random")]
    pub seed: Option<u64>,

    /// Start from the reset state (Background only) instead of the initial one.
    #[arg(long)]
    pub reset: bool,

    /// Print the final selection and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when the CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().skip(1).any(|a| {
            a == "--output" || a == "-o" || a.starts_with("--output=") || a == "--help" || a == "-h"
        })
    }

    /// Per-category overrides in paint order.
    fn overrides(&self) -> [(Category, Option<&str>); Category::COUNT] {
        [
            (Category::Background, self.background.as_deref()),
            (Category::Backpack, self.backpack.as_deref()),
            (Category::Model, self.model.as_deref()),
            (Category::Crown, self.crown.as_deref()),
            (Category::Clothes, self.clothes.as_deref()),
            (Category::Mouth, self.mouth.as_deref()),
            (Category::Eyes, self.eyes.as_deref()),
        ]
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = AppSettings::load();
    match run_with_settings(&args, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Render and write one avatar according to `args`, with `settings` filling
/// in anything the flags leave out.
pub fn run_with_settings(args: &CliArgs, settings: &AppSettings) -> Result<(), String> {
    let start = Instant::now();
    let catalog = Arc::new(TraitCatalog::builtin());
    let state = build_state(args, catalog, settings)?;

    let root = args.assets.clone().unwrap_or_else(|| settings.asset_root.clone());
    let size = AppSettings::clamp_canvas_size(args.size.unwrap_or(settings.canvas_size));
    let cache = Arc::new(ImageCache::new(DirAssetSource::new(&root), settings.asset_layout()));
    let compositor = Compositor::new(cache, size);

    let request = RenderRequest::from_state(&state);
    let image = compositor
        .render(&request)
        .ok_or_else(|| "render produced no surface".to_string())?;

    write_png(&image, &args.output)
        .map_err(|e| format!("could not write '{}': {}", args.output.display(), e))?;

    if args.verbose {
        for (category, value) in request.selection.iter() {
            let shown = if value.is_empty() { "-" } else { value };
            println!("  {:<10} {}", category, shown);
        }
        println!(
            "  → {} ({}×{}, {:.0}ms)",
            args.output.display(),
            size,
            size,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}

/// Apply the flags to a fresh [`SelectionState`].
pub fn build_state(args: &CliArgs, catalog: Arc<TraitCatalog>, settings: &AppSettings) -> Result<SelectionState, String> {
    let mut state = SelectionState::with_default_color(catalog, settings.default_background_color);

    if args.reset {
        state.reset();
    }
    if args.random {
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        state.randomize(&mut rng);
    }
    for (category, value) in args.overrides() {
        if let Some(value) = value {
            state.set_trait(category, value.trim());
        }
    }
    if let Some(color) = &args.color {
        let parsed = parse_hex_color(color)
            .ok_or_else(|| format!("invalid color '{}', expected #RRGGBB", color))?;
        state.set_background_color(parsed);
    }
    if let Some(alpha) = args.alpha {
        state.set_background_alpha(alpha);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("pfp-composer").chain(argv.iter().copied())).unwrap()
    }

    fn state_for(argv: &[&str]) -> Result<SelectionState, String> {
        build_state(&parse(argv), Arc::new(TraitCatalog::builtin()), &AppSettings::default())
    }

    #[test]
    fn output_is_required() {
        assert!(CliArgs::try_parse_from(["pfp-composer", "--model", "2"]).is_err());
    }

    #[test]
    fn seed_requires_random() {
        assert!(CliArgs::try_parse_from(["pfp-composer", "-o", "a.png", "--seed", "3"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let s = state_for(&["-o", "a.png", "--clothes", "7", "--model", "", "--alpha", "0.4"]).unwrap();
        assert_eq!(s.selection().get(Category::Background), Some("1"));
        assert_eq!(s.selection().get(Category::Model), None);
        assert_eq!(s.selection().get(Category::Clothes), Some("7"));
        assert_eq!(s.background().alpha(), 0.4);
    }

    #[test]
    fn reset_then_override() {
        let s = state_for(&["-o", "a.png", "--reset", "--eyes", "5"]).unwrap();
        assert_eq!(s.selection().get(Category::Model), None);
        assert_eq!(s.selection().get(Category::Eyes), Some("5"));
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let a = state_for(&["-o", "a.png", "--random", "--seed", "11"]).unwrap();
        let b = state_for(&["-o", "a.png", "--random", "--seed", "11"]).unwrap();
        assert_eq!(a.selection(), b.selection());
        assert_eq!(a.background(), b.background());
    }

    #[test]
    fn color_is_validated() {
        let s = state_for(&["-o", "a.png", "--color", "#102030"]).unwrap();
        assert_eq!(s.background().color(), Rgb([0x10, 0x20, 0x30]));
        assert!(state_for(&["-o", "a.png", "--color", "teal"]).is_err());
    }
}
