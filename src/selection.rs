use std::sync::Arc;

use image::Rgb;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::catalog::{Category, TraitCatalog};

/// Fill color used when no Background image is drawn.
pub const DEFAULT_BACKGROUND_COLOR: Rgb<u8> = Rgb([0x19, 0x1C, 0x1E]);

/// Randomized background opacity is drawn from `[RANDOM_ALPHA_MIN, 1.0]`.
pub const RANDOM_ALPHA_MIN: f32 = 0.5;

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<Rgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let val = u32::from_str_radix(hex, 16).ok()?;
    Some(Rgb([(val >> 16) as u8, (val >> 8) as u8, val as u8]))
}

pub fn format_hex_color(color: Rgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

/// Background fill color plus the opacity applied to a Background image layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundStyle {
    color: Rgb<u8>,
    alpha: f32,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND_COLOR, 1.0)
    }
}

impl BackgroundStyle {
    pub fn new(color: Rgb<u8>, alpha: f32) -> Self {
        let mut style = Self { color, alpha: 1.0 };
        style.set_alpha(alpha);
        style
    }

    pub fn color(&self) -> Rgb<u8> {
        self.color
    }

    /// Always within `[0, 1]`.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_color(&mut self, color: Rgb<u8>) {
        self.color = color;
    }

    /// Clamps to `[0, 1]`; NaN leaves the current value untouched.
    pub fn set_alpha(&mut self, alpha: f32) {
        if !alpha.is_nan() {
            self.alpha = alpha.clamp(0.0, 1.0);
        }
    }
}

/// The chosen option per category.  An empty string means "none".
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Selection {
    values: [String; Category::COUNT],
}

impl Selection {
    /// Nothing selected anywhere.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `None` when the category has no selection.
    pub fn get(&self, category: Category) -> Option<&str> {
        let value = self.values[category.index()].as_str();
        if value.is_empty() { None } else { Some(value) }
    }

    pub fn set(&mut self, category: Category, value: impl Into<String>) {
        self.values[category.index()] = value.into();
    }

    pub fn clear(&mut self, category: Category) {
        self.values[category.index()].clear();
    }

    pub fn with(mut self, category: Category, value: impl Into<String>) -> Self {
        self.set(category, value);
        self
    }

    /// All seven categories in paint order, empty values included.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> + '_ {
        Category::all()
            .iter()
            .map(move |&c| (c, self.values[c.index()].as_str()))
    }
}

/// Owner of the current selection and background style.
///
/// All mutation goes through [`set_trait`](Self::set_trait),
/// [`randomize`](Self::randomize) and [`reset`](Self::reset), plus the two
/// background setters.
#[derive(Clone, Debug)]
pub struct SelectionState {
    catalog: Arc<TraitCatalog>,
    selection: Selection,
    background: BackgroundStyle,
    default_color: Rgb<u8>,
}

impl SelectionState {
    /// Initial state: Background and Model on their first catalog entry,
    /// everything else empty.
    pub fn new(catalog: Arc<TraitCatalog>) -> Self {
        Self::with_default_color(catalog, DEFAULT_BACKGROUND_COLOR)
    }

    pub fn with_default_color(catalog: Arc<TraitCatalog>, default_color: Rgb<u8>) -> Self {
        let mut selection = Selection::empty();
        for category in [Category::Background, Category::Model] {
            if let Some(first) = catalog.first(category) {
                selection.set(category, first);
            }
        }
        Self {
            catalog,
            selection,
            background: BackgroundStyle::new(default_color, 1.0),
            default_color,
        }
    }

    pub fn catalog(&self) -> &Arc<TraitCatalog> {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn background(&self) -> BackgroundStyle {
        self.background
    }

    /// Set one category; an empty value clears it.  Not checked against the
    /// catalog: unknown options simply fail to resolve at render time.
    pub fn set_trait(&mut self, category: Category, value: impl Into<String>) {
        self.selection.set(category, value);
    }

    /// Independently pick a uniform option for every category that has any,
    /// and a new background opacity in `[0.5, 1.0]` rounded to one decimal.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut next = Selection::empty();
        for &category in Category::all() {
            if let Some(option) = self.catalog.options(category).choose(rng) {
                next.set(category, option.as_str());
            }
        }
        self.selection = next;

        let raw = rng.gen_range(RANDOM_ALPHA_MIN..1.0);
        self.background.set_alpha((raw * 10.0).round() / 10.0);
    }

    /// Background back to its first option, every other category cleared,
    /// background style back to defaults.
    ///
    /// Model is cleared here even though it starts selected; that difference
    /// from [`new`](Self::new) is intentional.
    pub fn reset(&mut self) {
        let mut selection = Selection::empty();
        if let Some(first) = self.catalog.first(Category::Background) {
            selection.set(Category::Background, first);
        }
        self.selection = selection;
        self.background = BackgroundStyle::new(self.default_color, 1.0);
    }

    pub fn set_background_color(&mut self, color: Rgb<u8>) {
        self.background.set_color(color);
    }

    pub fn set_background_alpha(&mut self, alpha: f32) {
        self.background.set_alpha(alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state() -> SelectionState {
        SelectionState::new(Arc::new(TraitCatalog::builtin()))
    }

    #[test]
    fn initial_defaults() {
        let s = state();
        assert_eq!(s.selection().get(Category::Background), Some("1"));
        assert_eq!(s.selection().get(Category::Model), Some("1"));
        for c in [Category::Backpack, Category::Crown, Category::Clothes, Category::Mouth, Category::Eyes] {
            assert_eq!(s.selection().get(c), None);
        }
        assert_eq!(s.background().color(), DEFAULT_BACKGROUND_COLOR);
        assert_eq!(s.background().alpha(), 1.0);
    }

    #[test]
    fn set_trait_touches_one_category() {
        let mut s = state();
        let before = s.selection().clone();
        s.set_trait(Category::Crown, "4");
        for (c, v) in s.selection().iter() {
            if c == Category::Crown {
                assert_eq!(v, "4");
            } else {
                assert_eq!(Some(v).filter(|v| !v.is_empty()), before.get(c));
            }
        }
        s.set_trait(Category::Crown, "");
        assert_eq!(s.selection(), &before);
    }

    #[test]
    fn set_trait_accepts_unknown_options() {
        let mut s = state();
        s.set_trait(Category::Eyes, "999");
        assert_eq!(s.selection().get(Category::Eyes), Some("999"));
    }

    #[test]
    fn reset_clears_model_too() {
        let mut s = state();
        s.set_trait(Category::Eyes, "3");
        s.set_trait(Category::Background, "6");
        s.set_background_alpha(0.3);
        s.set_background_color(Rgb([1, 2, 3]));
        s.reset();

        let expected = Selection::empty().with(Category::Background, "1");
        assert_eq!(s.selection(), &expected);
        assert_eq!(s.background(), BackgroundStyle::default());
    }

    #[test]
    fn randomize_stays_in_catalog() {
        let mut s = state();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            s.randomize(&mut rng);
            for &c in Category::all() {
                let v = s.selection().get(c).expect("every builtin category is non-empty");
                assert!(s.catalog().contains(c, v), "{} not in {}", v, c);
            }
            let a = s.background().alpha();
            assert!((0.5..=1.0).contains(&a), "alpha {}", a);
            assert!(((a * 10.0).round() - a * 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn randomize_leaves_empty_categories_empty() {
        let catalog = TraitCatalog::new([(Category::Model, crate::catalog::numbered(3))]).unwrap();
        let mut s = SelectionState::new(Arc::new(catalog));
        s.set_trait(Category::Eyes, "1");
        s.randomize(&mut StdRng::seed_from_u64(1));
        assert!(s.selection().get(Category::Model).is_some());
        assert_eq!(s.selection().get(Category::Eyes), None);
        assert_eq!(s.selection().get(Category::Background), None);
    }

    #[test]
    fn randomize_keeps_background_color() {
        let mut s = state();
        s.set_background_color(Rgb([9, 9, 9]));
        s.randomize(&mut StdRng::seed_from_u64(3));
        assert_eq!(s.background().color(), Rgb([9, 9, 9]));
    }

    #[test]
    fn alpha_is_clamped() {
        let mut style = BackgroundStyle::default();
        style.set_alpha(1.7);
        assert_eq!(style.alpha(), 1.0);
        style.set_alpha(-0.2);
        assert_eq!(style.alpha(), 0.0);
        style.set_alpha(f32::NAN);
        assert_eq!(style.alpha(), 0.0);
        assert_eq!(BackgroundStyle::new(Rgb([0, 0, 0]), 4.0).alpha(), 1.0);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#191C1E"), Some(DEFAULT_BACKGROUND_COLOR));
        assert_eq!(parse_hex_color("ff0080"), Some(Rgb([255, 0, 128])));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(format_hex_color(Rgb([25, 28, 30])), "#191C1E");
    }
}
