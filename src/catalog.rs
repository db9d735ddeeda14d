use std::fmt;

/// One avatar layer type.  Declaration order is paint order (back to front).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Background,
    Backpack,
    Model,
    Crown,
    Clothes,
    Mouth,
    Eyes,
}

impl Category {
    pub const COUNT: usize = 7;

    /// All categories in paint order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Background,
            Category::Backpack,
            Category::Model,
            Category::Crown,
            Category::Clothes,
            Category::Mouth,
            Category::Eyes,
        ]
    }

    /// Position in paint order, also the slot index in per-category arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Directory name under the asset root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Background => "Background",
            Category::Backpack => "Backpack",
            Category::Model => "Model",
            Category::Crown => "Crown",
            Category::Clothes => "Clothes",
            Category::Mouth => "Mouth",
            Category::Eyes => "Eyes",
        }
    }

    /// Button label for the category picker.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Background => "BACKDROP",
            Category::Backpack => "BACKPACK",
            Category::Model => "MODEL",
            Category::Crown => "CROWN",
            Category::Clothes => "CLOTHES",
            Category::Mouth => "MOUTH",
            Category::Eyes => "EYES",
        }
    }

    /// Case-insensitive lookup by directory name.
    pub fn from_name(name: &str) -> Option<Category> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.dir_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Error building a [`TraitCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Duplicate { category: Category, option: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Duplicate { category, option } => {
                write!(f, "duplicate option '{}' in category {}", option, category)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Static mapping from category to its selectable options, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TraitCatalog {
    options: [Vec<String>; Category::COUNT],
}

impl TraitCatalog {
    /// Build a catalog.  Categories not mentioned get no options; an option
    /// listed twice for the same category is rejected.
    pub fn new<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (Category, Vec<String>)>,
    {
        let mut catalog = Self::default();
        for (category, options) in entries {
            let slot = &mut catalog.options[category.index()];
            for option in options {
                if slot.contains(&option) {
                    return Err(CatalogError::Duplicate { category, option });
                }
                slot.push(option);
            }
        }
        Ok(catalog)
    }

    /// The shipped asset set.
    pub fn builtin() -> Self {
        let counts = [
            (Category::Background, 8),
            (Category::Backpack, 8),
            (Category::Model, 8),
            (Category::Crown, 12),
            (Category::Clothes, 19),
            (Category::Mouth, 7),
            (Category::Eyes, 10),
        ];
        let mut catalog = Self::default();
        for (category, count) in counts {
            catalog.options[category.index()] = numbered(count);
        }
        catalog
    }

    pub fn options(&self, category: Category) -> &[String] {
        &self.options[category.index()]
    }

    pub fn first(&self, category: Category) -> Option<&str> {
        self.options(category).first().map(String::as_str)
    }

    pub fn contains(&self, category: Category, option: &str) -> bool {
        self.options(category).iter().any(|o| o == option)
    }

    pub fn is_empty(&self, category: Category) -> bool {
        self.options(category).is_empty()
    }
}

/// Options labelled "1" through `count`.
pub fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|n| n.to_string()).collect()
}
