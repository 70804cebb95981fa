//! Gallery manifest data model.
//!
//! The manifest is a single JSON document stored in the repository:
//!
//! ```json
//! {
//!   "baseUrl": "https://example.org/images",
//!   "images": [
//!     { "id": "1", "src": "speakers/ana.webp", "alt": "...", "category": "ponentes",
//!       "title": "Ana", "description": "", "optimized": true,
//!       "originalSize": 2000000, "optimizedSize": 183211, "compressionRatio": 90.8 }
//!   ]
//! }
//! ```
//!
//! Hand-edited manifests are common, so parsing is lenient: `id` and
//! `compressionRatio` may be JSON strings or numbers, missing text fields
//! default to empty (and are reported by [`Manifest::validate`]), and unknown
//! fields are carried through to the next write untouched.
//!
//! Category → folder and category → display name are fixed tables on
//! [`Category`]; anything unrecognised lands in `misc`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest is not valid JSON: {0}")]
    Parse(String),
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Manifest changed remotely; gave up after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error("No image with id {0}")]
    EntryNotFound(String),
    #[error("Manifest already exists at {0}")]
    AlreadyExists(String),
}

// ============================================================================
// Category
// ============================================================================

/// Gallery category. Known values get a folder and display name; anything
/// else round-trips verbatim as [`Category::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Evento,
    Keynotes,
    Ponentes,
    Testimonios,
    Other(String),
}

impl Category {
    pub const KNOWN: [Category; 4] = [
        Category::Evento,
        Category::Keynotes,
        Category::Ponentes,
        Category::Testimonios,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "evento" => Category::Evento,
            "keynotes" => Category::Keynotes,
            "ponentes" => Category::Ponentes,
            "testimonios" => Category::Testimonios,
            other => Category::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Evento => "evento",
            Category::Keynotes => "keynotes",
            Category::Ponentes => "ponentes",
            Category::Testimonios => "testimonios",
            Category::Other(name) => name,
        }
    }

    /// Folder under the images root where assets of this category live.
    pub fn folder(&self) -> &'static str {
        match self {
            Category::Evento => "about",
            Category::Keynotes => "keynotes",
            Category::Ponentes => "speakers",
            Category::Testimonios => "testimonial",
            Category::Other(_) => "misc",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Category::Evento => "Evento",
            Category::Keynotes => "Keynotes",
            Category::Ponentes => "Ponentes",
            Category::Testimonios => "Testimonios",
            Category::Other(name) => name,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other(String::new())
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Category::parse(&name)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) if f.fract() == 0.0 => (f as i64).to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(StringOrNumber::deserialize(de)?.into_string())
}

fn lenient_ratio<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<StringOrNumber>::deserialize(de)? {
        None => None,
        Some(StringOrNumber::Str(s)) => s.trim().trim_end_matches('%').parse().ok(),
        Some(StringOrNumber::Int(i)) => Some(i as f64),
        Some(StringOrNumber::Float(f)) => Some(f),
    })
}

/// One gallery image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    /// Path relative to the images root, e.g. `speakers/ana.webp`.
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub optimized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_size: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_ratio",
        skip_serializing_if = "Option::is_none"
    )]
    pub compression_ratio: Option<f64>,
    /// Fields this crate does not know about, preserved on write.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything needed to create an entry except its id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewEntry {
    pub src: String,
    pub alt: String,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub optimized: bool,
    pub original_size: Option<u64>,
    pub optimized_size: Option<u64>,
    pub compression_ratio: Option<f64>,
}

impl NewEntry {
    pub fn with_id(self, id: String) -> GalleryEntry {
        GalleryEntry {
            id,
            src: self.src,
            alt: self.alt,
            category: self.category,
            title: self.title,
            description: self.description,
            optimized: self.optimized,
            original_size: self.original_size,
            optimized_size: self.optimized_size,
            compression_ratio: self.compression_ratio,
            extra: Map::new(),
        }
    }
}

/// Partial update for an entry. `None` fields are left alone.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntryPatch {
    pub src: Option<String>,
    pub alt: Option<String>,
    pub category: Option<Category>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub optimized: Option<bool>,
    pub original_size: Option<u64>,
    pub optimized_size: Option<u64>,
    pub compression_ratio: Option<f64>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        *self == EntryPatch::default()
    }

    pub fn apply(&self, entry: &mut GalleryEntry) {
        if let Some(v) = &self.src {
            entry.src = v.clone();
        }
        if let Some(v) = &self.alt {
            entry.alt = v.clone();
        }
        if let Some(v) = &self.category {
            entry.category = v.clone();
        }
        if let Some(v) = &self.title {
            entry.title = v.clone();
        }
        if let Some(v) = &self.description {
            entry.description = v.clone();
        }
        if let Some(v) = self.optimized {
            entry.optimized = v;
        }
        if let Some(v) = self.original_size {
            entry.original_size = Some(v);
        }
        if let Some(v) = self.optimized_size {
            entry.optimized_size = Some(v);
        }
        if let Some(v) = self.compression_ratio {
            entry.compression_ratio = Some(v);
        }
    }
}

/// Category and free-text filter over entries.
///
/// The search is a case-insensitive substring match on title, description
/// and alt text.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &GalleryEntry) -> bool {
        if let Some(category) = &self.category
            && &entry.category != category
        {
            return false;
        }
        match &self.search {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                [&entry.title, &entry.description, &entry.alt]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            }
            _ => true,
        }
    }
}

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub images: Vec<GalleryEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of [`Manifest::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Counts per category, as shown in the admin dashboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ManifestStats {
    pub total: usize,
    pub optimized: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl fmt::Display for ManifestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} images ({} optimized)", self.total, self.optimized)?;
        for (category, count) in &self.by_category {
            write!(f, ", {category}: {count}")?;
        }
        Ok(())
    }
}

impl Manifest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// UTF-8 JSON, 2-space indented.
    pub fn to_json(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// `max(numeric ids) + 1`, or `"1"` when there are no numeric ids.
    pub fn next_id(&self) -> String {
        self.images
            .iter()
            .filter_map(|e| e.id.trim().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1)
            .to_string()
    }

    pub fn get(&self, id: &str) -> Option<&GalleryEntry> {
        self.images.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GalleryEntry> {
        self.images.iter_mut().find(|e| e.id == id)
    }

    /// Full public URL for an entry's `src`.
    pub fn image_url(&self, src: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), src)
    }

    pub fn filter<'a>(&'a self, filter: &'a EntryFilter) -> impl Iterator<Item = &'a GalleryEntry> {
        self.images.iter().filter(move |e| filter.matches(e))
    }

    pub fn stats(&self) -> ManifestStats {
        let mut stats = ManifestStats {
            total: self.images.len(),
            ..ManifestStats::default()
        };
        for category in Category::KNOWN {
            stats.by_category.insert(category.to_string(), 0);
        }
        for entry in &self.images {
            if entry.optimized {
                stats.optimized += 1;
            }
            *stats
                .by_category
                .entry(entry.category.to_string())
                .or_insert(0) += 1;
        }
        stats
    }

    /// Structural check. Never mutates.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push("missing baseUrl".to_string());
        }

        for (index, entry) in self.images.iter().enumerate() {
            let n = index + 1;
            let checks = [
                ("id", entry.id.trim().is_empty()),
                ("src", entry.src.trim().is_empty()),
                ("title", entry.title.trim().is_empty()),
                ("category", entry.category.is_empty()),
                ("alt", entry.alt.trim().is_empty()),
            ];
            for (field, missing) in checks {
                if missing {
                    errors.push(format!("image {n}: missing {field}"));
                }
            }
        }

        let unique: HashSet<&str> = self.images.iter().map(|e| e.id.as_str()).collect();
        if unique.len() != self.images.len() {
            let mut seen = HashSet::new();
            let dupes: BTreeSet<&str> = self
                .images
                .iter()
                .map(|e| e.id.as_str())
                .filter(|id| !seen.insert(*id))
                .collect();
            let dupes: Vec<&str> = dupes.into_iter().collect();
            errors.push(format!("duplicate ids: {}", dupes.join(", ")));
        }

        ValidationReport::from_errors(errors)
    }
}

/// Validate a raw JSON document, including the shape checks that typed
/// parsing would otherwise turn into a hard error.
pub fn validate_document(doc: &Value) -> ValidationReport {
    let Some(object) = doc.as_object() else {
        return ValidationReport::from_errors(vec!["manifest must be a JSON object".to_string()]);
    };

    let mut errors = Vec::new();
    match object.get("images") {
        Some(Value::Array(_)) => {}
        _ => {
            if !matches!(object.get("baseUrl"), Some(Value::String(s)) if !s.trim().is_empty()) {
                errors.push("missing baseUrl".to_string());
            }
            errors.push("images must be an array".to_string());
            return ValidationReport::from_errors(errors);
        }
    }

    match serde_json::from_value::<Manifest>(doc.clone()) {
        Ok(manifest) => manifest.validate(),
        Err(e) => {
            errors.push(format!("malformed entry: {e}"));
            ValidationReport::from_errors(errors)
        }
    }
}
