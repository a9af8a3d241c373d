//! Extension-based file categorization.
//!
//! A [`CategoryMapping`] is an ordered list of named categories, each owning a set of
//! dot-prefixed, lower-case extensions. Resolution walks the categories in the order
//! they were defined and returns the first one listing the file's extension, or
//! [`OTHERS`] when none does.
//!
//! # Examples
//!
//! ```
//! use springclean::category::CategoryMapping;
//!
//! let mapping = CategoryMapping::builtin();
//! assert_eq!(mapping.resolve("report.pdf"), "DOCUMENTS");
//! assert_eq!(mapping.resolve("Photo.JPG"), "IMAGES");
//! assert_eq!(mapping.resolve("notes"), "OTHERS");
//! ```
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Category assigned to every extension the active mapping does not list.
pub const OTHERS: &str = "OTHERS";

/// The built-in table, in precedence order.
///
/// The compound `.tar.*` entries never match because only the last suffix of a
/// name is its extension; they are listed so the table reads like the one users
/// already know.
const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "DOCUMENTS",
        &[".pdf", ".doc", ".docx", ".txt", ".ppt", ".pptx", ".xls", ".xlsx"],
    ),
    (
        "IMAGES",
        &[
            ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg", ".webp", ".avif", ".ico",
            ".heic", ".heif",
        ],
    ),
    (
        "VIDEOS",
        &[
            ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mpeg", ".mpg", ".3gp",
            ".m4v", ".hevc",
        ],
    ),
    (
        "AUDIO",
        &[
            ".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma", ".opus", ".alac",
        ],
    ),
    (
        "CODE",
        &[
            ".py", ".js", ".html", ".css", ".java", ".c", ".cpp", ".h", ".php", ".rb", ".go",
            ".rs", ".ts", ".swift", ".kt", ".sh", ".bat",
        ],
    ),
    (
        "APPS",
        &[
            ".exe", ".msi", ".apk", ".dmg", ".pkg", ".app", ".deb", ".rpm", ".jar", ".war",
            ".iso",
        ],
    ),
    (
        "ARCHIVES",
        &[
            ".zip", ".rar", ".tar", ".gz", ".7z", ".bz2", ".xz", ".tar.gz", ".tar.bz2",
            ".tar.xz",
        ],
    ),
];

/// Errors raised while loading an external category definition.
///
/// None of these are fatal to an organize run: callers recover by falling back to
/// [`CategoryMapping::builtin`], see [`CategoryMapping::load_or_default`].
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition file does not exist.
    #[error("category definition not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The definition file exists but could not be read or written.
    #[error("failed to access category definition {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The definition is not well-formed JSON.
    #[error("category definition is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON is well-formed but does not describe a category mapping.
    #[error("invalid category definition: {0}")]
    Invalid(String),
}

/// Result type for category definition handling.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Where a [`CategoryMapping`] comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionSource {
    /// The built-in table.
    BuiltIn,
    /// A JSON side file mapping category names to extension lists.
    File(PathBuf),
    /// JSON text supplied directly by the caller.
    Inline(String),
}

impl DefinitionSource {
    /// Uses `path` when given, the built-in table otherwise.
    pub fn from_optional_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::BuiltIn,
        }
    }
}

/// A named bucket of extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    extensions: Vec<String>,
}

impl Category {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-case, dot-prefixed extensions in definition order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

/// Ordered mapping from category name to extensions.
///
/// Immutable once built. Lookups go through an index that keeps, for each
/// extension, the first category listing it, so [`resolve`](Self::resolve) is
/// equivalent to scanning the categories in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
}

impl CategoryMapping {
    /// Returns the built-in category table.
    pub fn builtin() -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|(name, extensions)| Category {
                name: (*name).to_string(),
                extensions: extensions.iter().map(|ext| (*ext).to_string()).collect(),
            })
            .collect();
        Self::assemble(categories)
    }

    /// Builds a mapping from `(category, extensions)` pairs, keeping their order.
    ///
    /// Extensions are lower-cased and given a leading `.` when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Invalid`] for an empty or duplicated category name,
    /// a name that is not a plain directory name, or an empty extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use springclean::category::CategoryMapping;
    ///
    /// let mapping = CategoryMapping::new(vec![
    ///     ("RAW".to_string(), vec!["CR2".to_string(), ".nef".to_string()]),
    /// ])
    /// .unwrap();
    /// assert_eq!(mapping.resolve("IMG_0001.cr2"), "RAW");
    /// assert_eq!(mapping.resolve("scan.pdf"), "OTHERS");
    /// ```
    pub fn new<I>(entries: I) -> DefinitionResult<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut categories: Vec<Category> = Vec::new();
        for (name, raw_extensions) in entries {
            validate_category_name(&name)?;
            if categories.iter().any(|existing| existing.name == name) {
                return Err(DefinitionError::Invalid(format!(
                    "category '{name}' is defined more than once"
                )));
            }

            let extensions = raw_extensions
                .iter()
                .map(|ext| {
                    normalize_extension(ext).ok_or_else(|| {
                        DefinitionError::Invalid(format!(
                            "category '{name}' contains an empty extension"
                        ))
                    })
                })
                .collect::<DefinitionResult<Vec<_>>>()?;

            categories.push(Category { name, extensions });
        }
        Ok(Self::assemble(categories))
    }

    /// Parses a JSON object of the form `{"CATEGORY": [".ext", ...], ...}`.
    ///
    /// Key order in the document is the precedence order.
    pub fn from_json(text: &str) -> DefinitionResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let object = value.as_object().ok_or_else(|| {
            DefinitionError::Invalid(
                "expected an object mapping category names to extension lists".to_string(),
            )
        })?;

        let mut entries = Vec::with_capacity(object.len());
        for (name, value) in object {
            let list = value.as_array().ok_or_else(|| {
                DefinitionError::Invalid(format!(
                    "category '{name}' must map to a list of extensions"
                ))
            })?;
            let extensions = list
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        DefinitionError::Invalid(format!(
                            "category '{name}' contains a non-string extension: {item}"
                        ))
                    })
                })
                .collect::<DefinitionResult<Vec<_>>>()?;
            entries.push((name.clone(), extensions));
        }

        Self::new(entries)
    }

    /// Loads a mapping from `source`.
    ///
    /// # Errors
    ///
    /// Any [`DefinitionError`]; see [`load_or_default`](Self::load_or_default) for the
    /// recovering variant.
    pub fn load(source: &DefinitionSource) -> DefinitionResult<Self> {
        match source {
            DefinitionSource::BuiltIn => Ok(Self::builtin()),
            DefinitionSource::File(path) => {
                if !path.exists() {
                    return Err(DefinitionError::NotFound(path.clone()));
                }
                let text = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
                    path: path.clone(),
                    source,
                })?;
                let mapping = Self::from_json(&text)?;
                debug!(
                    path = %path.display(),
                    categories = mapping.len(),
                    "loaded category definition"
                );
                Ok(mapping)
            }
            DefinitionSource::Inline(text) => Self::from_json(text),
        }
    }

    /// Loads a mapping from `source`, degrading to the built-in table on any error.
    pub fn load_or_default(source: &DefinitionSource) -> Self {
        match Self::load(source) {
            Ok(mapping) => mapping,
            Err(error) => {
                warn!(%error, "using built-in categories instead");
                Self::builtin()
            }
        }
    }

    /// Writes this mapping to `path` as a JSON side file readable by [`load`](Self::load).
    pub fn save(&self, path: &Path) -> DefinitionResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| DefinitionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the category for `file_name`, or [`OTHERS`].
    ///
    /// Matching is case-insensitive and depends only on the mapping and the name.
    pub fn resolve(&self, file_name: &str) -> &str {
        self.index
            .get(&extension_of(file_name))
            .map(|&position| self.categories[position].name.as_str())
            .unwrap_or(OTHERS)
    }

    /// Categories in precedence order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn assemble(categories: Vec<Category>) -> Self {
        let mut index = HashMap::new();
        for (position, category) in categories.iter().enumerate() {
            for ext in &category.extensions {
                index.entry(ext.clone()).or_insert(position);
            }
        }
        Self { categories, index }
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Serialize for CategoryMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &category.extensions)?;
        }
        map.end()
    }
}

/// Returns the lower-cased extension of `file_name`, including its leading dot.
///
/// The extension runs from the last `.` to the end of the name. Leading dots do
/// not start an extension, so hidden files such as `.bashrc` have none.
///
/// # Examples
///
/// ```
/// use springclean::category::extension_of;
///
/// assert_eq!(extension_of("Holiday.JPG"), ".jpg");
/// assert_eq!(extension_of("backup.tar.gz"), ".gz");
/// assert_eq!(extension_of("Makefile"), "");
/// assert_eq!(extension_of(".bashrc"), "");
/// ```
pub fn extension_of(file_name: &str) -> String {
    let stem = file_name.trim_start_matches('.');
    match stem.rfind('.') {
        Some(dot) => stem[dot..].to_lowercase(),
        None => String::new(),
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().to_lowercase();
    match ext.as_str() {
        "" | "." => None,
        _ if ext.starts_with('.') => Some(ext),
        _ => Some(format!(".{ext}")),
    }
}

/// Category names become directory names under the target, so they must be a
/// single normal path component.
fn validate_category_name(name: &str) -> DefinitionResult<()> {
    if name.trim().is_empty() {
        return Err(DefinitionError::Invalid(
            "category names must not be empty".to_string(),
        ));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) if component == OsStr::new(name) => Ok(()),
        _ => Err(DefinitionError::Invalid(format!(
            "category name '{name}' is not a plain directory name"
        ))),
    }
}
