use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Separator between the segments of a materialized path (`ltree` label separator).
pub const SEPARATOR: char = '.';

/// PathError
///
/// Raised when a string cannot be used as a materialized item path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("item path is empty")]
    Empty,
    #[error("invalid item path segment `{0}`")]
    InvalidSegment(String),
}

/// ItemPath
///
/// Materialized path of an item: the ids of every ancestor followed by the item's own id,
/// joined by `.`, with the hyphens of each UUID replaced by underscores
/// (e.g. `4d2c..._9e1f.77ab..._01c3`). Stored as `ltree` on the Postgres side and read
/// back through a `::text` cast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct ItemPath(String);

impl ItemPath {
    /// Path of a root item with the given id.
    pub fn from_id(id: Uuid) -> Self {
        Self(encode_segment(id))
    }

    /// Path of a direct child of `self` with the given id.
    pub fn child(&self, id: Uuid) -> Self {
        Self(format!("{}{}{}", self.0, SEPARATOR, encode_segment(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Number of segments; a root item has depth 1.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Path with the last segment removed, `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|index| Self(self.0[..index].to_string()))
    }

    /// Id encoded by the last segment.
    pub fn item_id(&self) -> Option<Uuid> {
        id_from_path(self)
    }

    /// True iff `self` is `path` itself or one of its ancestors.
    pub fn is_ancestor_of(&self, path: &ItemPath) -> bool {
        is_ancestor_path_of(self, path)
    }

    /// Like `is_ancestor_of`, but false for the path itself.
    pub fn is_strict_ancestor_of(&self, path: &ItemPath) -> bool {
        self != path && is_ancestor_path_of(self, path)
    }
}

/// is_ancestor_path_of
///
/// Prefix law of materialized paths: true iff `path` equals `candidate` or starts with
/// `candidate` followed by the separator. A plain `starts_with` would wrongly accept
/// `a.bc` as a descendant of `a.b`.
pub fn is_ancestor_path_of(candidate: &ItemPath, path: &ItemPath) -> bool {
    match path.0.strip_prefix(candidate.0.as_str()) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// id_from_path
///
/// Extracts the id encoded by the final segment, turning underscores back into hyphens.
pub fn id_from_path(path: &ItemPath) -> Option<Uuid> {
    let last = path.0.rsplit(SEPARATOR).next()?;
    Uuid::parse_str(&last.replace('_', "-")).ok()
}

fn encode_segment(id: Uuid) -> String {
    id.hyphenated().to_string().replace('-', "_")
}

impl FromStr for ItemPath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(PathError::Empty);
        }
        for segment in value.split(SEPARATOR) {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(PathError::InvalidSegment(segment.to_string()));
            }
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for ItemPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemPath> for String {
    fn from(path: ItemPath) -> Self {
        path.0
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
