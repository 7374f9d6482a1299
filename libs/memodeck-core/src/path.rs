//! Slash-joined tree store paths.
//!
//! Paths are composed by walking entity parent links, never stored. Every
//! segment must be non-empty and URL-safe (no slashes, no whitespace).

use crate::error::{ModelError, Result};
use std::fmt;

/// A canonical path into the tree store.
///
/// Held as a list of validated segments; rendered slash-joined with no
/// leading or trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The empty path (the store root).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a path from segments, validating each.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for segment in segments {
            path.push(segment.into())?;
        }
        Ok(path)
    }

    /// Append a validated segment in place.
    pub fn push(&mut self, segment: impl Into<String>) -> Result<()> {
        let segment = segment.into();
        if segment.is_empty()
            || segment.contains('/')
            || segment.contains(char::is_whitespace)
        {
            return Err(ModelError::InvalidSegment { segment });
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let mut path = self.clone();
        path.push(segment)?;
        Ok(path)
    }

    /// The validated segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `self` is `other` or an ancestor of `other`.
    pub fn is_prefix_of(&self, other: &TreePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Slash-joined rendering, e.g. `users/u1/cards/d1/c1`.
    pub fn join(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}
