//! Addresses for nodes in the document store.

use std::fmt::Display;

use crate::Error;

/// Characters that may not appear in a path segment.
const FORBIDDEN_CHARACTERS: [char; 5] = ['.', '#', '$', '[', ']'];

/// A `/`-separated address of a node in the document store, e.g. `"<identity>/records/<id>"`.
///
/// Paths always have at least one segment and no segment is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// Parse a path such as `"abc/records"`.
    ///
    /// Leading and trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidStorePath] if the path is empty, contains an
    /// empty segment (e.g. `"a//b"`) or a segment with a forbidden character.
    pub fn new(raw_path: &str) -> Result<Self, Error> {
        let trimmed = raw_path.trim_matches('/');

        if trimmed.is_empty() {
            return Err(Error::InvalidStorePath(raw_path.to_owned()));
        }

        let segments = trimmed
            .split('/')
            .map(|segment| {
                if is_valid_segment(segment) {
                    Ok(segment.to_owned())
                } else {
                    Err(Error::InvalidStorePath(raw_path.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(segments))
    }

    /// The path of the child node `segment` under this path.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidStorePath] if `segment` is not a valid single segment.
    pub fn child(&self, segment: &str) -> Result<Self, Error> {
        if !is_valid_segment(segment) || segment.contains('/') {
            return Err(Error::InvalidStorePath(format!("{self}/{segment}")));
        }

        let mut segments = self.0.clone();
        segments.push(segment.to_owned());

        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Whether a change at `self` may change the value at `other`, or vice versa.
    ///
    /// This is the case when the paths are equal or one is an ancestor of the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// All strict ancestors of this path, from the root down.
    pub fn ancestors(&self) -> impl Iterator<Item = StorePath> + '_ {
        (1..self.0.len()).map(|length| StorePath(self.0[..length].to_vec()))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(FORBIDDEN_CHARACTERS)
}

impl Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, store::StorePath};

    #[test]
    fn parses_nested_path() {
        let path = StorePath::new("/abc/records/123/").unwrap();

        assert_eq!(path.segments(), ["abc", "records", "123"]);
        assert_eq!(path.to_string(), "abc/records/123");
    }

    #[test]
    fn rejects_invalid_paths() {
        for raw_path in ["", "/", "a//b", "a/b.c", "a/#", "a/$b", "a/[0]"] {
            assert_eq!(
                StorePath::new(raw_path),
                Err(Error::InvalidStorePath(raw_path.to_owned())),
                "want {raw_path:?} to be rejected"
            );
        }
    }

    #[test]
    fn child_rejects_nested_segment() {
        let root = StorePath::new("abc").unwrap();

        assert!(root.child("records").is_ok());
        assert!(root.child("records/1").is_err());
        assert!(root.child("").is_err());
    }

    #[test]
    fn overlap_covers_ancestors_and_descendants() {
        let root = StorePath::new("abc").unwrap();
        let records = StorePath::new("abc/records").unwrap();
        let record = StorePath::new("abc/records/1").unwrap();
        let balance = StorePath::new("abc/balance").unwrap();
        let other_identity = StorePath::new("abcd/records").unwrap();

        assert!(root.is_ancestor_of(&record));
        assert!(!record.is_ancestor_of(&root));
        assert!(records.overlaps(&record));
        assert!(record.overlaps(&records));
        assert!(records.overlaps(&records));
        assert!(!records.overlaps(&balance));
        assert!(!records.overlaps(&other_identity));
    }

    #[test]
    fn ancestors_are_listed_from_the_root() {
        let path = StorePath::new("a/b/c").unwrap();

        let ancestors = path.ancestors().map(|p| p.to_string()).collect::<Vec<_>>();

        assert_eq!(ancestors, ["a", "a/b"]);
    }
}
