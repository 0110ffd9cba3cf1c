//! Object key layout of a release repository.
//!
//! All key arithmetic lives here so that the walker, the transfer engine and
//! the retention engine agree on one layout. Keys never start with a slash.

use crate::name::RepositoryName;
use crate::timestamp::Timestamp;

/// Separator between key segments, also used as the listing delimiter.
pub const DELIMITER: &str = "/";

/// Object name of the release manifest inside a release prefix.
pub const MANIFEST_FILE_NAME: &str = "meta.yml";

/// `<name>/<timestamp>`
pub fn release_prefix(name: &RepositoryName, timestamp: &Timestamp) -> String {
    format!("{name}{DELIMITER}{timestamp}")
}

/// `<name>/<timestamp>/meta.yml`
pub fn manifest_key(name: &RepositoryName, timestamp: &Timestamp) -> String {
    object_key(name, timestamp, MANIFEST_FILE_NAME)
}

/// `<name>/<timestamp>/<binary>`
pub fn object_key(name: &RepositoryName, timestamp: &Timestamp, binary: &str) -> String {
    format!("{}{DELIMITER}{binary}", release_prefix(name, timestamp))
}

/// Classification of a key (or common prefix) met while exploring the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyClass {
    /// The key sits at or directly below a release boundary.
    Boundary {
        name: RepositoryName,
        timestamp: Timestamp,
    },
    /// Not a release; the contained prefix (with trailing delimiter) should
    /// be listed to look deeper.
    Descend(String),
}

impl KeyClass {
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::Boundary { .. })
    }
}

/// Classify a listed key.
///
/// `a/b/c/20210101000000` and `a/b/c/20210101000000/bin` are both boundaries
/// of release `a/b/c`: the last segment is checked first, then the one
/// before it. Anything else descends. A trailing delimiter (as returned for
/// common prefixes) is ignored.
pub fn classify_key(key: &str) -> KeyClass {
    let trimmed = key.trim_end_matches('/');
    let items: Vec<&str> = trimmed.split('/').collect();
    let len = items.len();

    if len >= 2 {
        if let Ok(timestamp) = Timestamp::parse(items[len - 1]) {
            if let Ok(name) = RepositoryName::parse(&items[..len - 1].join(DELIMITER)) {
                return KeyClass::Boundary { name, timestamp };
            }
        } else if let Ok(timestamp) = Timestamp::parse(items[len - 2]) {
            if let Ok(name) = RepositoryName::parse(&items[..len - 2].join(DELIMITER)) {
                return KeyClass::Boundary { name, timestamp };
            }
        }
    }

    if trimmed.is_empty() {
        KeyClass::Descend(String::new())
    } else {
        KeyClass::Descend(format!("{trimmed}{DELIMITER}"))
    }
}

/// Release name encoded in `key`, if the key is at a release boundary.
pub fn parse_release_name(key: &str) -> Option<RepositoryName> {
    match classify_key(key) {
        KeyClass::Boundary { name, .. } => Some(name),
        KeyClass::Descend(_) => None,
    }
}

/// The most recent timestamp, or `None` when there are no releases.
pub fn latest_of<'a, I>(timestamps: I) -> Option<&'a Timestamp>
where
    I: IntoIterator<Item = &'a Timestamp>,
{
    timestamps.into_iter().max()
}
