//! Content objects and path-derived tags
//!
//! A [`ContentObject`] is one stored blob: its fingerprint, original size,
//! compressed payload, and every name and tag it has been seen under.

use crate::content::codec::{self, Encoded, Fingerprint};
use crate::error::{CodecError, CodecResult};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

/// The unit of stored data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentObject {
    fingerprint: Fingerprint,
    size: u64,
    payload: Vec<u8>,
    names: BTreeSet<String>,
    tags: BTreeSet<String>,
}

impl ContentObject {
    /// Create an object with no names or tags yet
    pub fn new(fingerprint: Fingerprint, size: u64, payload: Vec<u8>) -> Self {
        Self {
            fingerprint,
            size,
            payload,
            names: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Build from codec output, a name and its tags
    pub fn from_encoded(encoded: Encoded, name: impl Into<String>, tags: BTreeSet<String>) -> Self {
        Self {
            fingerprint: encoded.fingerprint,
            size: encoded.size,
            payload: encoded.payload,
            names: BTreeSet::from([name.into()]),
            tags,
        }
    }

    /// Read, fingerprint and compress `path`, tagging it relative to `root`
    pub fn from_file(path: &Path, root: &Path) -> CodecResult<Self> {
        let name = clean_path(path);
        let file = File::open(&name).map_err(|source| CodecError::Read {
            path: name.clone(),
            source,
        })?;

        let encoded = codec::encode(file).map_err(|e| match e {
            CodecError::Io(source) => CodecError::Read {
                path: name.clone(),
                source,
            },
            other => other,
        })?;

        let tags = derive_tags(&name, root);
        Ok(Self::from_encoded(encoded, name.to_string_lossy(), tags))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Original (uncompressed) size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn compressed_size(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Union another observation of the same content into this one
    pub fn merge_from(&mut self, other: &ContentObject) {
        self.names.extend(other.names.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
    }

    /// Decompress the stored payload back to the original bytes
    pub fn decode(&self) -> CodecResult<Vec<u8>> {
        codec::decode(&self.payload)
    }
}

/// Lexically normalize a path
///
/// Removes `.` components and redundant or trailing separators, and folds
/// `dir/..` pairs. Relative paths stay relative; an empty result is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // "/.." is "/"
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Directory segments between `root` and the file at `path`
///
/// The filename and the root's own segments are never tags. A path that is
/// not under `root` has no tags.
pub fn derive_tags(path: &Path, root: &Path) -> BTreeSet<String> {
    let path = clean_path(path);
    let root = clean_path(root);

    let suffix = if root == Path::new(".") && path.is_relative() {
        path.as_path()
    } else {
        match path.strip_prefix(&root) {
            Ok(suffix) => suffix,
            Err(_) => return BTreeSet::new(),
        }
    };

    let Some(dir) = suffix.parent() else {
        return BTreeSet::new();
    };

    dir.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}
