use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use serde::Serialize;
use walkdir::WalkDir;

use crate::{BuildError, Result};

/// Sub-containers the build writes into.
pub const REQUIRED_CONTAINERS: &[&str] = &[
    "moves",
    "battle",
    "partyjump",
    "practice",
    "sequences",
    "anims",
    "song",
];

/// Named-entry container for the packaged bundle.
///
/// Entry names are `/`-separated relative paths whose first segment is the
/// sub-container. The store is fully in memory; nothing reaches the disk
/// before [`AssetStore::save_dir`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AssetStore {
    source: Option<PathBuf>,
    containers: BTreeSet<String>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty template holding the given containers.
    pub fn with_containers<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut store = Self::new();
        for name in names {
            store.add_container(name);
        }
        store
    }

    /// Loads a template directory. Every sub-directory becomes a container
    /// and every file an entry.
    pub fn load_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(BuildError::resource(root, "asset template directory not found"));
        }
        let mut store = Self {
            source: Some(root.to_path_buf()),
            ..Self::default()
        };
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let name = entry_name(root, entry.path())?;
            if entry.file_type().is_dir() {
                store.containers.insert(name);
            } else {
                store.entries.insert(name, std::fs::read(entry.path())?);
            }
        }
        tracing::debug!(
            root = %root.display(),
            containers = store.containers.len(),
            entries = store.entries.len(),
            "loaded asset template"
        );
        Ok(store)
    }

    pub fn add_container(&mut self, name: &str) {
        self.containers.insert(name.to_string());
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.contains(name)
    }

    /// Fails with a resource error naming the first missing container.
    pub fn require_containers(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.has_container(name) {
                let path = self
                    .source
                    .as_deref()
                    .map(|root| root.join(name))
                    .unwrap_or_else(|| PathBuf::from(name));
                return Err(BuildError::resource(path, "required asset container is missing"));
            }
        }
        Ok(())
    }

    pub fn read_entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Writes or replaces an entry inside an existing container.
    pub fn write_entry(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let name = normalize_entry_name(name)?;
        let container = name.split('/').next().unwrap_or_default();
        if !self.has_container(container) {
            return Err(BuildError::msg(format!(
                "entry `{name}` targets unknown container `{container}`"
            )));
        }
        self.entries.insert(name, bytes);
        Ok(())
    }

    pub fn write_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_entry(name, bytes)
    }

    /// Entry names below `container`, in name order.
    pub fn list_entries(&self, container: &str) -> Vec<&str> {
        let prefix = format!("{container}/");
        self.entries
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every container and entry below `root`.
    pub fn save_dir(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)?;
        for container in &self.containers {
            std::fs::create_dir_all(root.join(container))?;
        }
        for (name, bytes) in &self.entries {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, bytes)?;
        }
        Ok(())
    }
}

/// `/`-separated name of `path` relative to the template root.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| BuildError::resource(path, "template entry outside the template root"))?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(segments.join("/"))
}

/// Normalizes separators and rejects absolute or escaping entry names.
pub fn normalize_entry_name(name: &str) -> Result<String> {
    let name = name.replace('\\', "/");
    let valid = !name.is_empty()
        && !name.starts_with('/')
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(name)
    } else {
        Err(BuildError::msg(format!("invalid asset entry name `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_into_known_containers_only() {
        let mut store = AssetStore::with_containers(["moves"]);
        store.write_entry("moves/graph.json", b"{}".to_vec()).unwrap();
        assert_eq!(store.read_entry("moves/graph.json"), Some(&b"{}"[..]));

        let err = store.write_entry("battle/steps.json", Vec::new()).unwrap_err();
        assert!(format!("{err}").contains("battle"));
    }

    #[test]
    fn replacing_an_entry_keeps_one_copy() {
        let mut store = AssetStore::with_containers(["song"]);
        store.write_entry("song/manifest.json", b"a".to_vec()).unwrap();
        store.write_entry("song/manifest.json", b"b".to_vec()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read_entry("song/manifest.json"), Some(&b"b"[..]));
    }

    #[test]
    fn lists_entries_per_container() {
        let mut store = AssetStore::with_containers(["anims", "practice"]);
        store.write_entry("anims/easy.json", Vec::new()).unwrap();
        store.write_entry("anims/expert.json", Vec::new()).unwrap();
        store.write_entry("practice/easy.json", Vec::new()).unwrap();
        assert_eq!(store.list_entries("anims"), vec!["anims/easy.json", "anims/expert.json"]);
    }

    #[test]
    fn rejects_escaping_names() {
        assert!(normalize_entry_name("../x.json").is_err());
        assert!(normalize_entry_name("/abs").is_err());
        assert_eq!(normalize_entry_name("a\\b.json").unwrap(), "a/b.json");
    }

    #[test]
    fn template_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AssetStore::with_containers(REQUIRED_CONTAINERS.iter().copied());
        store.write_entry("song/base.bin", vec![1, 2, 3]).unwrap();
        store.save_dir(dir.path()).unwrap();

        let loaded = AssetStore::load_dir(dir.path()).unwrap();
        loaded.require_containers(REQUIRED_CONTAINERS).unwrap();
        assert_eq!(loaded.read_entry("song/base.bin"), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn nested_template_directories_become_containers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sequences/easy")).unwrap();
        std::fs::write(dir.path().join("sequences/easy/b.json"), b"b").unwrap();
        std::fs::write(dir.path().join("sequences/easy/a.json"), b"a").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"top").unwrap();

        let store = AssetStore::load_dir(dir.path()).unwrap();
        assert!(store.has_container("sequences"));
        assert!(store.has_container("sequences/easy"));
        assert_eq!(
            store.list_entries("sequences"),
            vec!["sequences/easy/a.json", "sequences/easy/b.json"]
        );
        assert_eq!(store.read_entry("readme.txt"), Some(&b"top"[..]));
    }

    #[test]
    fn missing_template_directory_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AssetStore::load_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, BuildError::Resource { .. }));
    }

    #[test]
    fn missing_container_is_a_resource_error() {
        let store = AssetStore::with_containers(["moves"]);
        let err = store.require_containers(REQUIRED_CONTAINERS).unwrap_err();
        assert!(matches!(err, BuildError::Resource { .. }));
    }
}
