//! Raw asset access and the decoded-definition caches.
//!
//! Caches follow one rule: a value is built outside the lock and the first
//! insert for a key wins. Two threads racing on the same key may both
//! decode, but every caller gets the same published `Arc` afterwards and
//! nothing half-built is ever visible.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;

use super::floor::{OverlayDefinition, UnderlayDefinition};
use super::object::ObjectDefinition;
use crate::error::{Result, SceneError};
use crate::terrain::FloorSource;

/// Raw bytes by id. How they are stored is up to the host.
pub trait AssetSource: Send + Sync {
    fn mesh(&self, id: u32) -> Option<Vec<u8>>;
    fn object(&self, id: u32) -> Option<Vec<u8>>;
    fn underlay(&self, id: u32) -> Option<Vec<u8>>;
    fn overlay(&self, id: u32) -> Option<Vec<u8>>;
    fn has_texture(&self, _id: i32) -> bool {
        true
    }
}

// ============================================================================
// Shared cache
// ============================================================================

#[derive(Debug)]
pub struct SharedCache<K, V> {
    map: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for SharedCache<K, V> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy, V> SharedCache<K, V> {
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    /// Return the cached value, building and publishing it if absent.
    pub fn get_or_try_insert<F>(&self, key: K, build: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = Arc::new(build()?);
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(map.entry(key).or_insert(value)))
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Definition store
// ============================================================================

/// Decoded definitions over an [`AssetSource`], safe to share between
/// region workers.
pub struct DefinitionStore<S> {
    source: S,
    objects: SharedCache<u32, ObjectDefinition>,
    underlays: SharedCache<u16, UnderlayDefinition>,
    overlays: SharedCache<u16, OverlayDefinition>,
}

impl<S: AssetSource> DefinitionStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            objects: SharedCache::default(),
            underlays: SharedCache::default(),
            overlays: SharedCache::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn object(&self, id: u32) -> Result<Arc<ObjectDefinition>> {
        self.objects.get_or_try_insert(id, || {
            let bytes = self
                .source
                .object(id)
                .ok_or(SceneError::MissingDefinition { kind: "object", id })?;
            ObjectDefinition::decode(id, &bytes)
        })
    }

    pub fn cached_objects(&self) -> usize {
        self.objects.len()
    }
}

impl<S: AssetSource> FloorSource for DefinitionStore<S> {
    fn underlay(&self, id: u16) -> Result<Arc<UnderlayDefinition>> {
        self.underlays.get_or_try_insert(id, || {
            let def_id = id as u32 - 1;
            let bytes = self.source.underlay(def_id).ok_or(SceneError::MissingDefinition {
                kind: "underlay",
                id: def_id,
            })?;
            UnderlayDefinition::decode(def_id, &bytes)
        })
    }

    fn overlay(&self, id: u16) -> Result<Arc<OverlayDefinition>> {
        self.overlays.get_or_try_insert(id, || {
            let def_id = id as u32 - 1;
            let bytes = self.source.overlay(def_id).ok_or(SceneError::MissingDefinition {
                kind: "overlay",
                id: def_id,
            })?;
            OverlayDefinition::decode(def_id, &bytes)
        })
    }

    fn has_texture(&self, texture: i32) -> bool {
        self.source.has_texture(texture)
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Asset source backed by hash maps. `textures` lists the resolvable
/// texture ids; `None` accepts every id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub meshes: HashMap<u32, Vec<u8>>,
    pub objects: HashMap<u32, Vec<u8>>,
    pub underlays: HashMap<u32, Vec<u8>>,
    pub overlays: HashMap<u32, Vec<u8>>,
    pub textures: Option<HashSet<i32>>,
}

impl MemorySource {
    /// Load `<root>/{meshes,objects,underlays,overlays}/<id>.dat`. Missing
    /// subdirectories are treated as empty.
    pub fn load_dir(root: &Path) -> anyhow::Result<Self> {
        let mut source = MemorySource::default();
        for (name, map) in [
            ("meshes", &mut source.meshes),
            ("objects", &mut source.objects),
            ("underlays", &mut source.underlays),
            ("overlays", &mut source.overlays),
        ] {
            let dir = root.join(name);
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?
            {
                let path = entry?.path();
                let Some(id) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<u32>().ok())
                else {
                    continue;
                };
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                map.insert(id, bytes);
            }
        }
        Ok(source)
    }
}

impl AssetSource for MemorySource {
    fn mesh(&self, id: u32) -> Option<Vec<u8>> {
        self.meshes.get(&id).cloned()
    }

    fn object(&self, id: u32) -> Option<Vec<u8>> {
        self.objects.get(&id).cloned()
    }

    fn underlay(&self, id: u32) -> Option<Vec<u8>> {
        self.underlays.get(&id).cloned()
    }

    fn overlay(&self, id: u32) -> Option<Vec<u8>> {
        self.overlays.get(&id).cloned()
    }

    fn has_texture(&self, id: i32) -> bool {
        self.textures.as_ref().map_or(true, |t| t.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cache_publishes_first_value() {
        let cache: SharedCache<u32, String> = SharedCache::default();
        let calls = AtomicUsize::new(0);
        let a = cache
            .get_or_try_insert(1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("one".to_string())
            })
            .unwrap();
        let b = cache
            .get_or_try_insert(1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("other".to_string())
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache: SharedCache<u32, u8> = SharedCache::default();
        assert!(cache
            .get_or_try_insert(1, || Err(SceneError::corrupt("mesh", "bad")))
            .is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn store_decodes_once_and_reports_missing() {
        let mut source = MemorySource::default();
        source.objects.insert(4, vec![14, 2, 0]);
        source.underlays.insert(0, vec![1, 0x10, 0x20, 0x30, 0]);
        let store = DefinitionStore::new(source);

        let a = store.object(4).unwrap();
        let b = store.object(4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.size_x, 2);
        assert!(matches!(
            store.object(5),
            Err(SceneError::MissingDefinition { kind: "object", id: 5 })
        ));
        // tile ids are one-based
        assert_eq!(store.underlay(1).unwrap().rgb, 0x102030);
    }

    #[test]
    fn load_dir_reads_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("objects")).unwrap();
        std::fs::write(dir.path().join("objects/12.dat"), [0u8]).unwrap();
        std::fs::write(dir.path().join("objects/readme.txt"), b"x").unwrap();
        let source = MemorySource::load_dir(dir.path()).unwrap();
        assert_eq!(source.objects.len(), 1);
        assert_eq!(source.object(12), Some(vec![0]));
        assert!(source.meshes.is_empty());
    }
}
