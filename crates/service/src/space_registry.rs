//! The process-wide space registry (spec §3 "SpaceRegistry", C8's
//! startup recovery responsibility). Grounded on
//! `examples/original_source/zqd/space/space.go`'s `loadSpaces`, which
//! walks disk at startup to rebuild the in-memory space map.
//!
//! ADDED beyond a literal port: `Source` never exposes directory
//! listing (see `zq-storage`'s capability contract), so recovery can't
//! walk the storage root for space directories the way the Go manager
//! does. Instead this registry keeps a `spaces.json` manifest — just
//! the list of space ids — at the storage root, read at startup and
//! rewritten on every create/delete. Each space's own `config.json`
//! remains the source of truth for its fields; the manifest only
//! exists to answer "what ids are there" without a directory listing.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use zq_archive::Archive;
use zq_concurrency::GuardRegistry;
use zq_core::{Direction, Error, Result, SpaceId};
use zq_storage::{Source, Uri};
use zq_wire::protocol::{SpacePostRequest, SpacePutRequest};

use crate::space::{self, InfoCache, SpaceConfig, StorageKind};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    ids: Vec<SpaceId>,
}

impl Manifest {
    const FILENAME: &'static str = "spaces.json";

    fn uri(root: &Uri) -> Uri {
        root.append_path(Self::FILENAME)
    }

    fn read(source: &dyn Source, root: &Uri) -> Result<Manifest> {
        let uri = Self::uri(root);
        if !source.exists(&uri)? {
            return Ok(Manifest::default());
        }
        let bytes = zq_storage::read_all(source, &uri)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, source: &dyn Source, root: &Uri) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        zq_storage::write_all(source, &Self::uri(root), &bytes)
    }
}

/// Holds every known space's configuration plus the per-space
/// concurrency guards, recovered from disk at startup (spec §3
/// "Lifecycles").
pub struct SpaceRegistry {
    root: Uri,
    source: Arc<dyn Source>,
    guards: GuardRegistry,
    spaces: RwLock<HashMap<SpaceId, SpaceConfig>>,
}

impl SpaceRegistry {
    /// Recover every space listed in the root manifest, skipping (with
    /// a logged warning) any whose `config.json` can't be read rather
    /// than failing the whole startup.
    pub fn open(source: Arc<dyn Source>, root: Uri) -> Result<SpaceRegistry> {
        if let Some(dir_maker) = source.as_dir_maker() {
            dir_maker.mkdir_all(&root)?;
        }
        let manifest = Manifest::read(source.as_ref(), &root)?;
        let mut spaces = HashMap::with_capacity(manifest.ids.len());
        for id in &manifest.ids {
            let space_root = root.append_path(id.as_str());
            match SpaceConfig::read(source.as_ref(), &space_root) {
                Ok(cfg) => {
                    spaces.insert(id.clone(), cfg);
                }
                Err(err) => {
                    tracing::warn!(space = %id.as_str(), error = %err, "failed to recover space, skipping");
                }
            }
        }
        Ok(SpaceRegistry {
            root,
            source,
            guards: GuardRegistry::new(),
            spaces: RwLock::new(spaces),
        })
    }

    pub fn root(&self) -> &Uri {
        &self.root
    }

    pub fn source(&self) -> Arc<dyn Source> {
        self.source.clone()
    }

    pub fn guards(&self) -> &GuardRegistry {
        &self.guards
    }

    pub fn list(&self) -> Vec<SpaceConfig> {
        self.spaces.read().values().cloned().collect()
    }

    pub fn get(&self, id: &SpaceId) -> Result<SpaceConfig> {
        self.spaces
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no such space: {}", id.as_str())))
    }

    pub fn info_cache(&self, config: &SpaceConfig) -> Result<InfoCache> {
        InfoCache::read(self.source.as_ref(), &config.root())
    }

    pub fn open_archive(&self, config: &SpaceConfig) -> Result<Archive> {
        space::open_archive(self.source.clone(), config)
    }

    /// Create a new space (spec §6 `POST /space`). `data_path`, when
    /// given, overrides the default `<root>/<id>` location (spec §3
    /// "Space" allows a caller-supplied storage path).
    pub fn create(&self, request: SpacePostRequest) -> Result<SpaceConfig> {
        let id = SpaceId::new();
        let name = request.name.unwrap_or_else(|| id.as_str().to_string());
        let data_path = request
            .data_path
            .unwrap_or_else(|| self.root.append_path(id.as_str()).to_string());

        let config = SpaceConfig {
            id: id.clone(),
            name,
            data_path,
            pcap_path: None,
            storage_kind: StorageKind::ArchiveStore,
            direction: Direction::Forward,
        };

        let space_root = config.root();
        if let Some(dir_maker) = self.source.as_dir_maker() {
            dir_maker.mkdir_all(&space_root)?;
        }
        config.write(self.source.as_ref(), &space_root)?;
        InfoCache::default().write(self.source.as_ref(), &space_root)?;
        space::open_archive(self.source.clone(), &config)?;

        {
            let mut spaces = self.spaces.write();
            spaces.insert(id.clone(), config.clone());
        }
        self.rewrite_manifest()?;
        Ok(config)
    }

    /// Rename a space in place (spec §6 `PUT /space/{id}`).
    pub fn update(&self, id: &SpaceId, request: SpacePutRequest) -> Result<SpaceConfig> {
        let mut spaces = self.spaces.write();
        let config = spaces
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("no such space: {}", id.as_str())))?;
        config.name = request.name;
        config.write(self.source.as_ref(), &config.root())?;
        Ok(config.clone())
    }

    /// Associate a pcap file with a space (spec §6 `POST /pcap/{space}`).
    pub fn set_pcap_path(&self, id: &SpaceId, pcap_path: String) -> Result<SpaceConfig> {
        let mut spaces = self.spaces.write();
        let config = spaces
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("no such space: {}", id.as_str())))?;
        config.pcap_path = Some(pcap_path);
        config.write(self.source.as_ref(), &config.root())?;
        Ok(config.clone())
    }

    /// Delete a space (spec §4.8/§6 `DELETE /space/{id}`): waits for
    /// every in-flight operation against the space to finish via the
    /// guard, then removes its storage and drops it from the registry.
    pub async fn delete(&self, id: &SpaceId) -> Result<()> {
        let config = self.get(id)?;
        let guard = self.guards.get_or_create(id);
        guard.acquire_for_delete().await?;

        self.source.remove_all(&config.root())?;

        self.spaces.write().remove(id);
        self.guards.forget(id);
        self.rewrite_manifest()?;
        Ok(())
    }

    fn rewrite_manifest(&self) -> Result<()> {
        let ids: Vec<SpaceId> = self.spaces.read().keys().cloned().collect();
        Manifest { ids }.write(self.source.as_ref(), &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_storage::LocalSource;

    fn registry(dir: &std::path::Path) -> SpaceRegistry {
        SpaceRegistry::open(Arc::new(LocalSource), Uri::from_path(dir)).unwrap()
    }

    #[test]
    fn create_persists_config_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let cfg = reg.create(SpacePostRequest { name: Some("a".into()), data_path: None }).unwrap();
        assert_eq!(reg.get(&cfg.id).unwrap().name, "a");
        assert_eq!(reg.list().len(), 1);
    }

    #[test]
    fn reopening_recovers_spaces_from_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let reg = registry(dir.path());
            let cfg = reg.create(SpacePostRequest { name: Some("a".into()), data_path: None }).unwrap();
            cfg.id
        };
        let reopened = registry(dir.path());
        assert!(reopened.get(&id).is_ok());
    }

    #[test]
    fn update_renames_a_space() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let cfg = reg.create(SpacePostRequest { name: Some("a".into()), data_path: None }).unwrap();
        let updated = reg.update(&cfg.id, SpacePutRequest { name: "b".into() }).unwrap();
        assert_eq!(updated.name, "b");
    }

    #[test]
    fn get_missing_space_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let err = reg.get(&SpaceId::new()).unwrap_err();
        assert_eq!(err.kind(), zq_core::Kind::NotFound);
    }

    #[tokio::test]
    async fn delete_removes_space_from_registry_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let cfg = reg.create(SpacePostRequest { name: Some("a".into()), data_path: None }).unwrap();
        reg.delete(&cfg.id).await.unwrap();
        assert!(reg.get(&cfg.id).is_err());
        assert_eq!(reg.list().len(), 0);

        let reopened = registry(dir.path());
        assert_eq!(reopened.list().len(), 0);
    }
}
