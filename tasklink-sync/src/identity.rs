//! Identity map: cross-system links and per-entity sync checkpoints.
//!
//! Persists a [`LinkDocument`] JSON at `<home>/.tasklink/links.json`.
//! [`JsonIdentityStore`] writes through on every mutation using the atomic
//! `.tmp` + rename pattern, so a crash mid-pass loses at most the entity in
//! flight.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tasklink_core::{Checkpoint, EntityKind, NativeId, System};

use crate::error::{io_err, SyncError};

/// The opposite end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerRef {
    pub system: System,
    pub kind: EntityKind,
    pub id: NativeId,
}

/// Keyed storage of links and checkpoints.
pub trait IdentityMap: Send {
    fn get(&self, system: System, kind: EntityKind, id: NativeId) -> Option<PeerRef>;

    /// Link `(system, kind, id)` with `(system.peer(), kind, peer)` in both
    /// directions. Re-recording an existing link is a no-op; pointing either
    /// end somewhere else is a `LinkConflict`.
    fn set(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        peer: NativeId,
    ) -> Result<(), SyncError>;

    /// Unset checkpoints read as [`Checkpoint::UNSET`] (the epoch).
    fn checkpoint(&self, system: System, kind: EntityKind, id: NativeId) -> Checkpoint;

    fn set_checkpoint(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        checkpoint: Checkpoint,
    ) -> Result<(), SyncError>;
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

const DOCUMENT_VERSION: u32 = 1;

type ByKind<V> = BTreeMap<EntityKind, BTreeMap<NativeId, V>>;

/// On-disk identity map payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDocument {
    #[serde(default = "document_version")]
    pub version: u32,
    #[serde(default)]
    pub links: BTreeMap<System, ByKind<NativeId>>,
    #[serde(default)]
    pub checkpoints: BTreeMap<System, ByKind<Checkpoint>>,
}

fn document_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for LinkDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            links: BTreeMap::new(),
            checkpoints: BTreeMap::new(),
        }
    }
}

impl LinkDocument {
    pub fn peer(&self, system: System, kind: EntityKind, id: NativeId) -> Option<NativeId> {
        self.links.get(&system)?.get(&kind)?.get(&id).copied()
    }

    /// Returns whether the document changed.
    fn link(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        peer: NativeId,
    ) -> Result<bool, SyncError> {
        let peer_system = system.peer();
        let forward = self.peer(system, kind, id);
        let reverse = self.peer(peer_system, kind, peer);

        if let Some(existing) = forward.filter(|e| *e != peer) {
            return Err(SyncError::LinkConflict {
                system,
                kind,
                id,
                existing,
                requested: peer,
            });
        }
        if let Some(existing) = reverse.filter(|e| *e != id) {
            return Err(SyncError::LinkConflict {
                system: peer_system,
                kind,
                id: peer,
                existing,
                requested: id,
            });
        }
        if forward.is_some() && reverse.is_some() {
            return Ok(false);
        }

        self.links
            .entry(system)
            .or_default()
            .entry(kind)
            .or_default()
            .insert(id, peer);
        self.links
            .entry(peer_system)
            .or_default()
            .entry(kind)
            .or_default()
            .insert(peer, id);
        Ok(true)
    }

    pub fn checkpoint(&self, system: System, kind: EntityKind, id: NativeId) -> Checkpoint {
        self.checkpoints
            .get(&system)
            .and_then(|k| k.get(&kind))
            .and_then(|ids| ids.get(&id))
            .copied()
            .unwrap_or_default()
    }

    /// Returns whether the document changed.
    fn record_checkpoint(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        checkpoint: Checkpoint,
    ) -> bool {
        let slot = self
            .checkpoints
            .entry(system)
            .or_default()
            .entry(kind)
            .or_default()
            .entry(id)
            .or_default();
        if *slot == checkpoint {
            return false;
        }
        *slot = checkpoint;
        true
    }

    /// Number of `kind` entities of `system` that have a peer.
    pub fn link_count(&self, system: System, kind: EntityKind) -> usize {
        self.links
            .get(&system)
            .and_then(|k| k.get(&kind))
            .map_or(0, BTreeMap::len)
    }

    pub fn checkpoints_of(&self, system: System, kind: EntityKind) -> Vec<(NativeId, Checkpoint)> {
        self.checkpoints
            .get(&system)
            .and_then(|k| k.get(&kind))
            .map(|ids| ids.iter().map(|(id, cp)| (*id, *cp)).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// In-memory map
// ---------------------------------------------------------------------------

/// Non-durable identity map for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityMap {
    doc: LinkDocument,
}

impl MemoryIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &LinkDocument {
        &self.doc
    }
}

impl IdentityMap for MemoryIdentityMap {
    fn get(&self, system: System, kind: EntityKind, id: NativeId) -> Option<PeerRef> {
        peer_ref(&self.doc, system, kind, id)
    }

    fn set(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        peer: NativeId,
    ) -> Result<(), SyncError> {
        self.doc.link(system, kind, id, peer).map(|_| ())
    }

    fn checkpoint(&self, system: System, kind: EntityKind, id: NativeId) -> Checkpoint {
        self.doc.checkpoint(system, kind, id)
    }

    fn set_checkpoint(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        checkpoint: Checkpoint,
    ) -> Result<(), SyncError> {
        self.doc.record_checkpoint(system, kind, id, checkpoint);
        Ok(())
    }
}

fn peer_ref(doc: &LinkDocument, system: System, kind: EntityKind, id: NativeId) -> Option<PeerRef> {
    doc.peer(system, kind, id).map(|peer| PeerRef {
        system: system.peer(),
        kind,
        id: peer,
    })
}

// ---------------------------------------------------------------------------
// JSON store
// ---------------------------------------------------------------------------

/// `~/.tasklink/links.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    home.join(".tasklink").join("links.json")
}

/// Load the document at `path`; a missing file is an empty document.
pub fn load_document(path: &Path) -> Result<LinkDocument, SyncError> {
    if !path.exists() {
        return Ok(LinkDocument::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write-through identity map backed by a JSON file.
#[derive(Debug)]
pub struct JsonIdentityStore {
    path: PathBuf,
    doc: LinkDocument,
}

impl JsonIdentityStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let doc = load_document(&path)?;
        Ok(Self { path, doc })
    }

    pub fn open_at(home: &Path) -> Result<Self, SyncError> {
        Self::open(store_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &LinkDocument {
        &self.doc
    }

    /// Apply `change` to a copy and adopt it once the copy is on disk.
    fn commit(
        &mut self,
        change: impl FnOnce(&mut LinkDocument) -> Result<bool, SyncError>,
    ) -> Result<(), SyncError> {
        let mut next = self.doc.clone();
        if change(&mut next)? {
            self.write(&next)?;
            self.doc = next;
        }
        Ok(())
    }

    /// Writes to `<path>.tmp` then renames to `<path>`.
    fn write(&self, doc: &LinkDocument) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid identity store path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl IdentityMap for JsonIdentityStore {
    fn get(&self, system: System, kind: EntityKind, id: NativeId) -> Option<PeerRef> {
        peer_ref(&self.doc, system, kind, id)
    }

    fn set(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        peer: NativeId,
    ) -> Result<(), SyncError> {
        self.commit(|doc| doc.link(system, kind, id, peer))
    }

    fn checkpoint(&self, system: System, kind: EntityKind, id: NativeId) -> Checkpoint {
        self.doc.checkpoint(system, kind, id)
    }

    fn set_checkpoint(
        &mut self,
        system: System,
        kind: EntityKind,
        id: NativeId,
        checkpoint: Checkpoint,
    ) -> Result<(), SyncError> {
        self.commit(|doc| Ok(doc.record_checkpoint(system, kind, id, checkpoint)))
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}
