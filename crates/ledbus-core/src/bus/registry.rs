//! On-disk rendezvous directory shared by every attachment on a bus.
//!
//! ```text
//! <bus dir>/
//! ├── peers/<unique>.sock   endpoint of each connected attachment
//! ├── names/<well-known>    owner's unique name
//! └── adverts/<name>        JSON Advertisement
//! ```
//!
//! Files are replaced atomically (write to a temp file, then rename) so a
//! scanning peer never sees a half-written entry.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::listener::{NameFlags, TransportMask};
use super::status::{BusError, BusResult};

const PEERS_DIR: &str = "peers";
const NAMES_DIR: &str = "names";
const ADVERTS_DIR: &str = "adverts";

/// A name published for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub name: String,
    /// Unique name of the advertising attachment.
    pub owner: String,
    pub transport: TransportMask,
}

#[derive(Debug, Clone)]
pub(crate) struct Registry {
    root: PathBuf,
}

impl Registry {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory layout if missing.
    pub(crate) fn ensure_layout(&self) -> BusResult<()> {
        for dir in [PEERS_DIR, NAMES_DIR, ADVERTS_DIR] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    pub(crate) fn peer_socket(&self, unique_name: &str) -> PathBuf {
        self.root.join(PEERS_DIR).join(format!("{unique_name}.sock"))
    }

    /// An owner is alive while its endpoint socket exists.
    pub(crate) fn peer_alive(&self, unique_name: &str) -> bool {
        self.peer_socket(unique_name).exists()
    }

    pub(crate) fn name_owner(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(NAMES_DIR).join(name))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Record `owner` as the owner of `name`.
    ///
    /// A live foreign owner is displaced only with `replace_existing`. There
    /// is no waiting queue, so a refused request always fails immediately.
    pub(crate) fn claim_name(&self, name: &str, owner: &str, flags: NameFlags) -> BusResult<()> {
        if let Some(current) = self.name_owner(name)
            && current != owner
            && self.peer_alive(&current)
        {
            if !flags.replace_existing {
                return Err(BusError::NameExists(name.to_string()));
            }
            debug!(name, previous = %current, owner, "replacing name owner");
        }
        write_atomic(&self.root.join(NAMES_DIR).join(name), owner.as_bytes())
    }

    /// Drop `name` if, and only if, `owner` still holds it.
    pub(crate) fn release_name(&self, name: &str, owner: &str) {
        if self.name_owner(name).as_deref() == Some(owner) {
            remove_if_exists(&self.root.join(NAMES_DIR).join(name));
        }
    }

    /// Every name with a live owner.
    pub(crate) fn names(&self) -> BTreeMap<String, String> {
        list_dir(&self.root.join(NAMES_DIR))
            .into_iter()
            .filter_map(|name| {
                let owner = self.name_owner(&name)?;
                self.peer_alive(&owner).then_some((name, owner))
            })
            .collect()
    }

    pub(crate) fn advertise(&self, advert: &Advertisement) -> BusResult<()> {
        let bytes = serde_json::to_vec(advert)
            .map_err(|e| BusError::Protocol(format!("advertisement: {e}")))?;
        write_atomic(&self.root.join(ADVERTS_DIR).join(&advert.name), &bytes)
    }

    pub(crate) fn cancel_advertise(&self, name: &str, owner: &str) {
        let path = self.root.join(ADVERTS_DIR).join(name);
        if self.read_advert(&path).is_some_and(|a| a.owner == owner) {
            remove_if_exists(&path);
        }
    }

    /// Advertisements whose owner is still reachable.
    pub(crate) fn adverts(&self) -> Vec<Advertisement> {
        let dir = self.root.join(ADVERTS_DIR);
        list_dir(&dir)
            .into_iter()
            .filter_map(|name| self.read_advert(&dir.join(name)))
            .filter(|a| self.peer_alive(&a.owner))
            .collect()
    }

    /// Resolve a well-known or advertised name to its owner's unique name.
    pub(crate) fn resolve(&self, name: &str) -> Option<String> {
        if let Some(owner) = self.name_owner(name).filter(|o| self.peer_alive(o)) {
            return Some(owner);
        }
        self.adverts()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.owner)
    }

    fn read_advert(&self, path: &Path) -> Option<Advertisement> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| !n.starts_with('.'))
        .collect()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> BusResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BusError::Io(format!("bad registry path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}", std::process::id()));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "failed to remove registry entry");
    }
}
