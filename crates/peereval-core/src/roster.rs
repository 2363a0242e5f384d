//! Peers eligible to receive points.

use serde::{Deserialize, Serialize};

/// A classmate the current user can award points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: String,
    #[serde(alias = "full_name")]
    pub name: String,
}

impl PeerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ordered list of selectable peers for one form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    peers: Vec<PeerRef>,
}

impl Roster {
    pub fn new(peers: Vec<PeerRef>) -> Self {
        Self { peers }
    }

    /// Build a roster for `user_id`, dropping the user themselves and any
    /// repeated id (first occurrence wins).
    pub fn for_user(peers: Vec<PeerRef>, user_id: &str) -> Self {
        let mut kept: Vec<PeerRef> = Vec::with_capacity(peers.len());
        for peer in peers {
            if peer.id == user_id || kept.iter().any(|p| p.id == peer.id) {
                continue;
            }
            kept.push(peer);
        }
        Self { peers: kept }
    }

    pub fn peers(&self) -> &[PeerRef] {
        &self.peers
    }

    pub fn get(&self, id: &str) -> Option<&PeerRef> {
        self.peers.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
