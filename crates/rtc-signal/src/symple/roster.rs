use std::collections::HashMap;

use tokio::sync::Mutex;

/// Metadata the presence layer tracks for one peer: the identifiers in its
/// `from` field plus arbitrary presence data it announced (status, group
/// membership, ...).
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    pub id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Map of peerId -> peer metadata, per the data model's Symple `Roster`
/// entry. Loop-local (no internal locking beyond what lets it be shared
/// across the client's read/write tasks).
#[derive(Default)]
pub struct Roster {
    peers: Mutex<HashMap<String, PeerInfo>>,
}

impl Roster {
    pub fn new() -> Self {
        Roster::default()
    }

    pub async fn update(&self, info: PeerInfo) {
        self.peers.lock().await.insert(info.id.clone(), info);
    }

    pub async fn remove(&self, id: &str) -> Option<PeerInfo> {
        self.peers.lock().await.remove(id)
    }

    pub async fn get(&self, id: &str) -> Option<PeerInfo> {
        self.peers.lock().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.peers.lock().await.contains_key(id)
    }

    pub async fn peer_ids(&self) -> Vec<String> {
        self.peers.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod roster_test {
    use super::*;

    #[tokio::test]
    async fn test_update_then_get_round_trips() {
        let roster = Roster::new();
        roster
            .update(PeerInfo {
                id: "B1".to_owned(),
                data: serde_json::Map::new(),
            })
            .await;
        assert!(roster.contains("B1").await);
        assert_eq!(roster.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_drops_a_peer() {
        let roster = Roster::new();
        roster
            .update(PeerInfo {
                id: "A1".to_owned(),
                data: serde_json::Map::new(),
            })
            .await;
        assert!(roster.remove("A1").await.is_some());
        assert!(!roster.contains("A1").await);
    }
}
