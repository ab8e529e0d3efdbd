use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// The read collections cached per professional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    TeamMembers,
    Services,
    TeamMemberServices,
    InsurancePlans,
    TeamMemberInsurancePlans,
    SlotTemplates,
    Appointments,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::TeamMembers => write!(f, "team_members"),
            CollectionKind::Services => write!(f, "services"),
            CollectionKind::TeamMemberServices => write!(f, "team_member_services"),
            CollectionKind::InsurancePlans => write!(f, "insurance_plans"),
            CollectionKind::TeamMemberInsurancePlans => write!(f, "team_member_insurance_plans"),
            CollectionKind::SlotTemplates => write!(f, "time_slots"),
            CollectionKind::Appointments => write!(f, "appointments"),
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    rows: Vec<Value>,
    created_at: Instant,
}

/// Short-lived cache of raw rows keyed by professional and collection.
///
/// Entries are advisory and may be stale for up to `ttl`.
pub struct ReadCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<(Uuid, CollectionKind), CacheEntry>>,
}

impl ReadCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, professional_id: Uuid, kind: CollectionKind) -> Option<Vec<Value>> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() <= self.ttl);
        entries.get(&(professional_id, kind)).map(|entry| entry.rows.clone())
    }

    pub async fn insert(&self, professional_id: Uuid, kind: CollectionKind, rows: Vec<Value>) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() <= self.ttl);

        if entries.len() >= self.max_entries && !entries.contains_key(&(professional_id, kind)) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| *key)
            {
                entries.remove(&victim);
            }
        }

        entries.insert(
            (professional_id, kind),
            CacheEntry {
                rows,
                created_at: Instant::now(),
            },
        );
    }

    /// Drops one collection, or every collection when `kind` is `None`.
    pub async fn invalidate(&self, professional_id: Uuid, kind: Option<CollectionKind>) {
        let mut entries = self.entries.lock().await;
        match kind {
            Some(kind) => {
                entries.remove(&(professional_id, kind));
            }
            None => entries.retain(|(owner, _), _| *owner != professional_id),
        }
        debug!("Invalidated cache for professional {} ({:?})", professional_id, kind);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
