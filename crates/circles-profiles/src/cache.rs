//! # Profile Cache
//!
//! Point-lookup table of resolved profiles:
//!
//! ```text
//! profiles(id TEXT PRIMARY KEY, cid_v0 TEXT NULL, data TEXT NOT NULL)
//! ```
//!
//! `id` is the lowercase `0x` address for V1 lookups and the plain hex
//! digest for V2 lookups. Entries are never re-validated.

use crate::error::ProfileError;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use shared_types::ProfileMetadata;
use std::path::Path;
use tracing::{debug, info};

/// A cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProfile {
    pub cid_v0: Option<String>,
    pub profile: ProfileMetadata,
}

pub struct SqliteProfileCache {
    db: Mutex<Connection>,
}

impl SqliteProfileCache {
    /// Opens or creates the cache file.
    pub fn open(path: &Path) -> Result<Self, ProfileError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        let cache = Self::init(db)?;
        info!(path = %path.display(), "Profile cache opened");
        Ok(cache)
    }

    /// Cache that lives only as long as the process.
    pub fn in_memory() -> Result<Self, ProfileError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self, ProfileError> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                cid_v0 TEXT,
                data TEXT NOT NULL
            );",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn get(&self, id: &str) -> Result<Option<CachedProfile>, ProfileError> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached("SELECT cid_v0, data FROM profiles WHERE id = ?1")?;
        let row = stmt
            .query_row([id], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;

        match row {
            Some((cid_v0, data)) => Ok(Some(CachedProfile {
                cid_v0,
                profile: serde_json::from_str(&data)?,
            })),
            None => Ok(None),
        }
    }

    /// Upsert.
    pub fn put(
        &self,
        id: &str,
        cid_v0: Option<&str>,
        profile: &ProfileMetadata,
    ) -> Result<(), ProfileError> {
        let data = serde_json::to_string(profile)?;
        self.db.lock().execute(
            "INSERT INTO profiles (id, cid_v0, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET cid_v0 = ?2, data = ?3",
            params![id, cid_v0, data],
        )?;
        debug!(id, bytes = data.len(), "Cached profile");
        Ok(())
    }

    pub fn len(&self) -> Result<usize, ProfileError> {
        let count: i64 = self
            .db
            .lock()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, ProfileError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> ProfileMetadata {
        ProfileMetadata {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_replaces() {
        let cache = SqliteProfileCache::in_memory().unwrap();
        assert!(cache.get("abc").unwrap().is_none());

        cache.put("abc", Some("Qm1"), &named("first")).unwrap();
        cache.put("abc", Some("Qm2"), &named("second")).unwrap();

        let hit = cache.get("abc").unwrap().unwrap();
        assert_eq!(hit.cid_v0.as_deref(), Some("Qm2"));
        assert_eq!(hit.profile, named("second"));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.db");

        SqliteProfileCache::open(&path)
            .unwrap()
            .put("0xabc", None, &named("alice"))
            .unwrap();

        let reopened = SqliteProfileCache::open(&path).unwrap();
        let hit = reopened.get("0xabc").unwrap().unwrap();
        assert_eq!(hit.cid_v0, None);
        assert_eq!(hit.profile.name.as_deref(), Some("alice"));
    }
}
