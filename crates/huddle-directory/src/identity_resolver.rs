use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;

#[async_trait]
/// Maps a tracker-side identifier to a chat-platform user id, or absent.
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, tracker_id: &str) -> Option<String>;
}

#[derive(Default)]
struct DirectoryCache {
    mappings: HashMap<String, String>,
    loaded_at: Option<Instant>,
    outage_logged: bool,
}

/// Resolver backed by a JSON object file mapping tracker identifier to chat
/// user id. The file is re-read at most once per cache interval; a read or
/// parse failure empties the cache (everything resolves absent) and is
/// logged once per outage rather than once per identifier.
pub struct FileIdentityResolver {
    path: PathBuf,
    cache_interval: Duration,
    cache: Mutex<DirectoryCache>,
}

impl FileIdentityResolver {
    pub fn new(path: PathBuf, cache_interval: Duration) -> Self {
        Self {
            path,
            cache_interval,
            cache: Mutex::new(DirectoryCache::default()),
        }
    }

    fn refresh_if_stale(&self, cache: &mut DirectoryCache) {
        let stale = match cache.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() >= self.cache_interval,
            None => true,
        };
        if !stale {
            return;
        }
        cache.loaded_at = Some(Instant::now());
        let loaded = std::fs::read_to_string(&self.path)
            .map_err(|error| error.to_string())
            .and_then(|raw| {
                serde_json::from_str::<HashMap<String, String>>(&raw)
                    .map_err(|error| error.to_string())
            });
        match loaded {
            Ok(mappings) => {
                cache.mappings = mappings;
                cache.outage_logged = false;
            }
            Err(error) => {
                cache.mappings.clear();
                if !cache.outage_logged {
                    eprintln!(
                        "identity directory {} unavailable, treating all identifiers as unresolved: {error}",
                        self.path.display()
                    );
                    cache.outage_logged = true;
                }
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for FileIdentityResolver {
    async fn resolve(&self, tracker_id: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.refresh_if_stale(&mut cache);
        cache.mappings.get(tracker_id).cloned()
    }
}
