//! Per-path cache of emulated files with single-flight construction.
//!
//! Every path moves through `absent -> building -> ready`. Claiming a path
//! with [`EmulationCache::try_begin`] is an atomic insert-if-absent, so for
//! any number of concurrent callers exactly one owns construction. A caller
//! re-entering for a path it is still building gets `None` back instead of
//! recursing.
//!
//! Each claim carries a generation number. Invalidating a path that is being
//! built ends that claim: a later [`Claim::complete`] is dropped and the
//! claim's release leaves any newer owner's placeholder alone.
use crate::file::EmulatedFile;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Case-insensitive, separator-agnostic key for a target path.
///
/// Built from the raw bytes of the path. Valid UTF-8 runs are lower-cased
/// with `\` folded to `/`; any other bytes are kept as they are, so distinct
/// non-UTF-8 paths never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<u8>);

impl CacheKey {
    pub fn new(path: &Path) -> Self {
        let raw = path.as_os_str().as_encoded_bytes();
        let mut key = Vec::with_capacity(raw.len());

        for chunk in raw.utf8_chunks() {
            let text = chunk.valid().to_lowercase().replace('\\', "/");
            key.extend_from_slice(text.as_bytes());
            key.extend_from_slice(chunk.invalid());
        }

        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Building(u64),
    Ready(EmulatedFile),
}

/// State of a cached path.
#[derive(Debug, Clone)]
pub enum Lookup {
    Absent,
    Building,
    Ready(EmulatedFile),
}

/// Ownership of one construction of a path.
///
/// Dropping the claim without completing it releases the placeholder so the
/// path can be retried.
#[must_use = "dropping a claim abandons the construction"]
#[derive(Debug)]
pub struct Claim<'a> {
    cache: &'a EmulationCache,
    key: CacheKey,
    generation: u64,
    finished: bool,
}

impl Claim<'_> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stores the finished file, replacing the placeholder.
    ///
    /// Returns `false` if the claim was ended by an invalidation in the
    /// meantime. The file is then not cached.
    pub fn complete(mut self, file: EmulatedFile) -> bool {
        self.finished = true;

        match self.cache.entries.entry(self.key.clone()) {
            Entry::Occupied(mut e) if matches!(e.get(), Slot::Building(g) if *g == self.generation) => {
                debug!(key = %self.key, len = file.len(), "construction complete");
                e.insert(Slot::Ready(file));
                true
            }
            _ => {
                debug!(key = %self.key, generation = self.generation, "dropping stale construction");
                false
            }
        }
    }

    /// Releases the placeholder after a failed construction.
    pub fn abandon(self) {}

    fn release(&self) {
        let generation = self.generation;

        if self
            .cache
            .entries
            .remove_if(&self.key, |_, slot| matches!(slot, Slot::Building(g) if *g == generation))
            .is_some()
        {
            debug!(key = %self.key, "abandoned construction");
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}

#[derive(Debug, Default)]
pub struct EmulationCache {
    entries: DashMap<CacheKey, Slot>,
    generation: AtomicU64,
}

impl EmulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path` for construction.
    ///
    /// Returns `None` if the path is already being built or is ready.
    pub fn try_begin(&self, path: impl AsRef<Path>) -> Option<Claim<'_>> {
        let key = CacheKey::new(path.as_ref());

        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                trace!(key = %e.key(), "path already claimed");
                None
            }
            Entry::Vacant(e) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let key = e.key().clone();

                debug!(%key, generation, "claimed path for construction");
                e.insert(Slot::Building(generation));

                Some(Claim {
                    cache: self,
                    key,
                    generation,
                    finished: false,
                })
            }
        }
    }

    /// Returns the finished file for `path`, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<EmulatedFile> {
        match self.lookup(path) {
            Lookup::Ready(file) => Some(file),
            Lookup::Absent | Lookup::Building => None,
        }
    }

    pub fn lookup(&self, path: impl AsRef<Path>) -> Lookup {
        let key = CacheKey::new(path.as_ref());

        match self.entries.get(&key).as_deref() {
            None => Lookup::Absent,
            Some(Slot::Building(_)) => Lookup::Building,
            Some(Slot::Ready(file)) => Lookup::Ready(file.clone()),
        }
    }

    pub fn is_building(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.lookup(path), Lookup::Building)
    }

    /// Removes `path` whatever its state. Returns whether anything was removed.
    ///
    /// A construction in flight for `path` is ended: its result is not cached.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let key = CacheKey::new(path.as_ref());
        let removed = self.entries.remove(&key).is_some();

        if removed {
            debug!(%key, "invalidated");
        }

        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileemu_stream::CompositeStream;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    fn file() -> EmulatedFile {
        EmulatedFile::new(CompositeStream::empty())
    }

    fn ready(cache: &EmulationCache, path: &str) -> EmulatedFile {
        let built = file();
        assert!(cache.try_begin(path).unwrap().complete(built.clone()));
        built
    }

    #[test]
    fn keys_ignore_case_and_separators() {
        assert_eq!(
            CacheKey::new(Path::new("C:\\Game\\Content\\Paks\\global.UTOC")),
            CacheKey::new(Path::new("c:/game/content/paks/global.utoc"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn keys_keep_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let key = |raw: &[u8]| CacheKey::new(Path::new(OsStr::from_bytes(raw)));

        assert_ne!(key(b"Paks/\xff.utoc"), key(b"Paks/\xfe.utoc"));
        assert_eq!(key(b"PAKS/\xff.UTOC"), key(b"paks/\xff.utoc"));
        assert_eq!(key(b"PAKS/\xff.UTOC").as_bytes(), b"paks/\xff.utoc");
    }

    #[test]
    fn lifecycle() {
        let cache = EmulationCache::new();
        let path = "Paks/pakchunk0.utoc";

        assert!(matches!(cache.lookup(path), Lookup::Absent));
        let claim = cache.try_begin(path).unwrap();
        assert!(cache.is_building(path));
        assert!(cache.get(path).is_none());

        // Re-entry while building is refused.
        assert!(cache.try_begin("PAKS/PAKCHUNK0.UTOC").is_none());

        let built = file();
        assert!(claim.complete(built.clone()));

        assert!(cache.get(path).unwrap().ptr_eq(&built));
        assert!(cache.try_begin(path).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn dropped_claim_releases_the_path() {
        let cache = EmulationCache::new();

        cache.try_begin("a").unwrap().abandon();
        assert!(cache.is_empty());

        drop(cache.try_begin("a").unwrap());
        assert!(cache.is_empty());

        assert!(cache.try_begin("a").is_some());
    }

    #[test]
    fn stale_claim_leaves_newer_owner_alone() {
        let cache = EmulationCache::new();

        let first = cache.try_begin("x").unwrap();
        assert!(cache.invalidate("x"));

        let second = cache.try_begin("x").unwrap();
        assert_ne!(first.generation(), second.generation());

        first.abandon();
        assert!(cache.is_building("x"));
        assert!(cache.try_begin("x").is_none());

        assert!(second.complete(file()));
        assert!(cache.get("x").is_some());
    }

    #[test]
    fn completion_after_invalidation_is_dropped() {
        let cache = EmulationCache::new();

        let claim = cache.try_begin("y").unwrap();
        cache.invalidate("y");

        assert!(!claim.complete(file()));
        assert!(matches!(cache.lookup("y"), Lookup::Absent));

        let stale = cache.try_begin("z").unwrap();
        cache.invalidate("z");
        let fresh = cache.try_begin("z").unwrap();

        assert!(!stale.complete(file()));
        assert!(cache.is_building("z"));
        assert!(fresh.complete(file()));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = EmulationCache::new();
        ready(&cache, "a");
        ready(&cache, "b");

        assert!(cache.invalidate("A"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn exactly_one_thread_wins() {
        const THREADS: usize = 16;

        let cache = EmulationCache::new();
        let barrier = Barrier::new(THREADS);
        let winners = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    if let Some(claim) = cache.try_begin("shared.utoc") {
                        winners.fetch_add(1, Ordering::SeqCst);
                        // Keep the placeholder so late threads still see it.
                        std::mem::forget(claim);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completion_is_visible_across_threads() {
        let cache = EmulationCache::new();
        let claim = cache.try_begin("x").unwrap();

        std::thread::scope(|s| {
            s.spawn(move || assert!(claim.complete(file())));
        });

        assert!(cache.get("x").is_some());
    }
}
