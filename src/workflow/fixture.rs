//! Source payloads for uploads
//!
//! Every worker uploads the same pseudo-random payload for a given size. The
//! payload is generated once per size from a seeded Xoshiro256++ generator, so
//! a worker process handed the same seed and size rebuilds exactly the bytes
//! the parent would have used.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Immutable source payload of a fixed size
#[derive(Debug, PartialEq, Eq)]
pub struct Fixture {
    bytes: Vec<u8>,
}

impl Fixture {
    /// Generate a payload of `size` bytes from `seed`
    pub fn generate(size: u64, seed: u64) -> Self {
        let mut bytes = vec![0u8; size as usize];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-size fixture cache
///
/// The map is locked only while looking up or inserting an entry; workers
/// read the payload through their own `Arc` without further locking.
#[derive(Debug)]
pub struct FixtureStore {
    seed: u64,
    cache: Mutex<HashMap<u64, Arc<Fixture>>>,
}

impl FixtureStore {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fixture for `size`, generating it on first request
    pub fn get(&self, size: u64) -> Arc<Fixture> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .entry(size)
            .or_insert_with(|| {
                debug!(size, seed = self.seed, "generating fixture");
                Arc::new(Fixture::generate(size, self.seed))
            })
            .clone()
    }

    /// Number of distinct sizes generated so far
    pub fn cached_sizes(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Short lowercase label for a byte count, used in upload filenames
///
/// Picks the largest binary unit that divides the size evenly:
/// `10485760` → `10mb`, `1024` → `1kb`, `1500` → `1500b`.
pub fn size_label(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes == 0 {
        "0b".to_string()
    } else if bytes % GB == 0 {
        format!("{}gb", bytes / GB)
    } else if bytes % MB == 0 {
        format!("{}mb", bytes / MB)
    } else if bytes % KB == 0 {
        format!("{}kb", bytes / KB)
    } else {
        format!("{}b", bytes)
    }
}
