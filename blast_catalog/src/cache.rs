use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blast_formats::RasterImage;
use once_cell::sync::OnceCell;

/// Identity of a decoded raster: the blob plus the palette it was expanded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: u32,
    pub palette: Option<u32>,
}

type Slot = Arc<OnceCell<Arc<RasterImage>>>;

/// Memoized decodes. Concurrent requests for one key share a single decode;
/// failed decodes are not stored.
///
/// Invalidation detaches slots rather than waiting on them. A decode still
/// running for an evicted key finishes into its detached slot and is handed
/// only to the callers already waiting on it; the next request for that key
/// decodes afresh from the current inputs.
#[derive(Debug, Default)]
pub struct DecodeCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decode<E, F>(&self, key: CacheKey, decode: F) -> Result<Arc<RasterImage>, E>
    where
        F: FnOnce() -> Result<RasterImage, E>,
    {
        let slot = self.slots().entry(key).or_default().clone();
        slot.get_or_try_init(|| decode().map(Arc::new)).cloned()
    }

    pub fn get(&self, key: CacheKey) -> Option<Arc<RasterImage>> {
        self.slots().get(&key).and_then(|slot| slot.get().cloned())
    }

    /// Drops every raster decoded from `address`, whatever palette it used.
    pub fn invalidate_address(&self, address: u32) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| key.address != address);
        before - slots.len()
    }

    /// Drops every raster expanded with the palette at `palette`.
    pub fn invalidate_palette(&self, palette: u32) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| key.palette != Some(palette));
        before - slots.len()
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of completed decodes held.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blast_formats::PixelLayout;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn image(value: u8) -> RasterImage {
        RasterImage::from_pixels(1, 1, PixelLayout::GrayAlpha8, vec![value; 2]).unwrap()
    }

    fn key(address: u32, palette: Option<u32>) -> CacheKey {
        CacheKey { address, palette }
    }

    #[test]
    fn decodes_once_per_key() {
        let cache = DecodeCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let result: Result<_, ()> = cache.get_or_decode(key(1, None), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(image(7))
            });
            assert_eq!(result.unwrap().pixels(), &[7, 7]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn palette_is_part_of_the_key() {
        let cache = DecodeCache::new();
        let a: Result<_, ()> = cache.get_or_decode(key(1, Some(10)), || Ok(image(1)));
        let b: Result<_, ()> = cache.get_or_decode(key(1, Some(20)), || Ok(image(2)));
        assert_eq!(a.unwrap().pixels(), &[1, 1]);
        assert_eq!(b.unwrap().pixels(), &[2, 2]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_retried() {
        let cache = DecodeCache::new();
        let failed: Result<Arc<RasterImage>, &str> =
            cache.get_or_decode(key(1, None), || Err("corrupt"));
        assert_eq!(failed.unwrap_err(), "corrupt");
        assert!(cache.is_empty());

        let ok: Result<_, &str> = cache.get_or_decode(key(1, None), || Ok(image(3)));
        assert_eq!(ok.unwrap().pixels(), &[3, 3]);
    }

    #[test]
    fn invalidation_drops_all_palettes_for_address() {
        let cache = DecodeCache::new();
        for (address, palette) in [(1, Some(10)), (1, Some(20)), (2, None)] {
            let _: Result<_, ()> = cache.get_or_decode(key(address, palette), || Ok(image(0)));
        }
        assert_eq!(cache.invalidate_address(1), 2);
        assert!(cache.get(key(1, Some(10))).is_none());
        assert!(cache.get(key(2, None)).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn palette_invalidation_spans_addresses() {
        let cache = DecodeCache::new();
        for (address, palette) in [(1, Some(10)), (2, Some(10)), (2, Some(20)), (3, None)] {
            let _: Result<_, ()> = cache.get_or_decode(key(address, palette), || Ok(image(0)));
        }
        assert_eq!(cache.invalidate_palette(10), 2);
        assert!(cache.get(key(1, Some(10))).is_none());
        assert!(cache.get(key(2, Some(20))).is_some());
        assert!(cache.get(key(3, None)).is_some());
    }

    #[test]
    fn eviction_during_decode_leaves_fresh_result_cached() {
        let cache = Arc::new(DecodeCache::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let stale = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let result: Result<_, ()> = cache.get_or_decode(key(7, None), || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(image(1))
                });
                result.unwrap().pixels().to_vec()
            })
        };

        started_rx.recv().unwrap();
        assert_eq!(cache.invalidate_address(7), 1);
        let fresh: Result<_, ()> = cache.get_or_decode(key(7, None), || Ok(image(2)));
        assert_eq!(fresh.unwrap().pixels(), &[2, 2]);

        release_tx.send(()).unwrap();
        assert_eq!(stale.join().unwrap(), vec![1, 1]);
        assert_eq!(cache.get(key(7, None)).unwrap().pixels(), &[2, 2]);
    }

    #[test]
    fn concurrent_requests_share_one_decode() {
        let cache = Arc::new(DecodeCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    let result: Result<_, ()> = cache.get_or_decode(key(5, Some(1)), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(10));
                        Ok(image(9))
                    });
                    result.unwrap().pixels().to_vec()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![9, 9]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
