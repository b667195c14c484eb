//! Deferred reclamation of decoded audio
//!
//! Assets are `basedrop::Shared` pointers. When the audio callback drops the
//! last reference to one (an emitter was killed while a buffer was being
//! mixed, say), the pointer is queued for a background collector instead of
//! freeing the sample buffer on the real-time thread.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let asset = Shared::new(&gc_handle(), DecodedAudio::from_wave(wave));
//! let for_engine = asset.clone();
//! drop(asset);
//! drop(for_engine); // last reference: queued, freed on the GC thread
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread sweeps its queue
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Spawn the collector thread and return a handle to it
///
/// Falls back to a collector owned by nobody if the thread cannot be
/// spawned; allocations then leak instead of being freed on the callback.
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("faucet-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.map_err(|e| e.to_string()).and_then(|_| {
        rx.recv().map_err(|e| e.to_string())
    }) {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Failed to start audio GC thread: {}", e);
            let collector = Collector::new();
            let handle = collector.handle();
            std::mem::forget(collector);
            handle
        }
    }
}

/// Handle for creating `Shared<T>` allocations collected off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
