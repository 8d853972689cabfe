use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::render::RenderSequence;

const JANITOR_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Shared {
    pending: Option<Box<RenderSequence>>,
    fresh: bool,
}

/// Wait-free handoff of compiled render sequences to the audio thread.
///
/// The topology thread publishes into the `pending` slot under the lock;
/// the audio thread try-locks and, when something fresh is waiting, swaps
/// `pending` with its own live slot. Nothing is ever dropped on the audio
/// thread: the swapped-out previous sequence parks in `pending` until the
/// janitor thread (or the next publish) reclaims it. A failed try-lock just
/// means the audio thread keeps rendering the sequence it already has.
pub struct SequenceExchange {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    janitor: Option<JoinHandle<()>>,
}

impl SequenceExchange {
    pub fn new() -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let running = Arc::new(AtomicBool::new(true));
        let janitor = spawn_janitor(Arc::clone(&shared), Arc::clone(&running));
        Self {
            shared,
            running,
            janitor: Some(janitor),
        }
    }

    /// Publishes a newly compiled sequence (or `None` after release).
    /// An undelivered previous publish is coalesced away right here, on the
    /// calling thread.
    pub fn publish(&self, sequence: Option<Box<RenderSequence>>) {
        let mut shared = self.shared.lock();
        shared.pending = sequence;
        shared.fresh = true;
    }

    /// Audio-thread side: installs the freshest published sequence into
    /// `live` if the lock is free, otherwise leaves `live` untouched.
    /// Returns whether a swap happened.
    pub fn try_install(&self, live: &mut Option<Box<RenderSequence>>) -> bool {
        if let Some(mut shared) = self.shared.try_lock() {
            if shared.fresh {
                mem::swap(&mut shared.pending, live);
                shared.fresh = false;
                return true;
            }
        }
        false
    }

    /// Drops a parked, already-superseded or already-installed sequence.
    /// The janitor calls this on its timer; it is harmless to call early.
    pub fn collect_garbage(&self) {
        let collected = {
            let mut shared = self.shared.lock();
            if shared.fresh {
                None
            } else {
                shared.pending.take()
            }
        };
        if collected.is_some() {
            tracing::trace!("reclaimed a retired render sequence");
        }
    }
}

impl Default for SequenceExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SequenceExchange {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(janitor) = self.janitor.take() {
            let _ = janitor.join();
        }
    }
}

fn spawn_janitor(shared: Arc<Mutex<Shared>>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("patchbay-sequence-janitor".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(JANITOR_INTERVAL);
                let mut shared = shared.lock();
                if !shared.fresh {
                    shared.pending.take();
                }
            }
        })
        .expect("failed to spawn sequence janitor thread")
}
