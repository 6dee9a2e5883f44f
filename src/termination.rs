use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use signal_hook::SigId;

pub use signal_hook::consts::SIGUSR2;

/**
 * Process-local, one-way termination flag. The flag holds the number of the
 * signal that tripped it, or zero while the run is still going. It is written
 * from a signal handler that does nothing but an atomic store, and read by
 * the bounce loops at their safe points. It is never reset, and it is never
 * shared with other ranks.
 */
#[derive(Clone, Debug, Default)]
pub struct Termination {
    flag: Arc<AtomicUsize>,
}

impl Termination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange for `signal` to trip this flag. The installed handler stores
    /// the signal number and nothing else.
    pub fn register(&self, signal: i32) -> std::io::Result<SigId> {
        signal_hook::flag::register_usize(signal, Arc::clone(&self.flag), signal as usize)
    }

    /// Trip the flag from ordinary code. A zero cause is recorded as `1` so
    /// the flag cannot be cleared this way.
    pub fn fire(&self, signal: usize) {
        self.flag.store(signal.max(1), Ordering::SeqCst)
    }

    /// The signal that terminated the run, if any.
    pub fn signal(&self) -> Option<usize> {
        match self.flag.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }

    pub fn is_set(&self) -> bool {
        self.signal().is_some()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn flag_starts_clear_and_stays_set() {
        let termination = Termination::new();
        assert!(!termination.is_set());

        termination.fire(12);
        assert_eq!(termination.signal(), Some(12));

        termination.fire(0);
        assert!(termination.is_set());
    }

    #[test]
    fn clones_share_the_flag() {
        let termination = Termination::new();
        let handle = termination.clone();
        handle.fire(SIGUSR2 as usize);
        assert_eq!(termination.signal(), Some(SIGUSR2 as usize));
    }

    #[test]
    fn registered_signal_trips_the_flag() {
        let termination = Termination::new();
        let id = termination.register(SIGUSR2).unwrap();
        signal_hook::low_level::raise(SIGUSR2).unwrap();
        assert_eq!(termination.signal(), Some(SIGUSR2 as usize));
        signal_hook::low_level::unregister(id);
    }
}
