//! Change-notification hook.
//!
//! The core's responsibility ends at reporting operation results; UI layers
//! subscribe here and the caller that performed a successful mutation pushes
//! the affected path through.

use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

type Listener = Box<dyn Fn(&Path) + Send + Sync>;

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Mutex<Vec<Listener>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&Path) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Report that the entry at `path` (or its parent directory's contents)
    /// changed.
    pub fn notify(&self, path: &Path) {
        debug!("change notification: {}", path.display());
        for listener in self.listeners.lock().unwrap().iter() {
            listener(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn all_listeners_fire() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            notifier.subscribe(move |path| {
                assert_eq!(path, Path::new("/sdcard/x"));
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        notifier.notify(Path::new("/sdcard/x"));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
