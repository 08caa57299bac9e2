//! Disposal bins.
//!
//! Cleanup closures collected while a binding is set up and flushed together
//! at teardown. Flushing is idempotent.

use parking_lot::Mutex;

type Disposer = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct DisposalBin {
    items: Mutex<Vec<Disposer>>,
}

impl DisposalBin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, dispose: impl FnOnce() + Send + 'static) {
        self.items.lock().push(Box::new(dispose));
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Run every disposer in registration order.
    pub fn empty(&self) {
        let items = std::mem::take(&mut *self.items.lock());
        for dispose in items {
            dispose();
        }
    }
}

impl Drop for DisposalBin {
    fn drop(&mut self) {
        self.empty();
    }
}

impl std::fmt::Debug for DisposalBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalBin").field("pending", &self.len()).finish()
    }
}
