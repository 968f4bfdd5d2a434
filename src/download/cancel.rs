use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation signal.
///
/// Clones share the same flag. A [`Cancellation::child`] is cancelled when
/// either itself or one of its ancestors is, without cancelling them.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .ancestors
                .iter()
                .any(|ancestor| ancestor.load(Ordering::SeqCst))
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.flag.clone());

        Self {
            flag: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }
}
