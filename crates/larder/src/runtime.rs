//! Runtime abstraction for background work.
//!
//! Producer runs, write-backs, and fallback timers are fire-and-forget tasks:
//! they must keep running after the waiters they started for have already
//! been answered.

#[derive(Clone, Debug)]
pub(crate) struct Runtime {
    kind: RuntimeKind,
}

#[derive(Clone, Debug)]
enum RuntimeKind {
    Tokio,
}

impl Runtime {
    pub(crate) fn new_tokio() -> Self {
        Self {
            kind: RuntimeKind::Tokio,
        }
    }

    pub(crate) fn spawn<T>(&self, work: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        match self.kind {
            RuntimeKind::Tokio => {
                drop(tokio::spawn(work));
            }
        }
    }
}
