//! Observable state container.
//!
//! Decouples the store's mutable session state from any UI framework: the
//! store mutates through the cell, consumers read snapshots or subscribe
//! to change notifications.

use tokio::sync::watch;

/// Single-writer observable cell.
///
/// Every `update` notifies subscribers, even when the closure leaves the
/// value untouched; subscribers treat a notification as "state may have
/// changed" and re-read the snapshot.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Clone the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Mutate in place and notify subscribers.
    pub fn update(&self, mutate: impl FnOnce(&mut T)) {
        self.tx.send_modify(mutate);
    }

    /// Subscribe to change notifications.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_are_visible_to_snapshots_and_watchers() {
        let cell = StateCell::new(0u32);
        let mut watcher = cell.watch();

        cell.update(|value| *value += 1);
        assert_eq!(cell.get(), 1);

        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn watchers_are_notified_even_without_a_value_change() {
        let cell = StateCell::new(5u32);
        let mut watcher = cell.watch();
        cell.update(|_| {});
        watcher.changed().await.unwrap();
    }
}
