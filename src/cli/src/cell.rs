//! Observable state cells.

use tokio::sync::watch;

/// A value that subscribers can watch.
///
/// `set` replaces the value immediately, so a `get` that follows a `set`
/// always sees it, and receivers observe changes in the order they were made.
#[derive(Debug)]
pub struct StatusCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StatusCell<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value, returning the previous one.
    pub fn set(&self, value: T) -> T {
        self.tx.send_replace(value)
    }

    /// Mutate in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StatusCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Raises a boolean cell for as long as it is held.
///
/// Dropping the flag lowers the cell, including on early return.
pub struct BusyFlag<'a> {
    cell: &'a StatusCell<bool>,
}

impl<'a> BusyFlag<'a> {
    pub fn raise(cell: &'a StatusCell<bool>) -> Self {
        cell.set(true);
        Self { cell }
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.cell.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let cell = StatusCell::new(1);
        assert_eq!(cell.set(2), 1);
        assert_eq!(cell.get(), 2);
        cell.update(|v| *v += 1);
        assert_eq!(cell.get(), 3);
    }

    #[tokio::test]
    async fn test_subscriber_sees_updates() {
        let cell = StatusCell::new(false);
        let mut rx = cell.subscribe();

        cell.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_busy_flag_lowers_on_drop() {
        let busy = StatusCell::new(false);
        {
            let _flag = BusyFlag::raise(&busy);
            assert!(busy.get());
        }
        assert!(!busy.get());
    }
}
