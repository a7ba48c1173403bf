use tokio::sync::watch;

use super::Panel;

/// Whether the navigation bar is expanded.
///
/// One boolean topic: the owner toggles it, any number of components watch
/// it. Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct NavigationFlag {
    tx: watch::Sender<bool>,
}

impl Default for NavigationFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn is_expanded(&self) -> bool {
        *self.tx.borrow()
    }

    /// Flip and return the new value.
    pub fn toggle(&self) -> bool {
        let mut next = false;
        self.tx.send_modify(|current| {
            *current = !*current;
            next = *current;
        });
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Open and close `panel` as the flag changes. The task ends once every
    /// clone of the flag is dropped.
    pub fn drive(&self, panel: Panel) {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let expanded = *rx.borrow_and_update();
                if expanded {
                    panel.open();
                } else {
                    panel.close(None);
                }
            }
        });
    }
}
