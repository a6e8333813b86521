use crate::domain::audit::PreviewResults;
use crate::domain::session::ClientId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Single-slot holder for the current in-session audit preview.
///
/// `None` means no active preview. Writes replace the slot (last write wins);
/// readers either take a snapshot with [`ResultsStore::current`] or follow
/// changes through [`ResultsStore::subscribe`]. Nothing is validated and
/// nothing survives a restart.
pub struct ResultsStore {
    slot: watch::Sender<Option<PreviewResults>>,
}

impl ResultsStore {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    pub fn set_results(&self, value: Option<PreviewResults>) {
        self.slot.send_replace(value);
    }

    pub fn clear(&self) {
        self.set_results(None);
    }

    pub fn current(&self) -> Option<PreviewResults> {
        self.slot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PreviewResults>> {
        self.slot.subscribe()
    }
}

impl Default for ResultsStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`ResultsStore`] per client. Slots are created on first use and
/// dropped when the client clears its preview.
#[derive(Default)]
pub struct ResultsRegistry {
    slots: Mutex<HashMap<ClientId, Arc<ResultsStore>>>,
}

impl ResultsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, client: &ClientId) -> Arc<ResultsStore> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(client.clone())
            .or_insert_with(|| Arc::new(ResultsStore::new()))
            .clone()
    }

    pub fn current(&self, client: &ClientId) -> Option<PreviewResults> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(client).and_then(|store| store.current())
    }

    pub fn clear(&self, client: &ClientId) {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(client);
        if let Some(store) = removed {
            store.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(score: f64) -> PreviewResults {
        PreviewResults {
            score: Some(score),
            summary_md: format!("score {}", score),
            ..Default::default()
        }
    }

    #[test]
    fn test_starts_empty_and_clears() {
        let store = ResultsStore::new();
        assert!(store.current().is_none());

        store.set_results(Some(preview(80.0)));
        assert_eq!(store.current().unwrap().score, Some(80.0));

        store.clear();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let store = ResultsStore::new();
        store.set_results(Some(preview(10.0)));
        store.set_results(Some(preview(20.0)));
        assert_eq!(store.current().unwrap().score, Some(20.0));
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = ResultsStore::new();
        let b = ResultsStore::new();
        a.set_results(Some(preview(1.0)));
        assert!(b.current().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let store = ResultsStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_none());

        store.set_results(Some(preview(55.0)));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().score, Some(55.0));

        store.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn test_registry_scopes_previews_by_client() {
        let registry = ResultsRegistry::new();
        let alice = ClientId::parse(Some("alice")).unwrap();
        let bob = ClientId::parse(Some("bob")).unwrap();

        registry.store(&alice).set_results(Some(preview(70.0)));
        assert_eq!(registry.current(&alice).unwrap().score, Some(70.0));
        assert!(registry.current(&bob).is_none());
        assert_eq!(registry.len(), 1);

        registry.clear(&bob);
        assert!(registry.current(&alice).is_some());

        let held = registry.store(&alice);
        registry.clear(&alice);
        assert!(registry.current(&alice).is_none());
        assert!(held.current().is_none());
        assert!(registry.is_empty());
    }
}
