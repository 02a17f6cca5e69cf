use crate::watch::{Collection, WatchAdapter, WatchHandle, WatchRequest, WatchResource};

/// A query which only runs once its prerequisite is known.
///
/// While the prerequisite is absent, the query is withheld: no subscription exists and the
/// stage reports an empty, loaded collection. The subscription is only replaced when the
/// derived request changes.
#[derive(Debug)]
pub struct DependentWatch<K> {
    request: Option<WatchRequest>,
    handle: Option<WatchHandle<K>>,
}

impl<K> Default for DependentWatch<K> {
    fn default() -> Self {
        Self {
            request: None,
            handle: None,
        }
    }
}

impl<K: WatchResource> DependentWatch<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate, re-target, or withhold the query. Returns `true` if the subscription changed.
    pub fn activate<A, P, F>(&mut self, adapter: &A, prerequisite: Option<P>, query: F) -> bool
    where
        A: WatchAdapter,
        F: FnOnce(P) -> Option<WatchRequest>,
    {
        let request = prerequisite.and_then(query);
        if request == self.request {
            return false;
        }

        // release the old subscription first
        self.handle = None;
        self.handle = request.clone().map(|request| {
            log::debug!("Activating {} query: {request}", K::kind(&()));
            adapter.watch(request)
        });
        self.request = request;

        true
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn current(&self) -> Collection<K> {
        match &self.handle {
            Some(handle) => handle.current(),
            None => Collection::withheld(),
        }
    }

    pub fn handle_mut(&mut self) -> Option<&mut WatchHandle<K>> {
        self.handle.as_mut()
    }
}
