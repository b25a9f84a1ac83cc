//! Per-query "close on done" group.
//!
//! Attempts register a [`Closable`] for every socket or request they open.
//! Closing the pool closes everything still registered; a [`Registration`]
//! dropped before that closes and removes its own entry. Either way each
//! resource is closed exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio_util::sync::CancellationToken;

pub trait Closable: Send + Sync {
    fn close(&self);
}

impl Closable for CancellationToken {
    fn close(&self) {
        self.cancel();
    }
}

#[derive(Default)]
struct PoolState {
    closed: bool,
    next_id: u64,
    resources: HashMap<u64, Box<dyn Closable>>,
}

#[derive(Clone, Default)]
pub struct ClosePool {
    inner: Arc<Mutex<PoolState>>,
}

impl ClosePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` until the returned [`Registration`] is dropped.
    ///
    /// If the pool is already closed the resource is closed before returning.
    #[must_use = "dropping the registration closes the resource immediately"]
    pub fn add<C>(&self, resource: C) -> Registration
    where
        C: Closable + 'static,
    {
        let mut state = lock(&self.inner);
        if state.closed {
            drop(state);
            resource.close();
            return Registration {
                pool: Weak::new(),
                id: None,
            };
        }

        let id = state.next_id;
        state.next_id += 1;
        state.resources.insert(id, Box::new(resource));
        Registration {
            pool: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Closes every registered resource. Idempotent.
    pub fn close(&self) {
        let drained: Vec<Box<dyn Closable>> = {
            let mut state = lock(&self.inner);
            if state.closed {
                return;
            }
            state.closed = true;
            state.resources.drain().map(|(_, resource)| resource).collect()
        };

        for resource in drained {
            resource.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Number of resources currently registered.
    pub fn len(&self) -> usize {
        lock(&self.inner).resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ClosePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosePool")
            .field("open", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct Registration {
    pool: Weak<Mutex<PoolState>>,
    id: Option<u64>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let (Some(id), Some(pool)) = (self.id.take(), self.pool.upgrade()) else {
            return;
        };
        let resource = lock(&pool).resources.remove(&id);
        if let Some(resource) = resource {
            resource.close();
        }
    }
}

fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
