//! The Store - runtime coordinator for a reducer.
//!
//! The Store manages:
//! 1. The current snapshot (behind a `RwLock`, swapped on every change)
//! 2. The reducer (transition logic)
//! 3. The environment (injected capabilities)
//! 4. Subscribers (notified synchronously, in subscription order)
//!
//! The Store never performs I/O and never suspends. Persistence lives in
//! [`crate::persistence`] and talks to the Store only through a
//! subscription and a single rehydration write.

use crate::error::StoreError;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use todo_store_core::{reducer::Reducer, state::Snapshot};

/// A subscriber callback
type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Registered listeners, in subscription order
struct Listeners<S> {
    next_id: u64,
    entries: Vec<(u64, Listener<S>)>,
}

impl<S> Listeners<S> {
    const fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, listener: Listener<S>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Consistent copy of the listener set for one notification pass
    fn snapshot(&self) -> Vec<Listener<S>> {
        self.entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

// A panicking subscriber must not wedge the store, so poisoned locks are
// recovered rather than propagated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the current thread as the dispatching thread until dropped
struct DispatchGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _serial: MutexGuard<'a, ()>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *lock(self.owner) = None;
    }
}

/// The Store - runtime coordinator for a reducer
///
/// # Type Parameters
///
/// - `S`: State snapshot type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
///
/// # Concurrency
///
/// - [`Store::state`] returns a clone of the current snapshot; it only waits
///   for the pointer swap at the end of a dispatch, never for the reducer
/// - [`Store::dispatch`] calls from different threads are serialized
/// - [`Store::dispatch`] from inside a subscriber or the reducer (same
///   thread) is rejected with [`StoreError::ReentrantDispatch`]
///
/// # Example
///
/// ```ignore
/// let store = Store::new(TodoListState::new(), TodoReducer::new(), env);
///
/// let subscription = store.subscribe(|state| println!("{} todos", state.len()));
/// store.dispatch(TodoAction::add_todo("buy milk"))?;
/// subscription.unsubscribe();
/// ```
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: RwLock<S>,
    reducer: R,
    environment: E,
    listeners: Arc<Mutex<Listeners<S>>>,
    dispatch_serial: Mutex<()>,
    dispatching_thread: Mutex<Option<ThreadId>>,
    dispatch_count: AtomicU64,
    _action: PhantomData<fn(A)>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Snapshot + Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    ///
    /// # Arguments
    ///
    /// - `initial_state`: The starting snapshot for the store
    /// - `reducer`: The reducer implementation (transition logic)
    /// - `environment`: Injected dependencies
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self {
            state: RwLock::new(initial_state),
            reducer,
            environment,
            listeners: Arc::new(Mutex::new(Listeners::new())),
            dispatch_serial: Mutex::new(()),
            dispatching_thread: Mutex::new(None),
            dispatch_count: AtomicU64::new(0),
            _action: PhantomData,
        }
    }

    /// Current snapshot
    ///
    /// Never observes a partially applied transition.
    #[must_use]
    pub fn state(&self) -> S {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Access the injected environment
    #[must_use]
    pub const fn environment(&self) -> &E {
        &self.environment
    }

    /// Number of dispatches accepted since the store was created
    ///
    /// Rejected (reentrant) dispatches are not counted. Dispatches whose
    /// action turned out to be a no-op are.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count.load(Ordering::Acquire)
    }

    /// Number of currently registered subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Send an action to the store
    ///
    /// 1. Runs the reducer against the current snapshot
    /// 2. If the reducer returned a different snapshot, installs it
    /// 3. Notifies every subscriber registered when the dispatch started,
    ///    in subscription order, with the new snapshot
    ///
    /// No-op actions (the reducer returned the same snapshot) notify nobody.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReentrantDispatch`] if called from a subscriber
    /// callback or from the reducer while a dispatch is running on this
    /// thread.
    #[tracing::instrument(skip(self, action), name = "store_dispatch")]
    pub fn dispatch(&self, action: A) -> Result<(), StoreError> {
        let _guard = self.enter_dispatch()?;
        self.dispatch_count.fetch_add(1, Ordering::AcqRel);
        metrics::counter!("store.actions.total").increment(1);

        let current = self.state();

        let next = {
            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = std::time::Instant::now();
            let next = self.reducer.reduce(&current, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());
            next
        };

        if next.same_snapshot(&current) {
            tracing::debug!("Action left state unchanged");
            metrics::counter!("store.actions.unchanged").increment(1);
            return Ok(());
        }

        self.commit(next);
        Ok(())
    }

    /// Register a listener for state changes
    ///
    /// The listener is called synchronously at the end of every dispatch
    /// that changed the state. It must not call [`Store::dispatch`].
    ///
    /// Dropping the returned [`Subscription`] does not unsubscribe; call
    /// [`Subscription::unsubscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = lock(&self.listeners).insert(Arc::new(listener));
        tracing::trace!(subscription_id = id, "Listener subscribed");

        let registry: Weak<Mutex<Listeners<S>>> = Arc::downgrade(&self.listeners);
        Subscription {
            id,
            unsubscribe: Box::new(move || {
                registry
                    .upgrade()
                    .is_some_and(|registry| lock(&registry).remove(id))
            }),
        }
    }

    /// Dispatch count read while no dispatch is running
    ///
    /// Unlike [`Store::dispatch_count`], this waits for an in-flight
    /// dispatch to finish its notification pass, so every dispatch counted
    /// here has already notified the listeners registered before the call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReentrantDispatch`] if called while a dispatch
    /// is running on this thread.
    pub fn settled_dispatch_count(&self) -> Result<u64, StoreError> {
        let _guard = self.enter_dispatch()?;
        Ok(self.dispatch_count())
    }

    /// Replace the current snapshot, but only if no dispatch has been
    /// accepted since `dispatch_count()` returned `expected_dispatch_count`
    ///
    /// Used once by the persistence adapter to install a rehydrated
    /// snapshot. Subscribers are notified exactly as for a dispatch.
    ///
    /// Returns `true` if the snapshot was installed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReentrantDispatch`] if called while a dispatch
    /// is running on this thread.
    pub fn replace_if_untouched(
        &self,
        expected_dispatch_count: u64,
        state: S,
    ) -> Result<bool, StoreError> {
        let _guard = self.enter_dispatch()?;

        if self.dispatch_count() != expected_dispatch_count {
            return Ok(false);
        }

        self.commit(state);
        Ok(true)
    }

    /// Install `next` and run one notification pass; caller holds the guard
    fn commit(&self, next: S) {
        *self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next.clone();

        let listeners = lock(&self.listeners).snapshot();
        tracing::debug!(subscribers = listeners.len(), "State changed, notifying");
        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!("store.subscribers.notified").record(listeners.len() as f64);

        for listener in listeners {
            listener(&next);
        }
    }

    fn enter_dispatch(&self) -> Result<DispatchGuard<'_>, StoreError> {
        let me = thread::current().id();

        if *lock(&self.dispatching_thread) == Some(me) {
            tracing::error!("Rejected reentrant dispatch");
            metrics::counter!("store.dispatch.reentrant_rejected").increment(1);
            return Err(StoreError::ReentrantDispatch);
        }

        let serial = lock(&self.dispatch_serial);
        *lock(&self.dispatching_thread) = Some(me);

        Ok(DispatchGuard {
            owner: &self.dispatching_thread,
            _serial: serial,
        })
    }
}

/// Handle returned by [`Store::subscribe`]
///
/// Holds only a weak reference to the store's listener registry, so it may
/// outlive the store.
#[must_use = "a subscription is only removed by calling `unsubscribe`"]
pub struct Subscription {
    id: u64,
    unsubscribe: Box<dyn Fn() -> bool + Send + Sync>,
}

impl Subscription {
    /// Stop delivering notifications to this listener
    ///
    /// Safe to call from inside a listener during a notification pass: the
    /// pass in progress still completes over the listener set captured when
    /// it started. Calling it more than once is harmless.
    ///
    /// Returns `true` if the listener was still registered.
    #[allow(clippy::must_use_candidate)]
    pub fn unsubscribe(&self) -> bool {
        let removed = (self.unsubscribe)();
        if removed {
            tracing::trace!(subscription_id = self.id, "Listener unsubscribed");
        }
        removed
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
