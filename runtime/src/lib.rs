//! # Travel Booking Runtime
//!
//! Runtime for the travel booking engine: the [`Store`] that owns feature
//! state, runs the reducer and executes the effects it returns.
//!
//! The booking client is single-threaded and interaction-driven, so the
//! store executes effects cooperatively: [`Store::send`] resolves once the
//! action, every effect it produced and every action those effects fed back
//! have been processed. A caller awaiting `send` therefore observes the
//! settled state, which is what a UI needs before re-enabling a control.
//!
//! ## Example
//!
//! ```ignore
//! let store = Store::new(CheckoutState::default(), CheckoutReducer::new(), env);
//!
//! store.send(CheckoutAction::Submit).await?;
//!
//! let reserved = store.state(|s| s.reservation().cloned()).await;
//! ```

pub mod retry;

/// Errors produced by the store itself (never by business logic)
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store no longer accepts actions
    #[error("store is shutting down")]
    ShutdownInProgress,
}

/// Store module - owns state and drives the reducer/effect loop
pub mod store {
    use super::StoreError;
    use futures::future::{join_all, BoxFuture};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use travel_booking_core::{effect::Effect, reducer::Reducer};

    /// The Store - runtime coordinator for a reducer
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer under the write lock, releases the lock, then
        /// executes the returned effects. Effects returned together run
        /// concurrently; actions they produce are sent back through the
        /// reducer before this call resolves.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions.total").increment(1);

            let effects = {
                let mut state = self.state.write().await;
                self.reducer.reduce(&mut state, action, &self.environment)
            };

            tracing::trace!("Reducer returned {} effects", effects.len());

            join_all(effects.into_iter().map(|effect| self.execute_effect(effect))).await;
            Ok(())
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let booking_count = store.state(|s| s.bookings.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Stop accepting new actions
        ///
        /// Effects already in flight still complete, but the actions they
        /// produce are dropped.
        pub fn shutdown(&self) {
            tracing::info!("Store shutting down");
            self.shutdown.store(true, Ordering::Release);
        }

        /// Whether [`Store::shutdown`] has been called
        #[must_use]
        pub fn is_shutdown(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        // Boxed because feeding an action back recurses through `send`
        fn execute_effect(&self, effect: Effect<A>) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                match effect {
                    Effect::None => {},
                    Effect::Future(fut) => {
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            self.feed_back(action).await;
                        }
                    },
                }
            })
        }

        async fn feed_back(&self, action: A) {
            if let Err(error) = self.send(action).await {
                tracing::warn!(error = %error, "Dropped action produced by effect");
            }
        }
    }
}

pub use store::Store;
