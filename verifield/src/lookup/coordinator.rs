//! Lookup coordinator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{LookupConfig, LookupRequest, LookupSource, LookupValues, Transport};
use crate::state::{FieldStore, FieldUpdate, LookupStatus, SubscriptionId};
use crate::value::{FieldKey, FieldValue};

/// Where a coordinator is in its lookup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupPhase {
    /// Nothing pending.
    #[default]
    Idle,
    /// Waiting out the quiescence window after an eligible edit.
    Armed,
    /// A request was dispatched and its response is still wanted.
    InFlight,
    /// The response for the live request was applied.
    Settled,
}

impl LookupPhase {
    /// Check if a lookup is armed or in flight.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Armed | Self::InFlight)
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    /// Last dispatched generation.
    generation: u64,
    /// Generation whose response will still be applied.
    live: Option<u64>,
    /// Debounce timer of the current arming.
    timer: Option<CancellationToken>,
}

struct CoordinatorInner {
    owner: FieldKey,
    /// Owner first, then the source's other inputs.
    inputs: Vec<FieldKey>,
    store: FieldStore,
    source: Arc<dyn LookupSource>,
    transport: Arc<dyn Transport>,
    config: LookupConfig,
    cancel: CancellationToken,
    state: Mutex<CoordinatorState>,
    phase: watch::Sender<LookupPhase>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// Decorates a field with a debounced, out-of-order-safe remote lookup.
///
/// The coordinator watches its input fields in the store. Each eligible edit
/// restarts the quiescence window; when the window elapses one request is
/// dispatched with a fresh generation. Only the response of the live
/// generation is written back, as the owner's [`LookupStatus`]. Failed calls
/// settle as [`LookupStatus::Unavailable`] and are not retried until the next
/// edit.
///
/// Dropping the coordinator detaches it from the store and abandons any
/// pending work.
///
/// # Example
///
/// ```ignore
/// let coordinator = LookupCoordinator::attach(
///     "email",
///     store.clone(),
///     Arc::new(EmailLookup::new("email", &settings)),
///     transport,
///     LookupConfig::default(),
///     &shutdown,
/// );
///
/// store.set("email", FieldUpdate::new().value("a@b.com"))?;
/// assert_eq!(coordinator.phase(), LookupPhase::Armed);
/// ```
pub struct LookupCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl LookupCoordinator {
    /// Attach a lookup to `owner`.
    ///
    /// Pending timers and in-flight requests are abandoned when `shutdown`
    /// is cancelled. If the inputs are already eligible a lookup is armed
    /// right away.
    pub fn attach(
        owner: impl Into<FieldKey>,
        store: FieldStore,
        source: Arc<dyn LookupSource>,
        transport: Arc<dyn Transport>,
        config: LookupConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        let owner = owner.into();
        let mut inputs = vec![owner.clone()];
        for key in source.inputs() {
            if !inputs.contains(&key) {
                inputs.push(key);
            }
        }

        let (phase, _) = watch::channel(LookupPhase::Idle);
        let inner = Arc::new(CoordinatorInner {
            owner,
            inputs,
            store,
            source,
            transport,
            config,
            cancel: shutdown.child_token(),
            state: Mutex::new(CoordinatorState::default()),
            phase,
            subscription: Mutex::new(None),
        });

        // Listens store-wide so the subscription outlives an unmount and
        // remount of any input.
        let weak = Arc::downgrade(&inner);
        let id = inner.store.on_any_change(move |key, _, changes| {
            if !changes.value {
                return;
            }
            if let Some(inner) = weak.upgrade()
                && inner.inputs.contains(key)
            {
                inner.on_input_changed(key);
            }
        });
        if let Ok(mut subscription) = inner.subscription.lock() {
            *subscription = Some(id);
        }

        inner.rearm();
        Self { inner }
    }

    /// The field whose lookup status this coordinator decides.
    pub fn owner(&self) -> &FieldKey {
        &self.inner.owner
    }

    /// Current phase.
    pub fn phase(&self) -> LookupPhase {
        *self.inner.phase.borrow()
    }

    /// Receiver that observes every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<LookupPhase> {
        self.inner.phase.subscribe()
    }

    /// Number of requests dispatched so far (the last generation).
    pub fn generation(&self) -> u64 {
        self.inner
            .state
            .lock()
            .map(|state| state.generation)
            .unwrap_or(0)
    }

    /// Keys whose values the lookup is built from, owner first.
    pub fn inputs(&self) -> &[FieldKey] {
        &self.inner.inputs
    }

    /// Tell the coordinator that an input was mounted or unmounted.
    ///
    /// Store-level mounts do not notify listeners, so the owner's outcome is
    /// reset and the lookup re-armed against whatever is mounted now.
    pub fn input_remounted(&self, key: &FieldKey) {
        if self.inner.inputs.contains(key) {
            log::debug!(
                "Input '{}' of lookup for '{}' was remounted",
                key,
                self.inner.owner
            );
            self.inner.on_input_changed(key);
        }
    }

    /// Abandon the pending timer and any in-flight request.
    ///
    /// The coordinator stays attached; the next edit arms it again.
    pub fn cancel(&self) {
        self.inner.abandon();
        self.inner.set_phase(LookupPhase::Idle);
    }
}

impl Drop for LookupCoordinator {
    fn drop(&mut self) {
        log::debug!("Detaching lookup from '{}'", self.inner.owner);
        self.inner.cancel.cancel();
        self.inner.abandon();
        if let Ok(mut subscription) = self.inner.subscription.lock()
            && let Some(id) = subscription.take()
        {
            self.inner.store.unsubscribe(id);
        }
        self.inner.set_phase(LookupPhase::Idle);
    }
}

impl std::fmt::Debug for LookupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCoordinator")
            .field("owner", &self.inner.owner)
            .field("inputs", &self.inner.inputs)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl CoordinatorInner {
    fn on_input_changed(self: &Arc<Self>, key: &FieldKey) {
        if key != &self.owner {
            // Only the edited key was reset by the store; the owner's
            // outcome was built from the old input too.
            let reset = FieldUpdate::new().lookup(LookupStatus::Unknown);
            if let Err(err) = self.store.set(&self.owner, reset) {
                log::debug!("Could not reset lookup of '{}': {}", self.owner, err);
            }
        }
        self.rearm();
    }

    fn rearm(self: &Arc<Self>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(generation) = state.live.take() {
            log::debug!(
                "Abandoning lookup #{} for '{}' after edit",
                generation,
                self.owner
            );
        }
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }

        if self.cancel.is_cancelled() || !self.eligible(&self.values()) {
            self.set_phase(LookupPhase::Idle);
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("No async runtime, lookup for '{}' not armed", self.owner);
                self.set_phase(LookupPhase::Idle);
                return;
            }
        };

        let timer = self.cancel.child_token();
        state.timer = Some(timer.clone());
        self.set_phase(LookupPhase::Armed);
        drop(state);

        log::debug!("Armed lookup for '{}'", self.owner);
        let this = Arc::clone(self);
        runtime.spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(this.config.debounce) => this.dispatch(timer).await,
            }
        });
    }

    async fn dispatch(self: Arc<Self>, timer: CancellationToken) {
        let (request, owner_value) = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if timer.is_cancelled() {
                return;
            }
            state.timer = None;

            let values = self.values();
            if !self.eligible(&values) {
                self.set_phase(LookupPhase::Idle);
                return;
            }

            let generation = state.generation + 1;
            state.generation = generation;
            state.live = Some(generation);
            self.set_phase(LookupPhase::InFlight);

            let owner_value = values
                .get(self.owner.as_str())
                .cloned()
                .unwrap_or_default();
            let request = LookupRequest {
                field: self.owner.clone(),
                endpoint: self.source.endpoint(),
                query: self.source.query(&values),
                generation,
            };
            (request, owner_value)
        };

        log::debug!(
            "Dispatching lookup #{} for '{}'",
            request.generation,
            self.owner
        );

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return,
            outcome = tokio::time::timeout(
                self.config.request_timeout,
                self.transport.perform_lookup(&request),
            ) => outcome,
        };

        let status = match outcome {
            Err(_) => {
                log::warn!(
                    "Lookup #{} for '{}' timed out after {:?}",
                    request.generation,
                    self.owner,
                    self.config.request_timeout
                );
                LookupStatus::Unavailable
            }
            Ok(Err(err)) => {
                log::warn!(
                    "Lookup #{} for '{}' failed: {}",
                    request.generation,
                    self.owner,
                    err
                );
                LookupStatus::Unavailable
            }
            Ok(Ok(payload)) => self.classify(request.generation, &payload),
        };

        self.apply(request.generation, &owner_value, status);
    }

    fn classify(&self, generation: u64, payload: &serde_json::Value) -> LookupStatus {
        if !self.source.check_response(payload) {
            log::warn!(
                "Lookup #{} for '{}' returned a rejected payload",
                generation,
                self.owner
            );
            LookupStatus::Unavailable
        } else if self.source.is_successful(payload) {
            LookupStatus::Verified
        } else {
            LookupStatus::Rejected
        }
    }

    fn apply(&self, generation: u64, owner_value: &FieldValue, status: LookupStatus) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.live != Some(generation) {
                log::debug!(
                    "Discarding stale lookup #{} for '{}'",
                    generation,
                    self.owner
                );
                return;
            }
            state.live = None;
        }

        let update = FieldUpdate::new().lookup(status);
        match self
            .store
            .set_if(&self.owner, update, |state| state.value() == owner_value)
        {
            Ok(Some(_)) => {
                log::debug!(
                    "Lookup #{} for '{}' settled: {:?}",
                    generation,
                    self.owner,
                    status
                );
            }
            Ok(None) => {
                log::debug!(
                    "Discarding lookup #{} for '{}': value changed",
                    generation,
                    self.owner
                );
                return;
            }
            Err(err) => {
                log::debug!("Could not apply lookup #{}: {}", generation, err);
                self.set_phase(LookupPhase::Idle);
                return;
            }
        }

        if let Ok(state) = self.state.lock()
            && state.live.is_none()
            && state.timer.is_none()
        {
            self.set_phase(LookupPhase::Settled);
        }
    }

    fn abandon(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.live = None;
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
        }
    }

    fn values(&self) -> LookupValues {
        let (states, _) = self.store.snapshot(&self.inputs);
        LookupValues::new(
            states
                .into_iter()
                .map(|(key, state)| (key, state.value().clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    /// Eligibility gate: owner mounted and filled, and locally well-formed.
    fn eligible(&self, values: &LookupValues) -> bool {
        match values.get(self.owner.as_str()) {
            Some(value) if !value.is_empty() => self.source.accepts(values),
            _ => false,
        }
    }

    fn set_phase(&self, phase: LookupPhase) {
        self.phase.send_replace(phase);
    }
}
