//! Field state store.
//!
//! One [`FieldState`] per mounted field key, readable by any rule and written
//! only by the owning field's event handlers and its lookup coordinator.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use crate::error::StoreError;
use crate::value::{FieldKey, FieldValue};
use crate::wakeup::{WakeupHandle, WakeupSender};

/// Outcome of the remote lookup for the field's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupStatus {
    /// No lookup has completed for the current value.
    #[default]
    Unknown,
    /// The verification service confirmed the value.
    Verified,
    /// The verification service answered and rejected the value.
    Rejected,
    /// The call failed or the service reported an error.
    Unavailable,
}

impl LookupStatus {
    /// Tri-state view: `None` until a lookup settles, then pass/fail.
    ///
    /// `Unavailable` counts as a failing lookup.
    pub fn successful(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Verified => Some(true),
            Self::Rejected | Self::Unavailable => Some(false),
        }
    }

    /// Check if a lookup has settled for the current value.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Observable state of one field.
///
/// Fields are private so the derived `is_empty` flag can never drift from
/// the value it is derived from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldState {
    value: FieldValue,
    is_empty: bool,
    is_blurred: bool,
    lookup: LookupStatus,
}

impl FieldState {
    /// Fresh state for a newly mounted field.
    pub fn new(value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        Self {
            is_empty: value.is_empty(),
            value,
            is_blurred: false,
            lookup: LookupStatus::Unknown,
        }
    }

    /// The current value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// True iff the value is empty or unset.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// True once the field has lost focus at least once.
    pub fn is_blurred(&self) -> bool {
        self.is_blurred
    }

    /// Lookup outcome for the current value.
    pub fn lookup(&self) -> LookupStatus {
        self.lookup
    }

    /// Tri-state lookup result for the current value.
    pub fn lookup_successful(&self) -> Option<bool> {
        self.lookup.successful()
    }

    fn apply(&mut self, update: FieldUpdate) -> ChangeSet {
        let mut changes = ChangeSet::default();

        if let Some(value) = update.value
            && value != self.value
        {
            self.is_empty = value.is_empty();
            self.value = value;
            changes.value = true;

            // A settled lookup belongs to the previous value.
            if update.lookup.is_none() && self.lookup != LookupStatus::Unknown {
                self.lookup = LookupStatus::Unknown;
                changes.lookup = true;
            }
        }

        if let Some(blurred) = update.blurred
            && blurred != self.is_blurred
        {
            self.is_blurred = blurred;
            changes.blurred = true;
        }

        if let Some(lookup) = update.lookup
            && lookup != self.lookup
        {
            self.lookup = lookup;
            changes.lookup = true;
        }

        changes
    }
}

/// A partial update to a [`FieldState`].
///
/// Unset parts are left untouched. A value change without an explicit lookup
/// status resets the lookup to [`LookupStatus::Unknown`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    value: Option<FieldValue>,
    blurred: Option<bool>,
    lookup: Option<LookupStatus>,
}

impl FieldUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value.
    pub fn value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the blurred flag.
    pub fn blurred(mut self, blurred: bool) -> Self {
        self.blurred = Some(blurred);
        self
    }

    /// Set the lookup status.
    pub fn lookup(mut self, status: LookupStatus) -> Self {
        self.lookup = Some(status);
        self
    }
}

/// Which parts of a field changed in a committed update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The value changed.
    pub value: bool,
    /// The blurred flag changed.
    pub blurred: bool,
    /// The lookup status changed.
    pub lookup: bool,
}

impl ChangeSet {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        !(self.value || self.blurred || self.lookup)
    }
}

/// Identifier returned by [`FieldStore::on_change`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Arc<dyn Fn(&FieldKey, &FieldState, ChangeSet) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    /// `None` listens to every key.
    key: Option<FieldKey>,
    callback: ChangeCallback,
}

struct Slot {
    state: FieldState,
    revision: u64,
}

#[derive(Default)]
struct Fields {
    slots: HashMap<FieldKey, Slot>,
    /// Mount order.
    order: Vec<FieldKey>,
}

#[derive(Default)]
struct StoreInner {
    fields: RwLock<Fields>,
    subscribers: RwLock<Vec<Subscriber>>,
    /// Keys whose change notification is being delivered, per thread.
    notifying: Mutex<HashSet<(FieldKey, ThreadId)>>,
    revision: AtomicU64,
    next_subscription: AtomicU64,
    wakeup: WakeupHandle,
}

/// Shared, observable store of per-field state.
///
/// Cheap to clone; all clones see the same fields. Every committed `set`
/// bumps the field's revision, which is how rule evaluations notice that a
/// read dependency changed.
///
/// # Example
///
/// ```
/// use verifield::state::{FieldStore, FieldUpdate};
///
/// let store = FieldStore::new();
/// store.mount("email", "");
/// store.set("email", FieldUpdate::new().value("a@b.com")).unwrap();
///
/// let state = store.get("email").unwrap();
/// assert!(!state.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct FieldStore {
    inner: Arc<StoreInner>,
}

impl FieldStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a wakeup sender that receives every changed key.
    pub fn install_wakeup(&self, sender: WakeupSender) {
        self.inner.wakeup.install(sender);
    }

    /// Create state for a field.
    ///
    /// Returns `false` and leaves the existing state alone if the key is
    /// already mounted.
    pub fn mount(&self, key: impl Into<FieldKey>, initial: impl Into<FieldValue>) -> bool {
        let key = key.into();
        let Ok(mut fields) = self.inner.fields.write() else {
            return false;
        };
        if fields.slots.contains_key(&key) {
            return false;
        }
        let revision = self.next_revision();
        fields.slots.insert(
            key.clone(),
            Slot {
                state: FieldState::new(initial),
                revision,
            },
        );
        fields.order.push(key);
        true
    }

    /// Destroy a field's state and its per-key subscriptions.
    pub fn unmount(&self, key: impl Into<FieldKey>) -> Option<FieldState> {
        let key = key.into();
        let removed = self.inner.fields.write().ok().and_then(|mut fields| {
            fields.order.retain(|k| k != &key);
            fields.slots.remove(&key)
        });
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.retain(|s| s.key.as_ref() != Some(&key));
        }
        removed.map(|slot| slot.state)
    }

    /// Get a copy of a field's current state.
    pub fn get(&self, key: impl Into<FieldKey>) -> Option<FieldState> {
        let key = key.into();
        self.inner
            .fields
            .read()
            .ok()
            .and_then(|fields| fields.slots.get(&key).map(|slot| slot.state.clone()))
    }

    /// Check if a field is mounted.
    pub fn contains(&self, key: impl Into<FieldKey>) -> bool {
        let key = key.into();
        self.inner
            .fields
            .read()
            .map(|fields| fields.slots.contains_key(&key))
            .unwrap_or(false)
    }

    /// Mounted keys, in mount order.
    pub fn keys(&self) -> Vec<FieldKey> {
        self.inner
            .fields
            .read()
            .map(|fields| fields.order.clone())
            .unwrap_or_default()
    }

    /// Revision of a field's last committed change.
    ///
    /// Revisions come from one store-wide counter, so a remounted field never
    /// repeats a revision it had before.
    pub fn revision(&self, key: impl Into<FieldKey>) -> Option<u64> {
        let key = key.into();
        self.inner
            .fields
            .read()
            .ok()
            .and_then(|fields| fields.slots.get(&key).map(|slot| slot.revision))
    }

    /// Revisions of several fields, read under one lock.
    pub(crate) fn revisions(&self, keys: &[FieldKey]) -> Vec<Option<u64>> {
        match self.inner.fields.read() {
            Ok(fields) => keys
                .iter()
                .map(|key| fields.slots.get(key).map(|slot| slot.revision))
                .collect(),
            Err(_) => vec![None; keys.len()],
        }
    }

    /// Copy the states and revisions of several fields, read under one lock.
    ///
    /// Unmounted keys are absent from the map and have a `None` revision.
    pub(crate) fn snapshot(
        &self,
        keys: &[FieldKey],
    ) -> (HashMap<FieldKey, FieldState>, Vec<Option<u64>>) {
        let Ok(fields) = self.inner.fields.read() else {
            return (HashMap::new(), vec![None; keys.len()]);
        };
        let mut states = HashMap::with_capacity(keys.len());
        let mut revisions = Vec::with_capacity(keys.len());
        for key in keys {
            match fields.slots.get(key) {
                Some(slot) => {
                    states.insert(key.clone(), slot.state.clone());
                    revisions.push(Some(slot.revision));
                }
                None => revisions.push(None),
            }
        }
        (states, revisions)
    }

    /// Apply a partial update and notify listeners.
    ///
    /// The update is committed in full, derived fields included, before any
    /// listener runs. Listeners only run if something actually changed.
    pub fn set(
        &self,
        key: impl Into<FieldKey>,
        update: FieldUpdate,
    ) -> Result<ChangeSet, StoreError> {
        self.set_if(key, update, |_| true)
            .map(|changes| changes.unwrap_or_default())
    }

    /// Apply a partial update only if `guard` accepts the current state.
    ///
    /// The guard runs under the same write lock as the update. Returns
    /// `Ok(None)` when the guard refused.
    pub fn set_if(
        &self,
        key: impl Into<FieldKey>,
        update: FieldUpdate,
        guard: impl FnOnce(&FieldState) -> bool,
    ) -> Result<Option<ChangeSet>, StoreError> {
        let key = key.into();

        if self
            .inner
            .notifying
            .lock()
            .map(|notifying| notifying.contains(&(key.clone(), thread::current().id())))
            .unwrap_or(false)
        {
            log::warn!("Rejected reentrant update of field '{}'", key);
            return Err(StoreError::Reentrant(key));
        }

        let (state, changes) = {
            let mut fields = self
                .inner
                .fields
                .write()
                .map_err(|_| StoreError::UnknownField(key.clone()))?;
            let Some(slot) = fields.slots.get_mut(&key) else {
                return Err(StoreError::UnknownField(key));
            };
            if !guard(&slot.state) {
                return Ok(None);
            }
            let changes = slot.state.apply(update);
            if changes.is_empty() {
                return Ok(Some(changes));
            }
            slot.revision = self.next_revision();
            (slot.state.clone(), changes)
        };

        self.notify(&key, &state, changes);
        Ok(Some(changes))
    }

    /// Subscribe to committed changes of one field.
    pub fn on_change<F>(&self, key: impl Into<FieldKey>, callback: F) -> SubscriptionId
    where
        F: Fn(&FieldKey, &FieldState, ChangeSet) + Send + Sync + 'static,
    {
        self.subscribe(Some(key.into()), Arc::new(callback))
    }

    /// Subscribe to committed changes of every field.
    pub fn on_any_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FieldKey, &FieldState, ChangeSet) + Send + Sync + 'static,
    {
        self.subscribe(None, Arc::new(callback))
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.retain(|s| s.id != id);
        }
    }

    fn subscribe(&self, key: Option<FieldKey>, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.push(Subscriber { id, key, callback });
        }
        id
    }

    fn notify(&self, key: &FieldKey, state: &FieldState, changes: ChangeSet) {
        // Listeners run without any store lock held, so they may read freely.
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .subscribers
            .read()
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|s| s.key.as_ref().is_none_or(|k| k == key))
                    .map(|s| Arc::clone(&s.callback))
                    .collect()
            })
            .unwrap_or_default();

        let _notifying = NotifyingGuard::enter(&self.inner.notifying, key);
        for callback in callbacks {
            callback(key, state, changes);
        }
        self.inner.wakeup.send(key);
    }

    fn next_revision(&self) -> u64 {
        self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for FieldStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldStore")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

/// Marks a key as notifying on the current thread for the lifetime of the
/// guard. Listeners run synchronously, so a `set` from the same thread while
/// the mark is present comes from inside a listener.
struct NotifyingGuard<'a> {
    set: &'a Mutex<HashSet<(FieldKey, ThreadId)>>,
    entry: (FieldKey, ThreadId),
}

impl<'a> NotifyingGuard<'a> {
    fn enter(set: &'a Mutex<HashSet<(FieldKey, ThreadId)>>, key: &FieldKey) -> Self {
        let entry = (key.clone(), thread::current().id());
        if let Ok(mut entries) = set.lock() {
            entries.insert(entry.clone());
        }
        Self { set, entry }
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut entries) = self.set.lock() {
            entries.remove(&self.entry);
        }
    }
}
