//! Form session context.
//!
//! One [`FormSession`] per active form. It owns the field store, the rule
//! registry and the lookup coordinators, and tears all of them down when the
//! form goes away.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{SessionError, StoreError};
use crate::fields::{FieldKind, required_rule};
use crate::lookup::{LookupConfig, LookupCoordinator, LookupSource, Transport};
use crate::registry::RuleRegistry;
use crate::result::{FieldError, ValidationResult};
use crate::schema::{FieldSchema, FormSettings};
use crate::state::{ChangeSet, FieldState, FieldStore, FieldUpdate, SubscriptionId};
use crate::validity::{FieldReport, Validity};
use crate::value::{FieldKey, FieldValue};
use crate::wakeup::WakeupSender;

/// The state of one active form.
///
/// # Example
///
/// ```ignore
/// let mut session = FormSession::new(FormSettings::new("https://cms.example"))
///     .with_transport(HttpTransport::builder().build()?);
///
/// let email = session.mount(FieldSchema::new("email").required(), &EmailField)?;
/// email.input("a@b.com")?;
/// email.blur()?;
///
/// // ...once the quiescence window has passed and the service answered:
/// assert!(email.report().success);
/// ```
pub struct FormSession {
    settings: FormSettings,
    config: LookupConfig,
    store: FieldStore,
    registry: RuleRegistry,
    validity: Validity,
    transport: Option<Arc<dyn Transport>>,
    coordinators: HashMap<FieldKey, LookupCoordinator>,
    shutdown: CancellationToken,
}

impl FormSession {
    /// Create a session with default lookup timing and no transport.
    pub fn new(settings: FormSettings) -> Self {
        let store = FieldStore::new();
        let registry = RuleRegistry::new(store.clone());
        Self {
            settings,
            config: LookupConfig::default(),
            validity: Validity::new(registry.clone()),
            store,
            registry,
            transport: None,
            coordinators: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Set the transport used by lookup-backed fields.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set a shared transport used by lookup-backed fields.
    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set lookup timing for coordinators attached after this call.
    pub fn with_lookup_config(mut self, config: LookupConfig) -> Self {
        self.config = config;
        self
    }

    /// Form settings.
    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    /// The session's field store.
    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// The session's rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// The session's validity aggregator.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// Install a wakeup sender notified of every changed field.
    pub fn install_wakeup(&self, sender: WakeupSender) {
        self.store.install_wakeup(sender);
    }

    /// Mount a field: create its state, register its rules and attach its
    /// lookup if the field type has one.
    ///
    /// Rules registered by an earlier mount of the same key are replaced.
    pub fn mount(
        &mut self,
        schema: FieldSchema,
        kind: &dyn FieldKind,
    ) -> Result<FieldHandle, SessionError> {
        self.mount_with_value(schema, kind, FieldValue::Unset)
    }

    /// Mount a field with an initial value.
    pub fn mount_with_value(
        &mut self,
        schema: FieldSchema,
        kind: &dyn FieldKind,
        initial: impl Into<FieldValue>,
    ) -> Result<FieldHandle, SessionError> {
        let key = schema.key.clone();
        let lookup = kind.lookup(&schema, &self.settings);
        if lookup.is_some() && self.transport.is_none() {
            return Err(SessionError::MissingTransport(key));
        }
        if !self.store.mount(key.clone(), initial) {
            return Err(SessionError::DuplicateField(key));
        }

        if schema.required {
            let (name, rule) = required_rule(&schema, &self.settings);
            self.registry.register(key.clone(), name, rule);
        }
        for (name, rule) in kind.rules(&schema, &self.settings) {
            self.registry.register(key.clone(), name, rule);
        }
        log::debug!(
            "Mounted field '{}' with rules {:?}",
            key,
            self.registry.rules_for(&key)
        );

        self.notify_remount(&key);
        if let Some(source) = lookup {
            self.attach_lookup(key.clone(), source)?;
        }

        Ok(self.handle(key))
    }

    /// Decorate a mounted field with a remote lookup, replacing any lookup
    /// already attached to it.
    pub fn attach_lookup(
        &mut self,
        key: impl Into<FieldKey>,
        source: Arc<dyn LookupSource>,
    ) -> Result<(), SessionError> {
        let key = key.into();
        if !self.store.contains(&key) {
            return Err(SessionError::UnknownField(key));
        }
        let Some(transport) = self.transport.clone() else {
            return Err(SessionError::MissingTransport(key));
        };

        let coordinator = LookupCoordinator::attach(
            key.clone(),
            self.store.clone(),
            source,
            transport,
            self.config.clone(),
            &self.shutdown,
        );
        self.coordinators.insert(key, coordinator);
        Ok(())
    }

    /// Unmount a field: destroy its state and detach its lookup.
    ///
    /// Its rules stay registered and evaluate as inactive until the field is
    /// mounted again.
    pub fn unmount(&mut self, key: impl Into<FieldKey>) -> Result<(), SessionError> {
        let key = key.into();
        self.coordinators.remove(&key);
        match self.store.unmount(&key) {
            Some(_) => {
                log::debug!("Unmounted field '{}'", key);
                self.notify_remount(&key);
                Ok(())
            }
            None => Err(SessionError::UnknownField(key)),
        }
    }

    /// Handle for a mounted field.
    pub fn field(&self, key: impl Into<FieldKey>) -> Option<FieldHandle> {
        let key = key.into();
        self.store.contains(&key).then(|| self.handle(key))
    }

    /// The lookup coordinator of a field, if one is attached.
    pub fn lookup(&self, key: impl Into<FieldKey>) -> Option<&LookupCoordinator> {
        self.coordinators.get(&key.into())
    }

    /// True while any lookup is armed or in flight.
    pub fn lookups_pending(&self) -> bool {
        self.coordinators.values().any(|c| c.phase().is_pending())
    }

    /// Wait until no lookup is armed or in flight.
    pub async fn settle(&self) {
        for coordinator in self.coordinators.values() {
            let mut phases = coordinator.watch_phase();
            let _ = phases.wait_for(|phase| !phase.is_pending()).await;
        }
    }

    /// Validate the whole form.
    ///
    /// Every field is marked blurred first, so rules waiting for a blur apply
    /// as they would on submit. Errors are reported in mount order with the
    /// first hint of each invalid field.
    pub fn validate(&self) -> ValidationResult {
        let keys = self.store.keys();
        for key in &keys {
            if let Err(err) = self.store.set(key, FieldUpdate::new().blurred(true)) {
                log::debug!("Could not blur '{}' for validation: {}", key, err);
            }
        }

        let errors = keys
            .into_iter()
            .filter_map(|key| {
                let report = self.validity.report(&key);
                if report.valid {
                    return None;
                }
                let message = report.hints.into_iter().next().unwrap_or_default();
                Some(FieldError {
                    field: key,
                    message,
                })
            })
            .collect();
        ValidationResult::from_errors(errors)
    }

    /// Tear down: abandon all pending and in-flight lookups.
    pub fn close(&mut self) {
        self.shutdown.cancel();
        self.coordinators.clear();
    }

    /// Lookups reading `key` from another field see its mount state change.
    fn notify_remount(&self, key: &FieldKey) {
        for coordinator in self.coordinators.values() {
            if coordinator.owner() != key {
                coordinator.input_remounted(key);
            }
        }
    }

    fn handle(&self, key: FieldKey) -> FieldHandle {
        FieldHandle {
            key,
            store: self.store.clone(),
            validity: self.validity.clone(),
        }
    }
}

impl Drop for FormSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("settings", &self.settings)
            .field("fields", &self.store.keys())
            .field("lookups", &self.coordinators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// What a field component holds to forward user events and read its state.
///
/// The same handle serves plain and lookup-decorated fields; a coordinator
/// observes the store on its own, so the component never needs to know
/// whether a lookup is attached.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    key: FieldKey,
    store: FieldStore,
    validity: Validity,
}

impl FieldHandle {
    /// Key of the field.
    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    /// The user changed the value.
    pub fn input(&self, value: impl Into<FieldValue>) -> Result<ChangeSet, StoreError> {
        self.store.set(&self.key, FieldUpdate::new().value(value))
    }

    /// The field lost focus.
    pub fn blur(&self) -> Result<ChangeSet, StoreError> {
        self.store.set(&self.key, FieldUpdate::new().blurred(true))
    }

    /// Current state, if still mounted.
    pub fn state(&self) -> Option<FieldState> {
        self.store.get(&self.key)
    }

    /// Current value; unset if the field is no longer mounted.
    pub fn value(&self) -> FieldValue {
        self.state()
            .map(|state| state.value().clone())
            .unwrap_or_default()
    }

    /// True iff no active rule fails.
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid(&self.key)
    }

    /// True iff the lookup-backed rules are active and pass.
    pub fn is_success(&self) -> bool {
        self.validity.is_success(&self.key)
    }

    /// Hints to show, first-registered rule first.
    pub fn active_hints(&self) -> Vec<String> {
        self.validity.active_hints(&self.key)
    }

    /// Everything needed to decorate the widget.
    pub fn report(&self) -> FieldReport {
        self.validity.report(&self.key)
    }

    /// Re-render trigger: called after every committed change of this field.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FieldKey, &FieldState, ChangeSet) + Send + Sync + 'static,
    {
        self.store.on_change(&self.key, callback)
    }

    /// Remove a subscription made with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }
}
