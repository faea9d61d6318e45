//! Field store error types

use crate::value::FieldKey;

/// Errors returned by [`FieldStore::set`](crate::state::FieldStore::set).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The field is not mounted in the store.
    #[error("Field '{0}' is not mounted")]
    UnknownField(FieldKey),

    /// A change listener tried to write the key it is being notified about.
    #[error("Reentrant update of field '{0}' during change notification")]
    Reentrant(FieldKey),
}
