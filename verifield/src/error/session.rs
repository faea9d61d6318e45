//! Form session error types

use super::StoreError;
use crate::value::FieldKey;

/// Errors that can occur while mounting or driving fields in a form session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A field with this key is already mounted.
    #[error("Field '{0}' is already mounted")]
    DuplicateField(FieldKey),

    /// No field with this key is mounted.
    #[error("Field '{0}' is not mounted")]
    UnknownField(FieldKey),

    /// The field needs a remote lookup but the session has no transport.
    #[error("Field '{0}' needs a lookup transport but none is configured")]
    MissingTransport(FieldKey),

    /// The underlying field store rejected an update.
    #[error(transparent)]
    Store(#[from] StoreError),
}
