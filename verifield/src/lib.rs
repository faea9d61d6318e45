//! Reactive form validation core
//!
//! Keeps per-field state for a dynamically rendered form, evaluates
//! declarative validation rules against it, and decorates fields with
//! debounced remote lookups (such as email deliverability checks) whose
//! stale responses are discarded.
//!
//! ```
//! use verifield::prelude::*;
//!
//! let mut session = FormSession::new(FormSettings::new("https://cms.example"));
//! let name = session
//!     .mount(FieldSchema::new("name").required(), &TextField::new().max_length(5))
//!     .unwrap();
//!
//! name.input("Ferris the crab").unwrap();
//! name.blur().unwrap();
//! assert!(!name.is_valid());
//! ```

pub mod error;
pub mod fields;
pub mod hint;
pub mod lookup;
pub mod registry;
pub mod result;
pub mod rule;
pub mod rules;
pub mod schema;
pub mod session;
pub mod state;
pub mod validity;
pub mod value;
pub mod wakeup;

pub use session::{FieldHandle, FormSession};

pub mod prelude {
    pub use crate::error::{SessionError, StoreError, TransportError};
    pub use crate::fields::{EmailField, FieldKind, RadioField, TextField};
    pub use crate::hint::Hint;
    pub use crate::lookup::{
        LookupConfig, LookupCoordinator, LookupPhase, LookupRequest, LookupSource, LookupValues,
        Transport,
    };
    pub use crate::registry::RuleRegistry;
    pub use crate::result::{FieldError, ValidationResult};
    pub use crate::rule::{Rule, RuleContext};
    pub use crate::schema::{FieldSchema, FormSettings};
    pub use crate::session::{FieldHandle, FormSession};
    pub use crate::state::{ChangeSet, FieldState, FieldStore, FieldUpdate, LookupStatus};
    pub use crate::validity::{FieldReport, Validity};
    pub use crate::value::{FieldKey, FieldValue};
}
