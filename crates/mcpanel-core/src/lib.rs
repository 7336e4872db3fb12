//! Process-state reconciliation and schema-driven server properties.
//!
//! Nothing in this crate performs IO. Requests leave through
//! [`session::PendingCommand`] values and come back as
//! [`session::CommandCompletion`]s; push events are fed in directly.

pub mod backups;
pub mod error;
pub mod gate;
pub mod properties;
pub mod quick;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod store;

pub use backups::BackupCatalog;
pub use error::ActionError;
pub use gate::{Acknowledgement, Consequence, DestructiveIntent, GateBlock};
pub use properties::{
    ConfigRenderer, ConfigValueSet, FormError, FormSubmission, PropertyForm, PropertyValue,
    RendererState, Widget, serialize_submission,
};
pub use quick::QuickAction;
pub use reconcile::{ControlEvent, ReconcileStats, Reconciled, Reconciler};
pub use schema::{ConfigSchema, PropertyDefinition, SchemaError, ValueKind};
pub use session::{
    CommandCompletion, CommandKind, CommandOutcome, ControlSession, PendingCommand,
    SessionConfig, StartOptions, Step, execute,
};
pub use store::{
    ApplyDecision, CommandTicket, LifecycleIntent, LifecycleStore, LogBuffer, SettleDecision,
    StoreError, StoreUpdate, TransitionCause,
};
