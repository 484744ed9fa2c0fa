//! The form engine: schema-driven construction, interaction and submission.

pub mod controller;
pub mod errors;
pub mod field;
pub mod message;
pub mod registry;
pub mod related;
pub mod render;
pub mod session;
pub mod submit;

pub use controller::{EngineEvent, FormEngine, NotifyLevel, OpenFormOptions};
pub use field::{
    FieldCallback, FieldDescriptor, FieldEffect, FieldKind, FieldOverride, FieldPath, FilterHook,
    RelatedConfig, SubFormFields, SubFormSpec,
};
pub use message::{FormMsg, SubmitOutcome};
pub use session::{FormSession, SessionId, SuccessCallback, SuccessPolicy};
