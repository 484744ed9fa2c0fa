//! Messages driving the form engine's update loop.

use crossterm::event::KeyCode;
use serde_json::{Map, Value};

use crate::form::field::FieldPath;
use crate::form::related::{SearchPage, SelectedEntity};
use crate::form::session::SessionId;
use crate::schema::SchemaResponse;

/// Result of a submission attempt, classified for recovery.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// 2xx with the response body
    Success(Value),
    /// 400 with the validation payload
    Validation(Value),
    /// Network failure or any other status
    Transport(String),
}

/// Everything the engine reacts to: user input plus async completions.
///
/// Async completions carry the `SessionId` they belong to; completions for a
/// closed session are no-ops.
#[derive(Debug, Clone)]
pub enum FormMsg {
    SchemaFetched {
        session: SessionId,
        result: Result<SchemaResponse, String>,
    },
    InstanceFetched {
        session: SessionId,
        result: Result<Map<String, Value>, String>,
    },

    // Field interaction
    FieldKey {
        path: FieldPath,
        key: KeyCode,
    },
    CheckboxToggled {
        path: FieldPath,
    },
    SelectKey {
        path: FieldPath,
        key: KeyCode,
    },
    RelatedInputKey {
        path: FieldPath,
        key: KeyCode,
    },
    RelatedNavKey {
        path: FieldPath,
        key: KeyCode,
    },

    // Related-entity async completions
    SearchCompleted {
        session: SessionId,
        path: FieldPath,
        generation: u64,
        /// True for a continuation page, which extends the dropdown instead
        /// of replacing it
        append: bool,
        result: Result<SearchPage, String>,
    },
    PresetResolved {
        session: SessionId,
        path: FieldPath,
        result: Result<SelectedEntity, String>,
    },
    AutoFillResolved {
        session: SessionId,
        path: FieldPath,
        result: Result<Option<SelectedEntity>, String>,
    },
    CreatedResolved {
        session: SessionId,
        path: FieldPath,
        result: Result<SelectedEntity, String>,
    },

    // Secondary (stacked) forms
    OpenSecondary {
        path: FieldPath,
    },

    // Form chrome
    GroupToggled {
        group: String,
    },
    ConfirmToggled,
    Submit,
    SubmitFinished {
        session: SessionId,
        outcome: SubmitOutcome,
    },
    Cancel,
}
