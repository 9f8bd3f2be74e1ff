//! # Document confirmation gate
//!
//! Sensitive uploads (government ID, proof of need) are staged before
//! they reach the form:
//!
//! ```text
//! Idle ──select──► PendingConfirmation ──confirm──► Idle (document promoted)
//!                     │    ▲        └───cancel───► Idle (nothing changes)
//!                     └────┘ select (replaces the staged file)
//! ```
//!
//! The gate only holds the staged record; promoting it into the form is
//! the controller's job, done in one step with the preview update.

use serde::{Deserialize, Serialize};

use crate::media::SelectedFile;
use crate::preview::Preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentSlot {
    GovernmentId,
    ProofOfNeed,
}

impl DocumentSlot {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::GovernmentId => "governmentId",
            Self::ProofOfNeed => "proofOfNeed",
        }
    }
}

impl std::str::FromStr for DocumentSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "governmentId" | "government-id" => Ok(Self::GovernmentId),
            "proofOfNeed" | "proof-of-need" => Ok(Self::ProofOfNeed),
            other => Err(format!("unknown document slot: {other}")),
        }
    }
}

/// A selected document waiting for the user to confirm it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDocument {
    pub slot: DocumentSlot,
    pub file: SelectedFile,
    pub preview: Preview,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum GateState {
    #[default]
    Idle,
    PendingConfirmation(PendingDocument),
}

#[derive(Debug, Default)]
pub struct ConfirmationGate {
    state: GateState,
}

impl ConfirmationGate {
    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingDocument> {
        match &self.state {
            GateState::PendingConfirmation(doc) => Some(doc),
            GateState::Idle => None,
        }
    }

    /// Stage a document. A document already pending is replaced silently.
    pub fn stage(&mut self, document: PendingDocument) {
        self.state = GateState::PendingConfirmation(document);
    }

    /// Take the staged document for promotion. `None` when idle.
    pub fn confirm(&mut self) -> Option<PendingDocument> {
        match std::mem::take(&mut self.state) {
            GateState::PendingConfirmation(doc) => Some(doc),
            GateState::Idle => None,
        }
    }

    /// Discard the staged document. Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.pending().is_some();
        self.state = GateState::Idle;
        was_pending
    }
}
