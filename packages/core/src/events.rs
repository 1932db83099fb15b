//! Event types for live updates.

use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus};

/// Message type carried by every event on the wire.
pub const JOB_UPDATE: &str = "job_update";

/// A change to a job, published after the store commit succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// A job's status was written by a claim or a status update.
    StatusChanged { job_id: JobId, status: JobStatus },
    /// A job's starred flag flipped.
    StarToggled { job_id: JobId },
    /// A job was reset to inactive by an operator.
    ///
    /// Observers see the same message as a status change to `inactive`;
    /// the distinction exists for subscribers that clean up render output.
    Reset { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::StatusChanged { job_id, .. }
            | JobEvent::StarToggled { job_id }
            | JobEvent::Reset { job_id } => *job_id,
        }
    }

    /// Status carried by the event. Star toggles carry none.
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            JobEvent::StatusChanged { status, .. } => Some(*status),
            JobEvent::StarToggled { .. } => None,
            JobEvent::Reset { .. } => Some(JobStatus::Inactive),
        }
    }

    /// The wire shape sent to observers.
    pub fn to_message(&self) -> UpdateMessage {
        let field = match self {
            JobEvent::StarToggled { .. } => Some("starred".to_string()),
            _ => None,
        };
        UpdateMessage {
            kind: JOB_UPDATE.to_string(),
            job_id: self.job_id(),
            status: self.status(),
            field,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_message())
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::StatusChanged { job_id, status } => format!("Job {} -> {}", job_id, status),
            JobEvent::StarToggled { job_id } => format!("Job {} star toggled", job_id),
            JobEvent::Reset { job_id } => format!("Job {} reset", job_id),
        }
    }
}

impl Serialize for JobEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_message().serialize(serializer)
    }
}

/// `{"type": "job_update", "job_id": .., "status"?: .., "field"?: ..}`
///
/// `status` and `field` are never both present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use serde_json::json;

    use super::*;

    #[test]
    fn status_change_carries_status_only() {
        let event = JobEvent::StatusChanged {
            job_id: JobId(4),
            status: JobStatus::Working,
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"type": "job_update", "job_id": 4, "status": "working"})
        );
    }

    #[test]
    fn star_toggle_carries_field_without_status() {
        let event = JobEvent::StarToggled { job_id: JobId(9) };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"type": "job_update", "job_id": 9, "field": "starred"})
        );
    }

    #[test]
    fn reset_looks_like_inactive_update_to_observers() {
        let reset = JobEvent::Reset { job_id: JobId(2) };
        let update = JobEvent::StatusChanged {
            job_id: JobId(2),
            status: JobStatus::Inactive,
        };
        assert_eq!(reset.to_json().unwrap(), update.to_json().unwrap());
    }

    #[test]
    fn message_parses_back_from_wire() {
        let raw = r#"{"type":"job_update","job_id":11,"field":"starred"}"#;
        let message: UpdateMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message, JobEvent::StarToggled { job_id: JobId(11) }.to_message());
    }
}
