//! Lifecycle status enumerations with explicit transition tables.
//!
//! Statuses are stored as snake_case text columns; every handler parses the
//! stored value into the typed enum before deciding anything, so the
//! "any status to any status" gap of a free-form string field is closed at
//! the API boundary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Unknown status value: {0}")]
    UnknownStatus(String),
    #[error("Cannot transition from '{from}' to '{to}'")]
    NotAllowed { from: String, to: String },
}

/// Shared behavior of all lifecycle status enums.
pub trait StatusFlow: Sized + Copy + PartialEq + 'static {
    fn as_str(&self) -> &'static str;
    fn parse(s: &str) -> Result<Self, TransitionError>;
    /// Declared successor states; anything absent here is rejected
    fn successors(&self) -> &'static [Self];

    fn can_transition(&self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    fn transition(&self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(TransitionError::NotAllowed {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl StatusFlow for AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Planned => "planned",
            AuditStatus::InProgress => "in_progress",
            AuditStatus::Completed => "completed",
            AuditStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "planned" => Ok(AuditStatus::Planned),
            "in_progress" => Ok(AuditStatus::InProgress),
            "completed" => Ok(AuditStatus::Completed),
            "cancelled" => Ok(AuditStatus::Cancelled),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            AuditStatus::Planned => &[AuditStatus::InProgress, AuditStatus::Cancelled],
            AuditStatus::InProgress => &[AuditStatus::Completed, AuditStatus::Cancelled],
            AuditStatus::Completed | AuditStatus::Cancelled => &[],
        }
    }
}

impl AuditStatus {
    /// Audits may only be hard-deleted before any work has started
    pub fn is_deletable(&self) -> bool {
        matches!(self, AuditStatus::Planned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Requested,
    Scheduled,
    Completed,
    Cancelled,
}

impl StatusFlow for ConsultationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Requested => "requested",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "requested" => Ok(ConsultationStatus::Requested),
            "scheduled" => Ok(ConsultationStatus::Scheduled),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            ConsultationStatus::Requested => {
                &[ConsultationStatus::Scheduled, ConsultationStatus::Cancelled]
            }
            ConsultationStatus::Scheduled => {
                &[ConsultationStatus::Completed, ConsultationStatus::Cancelled]
            }
            ConsultationStatus::Completed | ConsultationStatus::Cancelled => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    Archived,
    /// Soft-delete flag; deleted documents stay in the table
    Deleted,
}

impl StatusFlow for DocumentStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Archived => "archived",
            DocumentStatus::Deleted => "deleted",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "active" => Ok(DocumentStatus::Active),
            "archived" => Ok(DocumentStatus::Archived),
            "deleted" => Ok(DocumentStatus::Deleted),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            DocumentStatus::Active => &[DocumentStatus::Archived, DocumentStatus::Deleted],
            DocumentStatus::Archived => &[DocumentStatus::Active, DocumentStatus::Deleted],
            DocumentStatus::Deleted => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Pending,
    Active,
    Inactive,
}

impl StatusFlow for IntegrationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Pending => "pending",
            IntegrationStatus::Active => "active",
            IntegrationStatus::Inactive => "inactive",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "pending" => Ok(IntegrationStatus::Pending),
            "active" => Ok(IntegrationStatus::Active),
            "inactive" => Ok(IntegrationStatus::Inactive),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            IntegrationStatus::Pending => &[IntegrationStatus::Active, IntegrationStatus::Inactive],
            IntegrationStatus::Active => &[IntegrationStatus::Inactive],
            IntegrationStatus::Inactive => &[IntegrationStatus::Active],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced,
    Failed,
}

impl StatusFlow for SyncStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "idle" => Ok(SyncStatus::Idle),
            "syncing" => Ok(SyncStatus::Syncing),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            SyncStatus::Idle => &[SyncStatus::Syncing],
            SyncStatus::Syncing => &[SyncStatus::Synced, SyncStatus::Failed],
            SyncStatus::Synced | SyncStatus::Failed => &[SyncStatus::Syncing],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    Draft,
    Submitted,
    Verified,
}

impl StatusFlow for CalculationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CalculationStatus::Draft => "draft",
            CalculationStatus::Submitted => "submitted",
            CalculationStatus::Verified => "verified",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "draft" => Ok(CalculationStatus::Draft),
            "submitted" => Ok(CalculationStatus::Submitted),
            "verified" => Ok(CalculationStatus::Verified),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            CalculationStatus::Draft => &[CalculationStatus::Submitted],
            // A submitted calculation can be sent back for revision
            CalculationStatus::Submitted => &[CalculationStatus::Verified, CalculationStatus::Draft],
            CalculationStatus::Verified => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Open,
    UnderReview,
    Compliant,
    NonCompliant,
}

impl StatusFlow for ComplianceStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Open => "open",
            ComplianceStatus::UnderReview => "under_review",
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
        }
    }

    fn parse(s: &str) -> Result<Self, TransitionError> {
        match s {
            "open" => Ok(ComplianceStatus::Open),
            "under_review" => Ok(ComplianceStatus::UnderReview),
            "compliant" => Ok(ComplianceStatus::Compliant),
            "non_compliant" => Ok(ComplianceStatus::NonCompliant),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            ComplianceStatus::Open => &[ComplianceStatus::UnderReview],
            ComplianceStatus::UnderReview => {
                &[ComplianceStatus::Compliant, ComplianceStatus::NonCompliant]
            }
            ComplianceStatus::NonCompliant => &[ComplianceStatus::UnderReview],
            ComplianceStatus::Compliant => &[],
        }
    }
}

impl FromStr for AuditStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for ConsultationStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for DocumentStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for IntegrationStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for SyncStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for CalculationStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

impl FromStr for ComplianceStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as StatusFlow>::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_terminal_states_reject_everything() {
        assert!(AuditStatus::Completed.transition(AuditStatus::Planned).is_err());
        assert!(AuditStatus::Cancelled.transition(AuditStatus::InProgress).is_err());
    }

    #[test]
    fn audit_planned_is_the_only_deletable_state() {
        assert!(AuditStatus::Planned.is_deletable());
        assert!(!AuditStatus::InProgress.is_deletable());
        assert!(!AuditStatus::Completed.is_deletable());
        assert!(!AuditStatus::Cancelled.is_deletable());
    }

    #[test]
    fn sync_retries_from_failed() {
        assert!(SyncStatus::Failed.can_transition(SyncStatus::Syncing));
        assert!(!SyncStatus::Failed.can_transition(SyncStatus::Synced));
    }

    #[test]
    fn submitted_calculation_can_be_sent_back() {
        assert!(CalculationStatus::Submitted.can_transition(CalculationStatus::Draft));
        assert!(!CalculationStatus::Verified.can_transition(CalculationStatus::Draft));
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!(matches!(
            "finished".parse::<AuditStatus>(),
            Err(TransitionError::UnknownStatus(_))
        ));
    }

    #[test]
    fn deleted_document_is_terminal() {
        assert!(DocumentStatus::Deleted.successors().is_empty());
        assert!(DocumentStatus::Archived.can_transition(DocumentStatus::Active));
    }
}
