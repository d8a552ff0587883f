pub mod audits;
pub mod auth;
pub mod bank_integrations;
pub mod compliance_records;
pub mod consultations;
pub mod documents;
pub mod notifications;
pub mod profile;
pub mod tax_calculations;

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::user::{self, User};
use crate::database::query;
use crate::domain::role::{Scope, UserRole};
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Resolve the owner of a record being created: callers may only write for
/// themselves unless their role is privileged.
pub(crate) fn resolve_owner(
    auth_user: &AuthUser,
    requested: Option<Uuid>,
) -> Result<Uuid, ApiError> {
    match requested {
        Some(owner) if owner != auth_user.id => {
            if auth_user.role.is_privileged() {
                Ok(owner)
            } else {
                Err(ApiError::forbidden(
                    "Only tax officers may create records for another owner",
                ))
            }
        }
        _ => Ok(auth_user.id),
    }
}

/// Owner, assignee, or privileged role may mutate; everyone else is rejected.
pub(crate) fn ensure_can_mutate(
    auth_user: &AuthUser,
    owner_id: Uuid,
    assigned_to: Option<Uuid>,
) -> Result<(), ApiError> {
    if auth_user.role.is_privileged()
        || owner_id == auth_user.id
        || assigned_to == Some(auth_user.id)
    {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have access to this record"))
    }
}

/// Whole-batch scope gate for bulk actions: a non-privileged caller fails
/// with 403 if any requested id is missing or outside their scope.
pub(crate) fn ensure_bulk_scope(
    scope: Scope,
    requested: &[Uuid],
    found: &[(Uuid, Option<Uuid>)],
) -> Result<(), ApiError> {
    if scope.is_unrestricted() {
        return Ok(());
    }
    if found.len() != requested.len()
        || found
            .iter()
            .any(|(owner, assignee)| !scope.permits(*owner, *assignee))
    {
        return Err(ApiError::forbidden(
            "One or more target records are outside your scope",
        ));
    }
    Ok(())
}

/// Assignees must exist and hold a staff role.
pub(crate) async fn validate_assignee(pool: &PgPool, assignee: Uuid) -> Result<(), ApiError> {
    let account: Option<User> = query::find_by_id(pool, user::TABLE, assignee).await?;
    let account = account.ok_or_else(|| ApiError::validation("Assignee does not exist", None))?;

    let role: UserRole = account
        .role
        .parse()
        .map_err(|_| ApiError::internal("Assignee has an unrecognized role"))?;
    if !role.is_staff() {
        return Err(ApiError::validation("Assignee must be a staff user", None));
    }
    Ok(())
}

pub(crate) fn to_json<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("response serialization failed: {}", e);
        ApiError::internal("Failed to serialize response data")
    })
}
