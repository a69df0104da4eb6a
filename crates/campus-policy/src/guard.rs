//! Field write guards and route-level access checks.

use campus_core::models::role::{Action, Resource};
use campus_core::models::user::CurrentUser;
use campus_core::predicate::{FilterOp, value_eq, value_in};
use serde_json::{Map, Value};

use crate::compiler::resolve_value;
use crate::error::PolicyError;

/// Verify that every proposed field value is permitted for the caller's
/// role under the given limits action (`UpdateLimits` / `CreateLimits`).
///
/// A wildcard (`"*"`) guard marks the field immutable for this role: any
/// attempt to set it fails regardless of value. Any single failing filter
/// rejects the whole write. An empty proposed set always passes.
pub fn verify_write_guard(
    user: &CurrentUser,
    resource: Resource,
    proposed: &Map<String, Value>,
    guard_action: Action,
) -> Result<(), PolicyError> {
    if proposed.is_empty() {
        return Ok(());
    }

    let permission = user
        .role
        .permission_for(resource)
        .ok_or(PolicyError::NoPermission { resource })?;

    let doc = user.document();

    for filter in &permission.filters {
        if !filter.applies_to(guard_action) {
            continue;
        }
        let Some(proposed_value) = proposed.get(&filter.field) else {
            continue;
        };

        if filter.is_wildcard() {
            return Err(PolicyError::GuardRejected {
                field: filter.field.clone(),
            });
        }

        let permitted = resolve_value(&filter.source, &doc)?;
        let holds = match filter.op {
            FilterOp::Equal => value_eq(proposed_value, &permitted),
            FilterOp::NotEqual => !value_eq(proposed_value, &permitted),
            FilterOp::In => value_in(proposed_value, &permitted),
            FilterOp::NotIn => !value_in(proposed_value, &permitted),
            op => {
                return Err(PolicyError::UnsupportedGuardOp {
                    field: filter.field.clone(),
                    op,
                });
            }
        };

        if !holds {
            return Err(PolicyError::GuardRejected {
                field: filter.field.clone(),
            });
        }
    }

    Ok(())
}

/// Route-level gate: the caller's role must hold every listed action on
/// every listed resource.
pub fn check_access(
    user: &CurrentUser,
    needed: &[(Resource, &[Action])],
) -> Result<(), PolicyError> {
    for (resource, actions) in needed {
        let permission = user
            .role
            .permission_for(*resource)
            .ok_or(PolicyError::NoPermission {
                resource: *resource,
            })?;
        if !actions.iter().all(|a| permission.allows(*a)) {
            return Err(PolicyError::NoPermission {
                resource: *resource,
            });
        }
    }
    Ok(())
}
