// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "Degraded")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last flipped
//!
//! # Example
//!
//! ```rust
//! use vigil::status::conditions::create_condition;
//!
//! let condition = create_condition("Ready", "True", "AllReady", "3/3 deployments available");
//! assert_eq!(condition.r#type, "Ready");
//! ```

use crate::crd::Condition;
use chrono::Utc;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (no API call).
///
/// The `lastTransitionTime` is preserved when the status value does not
/// change, and reset to now when it does.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Whether two condition lists differ in anything but timestamps.
#[must_use]
pub fn conditions_changed(existing: &[Condition], updated: &[Condition]) -> bool {
    if existing.len() != updated.len() {
        return true;
    }

    updated.iter().any(|new| match find_condition(existing, &new.r#type) {
        Some(current) => {
            current.status != new.status
                || current.reason != new.reason
                || current.message != new.message
        }
        None => true,
    })
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
