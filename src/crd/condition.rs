//! Status conditions, matching the `type`/`status`/`reason`/`message`
//! shape Kubernetes resources conventionally expose.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type tracked on a `SopsSecret`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    Ready,
    Decrypted,
}

impl ConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::Ready => "Ready",
            ConditionType::Decrypted => "Decrypted",
        }
    }
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

/// A single condition entry. Invariant: `conditions` on the resource status
/// carries at most one entry per `r#type`, enforced by [`upsert_condition`].
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        observed_generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.as_str().to_string(),
            status: status.as_str().to_string(),
            reason: Some(reason.into()),
            message: Some(message.into()),
            observed_generation,
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// Insert or replace the entry matching `new.type`, preserving the
/// "at most one per type" invariant. Only bumps `last_transition_time` when
/// the status actually changes, matching Kubernetes condition conventions.
pub fn upsert_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        if existing.status == new.status {
            existing.reason = new.reason;
            existing.message = new.message;
            existing.observed_generation = new.observed_generation;
        } else {
            *existing = new;
        }
        return;
    }
    conditions.push(new);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_inserts_new_type() {
        let mut conditions = vec![];
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "ok", Some(1)),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, "Ready");
    }

    #[test]
    fn upsert_replaces_same_type_never_duplicates() {
        let mut conditions = vec![];
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::False, "DecryptFailed", "bad", Some(1)),
        );
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "ok", Some(2)),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, "True");
        assert_eq!(conditions[0].reason.as_deref(), Some("Success"));
    }

    #[test]
    fn upsert_keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![];
        let first = Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "ok", Some(1));
        let first_time = first.last_transition_time.clone();
        upsert_condition(&mut conditions, first);
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "still ok", Some(2)),
        );
        assert_eq!(conditions[0].last_transition_time, first_time);
        assert_eq!(conditions[0].observed_generation, Some(2));
    }

    #[test]
    fn distinct_types_coexist() {
        let mut conditions = vec![];
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Decrypted, ConditionStatus::True, "Success", "ok", Some(1)),
        );
        upsert_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "ok", Some(1)),
        );
        assert_eq!(conditions.len(), 2);
    }
}
