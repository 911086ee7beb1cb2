//! # ExecutionFlow Model
//!
//! One record per workflow run. Created on submission, mutated by
//! status-transition events reported from executors and the master, immutable
//! once terminal. Persistence is handled by the external
//! [`ExecutionStore`](crate::dispatch::ExecutionStore) collaborator; this
//! module only models the record and its derived fields.
//!
//! Two fields keep a canonical string form next to a parsed form:
//!
//! - `user_defined_params` is a stored JSON list of `{prop, value}` pairs; the
//!   map view is computed once on first access and the cache is invalidated
//!   whenever the canonical string is reassigned.
//! - `notify_mails` is a stored JSON string list kept in sync with the parsed
//!   recipient list in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::enums::{ExecType, FailurePolicy, NotifyType};
use crate::state_machine::FlowStatus;

/// One user-defined workflow parameter in its stored form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub prop: String,
    pub value: String,
}

/// A single workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFlow {
    pub exec_id: i64,
    pub flow_id: i32,
    pub flow_name: String,
    pub project_id: i32,
    pub project_name: String,
    pub submit_user_id: i32,
    pub submit_user: String,
    pub proxy_user: Option<String>,
    pub status: FlowStatus,
    pub exec_type: ExecType,
    pub submit_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Schedule time for backfill runs.
    pub schedule_time: Option<DateTime<Utc>>,
    pub max_try_times: i32,
    /// Execution timeout in seconds.
    pub timeout: i32,
    pub failure_policy: FailurePolicy,
    pub notify_type: NotifyType,
    notify_mails: Option<String>,
    notify_mail_list: Vec<String>,
    /// Worker host currently executing this run, if any.
    pub worker: Option<String>,
    pub queue: Option<String>,
    user_defined_params: Option<String>,
    #[serde(skip)]
    user_defined_param_map: Option<HashMap<String, String>>,
}

impl ExecutionFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exec_id: i64,
        flow_id: i32,
        flow_name: impl Into<String>,
        project_id: i32,
        project_name: impl Into<String>,
        submit_user_id: i32,
        submit_user: impl Into<String>,
        exec_type: ExecType,
    ) -> Self {
        Self {
            exec_id,
            flow_id,
            flow_name: flow_name.into(),
            project_id,
            project_name: project_name.into(),
            submit_user_id,
            submit_user: submit_user.into(),
            proxy_user: None,
            status: FlowStatus::Init,
            exec_type,
            submit_time: Some(Utc::now()),
            start_time: None,
            end_time: None,
            schedule_time: None,
            max_try_times: 0,
            timeout: 0,
            failure_policy: FailurePolicy::default(),
            notify_type: NotifyType::default(),
            notify_mails: None,
            notify_mail_list: Vec::new(),
            worker: None,
            queue: None,
            user_defined_params: None,
            user_defined_param_map: None,
        }
    }

    /// Wall-clock duration in whole seconds. Derived, never stored; undefined
    /// until both timestamps exist.
    pub fn duration(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    /// Assign the stored parameter string, invalidating the cached map view.
    pub fn set_user_defined_params(&mut self, params: Option<String>) {
        self.user_defined_params = params;
        self.user_defined_param_map = None;
    }

    pub fn user_defined_params(&self) -> Option<&str> {
        self.user_defined_params.as_deref()
    }

    /// Parsed view of the user-defined parameters, computed once from the
    /// stored string and cached until the string is reassigned.
    pub fn user_defined_param_map(&mut self) -> Result<Option<&HashMap<String, String>>> {
        if self.user_defined_param_map.is_none() {
            if let Some(raw) = self.user_defined_params.as_deref().filter(|s| !s.is_empty()) {
                let props: Vec<Property> = serde_json::from_str(raw)?;
                self.user_defined_param_map =
                    Some(props.into_iter().map(|p| (p.prop, p.value)).collect());
            }
        }
        Ok(self.user_defined_param_map.as_ref())
    }

    /// Assign the stored recipient string, re-deriving the parsed list.
    pub fn set_notify_mails(&mut self, raw: impl Into<String>) -> Result<()> {
        let raw = raw.into();
        self.notify_mail_list = serde_json::from_str(&raw)?;
        self.notify_mails = Some(raw);
        Ok(())
    }

    /// Assign the recipient list, re-deriving the stored string form.
    pub fn set_notify_mail_list(&mut self, list: Vec<String>) -> Result<()> {
        self.notify_mails = Some(serde_json::to_string(&list)?);
        self.notify_mail_list = list;
        Ok(())
    }

    pub fn notify_mails(&self) -> Option<&str> {
        self.notify_mails.as_deref()
    }

    pub fn notify_mail_list(&self) -> &[String] {
        &self.notify_mail_list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn flow() -> ExecutionFlow {
        ExecutionFlow::new(1, 10, "etl-daily", 7, "p1", 42, "alice", ExecType::Direct)
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let mut f = flow();
        assert_eq!(f.duration(), None);

        f.start_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        assert_eq!(f.duration(), None);

        f.end_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 2, 30).unwrap());
        assert_eq!(f.duration(), Some(150));
    }

    #[test]
    fn test_param_map_memoized_and_invalidated() {
        let mut f = flow();
        f.set_user_defined_params(Some(
            r#"[{"prop":"dt","value":"2024-03-01"},{"prop":"env","value":"prod"}]"#.to_string(),
        ));

        let map = f.user_defined_param_map().unwrap().unwrap();
        assert_eq!(map.get("dt").map(String::as_str), Some("2024-03-01"));
        assert_eq!(map.len(), 2);

        // Reassigning the canonical string drops the cached view.
        f.set_user_defined_params(Some(r#"[{"prop":"dt","value":"2024-03-02"}]"#.to_string()));
        let map = f.user_defined_param_map().unwrap().unwrap();
        assert_eq!(map.get("dt").map(String::as_str), Some("2024-03-02"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_bad_param_string_is_parameter_error() {
        let mut f = flow();
        f.set_user_defined_params(Some("{not json".to_string()));
        assert!(f.user_defined_param_map().is_err());
    }

    #[test]
    fn test_notify_mails_kept_in_sync() {
        let mut f = flow();
        f.set_notify_mails(r#"["ops@example.com","etl@example.com"]"#).unwrap();
        assert_eq!(f.notify_mail_list().len(), 2);

        f.set_notify_mail_list(vec!["oncall@example.com".to_string()]).unwrap();
        assert_eq!(f.notify_mails(), Some(r#"["oncall@example.com"]"#));
    }

    proptest! {
        #[test]
        fn prop_duration_matches_second_difference(start in 0i64..4_000_000_000, len in 0i64..1_000_000) {
            let mut f = flow();
            f.start_time = Some(Utc.timestamp_opt(start, 0).unwrap());
            f.end_time = Some(Utc.timestamp_opt(start + len, 0).unwrap());
            prop_assert_eq!(f.duration(), Some(len));
        }
    }
}
