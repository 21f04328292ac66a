// Copyright (c) 2026 The resim developers. All rights reserved.

//! Types that map directly to the recorded trace file contents.
//!
//! A trace file holds one group of named workers, each with the ordered,
//! time-sorted action records the real pipeline emitted for it. Example:
//!
//! ```yaml
//! workers:
//!   - name: main
//!     actions:
//!       - { kind: bbox, start: 0.0, stop: 0.1 }
//!       - { kind: get, start: 0.3, stop: 0.4 }
//!       - { kind: push, start: 0.8, stop: 0.9, value: 1048576 }
//! ```

use std::io;
use std::path::Path;

use resim_engine::sim_error;
use resim_engine::types::{SimError, SimResult};
use serde::Deserialize;

/// Role name of the coarse-bucketing stage in a recorded trace.
pub const MAIN_ROLE: &str = "main";
/// Role name of the fine-bucketing stage in a recorded trace.
pub const FINE_ROLE: &str = "bucket.fine.0";
/// Role name of the device stage in a recorded trace.
pub const DEVICE_ROLE: &str = "device.0";
/// Role name of the meshing stage in a recorded trace.
pub const MESHER_ROLE: &str = "mesher.0";

/// The kinds of action the real pipeline records.
///
/// Any other name in a trace file fails deserialization, which is the
/// "unrecognized action" trace format error.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Dequeue of a work item at the coarse stage.
    Bbox,
    /// Dequeue of a work item at any later stage.
    Pop,
    /// Wait for downstream queue capacity.
    Get,
    /// Handoff of a new work item downstream.
    Push,
    /// Compute charged to the current work item.
    Compute,
    /// Load time charged to the current work item.
    Load,
    /// Output write; carries no latency.
    Write,
}

/// One recorded action.
#[derive(Clone, Debug, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub start: f64,
    pub stop: f64,
    /// For `push` actions, the recorded size of the pushed item in bytes.
    #[serde(default)]
    pub value: Option<f64>,
}

/// The recorded action sequence of one named worker.
#[derive(Debug, Deserialize)]
pub struct TraceWorker {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One recorded trace group.
#[derive(Debug, Deserialize)]
pub struct Trace {
    pub workers: Vec<TraceWorker>,
}

impl Trace {
    /// Load a trace from a file.
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| SimError(format!("Unable to read {}: {e}", path.display())))?;
        Self::from_string(&s)
    }

    /// Load a trace from any reader (typically stdin).
    pub fn from_reader(reader: impl io::Read) -> Result<Self, SimError> {
        serde_yaml::from_reader(reader)
            .map_err(|e| SimError(format!("serde_yaml::from_reader failed: {e}")))
    }

    /// Load a trace from a string.
    pub fn from_string(trace_str: &str) -> Result<Self, SimError> {
        serde_yaml::from_str(trace_str)
            .map_err(|e| SimError(format!("serde_yaml::from_str failed: {e}")))
    }

    /// Find a recorded worker by name.
    #[must_use]
    pub fn worker(&self, name: &str) -> Option<&TraceWorker> {
        self.workers.iter().find(|w| w.name == name)
    }

    /// Check the trace is one the fixed pipeline topology can replay.
    pub fn validate(&self) -> SimResult {
        let mut errors = Vec::new();

        for required in [MAIN_ROLE, FINE_ROLE, DEVICE_ROLE, MESHER_ROLE] {
            if self.worker(required).is_none() {
                errors.push(format!("Trace has no worker named {required}"));
            }
        }

        for worker in &self.workers {
            // A second recorded instance of a role would need a merge the
            // replay does not model.
            if worker.name.ends_with(".1") {
                errors.push(format!(
                    "Only one recorded instance per role is supported, found {}",
                    worker.name
                ));
            }

            let mut prev_stop = 0.0;
            for action in &worker.actions {
                if !(action.start >= 0.0) || action.stop < action.start {
                    errors.push(format!(
                        "{}: {:?} action has bad interval [{}, {}]",
                        worker.name, action.kind, action.start, action.stop
                    ));
                } else if action.start < prev_stop {
                    // Replay derives latencies from the gaps between
                    // consecutive actions, so they must not overlap.
                    errors.push(format!(
                        "{}: {:?} action at {} is not time-sorted",
                        worker.name, action.kind, action.start
                    ));
                } else {
                    prev_stop = action.stop;
                }
            }
        }

        if !errors.is_empty() {
            return sim_error!("Failed to validate trace:\n{}", errors.join("\n"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_trace() -> &'static str {
        "
workers:
  - name: main
    actions:
      - { kind: bbox, start: 0.0, stop: 0.1 }
      - { kind: get, start: 0.3, stop: 0.4 }
      - { kind: push, start: 0.8, stop: 0.9, value: 64 }
  - name: bucket.fine.0
  - name: device.0
  - name: mesher.0
"
    }

    #[test]
    fn parse_minimal() {
        let trace = Trace::from_string(minimal_trace()).unwrap();
        trace.validate().unwrap();

        let main = trace.worker(MAIN_ROLE).unwrap();
        assert_eq!(main.actions.len(), 3);
        assert_eq!(main.actions[0].kind, ActionKind::Bbox);
        assert_eq!(main.actions[2].value, Some(64.0));
        assert!(trace.worker("bucket.fine.0").unwrap().actions.is_empty());
    }

    #[test]
    fn unknown_action_kind_is_rejected() {
        let result = Trace::from_string(
            "
workers:
  - name: main
    actions:
      - { kind: warp, start: 0.0, stop: 0.1 }
",
        );
        let message = format!("{}", result.unwrap_err());
        assert!(message.contains("warp"), "unexpected message: {message}");
    }

    #[test]
    fn missing_role_fails_validation() {
        let trace = Trace::from_string(
            "
workers:
  - name: main
",
        )
        .unwrap();
        let message = format!("{}", trace.validate().unwrap_err());
        assert!(message.contains("bucket.fine.0"));
    }

    #[test]
    fn second_instance_fails_validation() {
        let trace = Trace::from_string(
            "
workers:
  - name: main
  - name: bucket.fine.0
  - name: bucket.fine.1
  - name: device.0
  - name: mesher.0
",
        )
        .unwrap();
        let message = format!("{}", trace.validate().unwrap_err());
        assert!(message.contains("bucket.fine.1"));
    }

    #[test]
    fn out_of_order_actions_fail_validation() {
        let trace = Trace::from_string(
            "
workers:
  - name: main
    actions:
      - { kind: bbox, start: 0.0, stop: 1.0 }
      - { kind: get, start: 0.5, stop: 1.5 }
  - name: bucket.fine.0
  - name: device.0
  - name: mesher.0
",
        )
        .unwrap();
        let message = format!("{}", trace.validate().unwrap_err());
        assert!(message.contains("not time-sorted"), "{message}");
    }

    #[test]
    fn negative_interval_fails_validation() {
        let trace = Trace::from_string(
            "
workers:
  - name: main
    actions:
      - { kind: compute, start: 1.0, stop: 0.5 }
  - name: bucket.fine.0
  - name: device.0
  - name: mesher.0
",
        )
        .unwrap();
        assert!(trace.validate().is_err());
    }
}
