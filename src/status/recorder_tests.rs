// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `recorder.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::status::{NamespacedName, StatusSink};

    #[test]
    fn test_degraded_calls_are_recorded_in_order() {
        let recorder = StatusRecorder::new();
        recorder.set_degraded("a", "first");
        recorder.set_degraded("b", "second");

        let calls = recorder.degraded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].reason, "a");
        assert_eq!(recorder.current_degraded().unwrap().message, "second");
    }

    #[test]
    fn test_clear_degraded_drops_current_pair() {
        let recorder = StatusRecorder::new();
        recorder.set_degraded("a", "first");
        recorder.clear_degraded();

        assert!(recorder.current_degraded().is_none());
        assert_eq!(recorder.clear_calls(), 1);
        assert_eq!(recorder.degraded_calls().len(), 1);
    }

    #[test]
    fn test_workload_tracking() {
        let recorder = StatusRecorder::new();
        let dpi = NamespacedName::new("vigil-dpi", "vigil-dpi");
        recorder.add_daemonsets(std::slice::from_ref(&dpi));
        recorder.add_daemonsets(std::slice::from_ref(&dpi));
        assert_eq!(recorder.daemonsets(), vec![dpi.clone()]);

        recorder.remove_daemonsets(&[dpi]);
        assert!(recorder.daemonsets().is_empty());
    }

    #[test]
    fn test_availability_defaults_to_true() {
        let recorder = StatusRecorder::new();
        assert!(recorder.is_available());
        recorder.set_available(false);
        assert!(!recorder.is_available());
    }

    #[test]
    fn test_namespaced_name_display() {
        let name = NamespacedName::new("vigil-intrusion-detection", "anomaly-detection-api");
        assert_eq!(name.to_string(), "vigil-intrusion-detection/anomaly-detection-api");
    }
}
