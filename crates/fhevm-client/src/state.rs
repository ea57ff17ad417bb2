//! Observable state of a long-running operation
//!
//! Front ends poll this to render progress: idle, in flight, resolved with a
//! value, or failed with a message.

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Idle,
    InFlight,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationState<T> {
    status: OperationStatus,
    error: Option<String>,
    result: Option<T>,
}

impl<T> OperationState<T> {
    pub fn new() -> Self {
        Self {
            status: OperationStatus::Idle,
            error: None,
            result: None,
        }
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == OperationStatus::InFlight
    }

    pub fn begin(&mut self) {
        self.status = OperationStatus::InFlight;
        self.error = None;
        self.result = None;
    }

    pub fn resolve(&mut self, value: T) {
        self.status = OperationStatus::Resolved;
        self.error = None;
        self.result = Some(value);
    }

    pub fn fail(&mut self, error: &impl Display) {
        self.status = OperationStatus::Failed;
        self.error = Some(error.to_string());
        self.result = None;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Drive `operation` while recording its progress
    pub async fn track<E, F>(&mut self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
        T: Clone,
    {
        self.begin();
        match operation.await {
            Ok(value) => {
                self.resolve(value.clone());
                Ok(value)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_success() {
        let mut state = OperationState::new();
        assert_eq!(state.status(), OperationStatus::Idle);

        let value = state.track(async { Ok::<_, String>(42u32) }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(state.status(), OperationStatus::Resolved);
        assert_eq!(state.result(), Some(&42));
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_track_failure_clears_previous_result() {
        let mut state = OperationState::new();
        state.resolve(1u32);

        let err = state.track(async { Err::<u32, _>("boom".to_string()) }).await;
        assert!(err.is_err());
        assert_eq!(state.status(), OperationStatus::Failed);
        assert_eq!(state.error(), Some("boom"));
        assert!(state.result().is_none());
    }

    #[test]
    fn test_serializes_for_front_ends() {
        let mut state = OperationState::<u8>::new();
        state.begin();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "in_flight");
    }
}
