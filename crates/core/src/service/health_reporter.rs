use std::sync::RwLock;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq)]
enum HealthState {
    Initializing,
    Ready { device: String },
    Failed { error: String },
}

/// Body of a health query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        self.status == "healthy"
    }
}

/// Readiness of the inference models, updated once by the initialiser and
/// read by any number of health queries.
pub struct HealthReporter {
    state: RwLock<HealthState>,
}

impl Default for HealthReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthReporter {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HealthState::Initializing),
        }
    }

    pub fn mark_ready(&self, device: impl Into<String>) {
        self.set(HealthState::Ready {
            device: device.into(),
        });
    }

    pub fn mark_failed(&self, error: impl Into<String>) {
        self.set(HealthState::Failed {
            error: error.into(),
        });
    }

    pub fn status(&self) -> HealthStatus {
        let state = match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match state {
            HealthState::Initializing => HealthStatus {
                status: "initializing",
                device: None,
                error: None,
            },
            HealthState::Ready { device } => HealthStatus {
                status: "healthy",
                device: Some(device),
                error: None,
            },
            HealthState::Failed { error } => HealthStatus {
                status: "failed",
                device: None,
                error: Some(error),
            },
        }
    }

    fn set(&self, next: HealthState) {
        match self.state.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
