use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Accuracy record of one evolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionDiagnostic {
    pub sequence: usize,
    pub handle: u64,
    pub epsilon: f64,
    pub exceeded: bool,
}

/// Append-only log of evolution diagnostics, shared between the adapter and
/// whoever audits the run.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<EvolutionDiagnostic>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, handle: u64, epsilon: f64, threshold: f64) -> EvolutionDiagnostic {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let diag = EvolutionDiagnostic {
            sequence: entries.len(),
            handle,
            epsilon,
            exceeded: epsilon > threshold,
        };
        entries.push(diag);
        diag
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<EvolutionDiagnostic> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn exceeded_count(&self) -> usize {
        self.entries().iter().filter(|d| d.exceeded).count()
    }

    pub fn max_epsilon(&self) -> Option<f64> {
        self.entries()
            .iter()
            .map(|d| d.epsilon)
            .max_by(|a, b| a.total_cmp(b))
    }
}
