use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: u32,
    pub name: String,
    pub rating: f64,
    pub completed_jobs: u32,
    pub initial_distance_km: f64,
    pub eta_minutes: u32,
    pub is_lead: bool,
}

/// Ranked providers for one booking; the lead is always first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSet {
    providers: Vec<Provider>,
}

impl AssignmentSet {
    pub(crate) fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn lead(&self) -> Option<&Provider> {
        self.providers.first().filter(|provider| provider.is_lead)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
