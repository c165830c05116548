use tracing::{debug, warn};

use crate::models::{ConsultationError, ConsultationStatus};

pub struct ConsultationLifecycleService;

impl ConsultationLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: ConsultationStatus,
        new_status: ConsultationStatus,
    ) -> Result<(), ConsultationError> {
        debug!("Validating consultation transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid consultation transition attempted: {} -> {}", current_status, new_status);
            return Err(ConsultationError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: ConsultationStatus) -> Vec<ConsultationStatus> {
        match current_status {
            ConsultationStatus::Active => vec![ConsultationStatus::Summarizing, ConsultationStatus::Failed],
            // Failed only when the outcome cannot be stored
            ConsultationStatus::Summarizing => vec![ConsultationStatus::Completed, ConsultationStatus::Failed],
            ConsultationStatus::Completed => vec![],
            ConsultationStatus::Failed => vec![],
        }
    }
}

impl Default for ConsultationLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
