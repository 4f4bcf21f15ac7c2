use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Owns the appointment status state machine. The record itself carries no
/// transition logic; every mutation goes through here first.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating status transition from {} to {}",
            current_status, new_status
        );

        let valid_transitions = self.valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!(
                "Invalid status transition attempted: {} -> {}",
                current_status, new_status
            );
            return Err(AppointmentError::InvalidStatusTransition(*current_status));
        }

        Ok(())
    }

    pub fn valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Scheduled => vec![AppointmentStatus::Cancelled],
            // Terminal: a cancelled appointment never comes back
            AppointmentStatus::Cancelled => vec![],
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_approved_or_cancelled() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle
            .validate_status_transition(&AppointmentStatus::Pending, &AppointmentStatus::Scheduled)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(&AppointmentStatus::Pending, &AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn scheduled_can_only_be_cancelled() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle
            .validate_status_transition(
                &AppointmentStatus::Scheduled,
                &AppointmentStatus::Cancelled
            )
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Pending)
            .is_err());
    }

    #[test]
    fn nothing_leaves_cancelled() {
        let lifecycle = AppointmentLifecycleService::new();

        for target in [
            AppointmentStatus::Pending,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Cancelled,
        ] {
            assert!(lifecycle
                .validate_status_transition(&AppointmentStatus::Cancelled, &target)
                .is_err());
        }
    }

    #[test]
    fn only_cancelled_releases_the_slot() {
        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Scheduled.occupies_slot());
        assert!(!AppointmentStatus::Cancelled.occupies_slot());
    }
}
