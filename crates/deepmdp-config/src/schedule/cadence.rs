//! Loop cadence derived from the counting fields of `exp_config`

/// Read-only view of how often the trainer samples, learns and syncs
///
/// All quantities saturate instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingCadence {
    pub(crate) n_epochs: usize,
    pub(crate) steps_per_epoch: usize,
    pub(crate) sampler_batch_size: usize,
    pub(crate) n_train_steps: usize,
    pub(crate) min_buffer_size: usize,
    pub(crate) target_network_update_freq: usize,
}

impl TrainingCadence {
    /// Whether the target network is synced at the end of `epoch`
    #[must_use]
    pub fn is_target_update_epoch(&self, epoch: usize) -> bool {
        epoch % self.target_network_update_freq == 0
    }

    /// Number of target syncs over a `total`-epoch run
    #[must_use]
    pub fn target_updates(&self, total: usize) -> usize {
        total.div_ceil(self.target_network_update_freq)
    }

    /// Environment transitions collected per epoch
    #[must_use]
    pub fn env_steps_per_epoch(&self) -> usize {
        self.steps_per_epoch.saturating_mul(self.sampler_batch_size)
    }

    /// Environment transitions collected over the whole run
    #[must_use]
    pub fn total_env_steps(&self) -> usize {
        self.env_steps_per_epoch().saturating_mul(self.n_epochs)
    }

    /// Optimizer updates per epoch once the buffer is prefilled
    #[must_use]
    pub fn gradient_steps_per_epoch(&self) -> usize {
        self.steps_per_epoch.saturating_mul(self.n_train_steps)
    }

    /// Upper bound on optimizer updates over the whole run
    #[must_use]
    pub fn total_gradient_steps(&self) -> usize {
        self.gradient_steps_per_epoch().saturating_mul(self.n_epochs)
    }

    /// Whether training may start with `n_stored` transitions in the buffer
    #[must_use]
    pub fn buffer_prefilled(&self, n_stored: usize) -> bool {
        n_stored >= self.min_buffer_size
    }

    /// Configured number of epochs
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cadence() -> TrainingCadence {
        TrainingCadence {
            n_epochs: 1000,
            steps_per_epoch: 500,
            sampler_batch_size: 1,
            n_train_steps: 1,
            min_buffer_size: 10_000,
            target_network_update_freq: 2,
        }
    }

    #[test]
    fn test_target_updates() {
        let c = cadence();
        assert!(c.is_target_update_epoch(0));
        assert!(!c.is_target_update_epoch(1));
        assert!(c.is_target_update_epoch(4));
        assert_eq!(c.target_updates(1000), 500);
        assert_eq!(c.target_updates(5), 3);
    }

    #[test]
    fn test_step_counts() {
        let c = TrainingCadence {
            sampler_batch_size: 4,
            n_train_steps: 2,
            ..cadence()
        };
        assert_eq!(c.env_steps_per_epoch(), 2000);
        assert_eq!(c.total_env_steps(), 2_000_000);
        assert_eq!(c.gradient_steps_per_epoch(), 1000);
        assert_eq!(c.total_gradient_steps(), 1_000_000);
    }

    #[test]
    fn test_buffer_prefilled() {
        let c = cadence();
        assert!(!c.buffer_prefilled(9_999));
        assert!(c.buffer_prefilled(10_000));
    }

    #[test]
    fn test_saturates() {
        let c = TrainingCadence {
            steps_per_epoch: usize::MAX,
            sampler_batch_size: 2,
            ..cadence()
        };
        assert_eq!(c.total_env_steps(), usize::MAX);
    }
}
