use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::ErrorClass;

/// Bounded retry schedule for connection acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub too_many_cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            retry_delay: cfg.retry_delay,
            too_many_cooldown: cfg.too_many_cooldown,
        }
    }

    /// Delay before retry number `retry` (1-based), or `None` once the error must surface.
    pub fn backoff(&self, class: ErrorClass, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        match class {
            ErrorClass::AccessDenied => None,
            ErrorClass::TooManyConnections => Some(self.too_many_cooldown),
            ErrorClass::Unreachable | ErrorClass::Transient => {
                Some(self.retry_delay.saturating_mul(retry))
            }
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            too_many_cooldown: Duration::from_millis(500),
        }
    }

    #[test]
    fn access_denied_never_retries() {
        assert_eq!(policy().backoff(ErrorClass::AccessDenied, 1), None);
    }

    #[test]
    fn unreachable_backs_off_linearly_until_bound() {
        let p = policy();
        assert_eq!(
            p.backoff(ErrorClass::Unreachable, 1),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            p.backoff(ErrorClass::Unreachable, 3),
            Some(Duration::from_millis(300))
        );
        assert_eq!(p.backoff(ErrorClass::Unreachable, 4), None);
    }

    #[test]
    fn too_many_uses_fixed_cooldown() {
        let p = policy();
        for retry in 1..=3 {
            assert_eq!(
                p.backoff(ErrorClass::TooManyConnections, retry),
                Some(Duration::from_millis(500))
            );
        }
        assert_eq!(p.backoff(ErrorClass::TooManyConnections, 4), None);
        assert_eq!(p.max_attempts(), 4);
    }

    #[test]
    fn zero_retries_surfaces_first_error() {
        let p = RetryPolicy {
            max_retries: 0,
            ..policy()
        };
        assert_eq!(p.backoff(ErrorClass::Transient, 1), None);
    }
}
