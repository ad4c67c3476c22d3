/*! Controller timing and agent configuration. */

use std::time::Duration;

use crate::agent::AgentOptions;

/// Wait after `enable_edit_mode` before the first injection attempt.
pub const DEFAULT_INJECT_DELAY: Duration = Duration::from_millis(300);

/// Wait after a frame load before re-injecting or re-syncing. A full reload
/// settles slower than an in-place render.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(500);

/// Interval between document accessibility checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Accessibility checks before an injection attempt gives up.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 50;

pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Controller configuration. See the `DEFAULT_*` constants for defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
  pub inject_delay: Duration,
  pub reload_delay: Duration,
  pub poll_interval: Duration,
  pub max_poll_attempts: u32,
  /// Capacity of the controller event channel. Oldest events are dropped on
  /// overflow.
  pub event_capacity: usize,
  /// Options rendered into the injected agent.
  pub agent: AgentOptions,
}

impl Default for ControllerConfig {
  fn default() -> Self {
    Self {
      inject_delay: DEFAULT_INJECT_DELAY,
      reload_delay: DEFAULT_RELOAD_DELAY,
      poll_interval: DEFAULT_POLL_INTERVAL,
      max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
      event_capacity: DEFAULT_EVENT_CAPACITY,
      agent: AgentOptions::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reload_settles_longer_than_first_injection() {
    let config = ControllerConfig::default();
    assert!(config.reload_delay > config.inject_delay);
    assert!(config.poll_interval < config.inject_delay);
    assert!(!config.agent.report_hover);
  }
}
