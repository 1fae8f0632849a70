//! Log-backed activity indicators.
//!
//! On hardware each role drives an LED: lit while the role is still
//! binding, flashed on every frame afterwards.  The simulated nodes have no
//! LEDs, so [`LogIndicator`] keeps the on/off state in memory and emits a
//! `debug` event whenever it changes.

use meshkey_core::{ServiceRole, StatusIndicator};
use tracing::debug;

/// A [`StatusIndicator`] that traces state changes for one named node.
#[derive(Debug, Clone)]
pub struct LogIndicator {
    node: &'static str,
    register_lit: bool,
    request_lit: bool,
    changes: u64,
}

impl LogIndicator {
    pub fn new(node: &'static str) -> Self {
        Self {
            node,
            register_lit: false,
            request_lit: false,
            changes: 0,
        }
    }

    /// Current state of the indicator for `role`.
    pub fn is_lit(&self, role: ServiceRole) -> bool {
        match role {
            ServiceRole::Register => self.register_lit,
            ServiceRole::Request => self.request_lit,
        }
    }

    /// Number of on/off transitions seen so far.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, role: ServiceRole, on: bool) {
        let lit = match role {
            ServiceRole::Register => &mut self.register_lit,
            ServiceRole::Request => &mut self.request_lit,
        };
        if *lit == on {
            return;
        }
        *lit = on;
        self.changes += 1;
        debug!(node = self.node, %role, on, "indicator");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_indicator_is_dark() {
        let indicator = LogIndicator::new("rx");

        assert!(!indicator.is_lit(ServiceRole::Register));
        assert!(!indicator.is_lit(ServiceRole::Request));
    }

    #[test]
    fn test_set_tracks_roles_independently() {
        // Arrange
        let mut indicator = LogIndicator::new("tx");

        // Act
        indicator.set(ServiceRole::Request, true);

        // Assert
        assert!(indicator.is_lit(ServiceRole::Request));
        assert!(!indicator.is_lit(ServiceRole::Register));
    }

    #[test]
    fn test_repeated_set_counts_one_change() {
        let mut indicator = LogIndicator::new("tx");

        indicator.set(ServiceRole::Register, true);
        indicator.set(ServiceRole::Register, true);
        indicator.set(ServiceRole::Register, false);

        assert_eq!(indicator.changes(), 2);
    }
}
