#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Coil writers: a Modbus/TCP client for real hubs and an in-memory bank
//! for simulation and tests.
pub mod error;
pub mod modbus;

pub use error::HwError;
pub use modbus::ModbusTcpCoilWriter;

use shutter_traits::CoilWriter;
use std::collections::HashMap;

/// Simulated coil bank.
///
/// Keeps the last written state of every `(unit, address)` and refuses a
/// write that would energize both coils of a registered interlock pair.
#[derive(Debug, Default)]
pub struct SimulatedCoilBank {
    coils: HashMap<(u8, u16), bool>,
    interlocks: Vec<(u8, u16, u16)>,
    fail_on: Option<u16>,
    writes: usize,
}

impl SimulatedCoilBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open/close pair that must never both be on.
    pub fn with_interlock(mut self, unit: u8, open: u16, close: u16) -> Self {
        self.add_interlock(unit, open, close);
        self
    }

    pub fn add_interlock(&mut self, unit: u8, open: u16, close: u16) {
        self.interlocks.push((unit, open, close));
    }

    /// Fail every write to `address` (any unit). `None` clears it.
    pub fn fail_address(&mut self, address: Option<u16>) {
        self.fail_on = address;
    }

    /// Last written state; unwritten coils read as off.
    pub fn coil(&self, unit: u8, address: u16) -> bool {
        self.coils.get(&(unit, address)).copied().unwrap_or(false)
    }

    /// Number of accepted writes.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn check_interlock(&self, unit: u8, address: u16) -> error::Result<()> {
        for &(u, open, close) in &self.interlocks {
            if u != unit {
                continue;
            }
            let other = if address == open {
                close
            } else if address == close {
                open
            } else {
                continue;
            };
            if self.coil(unit, other) {
                return Err(HwError::Interlock { unit, open, close });
            }
        }
        Ok(())
    }
}

impl CoilWriter for SimulatedCoilBank {
    fn write_coil(
        &mut self,
        hub: &str,
        unit: u8,
        address: u16,
        state: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_on == Some(address) {
            tracing::warn!(hub, unit, address, state, "coil write failed (injected)");
            return Err(Box::new(HwError::Injected(address)));
        }
        if state {
            self.check_interlock(unit, address)?;
        }
        self.coils.insert((unit, address), state);
        self.writes += 1;
        tracing::debug!(hub, unit, address, state, "coil write (simulated)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_last_state() {
        let mut bank = SimulatedCoilBank::new();
        assert!(!bank.coil(1, 10));
        bank.write_coil("main", 1, 10, true).unwrap();
        assert!(bank.coil(1, 10));
        assert!(!bank.coil(2, 10));
        bank.write_coil("main", 1, 10, false).unwrap();
        assert!(!bank.coil(1, 10));
        assert_eq!(bank.write_count(), 2);
    }

    #[test]
    fn interlock_rejects_both_on() {
        let mut bank = SimulatedCoilBank::new().with_interlock(1, 10, 11);
        bank.write_coil("main", 1, 10, true).unwrap();
        let err = bank.write_coil("main", 1, 11, true).unwrap_err();
        assert!(err.to_string().contains("interlock"));
        assert!(!bank.coil(1, 11));
        // Other units are independent
        bank.write_coil("main", 2, 11, true).unwrap();
    }

    #[test]
    fn injected_failure_is_not_applied() {
        let mut bank = SimulatedCoilBank::new();
        bank.fail_address(Some(7));
        let err = bank.write_coil("main", 1, 7, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>(),
            Some(HwError::Injected(7))
        ));
        assert!(!bank.coil(1, 7));
        bank.fail_address(None);
        bank.write_coil("main", 1, 7, true).unwrap();
        assert!(bank.coil(1, 7));
    }
}
