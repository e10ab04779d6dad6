//! Maps `Box<dyn Error>` from the coil-writer boundary to a typed `WriteFault`.
//!
//! `shutter_traits::CoilWriter` returns `Box<dyn Error + Send + Sync>`; this
//! module classifies those, with an optional feature-gated path for
//! `shutter_hardware::HwError` downcasting.

use crate::error::WriteFault;

/// Map a trait-boundary error to a typed `WriteFault`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> WriteFault {
    #[cfg(feature = "hardware-errors")]
    {
        use shutter_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => WriteFault::Timeout,
                HwError::Interlock { .. } => WriteFault::Interlock,
                HwError::Exception(_) => WriteFault::Device(hw.to_string()),
                other => WriteFault::Transport(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        WriteFault::Timeout
    } else if lower.contains("interlock") {
        WriteFault::Interlock
    } else {
        WriteFault::Transport(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_detects_timeouts() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        assert_eq!(map_hw_error(&e), WriteFault::Timeout);
    }

    #[test]
    fn unknown_errors_become_transport() {
        let e = std::io::Error::other("connection reset");
        assert_eq!(
            map_hw_error(&e),
            WriteFault::Transport("connection reset".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hardware_errors_are_classified() {
        use shutter_hardware::HwError;
        assert_eq!(map_hw_error(&HwError::Timeout), WriteFault::Timeout);
        assert_eq!(
            map_hw_error(&HwError::Interlock {
                unit: 1,
                open: 2,
                close: 3
            }),
            WriteFault::Interlock
        );
        assert!(matches!(
            map_hw_error(&HwError::Exception(2)),
            WriteFault::Device(_)
        ));
        assert!(matches!(
            map_hw_error(&HwError::Injected(4)),
            WriteFault::Transport(_)
        ));
    }
}
