//! Maps `Box<dyn Error>` from trait boundaries to typed `DoorError`.
//!
//! The traits in `doorctl_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `doorctl_hardware::HwError` downcasting.

use crate::error::DoorError;

/// Map a trait-boundary error to a typed `DoorError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DoorError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<doorctl_hardware::error::HwError>() {
            return match hw {
                doorctl_hardware::error::HwError::EchoTimeout => DoorError::Timeout,
                doorctl_hardware::error::HwError::Io(io) => DoorError::Io(io.to_string()),
                other => DoorError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return DoorError::Io(io.to_string());
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        DoorError::Timeout
    } else {
        DoorError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain(&'static str);
    impl std::fmt::Display for Plain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }
    impl std::error::Error for Plain {}

    #[test]
    fn timeout_text_maps_to_timeout() {
        assert!(matches!(
            map_hw_error(&Plain("relay Timeout")),
            DoorError::Timeout
        ));
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let e = std::io::Error::other("disk gone");
        assert!(matches!(map_hw_error(&e), DoorError::Io(_)));
    }

    #[test]
    fn unknown_text_is_generic_hardware() {
        match map_hw_error(&Plain("gpio busy")) {
            DoorError::Hardware(s) => assert_eq!(s, "gpio busy"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
