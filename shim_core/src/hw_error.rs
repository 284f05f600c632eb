//! Maps `Box<dyn Error>` from the `Dac` trait boundary to typed `ShimError`.
//!
//! The traits in `shim_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `shim_hardware::HwError` downcasting.

use crate::error::ShimError;

/// Map a trait-boundary error to a typed `ShimError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ShimError {
    #[cfg(feature = "hardware-errors")]
    {
        use shim_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Channel(ch) => ShimError::Config(format!("dac channel {ch} out of range")),
                other => ShimError::HardwareFault(other.to_string()),
            };
        }
    }

    ShimError::HardwareFault(e.to_string())
}

#[cfg(all(test, feature = "hardware-errors"))]
mod tests {
    use super::*;
    use shim_hardware::error::HwError;

    #[test]
    fn channel_errors_map_to_config() {
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::Channel(20));
        assert!(matches!(map_hw_error(&*e), ShimError::Config(_)));
    }

    #[test]
    fn other_errors_map_to_fault() {
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(std::io::Error::other("bus"));
        assert_eq!(map_hw_error(&*e), ShimError::HardwareFault("bus".into()));
    }
}
