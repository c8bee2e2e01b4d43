//! Maps `Box<dyn Error>` from trait boundaries to typed kernel errors.
//!
//! The traits in `kettle_traits` use `Box<dyn Error + Send + Sync>`; this
//! module classifies those, with an optional feature-gated path for
//! `kettle_hardware::HwError` downcasting.

use crate::error::StoreError;

/// Map a store-boundary error to a typed `StoreError`.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> StoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<kettle_hardware::HwError>() {
            return match hw {
                kettle_hardware::HwError::OutOfRange { addr, len, size } => StoreError::OutOfRange {
                    addr: *addr,
                    len: *len,
                    size: *size,
                },
                other => StoreError::Io(other.to_string()),
            };
        }
    }
    if let Some(se) = e.downcast_ref::<StoreError>() {
        return se.clone();
    }
    StoreError::Io(e.to_string())
}

/// True when a failed conversion only means "no data yet", not a fault.
pub fn is_not_ready(e: &(dyn std::error::Error + 'static)) -> bool {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<kettle_hardware::HwError>() {
            return matches!(hw, kettle_hardware::HwError::NotReady);
        }
    }
    e.to_string().to_lowercase().contains("not ready")
}
