//! Error types for the thingy52-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The user dismissed the device chooser.
    #[error("Device selection cancelled by user")]
    UserCancelled,

    /// No device matching the filter was found.
    #[error("No matching device found")]
    NoDeviceFound,

    /// Failed to establish or keep the GATT session.
    #[error("Link error: {reason}")]
    LinkError {
        /// Description of why the link failed.
        reason: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// A best-effort feature could not be set up. Never returned from
    /// `scan()`; kept for diagnostics only.
    #[error("Optional feature '{feature}' unavailable: {reason}")]
    OptionalFeatureUnavailable {
        /// Name of the feature, e.g. `battery`.
        feature: String,
        /// Why it could not be enabled.
        reason: String,
    },

    /// Invalid data was received from the device.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// The session was superseded or disconnected while still being set up.
    #[error("Session setup cancelled")]
    Cancelled,
}

impl Error {
    /// True for errors that mean the peripheral lacks part of the expected
    /// GATT profile.
    pub fn is_profile_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound { .. } | Self::CharacteristicNotFound { .. }
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
