//! Long-lived transfer PIN checks
//!
//! The transfer PIN is a six-digit secret kept on the user's profile. It is
//! set once and then required for transfers the user initiates by phone
//! number or account number.

use crate::core::traits::ProfileStore;
use crate::types::{LedgerError, UserId};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Number of digits in a transfer PIN
pub const TRANSFER_PIN_LENGTH: usize = 6;

/// Sets and checks users' transfer PINs through the profile store
pub struct TransferPins {
    profiles: Arc<dyn ProfileStore>,
}

impl TransferPins {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Set the user's transfer PIN
    ///
    /// # Errors
    ///
    /// * `InvalidPinFormat` - The PIN is not exactly six ASCII digits
    /// * `UserNotFound` - Unknown user
    /// * `TransferPinAlreadySet` - The user already has a PIN
    pub fn set(&self, user: UserId, pin: &str) -> Result<(), LedgerError> {
        if !is_well_formed(pin) {
            return Err(LedgerError::InvalidPinFormat);
        }

        self.profiles.store_transfer_pin(user, pin, Utc::now())?;
        info!(user, "Transfer PIN set");
        Ok(())
    }

    pub fn has(&self, user: UserId) -> bool {
        self.profiles
            .find_user(user)
            .is_some_and(|profile| profile.transfer_pin.is_some())
    }

    /// Whether `pin` matches the user's transfer PIN
    ///
    /// False for unknown users and for users without a PIN.
    pub fn verify(&self, user: UserId, pin: &str) -> bool {
        self.profiles
            .find_user(user)
            .and_then(|profile| profile.transfer_pin)
            .is_some_and(|stored| stored == pin)
    }

    /// Check the PIN, failing with `InvalidTransferPin` on mismatch or absence
    pub fn authorize(&self, user: UserId, pin: &str) -> Result<(), LedgerError> {
        if self.verify(user, pin) {
            Ok(())
        } else {
            warn!(user, "Transfer PIN rejected");
            Err(LedgerError::InvalidTransferPin { user })
        }
    }
}

fn is_well_formed(pin: &str) -> bool {
    pin.len() == TRANSFER_PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directory::InMemoryDirectory;
    use crate::types::{ErrorKind, UserProfile};
    use rstest::rstest;

    fn pins() -> TransferPins {
        let directory = InMemoryDirectory::new();
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();
        TransferPins::new(Arc::new(directory))
    }

    #[rstest]
    #[case::too_short("12345")]
    #[case::too_long("1234567")]
    #[case::letters("12a456")]
    #[case::empty("")]
    #[case::unicode_digits("١٢٣٤٥٦")]
    fn test_malformed_pin_is_rejected(#[case] pin: &str) {
        let pins = pins();

        let result = pins.set(1, pin);

        assert_eq!(result, Err(LedgerError::InvalidPinFormat));
        assert_eq!(LedgerError::InvalidPinFormat.kind(), ErrorKind::InvalidInput);
        assert!(!pins.has(1));
    }

    #[test]
    fn test_set_once() {
        let pins = pins();

        pins.set(1, "123456").unwrap();
        let second = pins.set(1, "654321");

        assert_eq!(second.unwrap_err().kind(), ErrorKind::Conflict);
        assert!(pins.verify(1, "123456"));
        assert!(!pins.verify(1, "654321"));
    }

    #[test]
    fn test_unknown_user() {
        let pins = pins();

        assert_eq!(
            pins.set(7, "123456"),
            Err(LedgerError::UserNotFound { user: 7 })
        );
        assert!(!pins.has(7));
        assert!(!pins.verify(7, "123456"));
    }

    #[test]
    fn test_authorize_without_pin() {
        let pins = pins();

        assert_eq!(
            pins.authorize(1, "123456"),
            Err(LedgerError::InvalidTransferPin { user: 1 })
        );
    }
}
