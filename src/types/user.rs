//! User profile types
//!
//! The ledger core only needs the slice of a user profile that identifies
//! the owner of an account and authorizes transfers: the id, the phone number
//! used for recipient resolution, and the long-lived transfer PIN.

use chrono::{DateTime, Utc};
use std::fmt;

/// Internal user identifier
pub type UserId = u64;

/// The parts of a user profile consumed by the ledger core
#[derive(Clone, PartialEq)]
pub struct UserProfile {
    pub id: UserId,

    /// Phone number used to resolve phone-addressed transfers
    pub phone_number: String,

    /// Six-digit transfer PIN, set at most once
    pub transfer_pin: Option<String>,

    /// When the transfer PIN was set
    pub pin_created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Create a profile without a transfer PIN
    pub fn new(id: UserId, phone_number: impl Into<String>) -> Self {
        UserProfile {
            id,
            phone_number: phone_number.into(),
            transfer_pin: None,
            pin_created_at: None,
        }
    }
}

// The PIN never shows up in logs or panic messages.
impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("id", &self.id)
            .field("phone_number", &self.phone_number)
            .field(
                "transfer_pin",
                &self.transfer_pin.as_ref().map(|_| "******"),
            )
            .field("pin_created_at", &self.pin_created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_transfer_pin() {
        let mut profile = UserProfile::new(1, "+15550001");
        profile.transfer_pin = Some("123456".to_string());

        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("123456"));
        assert!(rendered.contains("******"));
    }
}
