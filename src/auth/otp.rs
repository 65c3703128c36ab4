//! One-time passcode generation and verification.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use subtle::ConstantTimeEq;

use super::{error::AuthError, models::User};

pub const OTP_DIGITS: usize = 6;

/// A freshly generated passcode and its expiry. The caller stores both on
/// the user snapshot and hands the code to the mail collaborator.
#[derive(Clone, Debug)]
pub struct OtpIssue {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
pub struct OtpChallenge {
    ttl: Duration,
}

impl OtpChallenge {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.max(1)),
        }
    }

    /// Draw a uniform 6-digit code and stamp its expiry.
    #[must_use]
    pub fn generate(&self) -> OtpIssue {
        // gen_range is uniform over 0..=999999; leading zeros are kept.
        let value: u32 = OsRng.gen_range(0..1_000_000);
        OtpIssue {
            code: format!("{value:0width$}", width = OTP_DIGITS),
            expires_at: Utc::now() + self.ttl,
        }
    }

    /// Check a submitted code against the user's stored challenge.
    ///
    /// Expiry is checked first so an expired code is rejected even when it
    /// matches, closing the replay window. The comparison itself does not
    /// leak timing information.
    ///
    /// # Errors
    /// `OtpExpired` past the stored expiry, `OtpMismatch` otherwise on any
    /// failure to match (including a user with no active challenge).
    pub fn verify(&self, user: &User, submitted: &str) -> Result<(), AuthError> {
        let (Some(code), Some(expires_at)) = (&user.otp_code, user.otp_expires_at) else {
            return Err(AuthError::OtpMismatch);
        };

        if Utc::now() > expires_at {
            return Err(AuthError::OtpExpired);
        }

        let matches: bool = code
            .as_bytes()
            .ct_eq(submitted.trim().as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(AuthError::OtpMismatch)
        }
    }
}
