//! Signature verification outcome types.

use serde::{Deserialize, Serialize};

/// Outcome category of an inbound signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No secret configured: verification is opt-in and the delivery is accepted.
    NoSecret,
    Verified,
    MissingSignature,
    BadFormat,
    Mismatch,
}

impl VerificationStatus {
    /// Human-readable status, carried in the broadcast payload.
    pub fn describe(&self) -> &'static str {
        match self {
            VerificationStatus::NoSecret => "No signature required",
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::MissingSignature => "FAILED: Missing signature header",
            VerificationStatus::BadFormat => "FAILED: Invalid signature format",
            VerificationStatus::Mismatch => "FAILED: Signature mismatch",
        }
    }
}

/// Result of checking one inbound request body against its signature header.
/// Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub is_valid: bool,
    pub status: VerificationStatus,
}

impl Verification {
    pub fn accepted(status: VerificationStatus) -> Self {
        Self {
            is_valid: true,
            status,
        }
    }

    pub fn rejected(status: VerificationStatus) -> Self {
        Self {
            is_valid: false,
            status,
        }
    }
}
