//! User domain types.

use serde::{Deserialize, Serialize};

use plateful_core::{AddressId, Email, UserId, UserRole};

/// The authenticated user's profile.
///
/// Fetched lazily once an access token is present and then held for the
/// remainder of the session; the session coordinator clears it on logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// User's email address.
    pub email: Email,
    /// Account role.
    pub role: UserRole,
}

/// A delivery address belonging to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Unique address ID.
    pub id: AddressId,
    /// User-assigned label (e.g., "Home", "Office").
    pub label: String,
    /// Street address, first line.
    pub line1: String,
    /// Street address, second line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Whether this is the user's preferred delivery address.
    #[serde(default)]
    pub is_default: bool,
}
