//! Status enums for orders and users.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order, from checkout to the customer's door.
///
/// The remote system is authoritative for status changes; clients mirror
/// whatever it reports. `Cancelled` is reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Accepted,
    Preparing,
    Ready,
    RiderAssigned,
    RiderOnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The next stage in the normal (uncancelled) progression.
    ///
    /// Returns `None` for terminal statuses.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Placed => Some(Self::Accepted),
            Self::Accepted => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::RiderAssigned),
            Self::RiderAssigned => Some(Self::RiderOnTheWay),
            Self::RiderOnTheWay => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Whether this status ends the order's lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Plausibility check for a status change.
    ///
    /// Forward movement is allowed (including skipped stages, since push
    /// updates can arrive out of order), as is cancellation of any
    /// non-terminal order. This is advisory only; the remote system remains
    /// the source of truth.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match target {
            Self::Cancelled => !self.is_terminal(),
            _ => target.rank() > self.rank(),
        }
    }

    /// Human-readable label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Placed => "Placed",
            Self::Accepted => "Accepted",
            Self::Preparing => "Preparing",
            Self::Ready => "Ready for pickup",
            Self::RiderAssigned => "Rider assigned",
            Self::RiderOnTheWay => "Rider on the way",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Position in the normal progression. `Cancelled` sits outside it.
    const fn rank(&self) -> u8 {
        match self {
            Self::Placed => 0,
            Self::Accepted => 1,
            Self::Preparing => 2,
            Self::Ready => 3,
            Self::RiderAssigned => 4,
            Self::RiderOnTheWay => 5,
            Self::Delivered => 6,
            Self::Cancelled => 7,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed => write!(f, "placed"),
            Self::Accepted => write!(f, "accepted"),
            Self::Preparing => write!(f, "preparing"),
            Self::Ready => write!(f, "ready"),
            Self::RiderAssigned => write!(f, "rider_assigned"),
            Self::RiderOnTheWay => write!(f, "rider_on_the_way"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error returned when a status string does not name a known status.
///
/// Unknown values are rejected rather than coerced to a default; a silent
/// fallback would misreport where an order actually is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0:?}")]
pub struct ParseOrderStatusError(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(Self::Placed),
            "accepted" => Ok(Self::Accepted),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "rider_assigned" => Ok(Self::RiderAssigned),
            "rider_on_the_way" => Ok(Self::RiderOnTheWay),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseOrderStatusError(s.to_owned())),
        }
    }
}

/// Account role with different capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Places orders.
    #[default]
    Customer,
    /// Manages a restaurant's menu and accepts orders.
    Vendor,
    /// Delivers orders.
    Rider,
    /// Full access to platform management.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Rider => write!(f, "rider"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "rider" => Ok(Self::Rider),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}
