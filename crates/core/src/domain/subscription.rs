use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bundle::{BillingCycle, BundleId, PlanTier};
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown subscription status `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub tenant_id: TenantId,
    pub tier: PlanTier,
    pub bundles: Vec<BundleId>,
    pub seats: u32,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub promo_code: Option<String>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn includes(&self, bundle: &BundleId) -> bool {
        self.bundles.iter().any(|candidate| candidate == bundle)
    }

    /// Time elapsed since the current period ended, or zero while the period is still open.
    pub fn overdue_by(&self, now: DateTime<Utc>) -> Duration {
        if now > self.current_period_end {
            now - self.current_period_end
        } else {
            Duration::zero()
        }
    }

    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;

        matches!(
            (self.status, next),
            (Trialing, Active)
                | (Trialing, Expired)
                | (Trialing, Cancelled)
                | (Active, PastDue)
                | (Active, Cancelled)
                | (PastDue, Active)
                | (PastDue, Cancelled)
                | (PastDue, Expired)
                | (Cancelled, Active)
        )
    }

    pub fn transition_to(&mut self, next: SubscriptionStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = Utc::now();
            return Ok(());
        }

        Err(DomainError::InvalidSubscriptionTransition { from: self.status, to: next })
    }
}
