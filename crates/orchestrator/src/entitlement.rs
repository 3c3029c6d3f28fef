use chrono::{DateTime, Duration, Utc};

use coreflow_core::domain::bundle::BundleDefinition;
use coreflow_core::domain::subscription::{Subscription, SubscriptionStatus};

pub const DEFAULT_PAST_DUE_GRACE_DAYS: u32 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntitlementDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
    Degrade { reason_code: &'static str, user_message: String },
}

impl EntitlementDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny { .. } => "deny",
            Self::Degrade { .. } => "degrade",
        }
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason_code, .. } | Self::Degrade { reason_code, .. } => {
                Some(*reason_code)
            }
        }
    }
}

/// Decides whether a tenant's subscription lets it run a bundle workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitlementPolicy {
    pub past_due_grace_days: u32,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self { past_due_grace_days: DEFAULT_PAST_DUE_GRACE_DAYS }
    }
}

impl EntitlementPolicy {
    pub fn new(past_due_grace_days: u32) -> Self {
        Self { past_due_grace_days }
    }

    pub fn evaluate(
        &self,
        subscription: Option<&Subscription>,
        bundle: &BundleDefinition,
        now: DateTime<Utc>,
    ) -> EntitlementDecision {
        let Some(subscription) = subscription else {
            return EntitlementDecision::Deny {
                reason_code: "no_subscription",
                user_message: "This tenant has no subscription. Subscribe to a plan to use bundles."
                    .to_string(),
            };
        };

        if subscription.status.is_terminal() {
            return EntitlementDecision::Deny {
                reason_code: "subscription_inactive",
                user_message: format!(
                    "The subscription is {}. Reactivate it to use {}.",
                    subscription.status.as_str(),
                    bundle.name
                ),
            };
        }

        if !subscription.includes(&bundle.id) {
            return EntitlementDecision::Deny {
                reason_code: "bundle_not_subscribed",
                user_message: format!("{} is not part of this subscription.", bundle.name),
            };
        }

        if !bundle.available_on(subscription.tier) {
            return EntitlementDecision::Deny {
                reason_code: "tier_insufficient",
                user_message: format!(
                    "{} requires the {} plan or higher.",
                    bundle.name,
                    bundle.minimum_tier.as_str()
                ),
            };
        }

        match subscription.status {
            SubscriptionStatus::Trialing if now > subscription.current_period_end => {
                EntitlementDecision::Deny {
                    reason_code: "trial_expired",
                    user_message: "The trial period has ended. Upgrade to continue.".to_string(),
                }
            }
            SubscriptionStatus::PastDue => {
                let grace = Duration::days(i64::from(self.past_due_grace_days));
                if subscription.overdue_by(now) <= grace {
                    EntitlementDecision::Allow
                } else {
                    EntitlementDecision::Degrade {
                        reason_code: "subscription_past_due",
                        user_message:
                            "Payment is past due. Results are limited until the balance is settled."
                                .to_string(),
                    }
                }
            }
            _ => EntitlementDecision::Allow,
        }
    }
}
