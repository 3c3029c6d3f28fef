use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use coreflow_core::catalog::{
    FINGPT_BUNDLE, FINROBOT_BUNDLE, MANUFACTURING_BUNDLE, PAYROLL_BUNDLE,
};
use coreflow_core::domain::bundle::{BillingCycle, BundleId, PlanTier};
use coreflow_core::domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};
use coreflow_core::domain::tenant::TenantId;

use crate::repositories::{RepositoryError, SubscriptionRepository};

struct SeedTenantContract {
    tenant_id: &'static str,
    subscription_id: &'static str,
    tier: PlanTier,
    bundles: &'static [&'static str],
    seats: u32,
    billing_cycle: BillingCycle,
    status: SubscriptionStatus,
    /// Days from now until the current period ends; negative means already ended.
    period_end_offset_days: i64,
    description: &'static str,
}

const SEED_TENANTS: &[SeedTenantContract] = &[
    SeedTenantContract {
        tenant_id: "tenant-acme",
        subscription_id: "SUB-acme",
        tier: PlanTier::Enterprise,
        bundles: &[FINGPT_BUNDLE, FINROBOT_BUNDLE, PAYROLL_BUNDLE, MANUFACTURING_BUNDLE],
        seats: 250,
        billing_cycle: BillingCycle::Annual,
        status: SubscriptionStatus::Active,
        period_end_offset_days: 300,
        description: "Enterprise tenant with every bundle",
    },
    SeedTenantContract {
        tenant_id: "tenant-globex",
        subscription_id: "SUB-globex",
        tier: PlanTier::Professional,
        bundles: &[FINGPT_BUNDLE, PAYROLL_BUNDLE],
        seats: 40,
        billing_cycle: BillingCycle::Monthly,
        status: SubscriptionStatus::Active,
        period_end_offset_days: 20,
        description: "Professional tenant with sentiment and payroll",
    },
    SeedTenantContract {
        tenant_id: "tenant-initech",
        subscription_id: "SUB-initech",
        tier: PlanTier::Professional,
        bundles: &[FINGPT_BUNDLE],
        seats: 10,
        billing_cycle: BillingCycle::Monthly,
        status: SubscriptionStatus::PastDue,
        period_end_offset_days: -30,
        description: "Past-due tenant beyond the grace period",
    },
];

/// Demo tenants used by `coreflow seed` and the end-to-end tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub fn subscriptions(now: DateTime<Utc>) -> Vec<Subscription> {
        let now = now.trunc_subsecs(0);
        SEED_TENANTS
            .iter()
            .map(|contract| Subscription {
                id: SubscriptionId(contract.subscription_id.to_string()),
                tenant_id: TenantId(contract.tenant_id.to_string()),
                tier: contract.tier,
                bundles: contract.bundles.iter().map(|bundle| BundleId::from(*bundle)).collect(),
                seats: contract.seats,
                billing_cycle: contract.billing_cycle,
                status: contract.status,
                promo_code: None,
                current_period_end: now + Duration::days(contract.period_end_offset_days),
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    /// Upserts every demo tenant; running it twice leaves the same rows.
    pub async fn load(
        repository: &dyn SubscriptionRepository,
    ) -> Result<SeedResult, RepositoryError> {
        let mut tenants_seeded = Vec::with_capacity(SEED_TENANTS.len());
        for (contract, subscription) in SEED_TENANTS.iter().zip(Self::subscriptions(Utc::now())) {
            repository.save(subscription).await?;
            tenants_seeded.push(TenantSeedInfo {
                tenant_id: contract.tenant_id,
                tier: contract.tier.as_str(),
                status: contract.status.as_str(),
                description: contract.description,
            });
        }

        Ok(SeedResult { tenants_seeded })
    }

    pub async fn verify(
        repository: &dyn SubscriptionRepository,
    ) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_TENANTS.len());
        for contract in SEED_TENANTS {
            let found = repository.find_by_tenant(&TenantId::from(contract.tenant_id)).await?;
            let matches = found.is_some_and(|subscription| {
                subscription.tier == contract.tier
                    && subscription.status == contract.status
                    && subscription.bundles.len() == contract.bundles.len()
            });
            checks.push((contract.tenant_id, matches));
        }

        Ok(VerificationResult { checks })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SeedResult {
    pub tenants_seeded: Vec<TenantSeedInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TenantSeedInfo {
    pub tenant_id: &'static str,
    pub tier: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, passed)| *passed)
    }

    pub fn failed(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, passed)| !passed).map(|(name, _)| *name).collect()
    }
}
