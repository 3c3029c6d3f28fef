use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub String);

impl BundleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BundleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Subscription plan level. Variant order is significant: `Ord` follows
/// Starter < Professional < Enterprise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Professional,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    /// Platform price per seat per month, before bundles.
    pub fn seat_price(&self) -> Decimal {
        match self {
            Self::Starter => Decimal::new(1500, 2),
            Self::Professional => Decimal::new(3500, 2),
            Self::Enterprise => Decimal::new(6500, 2),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported plan tier `{other}` (expected starter|professional|enterprise)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Annual => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "annual" | "yearly" => Ok(Self::Annual),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported billing cycle `{other}` (expected monthly|annual)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleService {
    FinGpt,
    FinRobot,
    ErpNext,
}

impl BundleService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinGpt => "fingpt",
            Self::FinRobot => "finrobot",
            Self::ErpNext => "erpnext",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    pub id: BundleId,
    pub name: String,
    pub service: BundleService,
    pub workflows: Vec<String>,
    pub monthly_seat_price: Decimal,
    pub minimum_tier: PlanTier,
    pub capabilities: Vec<String>,
}

impl BundleDefinition {
    pub fn supports(&self, workflow: &str) -> bool {
        self.workflows.iter().any(|candidate| candidate == workflow)
    }

    pub fn available_on(&self, tier: PlanTier) -> bool {
        tier >= self.minimum_tier
    }
}
