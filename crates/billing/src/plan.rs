use chrono::Duration;
use serde::{Deserialize, Serialize};

use sahakari_core::{DomainError, Money};

/// Days a society keeps write access after its subscription lapses.
pub const GRACE_PERIOD_DAYS: i64 = 7;

pub fn grace_period() -> Duration {
    Duration::days(GRACE_PERIOD_DAYS)
}

/// Subscription plan catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Quarterly,
    Yearly,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Monthly, Plan::Quarterly, Plan::Yearly];

    pub fn months(self) -> u32 {
        match self {
            Plan::Monthly => 1,
            Plan::Quarterly => 3,
            Plan::Yearly => 12,
        }
    }

    pub fn price(self) -> Money {
        match self {
            Plan::Monthly => Money::from_paise(49_900),
            Plan::Quarterly => Money::from_paise(139_900),
            Plan::Yearly => Money::from_paise(499_900),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Quarterly => "quarterly",
            Plan::Yearly => "yearly",
        }
    }
}

impl core::str::FromStr for Plan {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Plan::Monthly),
            "quarterly" => Ok(Plan::Quarterly),
            "yearly" => Ok(Plan::Yearly),
            other => Err(DomainError::validation(format!("unknown plan '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_prices() {
        assert_eq!(Plan::Monthly.price().paise(), 49_900);
        assert_eq!(Plan::Quarterly.price().paise(), 139_900);
        assert_eq!(Plan::Yearly.price().paise(), 499_900);
        assert_eq!(Plan::ALL.iter().map(|p| p.months()).sum::<u32>(), 16);
    }

    #[test]
    fn longer_plans_are_cheaper_per_month() {
        let per_month = |p: Plan| p.price().paise() / i64::from(p.months());
        assert!(per_month(Plan::Quarterly) < per_month(Plan::Monthly));
        assert!(per_month(Plan::Yearly) < per_month(Plan::Quarterly));
    }
}
