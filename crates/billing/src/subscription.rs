use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use sahakari_events::Event;

use crate::plan::{grace_period, Plan};

pub const SUBSCRIPTION_AGGREGATE_TYPE: &str = "billing.subscription";

pub const SUBSCRIPTION_ID: AggregateId = AggregateId::well_known(0x5a4a_0003);

/// Subscription state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Never started.
    None,
    Active,
    /// Expired less than the grace period ago.
    Grace,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    /// Whether the society may still record transactions.
    pub fn allows_writes(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Grace)
    }
}

/// Aggregate root: a society's SaaS subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    plan: Option<Plan>,
    started_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    total_paid: Money,
    version: u64,
}

impl Subscription {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            plan: None,
            started_at: None,
            expires_at: None,
            cancelled_at: None,
            total_paid: Money::ZERO,
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn plan(&self) -> Option<Plan> {
        self.plan
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    pub fn status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        status_at(self.expires_at, self.cancelled_at, now)
    }
}

/// Status from the two timestamps that decide it; shared with read models.
pub fn status_at(
    expires_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubscriptionStatus {
    let Some(expires_at) = expires_at else {
        return SubscriptionStatus::None;
    };
    if cancelled_at.is_some() {
        SubscriptionStatus::Cancelled
    } else if now < expires_at {
        SubscriptionStatus::Active
    } else if now < expires_at + grace_period() {
        SubscriptionStatus::Grace
    } else {
        SubscriptionStatus::Expired
    }
}

impl AggregateRoot for Subscription {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSubscription {
    pub tenant_id: TenantId,
    pub plan: Plan,
    pub started_at: DateTime<Utc>,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewSubscription {
    pub tenant_id: TenantId,
    /// Keeps the current plan when absent.
    pub plan: Option<Plan>,
    pub renewed_at: DateTime<Utc>,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSubscription {
    pub tenant_id: TenantId,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionCommand {
    Start(StartSubscription),
    Renew(RenewSubscription),
    Cancel(CancelSubscription),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStarted {
    pub tenant_id: TenantId,
    pub plan: Plan,
    pub amount: Money,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRenewed {
    pub tenant_id: TenantId,
    pub plan: Plan,
    pub amount: Money,
    pub renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCancelled {
    pub tenant_id: TenantId,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionEvent {
    Started(SubscriptionStarted),
    Renewed(SubscriptionRenewed),
    Cancelled(SubscriptionCancelled),
}

impl SubscriptionEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            SubscriptionEvent::Started(e) => e.tenant_id,
            SubscriptionEvent::Renewed(e) => e.tenant_id,
            SubscriptionEvent::Cancelled(e) => e.tenant_id,
        }
    }
}

impl Event for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubscriptionEvent::Started(_) => "billing.subscription.started",
            SubscriptionEvent::Renewed(_) => "billing.subscription.renewed",
            SubscriptionEvent::Cancelled(_) => "billing.subscription.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SubscriptionEvent::Started(e) => e.started_at,
            SubscriptionEvent::Renewed(e) => e.renewed_at,
            SubscriptionEvent::Cancelled(e) => e.cancelled_at,
        }
    }
}

impl Aggregate for Subscription {
    type Command = SubscriptionCommand;
    type Event = SubscriptionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SubscriptionEvent::Started(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.plan = Some(e.plan);
                self.started_at = Some(e.started_at);
                self.expires_at = Some(e.expires_at);
                self.cancelled_at = None;
                self.total_paid += e.amount;
            }
            SubscriptionEvent::Renewed(e) => {
                self.plan = Some(e.plan);
                self.expires_at = Some(e.expires_at);
                self.total_paid += e.amount;
            }
            SubscriptionEvent::Cancelled(e) => {
                self.cancelled_at = Some(e.cancelled_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SubscriptionCommand::Start(cmd) => {
                self.ensure_tenant(cmd.tenant_id)?;
                let reference = payment_reference(&cmd.payment_reference)?;
                if self.status(cmd.started_at) == SubscriptionStatus::Active {
                    return Err(DomainError::conflict("an active subscription already exists"));
                }

                Ok(vec![SubscriptionEvent::Started(SubscriptionStarted {
                    tenant_id: cmd.tenant_id,
                    plan: cmd.plan,
                    amount: cmd.plan.price(),
                    started_at: cmd.started_at,
                    expires_at: extend(cmd.started_at, cmd.plan)?,
                    payment_reference: reference,
                })])
            }
            SubscriptionCommand::Renew(cmd) => {
                let (Some(current_plan), Some(expires_at)) = (self.plan, self.expires_at) else {
                    return Err(DomainError::not_found());
                };
                self.ensure_tenant(cmd.tenant_id)?;
                if self.cancelled_at.is_some() {
                    return Err(DomainError::invariant(
                        "cancelled subscriptions must be started again, not renewed",
                    ));
                }
                let reference = payment_reference(&cmd.payment_reference)?;

                let plan = cmd.plan.unwrap_or(current_plan);
                let from = expires_at.max(cmd.renewed_at);

                Ok(vec![SubscriptionEvent::Renewed(SubscriptionRenewed {
                    tenant_id: cmd.tenant_id,
                    plan,
                    amount: plan.price(),
                    renewed_at: cmd.renewed_at,
                    expires_at: extend(from, plan)?,
                    payment_reference: reference,
                })])
            }
            SubscriptionCommand::Cancel(cmd) => {
                if self.expires_at.is_none() {
                    return Err(DomainError::not_found());
                }
                self.ensure_tenant(cmd.tenant_id)?;
                if self.cancelled_at.is_some() {
                    return Err(DomainError::conflict("subscription already cancelled"));
                }

                Ok(vec![SubscriptionEvent::Cancelled(SubscriptionCancelled {
                    tenant_id: cmd.tenant_id,
                    cancelled_at: cmd.cancelled_at,
                    reason: cmd.reason.clone(),
                })])
            }
        }
    }
}

impl Subscription {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.tenant_id {
            Some(t) if t != tenant_id => Err(DomainError::invariant("tenant mismatch")),
            _ => Ok(()),
        }
    }
}

fn extend(from: DateTime<Utc>, plan: Plan) -> Result<DateTime<Utc>, DomainError> {
    from.checked_add_months(Months::new(plan.months()))
        .ok_or_else(|| DomainError::validation("subscription end date out of range"))
}

fn payment_reference(raw: &str) -> Result<String, DomainError> {
    let reference = raw.trim();
    if reference.is_empty() {
        return Err(DomainError::validation("payment_reference cannot be empty"));
    }
    Ok(reference.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sahakari_events::execute;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn start(t: TenantId, plan: Plan, when: DateTime<Utc>) -> SubscriptionCommand {
        SubscriptionCommand::Start(StartSubscription {
            tenant_id: t,
            plan,
            started_at: when,
            payment_reference: "pay_123".to_string(),
        })
    }

    fn renew(t: TenantId, plan: Option<Plan>, when: DateTime<Utc>) -> SubscriptionCommand {
        SubscriptionCommand::Renew(RenewSubscription {
            tenant_id: t,
            plan,
            renewed_at: when,
            payment_reference: "pay_456".to_string(),
        })
    }

    fn cancel(t: TenantId) -> SubscriptionCommand {
        SubscriptionCommand::Cancel(CancelSubscription {
            tenant_id: t,
            cancelled_at: at(2024, 2, 1),
            reason: None,
        })
    }

    #[test]
    fn status_walks_through_grace_to_expired() {
        let t = TenantId::new();
        let mut sub = Subscription::empty(SUBSCRIPTION_ID);
        assert_eq!(sub.status(at(2024, 1, 1)), SubscriptionStatus::None);

        execute(&mut sub, &start(t, Plan::Monthly, at(2024, 1, 15))).unwrap();
        assert_eq!(sub.expires_at(), Some(at(2024, 2, 15)));
        assert_eq!(sub.total_paid(), Money::from_paise(49_900));

        assert_eq!(sub.status(at(2024, 2, 14)), SubscriptionStatus::Active);
        assert_eq!(sub.status(at(2024, 2, 15)), SubscriptionStatus::Grace);
        assert_eq!(sub.status(at(2024, 2, 21)), SubscriptionStatus::Grace);
        assert_eq!(sub.status(at(2024, 2, 22)), SubscriptionStatus::Expired);
        assert!(!SubscriptionStatus::Expired.allows_writes());
        assert!(SubscriptionStatus::Grace.allows_writes());
    }

    #[test]
    fn start_conflicts_while_active() {
        let t = TenantId::new();
        let mut sub = Subscription::empty(SUBSCRIPTION_ID);
        execute(&mut sub, &start(t, Plan::Monthly, at(2024, 1, 1))).unwrap();

        assert!(matches!(
            sub.handle(&start(t, Plan::Yearly, at(2024, 1, 20))),
            Err(DomainError::Conflict(_))
        ));
        // Lapsed: a fresh start is allowed.
        assert!(sub.handle(&start(t, Plan::Yearly, at(2024, 3, 1))).is_ok());
    }

    #[test]
    fn early_renewal_extends_from_current_expiry() {
        let t = TenantId::new();
        let mut sub = Subscription::empty(SUBSCRIPTION_ID);
        execute(&mut sub, &start(t, Plan::Monthly, at(2024, 1, 1))).unwrap();
        execute(&mut sub, &renew(t, Some(Plan::Quarterly), at(2024, 1, 20))).unwrap();

        assert_eq!(sub.expires_at(), Some(at(2024, 5, 1)));
        assert_eq!(sub.plan(), Some(Plan::Quarterly));
    }

    #[test]
    fn late_renewal_extends_from_renewal_time() {
        let t = TenantId::new();
        let mut sub = Subscription::empty(SUBSCRIPTION_ID);
        execute(&mut sub, &start(t, Plan::Monthly, at(2024, 1, 1))).unwrap();
        let late = at(2024, 6, 10) + Duration::hours(3);
        execute(&mut sub, &renew(t, None, late)).unwrap();

        assert_eq!(sub.expires_at(), Some(at(2024, 7, 10) + Duration::hours(3)));
        assert_eq!(sub.plan(), Some(Plan::Monthly));
    }

    #[test]
    fn renew_and_cancel_rules() {
        let t = TenantId::new();
        let mut sub = Subscription::empty(SUBSCRIPTION_ID);
        assert_eq!(sub.handle(&renew(t, None, at(2024, 1, 1))), Err(DomainError::NotFound));
        assert_eq!(sub.handle(&cancel(t)), Err(DomainError::NotFound));

        execute(&mut sub, &start(t, Plan::Yearly, at(2024, 1, 1))).unwrap();
        execute(&mut sub, &cancel(t)).unwrap();
        assert_eq!(sub.status(at(2024, 2, 2)), SubscriptionStatus::Cancelled);

        assert!(matches!(sub.handle(&cancel(t)), Err(DomainError::Conflict(_))));
        assert!(matches!(
            sub.handle(&renew(t, None, at(2024, 2, 2))),
            Err(DomainError::InvariantViolation(_))
        ));
        // Starting again clears the cancellation.
        execute(&mut sub, &start(t, Plan::Monthly, at(2024, 2, 2))).unwrap();
        assert_eq!(sub.status(at(2024, 2, 3)), SubscriptionStatus::Active);
    }

    #[test]
    fn blank_payment_reference_is_rejected() {
        let sub = Subscription::empty(SUBSCRIPTION_ID);
        let cmd = SubscriptionCommand::Start(StartSubscription {
            tenant_id: TenantId::new(),
            plan: Plan::Monthly,
            started_at: at(2024, 1, 1),
            payment_reference: "   ".to_string(),
        });
        assert!(matches!(sub.handle(&cmd), Err(DomainError::Validation(_))));
    }
}
