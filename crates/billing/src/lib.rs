//! Billing module: the society's SaaS subscription.
//!
//! Payment collection happens elsewhere; commands carry an opaque gateway
//! reference.

pub mod plan;
pub mod subscription;

pub use plan::{grace_period, Plan, GRACE_PERIOD_DAYS};
pub use subscription::{
    status_at, CancelSubscription, RenewSubscription, StartSubscription, Subscription,
    SubscriptionCancelled, SubscriptionCommand, SubscriptionEvent, SubscriptionRenewed,
    SubscriptionStarted, SubscriptionStatus, SUBSCRIPTION_AGGREGATE_TYPE, SUBSCRIPTION_ID,
};
