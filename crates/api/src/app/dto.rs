//! Request and response bodies. Amounts are integer paise throughout.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_billing::{Plan, SubscriptionStatus};
use sahakari_core::{Money, PaymentMode};
use sahakari_infra::projections::SubscriptionReadModel;
use sahakari_members::MemberId;
use sahakari_passbook::EntryKind;
use sahakari_treasury::{AdminFund, ExpenseLedger, ExpenseLine};

#[derive(Debug, Deserialize)]
pub struct RegisterMemberRequest {
    pub membership_no: String,
    pub name: String,
    pub phone: Option<String>,
    /// Defaults to today.
    pub joined_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Body of lifecycle and reversal endpoints; may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordEntryRequest {
    pub kind: EntryKind,
    pub amount: Money,
    pub mode: PaymentMode,
    pub entry_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueLoanRequest {
    pub member_id: MemberId,
    pub principal: Money,
    pub annual_rate_bp: u32,
    pub tenure_months: u32,
    pub mode: PaymentMode,
    pub issued_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RepaymentRequest {
    #[serde(default)]
    pub principal: Money,
    #[serde(default)]
    pub interest: Money,
    pub mode: PaymentMode,
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseLoanRequest {
    pub closed_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RecordExpenseRequest {
    pub category: String,
    pub amount: Money,
    pub mode: PaymentMode,
    pub spent_on: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FundMovementRequest {
    pub amount: Money,
    pub mode: PaymentMode,
    pub on: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub amount: Money,
    pub from: PaymentMode,
    pub to: PaymentMode,
    pub on: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartSubscriptionRequest {
    pub plan: Plan,
    pub payment_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct RenewSubscriptionRequest {
    /// Keeps the current plan when absent.
    pub plan: Option<Plan>,
    pub payment_reference: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CommandAccepted {
    pub id: String,
    pub events_committed: usize,
}

#[derive(Debug, Serialize)]
pub struct ExpenseView {
    pub expense_id: Uuid,
    pub category: String,
    pub amount: Money,
    pub mode: PaymentMode,
    pub spent_on: NaiveDate,
    pub reversed: bool,
}

impl From<&ExpenseLine> for ExpenseView {
    fn from(line: &ExpenseLine) -> Self {
        Self {
            expense_id: line.expense_id,
            category: line.category.clone(),
            amount: line.amount,
            mode: line.mode,
            spent_on: line.spent_on,
            reversed: line.reversed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseListView {
    pub expenses: Vec<ExpenseView>,
    /// Sum of non-reversed expenses.
    pub total: Money,
}

impl From<&ExpenseLedger> for ExpenseListView {
    fn from(ledger: &ExpenseLedger) -> Self {
        Self {
            expenses: ledger.lines().iter().map(ExpenseView::from).collect(),
            total: ledger.total(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminFundView {
    pub injected: Money,
    pub withdrawn: Money,
    pub transferred: Money,
    pub net_contribution: Money,
}

impl From<&AdminFund> for AdminFundView {
    fn from(fund: &AdminFund) -> Self {
        Self {
            injected: fund.injected(),
            withdrawn: fund.withdrawn(),
            transferred: fund.transferred(),
            net_contribution: fund.net_contribution(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub status: SubscriptionStatus,
    pub allows_writes: bool,
    pub checked_at: DateTime<Utc>,
    pub subscription: Option<SubscriptionReadModel>,
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub plan: Plan,
    pub months: u32,
    pub price: Money,
}

impl From<Plan> for PlanView {
    fn from(plan: Plan) -> Self {
        Self {
            plan,
            months: plan.months(),
            price: plan.price(),
        }
    }
}
