use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, PaymentMode, TenantId};
use sahakari_events::Event;

/// Stream type for the society expense ledger.
pub const EXPENSE_LEDGER_AGGREGATE_TYPE: &str = "treasury.expenses";

/// Every society has exactly one expense ledger stream, always at this id.
pub const EXPENSE_LEDGER_ID: AggregateId = AggregateId::well_known(0x5a4a_0001);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseLine {
    pub expense_id: Uuid,
    pub category: String,
    pub amount: Money,
    pub mode: PaymentMode,
    pub spent_on: NaiveDate,
    pub reversed: bool,
}

/// Aggregate root: operating expenses paid out of the society pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseLedger {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    lines: Vec<ExpenseLine>,
    version: u64,
}

impl ExpenseLedger {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            lines: Vec::new(),
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn lines(&self) -> &[ExpenseLine] {
        &self.lines
    }

    /// Sum of non-reversed expenses.
    pub fn total(&self) -> Money {
        self.lines.iter().filter(|l| !l.reversed).map(|l| l.amount).sum()
    }

    fn line(&self, expense_id: Uuid) -> Option<&ExpenseLine> {
        self.lines.iter().find(|l| l.expense_id == expense_id)
    }
}

impl AggregateRoot for ExpenseLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub tenant_id: TenantId,
    pub expense_id: Uuid,
    pub category: String,
    pub amount: Money,
    pub mode: PaymentMode,
    pub spent_on: NaiveDate,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseExpense {
    pub tenant_id: TenantId,
    pub expense_id: Uuid,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    Record(RecordExpense),
    Reverse(ReverseExpense),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub tenant_id: TenantId,
    pub expense_id: Uuid,
    pub category: String,
    pub amount: Money,
    pub mode: PaymentMode,
    pub spent_on: NaiveDate,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseReversed {
    pub tenant_id: TenantId,
    pub expense_id: Uuid,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    Recorded(ExpenseRecorded),
    Reversed(ExpenseReversed),
}

impl ExpenseEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ExpenseEvent::Recorded(e) => e.tenant_id,
            ExpenseEvent::Reversed(e) => e.tenant_id,
        }
    }
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::Recorded(_) => "treasury.expenses.recorded",
            ExpenseEvent::Reversed(_) => "treasury.expenses.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::Recorded(e) => e.occurred_at,
            ExpenseEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ExpenseLedger {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::Recorded(e) => {
                self.tenant_id.get_or_insert(e.tenant_id);
                self.lines.push(ExpenseLine {
                    expense_id: e.expense_id,
                    category: e.category.clone(),
                    amount: e.amount,
                    mode: e.mode,
                    spent_on: e.spent_on,
                    reversed: false,
                });
            }
            ExpenseEvent::Reversed(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.expense_id == e.expense_id) {
                    line.reversed = true;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::Record(cmd) => {
                crate::ensure_tenant(self.tenant_id, cmd.tenant_id)?;

                let category = cmd.category.trim();
                if category.is_empty() {
                    return Err(DomainError::validation("category cannot be empty"));
                }
                cmd.amount.ensure_line_amount("amount")?;
                if self.line(cmd.expense_id).is_some() {
                    return Err(DomainError::conflict("expense already recorded"));
                }
                self.total().try_add(cmd.amount, "expense total")?;

                Ok(vec![ExpenseEvent::Recorded(ExpenseRecorded {
                    tenant_id: cmd.tenant_id,
                    expense_id: cmd.expense_id,
                    category: category.to_string(),
                    amount: cmd.amount,
                    mode: cmd.mode,
                    spent_on: cmd.spent_on,
                    description: cmd
                        .description
                        .as_deref()
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ExpenseCommand::Reverse(cmd) => {
                crate::ensure_tenant(self.tenant_id, cmd.tenant_id)?;

                let line = self.line(cmd.expense_id).ok_or_else(DomainError::not_found)?;
                if line.reversed {
                    return Err(DomainError::conflict("expense already reversed"));
                }

                Ok(vec![ExpenseEvent::Reversed(ExpenseReversed {
                    tenant_id: cmd.tenant_id,
                    expense_id: cmd.expense_id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sahakari_events::execute;

    fn record(t: TenantId, category: &str, paise: i64) -> ExpenseCommand {
        ExpenseCommand::Record(RecordExpense {
            tenant_id: t,
            expense_id: Uuid::now_v7(),
            category: category.to_string(),
            amount: Money::from_paise(paise),
            mode: PaymentMode::Upi,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            description: Some("  ".to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn record_trims_and_totals() {
        let t = TenantId::new();
        let mut ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        let events = execute(&mut ledger, &record(t, "  stationery ", 2_500)).unwrap();
        execute(&mut ledger, &record(t, "rent", 100_000)).unwrap();

        let ExpenseEvent::Recorded(e) = &events[0] else {
            panic!("expected Recorded");
        };
        assert_eq!(e.category, "stationery");
        assert_eq!(e.description, None);
        assert_eq!(ledger.total(), Money::from_paise(102_500));
    }

    #[test]
    fn blank_category_and_zero_amount_are_rejected() {
        let t = TenantId::new();
        let ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        assert!(matches!(ledger.handle(&record(t, " ", 100)), Err(DomainError::Validation(_))));
        assert!(matches!(ledger.handle(&record(t, "tea", 0)), Err(DomainError::Validation(_))));
    }

    #[test]
    fn reverse_rules() {
        let t = TenantId::new();
        let mut ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        let events = execute(&mut ledger, &record(t, "rent", 1_000)).unwrap();
        let ExpenseEvent::Recorded(e) = &events[0] else {
            panic!("expected Recorded");
        };

        let reverse = ExpenseCommand::Reverse(ReverseExpense {
            tenant_id: t,
            expense_id: e.expense_id,
            reason: None,
            occurred_at: Utc::now(),
        });
        execute(&mut ledger, &reverse).unwrap();
        assert_eq!(ledger.total(), Money::ZERO);
        assert!(matches!(ledger.handle(&reverse), Err(DomainError::Conflict(_))));

        let unknown = ExpenseCommand::Reverse(ReverseExpense {
            tenant_id: t,
            expense_id: Uuid::now_v7(),
            reason: None,
            occurred_at: Utc::now(),
        });
        assert_eq!(ledger.handle(&unknown), Err(DomainError::NotFound));
    }

    #[test]
    fn ledger_belongs_to_first_tenant() {
        let mut ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        execute(&mut ledger, &record(TenantId::new(), "rent", 1_000)).unwrap();
        assert!(matches!(
            ledger.handle(&record(TenantId::new(), "rent", 1_000)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn oversized_expense_is_rejected() {
        let ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        let t = TenantId::new();
        assert!(matches!(
            ledger.handle(&record(t, "rent", Money::MAX_LINE.paise() + 1)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(ledger.handle(&record(t, "rent", i64::MAX)), Err(DomainError::Validation(_))));
    }

    #[test]
    fn expense_that_would_overflow_the_total_is_rejected() {
        let t = TenantId::new();
        let mut ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
        // History written before the line limit existed.
        ledger.apply(&ExpenseEvent::Recorded(ExpenseRecorded {
            tenant_id: t,
            expense_id: Uuid::now_v7(),
            category: "building".to_string(),
            amount: Money::from_paise(i64::MAX - 100),
            mode: PaymentMode::Bank,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: None,
            occurred_at: Utc::now(),
        }));

        assert!(matches!(
            ledger.handle(&record(t, "tea", 101)),
            Err(DomainError::InvariantViolation(_))
        ));
        execute(&mut ledger, &record(t, "tea", 100)).unwrap();
        assert_eq!(ledger.total(), Money::from_paise(i64::MAX));
    }

    proptest! {
        #[test]
        fn accepted_expenses_stay_within_limits(
            amounts in prop::collection::vec(prop_oneof![1i64..100_000, any::<i64>()], 1..30),
        ) {
            let t = TenantId::new();
            let mut ledger = ExpenseLedger::empty(EXPENSE_LEDGER_ID);
            let mut expected = Money::ZERO;
            for paise in amounts {
                if execute(&mut ledger, &record(t, "misc", paise)).is_ok() {
                    prop_assert!(paise > 0 && Money::from_paise(paise) <= Money::MAX_LINE);
                    expected = expected.checked_add(Money::from_paise(paise)).unwrap();
                }
            }
            prop_assert_eq!(ledger.total(), expected);
        }
    }
}
