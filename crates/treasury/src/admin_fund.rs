use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, PaymentMode, TenantId};
use sahakari_events::Event;

/// Stream type for the admin's own-funds account.
pub const ADMIN_FUND_AGGREGATE_TYPE: &str = "treasury.admin_fund";

pub const ADMIN_FUND_ID: AggregateId = AggregateId::well_known(0x5a4a_0002);

/// Aggregate root: money the admin personally puts into (or takes out of) the
/// society pool, plus contra transfers between payment modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminFund {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    injected: Money,
    withdrawn: Money,
    transferred: Money,
    movement_ids: Vec<Uuid>,
    version: u64,
}

impl AdminFund {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            injected: Money::ZERO,
            withdrawn: Money::ZERO,
            transferred: Money::ZERO,
            movement_ids: Vec::new(),
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn injected(&self) -> Money {
        self.injected
    }

    pub fn withdrawn(&self) -> Money {
        self.withdrawn
    }

    /// Gross amount moved between modes.
    pub fn transferred(&self) -> Money {
        self.transferred
    }

    pub fn net_contribution(&self) -> Money {
        self.injected - self.withdrawn
    }
}

impl AggregateRoot for AdminFund {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Injection or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundMovement {
    pub tenant_id: TenantId,
    pub movement_id: Uuid,
    pub amount: Money,
    pub mode: PaymentMode,
    pub on: NaiveDate,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFunds {
    pub tenant_id: TenantId,
    pub movement_id: Uuid,
    pub amount: Money,
    pub from: PaymentMode,
    pub to: PaymentMode,
    pub on: NaiveDate,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminFundCommand {
    Inject(FundMovement),
    Withdraw(FundMovement),
    Transfer(TransferFunds),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminFundEvent {
    FundsInjected(FundMovement),
    FundsWithdrawn(FundMovement),
    FundsTransferred(TransferFunds),
}

impl AdminFundEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            AdminFundEvent::FundsInjected(e) | AdminFundEvent::FundsWithdrawn(e) => e.tenant_id,
            AdminFundEvent::FundsTransferred(e) => e.tenant_id,
        }
    }
}

impl Event for AdminFundEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdminFundEvent::FundsInjected(_) => "treasury.admin_fund.injected",
            AdminFundEvent::FundsWithdrawn(_) => "treasury.admin_fund.withdrawn",
            AdminFundEvent::FundsTransferred(_) => "treasury.admin_fund.transferred",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AdminFundEvent::FundsInjected(e) | AdminFundEvent::FundsWithdrawn(e) => e.occurred_at,
            AdminFundEvent::FundsTransferred(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AdminFund {
    type Command = AdminFundCommand;
    type Event = AdminFundEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.tenant_id.get_or_insert(event.tenant_id());
        match event {
            AdminFundEvent::FundsInjected(e) => {
                self.injected += e.amount;
                self.movement_ids.push(e.movement_id);
            }
            AdminFundEvent::FundsWithdrawn(e) => {
                self.withdrawn += e.amount;
                self.movement_ids.push(e.movement_id);
            }
            AdminFundEvent::FundsTransferred(e) => {
                self.transferred += e.amount;
                self.movement_ids.push(e.movement_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AdminFundCommand::Inject(cmd) => {
                self.check_movement(cmd.tenant_id, cmd.movement_id, cmd.amount)?;
                self.injected.try_add(cmd.amount, "admin injections")?;
                Ok(vec![AdminFundEvent::FundsInjected(normalized(cmd))])
            }
            AdminFundCommand::Withdraw(cmd) => {
                self.check_movement(cmd.tenant_id, cmd.movement_id, cmd.amount)?;
                if cmd.amount > self.net_contribution() {
                    return Err(DomainError::invariant(format!(
                        "withdrawal of {} exceeds admin net contribution of {}",
                        cmd.amount,
                        self.net_contribution()
                    )));
                }
                Ok(vec![AdminFundEvent::FundsWithdrawn(normalized(cmd))])
            }
            AdminFundCommand::Transfer(cmd) => {
                self.check_movement(cmd.tenant_id, cmd.movement_id, cmd.amount)?;
                if cmd.from == cmd.to {
                    return Err(DomainError::validation(
                        "transfer source and destination must differ",
                    ));
                }
                self.transferred.try_add(cmd.amount, "transferred total")?;
                let mut ev = cmd.clone();
                ev.note = trimmed(&cmd.note);
                Ok(vec![AdminFundEvent::FundsTransferred(ev)])
            }
        }
    }
}

impl AdminFund {
    fn check_movement(&self, tenant_id: TenantId, movement_id: Uuid, amount: Money) -> Result<(), DomainError> {
        crate::ensure_tenant(self.tenant_id, tenant_id)?;
        amount.ensure_line_amount("amount")?;
        if self.movement_ids.contains(&movement_id) {
            return Err(DomainError::conflict("movement already recorded"));
        }
        Ok(())
    }
}

fn normalized(cmd: &FundMovement) -> FundMovement {
    FundMovement {
        note: trimmed(&cmd.note),
        ..cmd.clone()
    }
}

fn trimmed(note: &Option<String>) -> Option<String> {
    note.as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sahakari_events::execute;

    fn movement(t: TenantId, paise: i64) -> FundMovement {
        FundMovement {
            tenant_id: t,
            movement_id: Uuid::now_v7(),
            amount: Money::from_paise(paise),
            mode: PaymentMode::Cash,
            on: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            note: Some(" seed capital ".to_string()),
            occurred_at: Utc::now(),
        }
    }

    fn transfer(t: TenantId, paise: i64, from: PaymentMode, to: PaymentMode) -> AdminFundCommand {
        AdminFundCommand::Transfer(TransferFunds {
            tenant_id: t,
            movement_id: Uuid::now_v7(),
            amount: Money::from_paise(paise),
            from,
            to,
            on: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            note: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn withdrawals_are_capped_by_net_contribution() {
        let t = TenantId::new();
        let mut fund = AdminFund::empty(ADMIN_FUND_ID);

        assert!(matches!(
            fund.handle(&AdminFundCommand::Withdraw(movement(t, 1))),
            Err(DomainError::InvariantViolation(_))
        ));

        let events = execute(&mut fund, &AdminFundCommand::Inject(movement(t, 50_000))).unwrap();
        let AdminFundEvent::FundsInjected(e) = &events[0] else {
            panic!("expected FundsInjected");
        };
        assert_eq!(e.note.as_deref(), Some("seed capital"));

        execute(&mut fund, &AdminFundCommand::Withdraw(movement(t, 20_000))).unwrap();
        assert_eq!(fund.net_contribution(), Money::from_paise(30_000));
        assert!(fund.handle(&AdminFundCommand::Withdraw(movement(t, 30_001))).is_err());
    }

    #[test]
    fn transfers_do_not_change_net_contribution() {
        let t = TenantId::new();
        let mut fund = AdminFund::empty(ADMIN_FUND_ID);
        execute(&mut fund, &AdminFundCommand::Inject(movement(t, 10_000))).unwrap();
        execute(&mut fund, &transfer(t, 4_000, PaymentMode::Cash, PaymentMode::Bank)).unwrap();

        assert_eq!(fund.net_contribution(), Money::from_paise(10_000));
        assert_eq!(fund.transferred(), Money::from_paise(4_000));
    }

    #[test]
    fn transfer_to_same_mode_is_rejected() {
        let fund = AdminFund::empty(ADMIN_FUND_ID);
        assert!(matches!(
            fund.handle(&transfer(TenantId::new(), 100, PaymentMode::Upi, PaymentMode::Upi)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_movement_conflicts() {
        let t = TenantId::new();
        let mut fund = AdminFund::empty(ADMIN_FUND_ID);
        let cmd = AdminFundCommand::Inject(movement(t, 100));
        execute(&mut fund, &cmd).unwrap();
        assert!(matches!(fund.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn oversized_movements_are_rejected() {
        let t = TenantId::new();
        let fund = AdminFund::empty(ADMIN_FUND_ID);
        for paise in [Money::MAX_LINE.paise() + 1, i64::MAX] {
            assert!(matches!(
                fund.handle(&AdminFundCommand::Inject(movement(t, paise))),
                Err(DomainError::Validation(_))
            ));
            assert!(matches!(
                fund.handle(&transfer(t, paise, PaymentMode::Cash, PaymentMode::Bank)),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn injection_that_would_overflow_is_rejected() {
        let t = TenantId::new();
        let mut fund = AdminFund::empty(ADMIN_FUND_ID);
        // History written before the line limit existed.
        fund.apply(&AdminFundEvent::FundsInjected(movement(t, i64::MAX - 1)));

        assert!(matches!(
            fund.handle(&AdminFundCommand::Inject(movement(t, 2))),
            Err(DomainError::InvariantViolation(_))
        ));
        execute(&mut fund, &AdminFundCommand::Inject(movement(t, 1))).unwrap();
        assert_eq!(fund.net_contribution(), Money::from_paise(i64::MAX));
    }

    proptest! {
        #[test]
        fn net_contribution_never_negative(
            ops in prop::collection::vec((0u8..3, prop_oneof![1i64..100_000, any::<i64>()]), 1..30),
        ) {
            let t = TenantId::new();
            let mut fund = AdminFund::empty(ADMIN_FUND_ID);
            for (op, paise) in ops {
                let cmd = match op {
                    0 => AdminFundCommand::Inject(movement(t, paise)),
                    1 => AdminFundCommand::Withdraw(movement(t, paise)),
                    _ => transfer(t, paise, PaymentMode::Bank, PaymentMode::Upi),
                };
                if execute(&mut fund, &cmd).is_ok() {
                    prop_assert!(paise > 0 && Money::from_paise(paise) <= Money::MAX_LINE);
                }
                prop_assert!(!fund.net_contribution().is_negative());
                prop_assert_eq!(fund.net_contribution(), fund.injected() - fund.withdrawn());
            }
        }
    }
}
