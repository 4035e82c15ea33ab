use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, PaymentMode, TenantId};
use sahakari_events::Event;
use sahakari_members::MemberId;

/// Stream type for loan aggregates.
pub const LOAN_AGGREGATE_TYPE: &str = "loans.loan";

pub const MAX_ANNUAL_RATE_BP: u32 = 10_000;
pub const MAX_TENURE_MONTHS: u32 = 360;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub AggregateId);

impl LoanId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LoanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Closed,
}

/// Aggregate root: a loan issued to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    id: LoanId,
    tenant_id: Option<TenantId>,
    member_id: Option<MemberId>,
    principal: Money,
    annual_rate_bp: u32,
    tenure_months: u32,
    issued_on: Option<NaiveDate>,
    principal_repaid: Money,
    interest_paid: Money,
    repayment_ids: Vec<Uuid>,
    status: Option<LoanStatus>,
    version: u64,
}

impl Loan {
    pub fn empty(id: LoanId) -> Self {
        Self {
            id,
            tenant_id: None,
            member_id: None,
            principal: Money::ZERO,
            annual_rate_bp: 0,
            tenure_months: 0,
            issued_on: None,
            principal_repaid: Money::ZERO,
            interest_paid: Money::ZERO,
            repayment_ids: Vec::new(),
            status: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> LoanId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn member_id(&self) -> Option<MemberId> {
        self.member_id
    }

    pub fn principal(&self) -> Money {
        self.principal
    }

    pub fn annual_rate_bp(&self) -> u32 {
        self.annual_rate_bp
    }

    pub fn tenure_months(&self) -> u32 {
        self.tenure_months
    }

    pub fn issued_on(&self) -> Option<NaiveDate> {
        self.issued_on
    }

    pub fn principal_repaid(&self) -> Money {
        self.principal_repaid
    }

    pub fn interest_paid(&self) -> Money {
        self.interest_paid
    }

    pub fn status(&self) -> Option<LoanStatus> {
        self.status
    }

    pub fn is_issued(&self) -> bool {
        self.status.is_some()
    }

    /// Principal still owed.
    pub fn outstanding(&self) -> Money {
        self.principal - self.principal_repaid
    }

    /// One month of simple interest on the outstanding principal.
    pub fn monthly_interest_due(&self) -> Money {
        monthly_interest(self.outstanding(), self.annual_rate_bp)
    }
}

/// `outstanding * rate / 12 / 10_000`, rounded half away from zero.
pub fn monthly_interest(outstanding: Money, annual_rate_bp: u32) -> Money {
    outstanding
        .mul_div(i64::from(annual_rate_bp), 12 * 10_000)
        .unwrap_or(Money::ZERO)
}

impl AggregateRoot for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLoan {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub principal: Money,
    pub annual_rate_bp: u32,
    pub tenure_months: u32,
    pub mode: PaymentMode,
    pub issued_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordRepayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRepayment {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub repayment_id: Uuid,
    pub principal: Money,
    pub interest: Money,
    pub mode: PaymentMode,
    pub paid_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseLoan {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub closed_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanCommand {
    Issue(IssueLoan),
    RecordRepayment(RecordRepayment),
    Close(CloseLoan),
}

/// Event: LoanIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanIssued {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub principal: Money,
    pub annual_rate_bp: u32,
    pub tenure_months: u32,
    pub mode: PaymentMode,
    pub issued_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RepaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRecorded {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub repayment_id: Uuid,
    pub principal: Money,
    pub interest: Money,
    pub mode: PaymentMode,
    pub paid_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanClosed {
    pub tenant_id: TenantId,
    pub loan_id: LoanId,
    pub closed_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    Issued(LoanIssued),
    RepaymentRecorded(RepaymentRecorded),
    Closed(LoanClosed),
}

impl LoanEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LoanEvent::Issued(e) => e.tenant_id,
            LoanEvent::RepaymentRecorded(e) => e.tenant_id,
            LoanEvent::Closed(e) => e.tenant_id,
        }
    }

    pub fn loan_id(&self) -> LoanId {
        match self {
            LoanEvent::Issued(e) => e.loan_id,
            LoanEvent::RepaymentRecorded(e) => e.loan_id,
            LoanEvent::Closed(e) => e.loan_id,
        }
    }
}

impl Event for LoanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::Issued(_) => "loans.loan.issued",
            LoanEvent::RepaymentRecorded(_) => "loans.loan.repayment_recorded",
            LoanEvent::Closed(_) => "loans.loan.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::Issued(e) => e.occurred_at,
            LoanEvent::RepaymentRecorded(e) => e.occurred_at,
            LoanEvent::Closed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Loan {
    type Command = LoanCommand;
    type Event = LoanEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoanEvent::Issued(e) => {
                self.id = e.loan_id;
                self.tenant_id = Some(e.tenant_id);
                self.member_id = Some(e.member_id);
                self.principal = e.principal;
                self.annual_rate_bp = e.annual_rate_bp;
                self.tenure_months = e.tenure_months;
                self.issued_on = Some(e.issued_on);
                self.status = Some(LoanStatus::Open);
            }
            LoanEvent::RepaymentRecorded(e) => {
                self.principal_repaid += e.principal;
                self.interest_paid += e.interest;
                self.repayment_ids.push(e.repayment_id);
            }
            LoanEvent::Closed(_) => {
                self.status = Some(LoanStatus::Closed);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoanCommand::Issue(cmd) => self.handle_issue(cmd),
            LoanCommand::RecordRepayment(cmd) => self.handle_repayment(cmd),
            LoanCommand::Close(cmd) => self.handle_close(cmd),
        }
    }
}

impl Loan {
    fn ensure_issued(&self, tenant_id: TenantId, loan_id: LoanId) -> Result<MemberId, DomainError> {
        let (Some(t), Some(member_id)) = (self.tenant_id, self.member_id) else {
            return Err(DomainError::not_found());
        };
        if t != tenant_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != loan_id {
            return Err(DomainError::invariant("loan_id mismatch"));
        }
        Ok(member_id)
    }

    fn handle_issue(&self, cmd: &IssueLoan) -> Result<Vec<LoanEvent>, DomainError> {
        if self.is_issued() {
            return Err(DomainError::conflict("loan already issued"));
        }
        if self.id != cmd.loan_id {
            return Err(DomainError::invariant("loan_id mismatch"));
        }
        cmd.principal.ensure_line_amount("principal")?;
        if cmd.annual_rate_bp > MAX_ANNUAL_RATE_BP {
            return Err(DomainError::validation(format!(
                "annual_rate_bp must be between 0 and {MAX_ANNUAL_RATE_BP}"
            )));
        }
        if cmd.tenure_months == 0 || cmd.tenure_months > MAX_TENURE_MONTHS {
            return Err(DomainError::validation(format!(
                "tenure_months must be between 1 and {MAX_TENURE_MONTHS}"
            )));
        }

        Ok(vec![LoanEvent::Issued(LoanIssued {
            tenant_id: cmd.tenant_id,
            loan_id: cmd.loan_id,
            member_id: cmd.member_id,
            principal: cmd.principal,
            annual_rate_bp: cmd.annual_rate_bp,
            tenure_months: cmd.tenure_months,
            mode: cmd.mode,
            issued_on: cmd.issued_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_repayment(&self, cmd: &RecordRepayment) -> Result<Vec<LoanEvent>, DomainError> {
        let member_id = self.ensure_issued(cmd.tenant_id, cmd.loan_id)?;

        if self.status == Some(LoanStatus::Closed) {
            return Err(DomainError::invariant("loan is closed"));
        }
        if cmd.principal.is_negative() || cmd.interest.is_negative() {
            return Err(DomainError::validation("repayment amounts must not be negative"));
        }
        if cmd.principal.is_zero() && cmd.interest.is_zero() {
            return Err(DomainError::validation(
                "repayment must include principal or interest",
            ));
        }
        cmd.interest.ensure_within_line_limit("interest")?;
        self.interest_paid.try_add(cmd.interest, "interest collected")?;
        if self.repayment_ids.contains(&cmd.repayment_id) {
            return Err(DomainError::conflict("repayment already recorded"));
        }
        if self.issued_on.is_some_and(|issued| cmd.paid_on < issued) {
            return Err(DomainError::validation("paid_on is before the loan was issued"));
        }
        if cmd.principal > self.outstanding() {
            return Err(DomainError::invariant(format!(
                "principal repayment of {} exceeds outstanding {}",
                cmd.principal,
                self.outstanding()
            )));
        }

        Ok(vec![LoanEvent::RepaymentRecorded(RepaymentRecorded {
            tenant_id: cmd.tenant_id,
            loan_id: cmd.loan_id,
            member_id,
            repayment_id: cmd.repayment_id,
            principal: cmd.principal,
            interest: cmd.interest,
            mode: cmd.mode,
            paid_on: cmd.paid_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseLoan) -> Result<Vec<LoanEvent>, DomainError> {
        self.ensure_issued(cmd.tenant_id, cmd.loan_id)?;

        if self.status == Some(LoanStatus::Closed) {
            return Err(DomainError::conflict("loan already closed"));
        }
        if !self.outstanding().is_zero() {
            return Err(DomainError::invariant(format!(
                "loan still has {} outstanding",
                self.outstanding()
            )));
        }

        Ok(vec![LoanEvent::Closed(LoanClosed {
            tenant_id: cmd.tenant_id,
            loan_id: cmd.loan_id,
            closed_on: cmd.closed_on,
            occurred_at: cmd.occurred_at,
        })])
    }
}
