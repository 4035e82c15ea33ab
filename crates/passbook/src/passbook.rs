use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, PaymentMode, TenantId};
use sahakari_events::Event;
use sahakari_members::MemberId;

/// Stream type for passbooks.
pub const PASSBOOK_AGGREGATE_TYPE: &str = "passbook.member";

const PASSBOOK_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c52_9b0e_4d7a_8e21_5f6c_0b3d_9a47);

/// Stream id of a member's passbook. Stable for a given member and distinct
/// from the member's own stream id.
pub fn passbook_stream_id(member_id: MemberId) -> AggregateId {
    AggregateId::from_uuid(Uuid::new_v5(&PASSBOOK_NAMESPACE, member_id.0.as_uuid().as_bytes()))
}

/// What a passbook line records.
///
/// Deposits and withdrawals move the member's savings. Interest and fines are
/// payments the member makes to the society and leave savings untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Interest,
    Fine,
    Withdrawal,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Interest => "interest",
            EntryKind::Fine => "fine",
            EntryKind::Withdrawal => "withdrawal",
        }
    }

    /// Signed effect on the member's savings balance.
    pub fn savings_effect(self, amount: Money) -> Money {
        match self {
            EntryKind::Deposit => amount,
            EntryKind::Withdrawal => -amount,
            EntryKind::Interest | EntryKind::Fine => Money::ZERO,
        }
    }
}

impl core::str::FromStr for EntryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(EntryKind::Deposit),
            "interest" => Ok(EntryKind::Interest),
            "fine" => Ok(EntryKind::Fine),
            "withdrawal" => Ok(EntryKind::Withdrawal),
            other => Err(DomainError::validation(format!(
                "entry kind must be one of: deposit, interest, fine, withdrawal (got '{other}')"
            ))),
        }
    }
}

/// One line as the aggregate remembers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassbookLine {
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub mode: PaymentMode,
    pub entry_date: NaiveDate,
    pub reversed: bool,
}

/// Aggregate root: a member's passbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passbook {
    member_id: MemberId,
    tenant_id: Option<TenantId>,
    lines: Vec<PassbookLine>,
    savings: Money,
    version: u64,
}

impl Passbook {
    /// Empty passbook for rehydration; the first recorded entry opens it.
    pub fn empty(member_id: MemberId) -> Self {
        Self {
            member_id,
            tenant_id: None,
            lines: Vec::new(),
            savings: Money::ZERO,
            version: 0,
        }
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Deposits minus withdrawals over non-reversed lines.
    pub fn savings_balance(&self) -> Money {
        self.savings
    }

    pub fn lines(&self) -> &[PassbookLine] {
        &self.lines
    }

    fn line(&self, entry_id: Uuid) -> Option<&PassbookLine> {
        self.lines.iter().find(|l| l.entry_id == entry_id)
    }
}

impl AggregateRoot for Passbook {
    type Id = MemberId;

    fn id(&self) -> &Self::Id {
        &self.member_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub mode: PaymentMode,
    pub entry_date: NaiveDate,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseEntry {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub entry_id: Uuid,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassbookCommand {
    RecordEntry(RecordEntry),
    ReverseEntry(ReverseEntry),
}

/// Event: EntryRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecorded {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub mode: PaymentMode,
    pub entry_date: NaiveDate,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryReversed. Repeats the original line's facts for consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReversed {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassbookEvent {
    EntryRecorded(EntryRecorded),
    EntryReversed(EntryReversed),
}

impl PassbookEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PassbookEvent::EntryRecorded(e) => e.tenant_id,
            PassbookEvent::EntryReversed(e) => e.tenant_id,
        }
    }

    pub fn member_id(&self) -> MemberId {
        match self {
            PassbookEvent::EntryRecorded(e) => e.member_id,
            PassbookEvent::EntryReversed(e) => e.member_id,
        }
    }
}

impl Event for PassbookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PassbookEvent::EntryRecorded(_) => "passbook.member.entry_recorded",
            PassbookEvent::EntryReversed(_) => "passbook.member.entry_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PassbookEvent::EntryRecorded(e) => e.occurred_at,
            PassbookEvent::EntryReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Passbook {
    type Command = PassbookCommand;
    type Event = PassbookEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PassbookEvent::EntryRecorded(e) => {
                self.member_id = e.member_id;
                if self.tenant_id.is_none() {
                    self.tenant_id = Some(e.tenant_id);
                }
                self.savings += e.kind.savings_effect(e.amount);
                self.lines.push(PassbookLine {
                    entry_id: e.entry_id,
                    kind: e.kind,
                    amount: e.amount,
                    mode: e.mode,
                    entry_date: e.entry_date,
                    reversed: false,
                });
            }
            PassbookEvent::EntryReversed(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.entry_id == e.entry_id) {
                    if !line.reversed {
                        line.reversed = true;
                        self.savings -= line.kind.savings_effect(line.amount);
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PassbookCommand::RecordEntry(cmd) => self.handle_record(cmd),
            PassbookCommand::ReverseEntry(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl Passbook {
    fn ensure_scope(&self, tenant_id: TenantId, member_id: MemberId) -> Result<(), DomainError> {
        if let Some(t) = self.tenant_id {
            if t != tenant_id {
                return Err(DomainError::invariant("tenant mismatch"));
            }
        }
        if self.member_id != member_id {
            return Err(DomainError::invariant("member_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordEntry) -> Result<Vec<PassbookEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.member_id)?;

        cmd.amount.ensure_line_amount("amount")?;
        if self.line(cmd.entry_id).is_some() {
            return Err(DomainError::conflict("entry already recorded"));
        }
        if cmd.kind == EntryKind::Deposit {
            self.savings.try_add(cmd.amount, "savings balance")?;
        }
        if cmd.kind == EntryKind::Withdrawal && cmd.amount > self.savings {
            return Err(DomainError::invariant(format!(
                "withdrawal of {} exceeds savings balance of {}",
                cmd.amount, self.savings
            )));
        }

        Ok(vec![PassbookEvent::EntryRecorded(EntryRecorded {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            entry_id: cmd.entry_id,
            kind: cmd.kind,
            amount: cmd.amount,
            mode: cmd.mode,
            entry_date: cmd.entry_date,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseEntry) -> Result<Vec<PassbookEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.member_id)?;

        let line = self.line(cmd.entry_id).ok_or_else(DomainError::not_found)?;
        if line.reversed {
            return Err(DomainError::conflict("entry already reversed"));
        }

        let after = self.savings - line.kind.savings_effect(line.amount);
        if after.is_negative() {
            return Err(DomainError::invariant(
                "reversal would leave a negative savings balance",
            ));
        }

        Ok(vec![PassbookEvent::EntryReversed(EntryReversed {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            entry_id: cmd.entry_id,
            kind: line.kind,
            amount: line.amount,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
