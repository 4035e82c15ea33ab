use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sahakari_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use sahakari_events::Event;

/// Stream type for member aggregates.
pub const MEMBER_AGGREGATE_TYPE: &str = "members.member";

/// Member identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub AggregateId);

impl MemberId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MemberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// Aggregate root: a society member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    id: MemberId,
    tenant_id: Option<TenantId>,
    membership_no: String,
    name: String,
    phone: Option<String>,
    joined_on: Option<NaiveDate>,
    status: MemberStatus,
    version: u64,
    created: bool,
}

impl Member {
    /// Not-yet-registered instance for rehydration.
    pub fn empty(id: MemberId) -> Self {
        Self {
            id,
            tenant_id: None,
            membership_no: String::new(),
            name: String::new(),
            phone: None,
            joined_on: None,
            status: MemberStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MemberId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn membership_no(&self) -> &str {
        &self.membership_no
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn joined_on(&self) -> Option<NaiveDate> {
        self.joined_on
    }

    pub fn status(&self) -> MemberStatus {
        self.status
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Member {
    type Id = MemberId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMember {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub membership_no: String,
    pub name: String,
    pub phone: Option<String>,
    pub joined_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateMember. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMember {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateMember {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateMember {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberCommand {
    Register(RegisterMember),
    Update(UpdateMember),
    Deactivate(DeactivateMember),
    Reactivate(ReactivateMember),
}

/// Event: MemberRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRegistered {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub membership_no: String,
    pub name: String,
    pub phone: Option<String>,
    pub joined_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberUpdated (carries the full new details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdated {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub name: String,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDeactivated {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReactivated {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberEvent {
    Registered(MemberRegistered),
    Updated(MemberUpdated),
    Deactivated(MemberDeactivated),
    Reactivated(MemberReactivated),
}

impl MemberEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            MemberEvent::Registered(e) => e.tenant_id,
            MemberEvent::Updated(e) => e.tenant_id,
            MemberEvent::Deactivated(e) => e.tenant_id,
            MemberEvent::Reactivated(e) => e.tenant_id,
        }
    }

    pub fn member_id(&self) -> MemberId {
        match self {
            MemberEvent::Registered(e) => e.member_id,
            MemberEvent::Updated(e) => e.member_id,
            MemberEvent::Deactivated(e) => e.member_id,
            MemberEvent::Reactivated(e) => e.member_id,
        }
    }
}

impl Event for MemberEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MemberEvent::Registered(_) => "members.member.registered",
            MemberEvent::Updated(_) => "members.member.updated",
            MemberEvent::Deactivated(_) => "members.member.deactivated",
            MemberEvent::Reactivated(_) => "members.member.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MemberEvent::Registered(e) => e.occurred_at,
            MemberEvent::Updated(e) => e.occurred_at,
            MemberEvent::Deactivated(e) => e.occurred_at,
            MemberEvent::Reactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Member {
    type Command = MemberCommand;
    type Event = MemberEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MemberEvent::Registered(e) => {
                self.id = e.member_id;
                self.tenant_id = Some(e.tenant_id);
                self.membership_no = e.membership_no.clone();
                self.name = e.name.clone();
                self.phone = e.phone.clone();
                self.joined_on = Some(e.joined_on);
                self.status = MemberStatus::Active;
                self.created = true;
            }
            MemberEvent::Updated(e) => {
                self.name = e.name.clone();
                self.phone = e.phone.clone();
            }
            MemberEvent::Deactivated(_) => {
                self.status = MemberStatus::Inactive;
            }
            MemberEvent::Reactivated(_) => {
                self.status = MemberStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MemberCommand::Register(cmd) => self.handle_register(cmd),
            MemberCommand::Update(cmd) => self.handle_update(cmd),
            MemberCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            MemberCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Member {
    fn ensure_existing(&self, tenant_id: TenantId, member_id: MemberId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != member_id {
            return Err(DomainError::invariant("member_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterMember) -> Result<Vec<MemberEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("member already registered"));
        }

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let membership_no = cmd.membership_no.trim();
        if membership_no.is_empty() {
            return Err(DomainError::validation("membership_no cannot be empty"));
        }

        Ok(vec![MemberEvent::Registered(MemberRegistered {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            membership_no: membership_no.to_string(),
            name: name.to_string(),
            phone: normalize_phone(cmd.phone.as_deref()),
            joined_on: cmd.joined_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateMember) -> Result<Vec<MemberEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.member_id)?;

        if self.status == MemberStatus::Inactive {
            return Err(DomainError::invariant("inactive members cannot be updated"));
        }

        let name = match cmd.name.as_deref().map(str::trim) {
            Some("") => return Err(DomainError::validation("name cannot be empty")),
            Some(n) => n.to_string(),
            None => self.name.clone(),
        };
        let phone = match cmd.phone.as_deref() {
            Some(p) => normalize_phone(Some(p)),
            None => self.phone.clone(),
        };

        if name == self.name && phone == self.phone {
            return Err(DomainError::validation("update changes nothing"));
        }

        Ok(vec![MemberEvent::Updated(MemberUpdated {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            name,
            phone,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateMember) -> Result<Vec<MemberEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.member_id)?;

        if self.status == MemberStatus::Inactive {
            return Err(DomainError::conflict("member already inactive"));
        }

        Ok(vec![MemberEvent::Deactivated(MemberDeactivated {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateMember) -> Result<Vec<MemberEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.member_id)?;

        if self.status == MemberStatus::Active {
            return Err(DomainError::conflict("member already active"));
        }

        Ok(vec![MemberEvent::Reactivated(MemberReactivated {
            tenant_id: cmd.tenant_id,
            member_id: cmd.member_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Blank phone numbers are stored as absent.
fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahakari_events::execute;

    fn tenant() -> TenantId {
        TenantId::new()
    }

    fn member_id() -> MemberId {
        MemberId::new(AggregateId::new())
    }

    fn register_cmd(tenant_id: TenantId, member_id: MemberId) -> MemberCommand {
        MemberCommand::Register(RegisterMember {
            tenant_id,
            member_id,
            membership_no: " M-001 ".to_string(),
            name: "  Asha Patil ".to_string(),
            phone: Some("".to_string()),
            joined_on: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            occurred_at: Utc::now(),
        })
    }

    fn registered(tenant_id: TenantId, id: MemberId) -> Member {
        let mut m = Member::empty(id);
        execute(&mut m, &register_cmd(tenant_id, id)).unwrap();
        m
    }

    #[test]
    fn register_trims_fields_and_drops_blank_phone() {
        let t = tenant();
        let id = member_id();
        let m = registered(t, id);

        assert_eq!(m.name(), "Asha Patil");
        assert_eq!(m.membership_no(), "M-001");
        assert_eq!(m.phone(), None);
        assert_eq!(m.status(), MemberStatus::Active);
        assert_eq!(m.version(), 1);
    }

    #[test]
    fn double_registration_conflicts() {
        let t = tenant();
        let id = member_id();
        let m = registered(t, id);
        assert!(matches!(m.handle(&register_cmd(t, id)), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn blank_name_is_rejected() {
        let id = member_id();
        let cmd = MemberCommand::Register(RegisterMember {
            tenant_id: tenant(),
            member_id: id,
            membership_no: "M-9".to_string(),
            name: "   ".to_string(),
            phone: None,
            joined_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(Member::empty(id).handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn update_on_unknown_member_is_not_found() {
        let id = member_id();
        let cmd = MemberCommand::Update(UpdateMember {
            tenant_id: tenant(),
            member_id: id,
            name: Some("X".to_string()),
            phone: None,
            occurred_at: Utc::now(),
        });
        assert_eq!(Member::empty(id).handle(&cmd), Err(DomainError::NotFound));
    }

    #[test]
    fn noop_update_is_rejected() {
        let t = tenant();
        let id = member_id();
        let m = registered(t, id);
        let cmd = MemberCommand::Update(UpdateMember {
            tenant_id: t,
            member_id: id,
            name: Some("Asha Patil".to_string()),
            phone: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(m.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn deactivate_then_reactivate() {
        let t = tenant();
        let id = member_id();
        let mut m = registered(t, id);

        let deactivate = MemberCommand::Deactivate(DeactivateMember {
            tenant_id: t,
            member_id: id,
            reason: Some("moved away".to_string()),
            occurred_at: Utc::now(),
        });
        execute(&mut m, &deactivate).unwrap();
        assert_eq!(m.status(), MemberStatus::Inactive);
        assert!(matches!(m.handle(&deactivate), Err(DomainError::Conflict(_))));

        let update = MemberCommand::Update(UpdateMember {
            tenant_id: t,
            member_id: id,
            name: Some("New Name".to_string()),
            phone: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(m.handle(&update), Err(DomainError::InvariantViolation(_))));

        let reactivate = MemberCommand::Reactivate(ReactivateMember {
            tenant_id: t,
            member_id: id,
            occurred_at: Utc::now(),
        });
        execute(&mut m, &reactivate).unwrap();
        assert_eq!(m.status(), MemberStatus::Active);
        assert_eq!(m.version(), 3);
    }

    #[test]
    fn commands_from_other_tenant_are_rejected() {
        let id = member_id();
        let m = registered(tenant(), id);
        let cmd = MemberCommand::Deactivate(DeactivateMember {
            tenant_id: tenant(),
            member_id: id,
            reason: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(m.handle(&cmd), Err(DomainError::InvariantViolation(_))));
    }
}
