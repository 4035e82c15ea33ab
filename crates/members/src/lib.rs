//! Members module (event-sourced).
//!
//! Registration and lifecycle of society members. Pure domain logic only.

pub mod member;

pub use member::{
    DeactivateMember, Member, MemberCommand, MemberDeactivated, MemberEvent, MemberId,
    MemberReactivated, MemberRegistered, MemberStatus, MemberUpdated, ReactivateMember,
    RegisterMember, UpdateMember, MEMBER_AGGREGATE_TYPE,
};
