//! Role-based authorization for moderation operations.
//!
//! One pure function evaluated from every moderation call site (mute,
//! kick, role change, roster add/remove). Rules:
//!
//! - The originator may act on anyone except another originator: the
//!   originator cannot be kicked, removed, or demoted, and that covers
//!   kicking yourself, since the only originator is you.
//! - A moderator may mute/kick/remove participants holding the
//!   participant, speaker, or assistant role - never another moderator or
//!   the originator. Role changes by moderators stay within that set.
//! - Regular roles hold no moderation rights. Self-mute is not a
//!   moderation operation and is decided before this function is reached.
//! - No role is ever promoted to originator after creation.

use crate::errors::ConfError;
use common::types::ParticipantRole;

/// A moderation operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAction {
    /// Mute or unmute the target.
    Mute,

    /// Eject the target from a live conference.
    Kick,

    /// Remove the target from the roster.
    Remove,

    /// Change the target's role to the payload role.
    ChangeRole(ParticipantRole),

    /// Add users to the roster.
    Add,
}

impl ModAction {
    /// Audit log label for the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModAction::Mute => "mute",
            ModAction::Kick => "kick",
            ModAction::Remove => "remove",
            ModAction::ChangeRole(_) => "role_change",
            ModAction::Add => "add",
        }
    }
}

/// Whether a role is moderatable by a moderator.
fn is_regular(role: ParticipantRole) -> bool {
    matches!(
        role,
        ParticipantRole::Participant | ParticipantRole::Speaker | ParticipantRole::Assistant
    )
}

/// Decide whether `actor` may perform `action` on `target`.
///
/// Pure and synchronous so every call site shares one decision table and
/// the table is unit-testable exhaustively.
///
/// # Errors
///
/// Returns `ConfError::PermissionDenied` when the action is not allowed.
pub fn authorize(
    actor: ParticipantRole,
    target: ParticipantRole,
    action: ModAction,
) -> Result<(), ConfError> {
    // Promotion to originator is never permitted, regardless of actor.
    if let ModAction::ChangeRole(new_role) = action {
        if new_role == ParticipantRole::Originator {
            return Err(ConfError::PermissionDenied(
                "The originator role is assigned at creation only".to_string(),
            ));
        }
    }

    match actor {
        ParticipantRole::Originator => match action {
            ModAction::Add => Ok(()),
            ModAction::Mute => Ok(()),
            ModAction::Kick | ModAction::Remove | ModAction::ChangeRole(_) => {
                if target == ParticipantRole::Originator {
                    Err(ConfError::PermissionDenied(
                        "The originator cannot be removed or demoted".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        },
        ParticipantRole::Moderator => match action {
            ModAction::Add => Ok(()),
            ModAction::Mute | ModAction::Kick | ModAction::Remove => {
                if is_regular(target) {
                    Ok(())
                } else {
                    Err(ConfError::PermissionDenied(
                        "Moderators cannot act on moderators or the originator".to_string(),
                    ))
                }
            }
            ModAction::ChangeRole(new_role) => {
                if is_regular(target) && is_regular(new_role) {
                    Ok(())
                } else {
                    Err(ConfError::PermissionDenied(
                        "Moderators can only change roles among regular participants"
                            .to_string(),
                    ))
                }
            }
        },
        ParticipantRole::Participant | ParticipantRole::Speaker | ParticipantRole::Assistant => {
            Err(ConfError::PermissionDenied(
                "Only the originator or a moderator may do that".to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::ParticipantRole::{
        Assistant, Moderator, Originator, Participant, Speaker,
    };

    #[test]
    fn test_kick_matrix() {
        // (actor, target, allowed)
        let table = [
            (Originator, Moderator, true),
            (Originator, Participant, true),
            (Originator, Speaker, true),
            (Originator, Assistant, true),
            // The only originator is yourself: no self-kick.
            (Originator, Originator, false),
            (Moderator, Participant, true),
            (Moderator, Speaker, true),
            (Moderator, Assistant, true),
            (Moderator, Moderator, false),
            (Moderator, Originator, false),
            (Participant, Participant, false),
            (Participant, Originator, false),
            (Speaker, Participant, false),
            (Assistant, Assistant, false),
        ];

        for (actor, target, allowed) in table {
            let result = authorize(actor, target, ModAction::Kick);
            assert_eq!(
                result.is_ok(),
                allowed,
                "kick: actor={actor:?} target={target:?}"
            );
        }
    }

    #[test]
    fn test_remove_mirrors_kick() {
        for actor in [Originator, Moderator, Participant, Speaker, Assistant] {
            for target in [Originator, Moderator, Participant, Speaker, Assistant] {
                assert_eq!(
                    authorize(actor, target, ModAction::Kick).is_ok(),
                    authorize(actor, target, ModAction::Remove).is_ok(),
                    "actor={actor:?} target={target:?}"
                );
            }
        }
    }

    #[test]
    fn test_mute_matrix() {
        let table = [
            (Originator, Participant, true),
            (Originator, Moderator, true),
            (Moderator, Participant, true),
            (Moderator, Speaker, true),
            (Moderator, Moderator, false),
            (Moderator, Originator, false),
            (Participant, Participant, false),
            (Speaker, Moderator, false),
        ];

        for (actor, target, allowed) in table {
            let result = authorize(actor, target, ModAction::Mute);
            assert_eq!(
                result.is_ok(),
                allowed,
                "mute: actor={actor:?} target={target:?}"
            );
        }
    }

    #[test]
    fn test_no_promotion_to_originator() {
        for actor in [Originator, Moderator, Participant, Speaker, Assistant] {
            for target in [Moderator, Participant, Speaker, Assistant] {
                assert!(
                    authorize(actor, target, ModAction::ChangeRole(Originator)).is_err(),
                    "actor={actor:?} target={target:?}"
                );
            }
        }
    }

    #[test]
    fn test_role_change_matrix() {
        // Originator may promote a participant to moderator.
        assert!(authorize(Originator, Participant, ModAction::ChangeRole(Moderator)).is_ok());
        // Originator may demote a moderator.
        assert!(authorize(Originator, Moderator, ModAction::ChangeRole(Participant)).is_ok());
        // Originator cannot be demoted.
        assert!(authorize(Originator, Originator, ModAction::ChangeRole(Participant)).is_err());
        // Moderator may shuffle regular roles.
        assert!(authorize(Moderator, Participant, ModAction::ChangeRole(Speaker)).is_ok());
        // Moderator cannot grant moderator.
        assert!(authorize(Moderator, Participant, ModAction::ChangeRole(Moderator)).is_err());
        // Moderator cannot touch another moderator's role.
        assert!(authorize(Moderator, Moderator, ModAction::ChangeRole(Participant)).is_err());
        // Regular roles hold no role-change rights.
        assert!(authorize(Participant, Participant, ModAction::ChangeRole(Speaker)).is_err());
    }

    #[test]
    fn test_add_requires_moderation_rights() {
        assert!(authorize(Originator, Participant, ModAction::Add).is_ok());
        assert!(authorize(Moderator, Participant, ModAction::Add).is_ok());
        assert!(authorize(Participant, Participant, ModAction::Add).is_err());
        assert!(authorize(Speaker, Participant, ModAction::Add).is_err());
        assert!(authorize(Assistant, Participant, ModAction::Add).is_err());
    }

    #[test]
    fn test_action_audit_labels() {
        assert_eq!(ModAction::Kick.as_str(), "kick");
        assert_eq!(ModAction::Remove.as_str(), "remove");
        assert_eq!(
            ModAction::ChangeRole(ParticipantRole::Speaker).as_str(),
            "role_change"
        );
    }
}
