//! # Avatar Lifecycle
//!
//! ```text
//! Unknown ──→ Invite ──→ {Signup, RegisterHuman} ──→ Migrating ──→ RegisterHuman (v2)
//! Unknown ──→ RegisterOrganization
//! Unknown ──→ RegisterGroup
//! ```
//!
//! `Unknown` is the provisional state of an avatar whose metadata digest
//! arrived before its registration.

use super::tokens;
use crate::domain::{
    contract_token_id, Avatar, AvatarType, EntityRecord, LoadedToken, Profile, ProjectionError,
    ProtocolVersion, Provenance, TokenType,
};
use crate::events::EventEnvelope;
use crate::snapshot::Snapshot;
use shared_types::{Address, ProfileMetadata, ResolvedDigest, SourceKind, TxHash, U256};
use tracing::debug;

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}

fn existing_or_new(
    snapshot: &Snapshot,
    id: &Address,
    avatar_type: AvatarType,
    version: ProtocolVersion,
    provenance: Provenance,
) -> Result<(Avatar, bool), ProjectionError> {
    Ok(match snapshot.avatar(id)? {
        Some(existing) => (existing.clone(), false),
        None => (Avatar::new(*id, avatar_type, version, provenance), true),
    })
}

fn merge_profile(
    snapshot: &mut Snapshot,
    id: &Address,
    update: &ProfileMetadata,
) -> Result<(), ProjectionError> {
    let mut profile = snapshot.profile(id)?.cloned().unwrap_or(Profile {
        id: *id,
        metadata: ProfileMetadata::default(),
    });
    profile.metadata.merge_from(update);
    snapshot.put(EntityRecord::Profile(profile));
    Ok(())
}

// =============================================================================
// HUB V1
// =============================================================================

pub fn signup(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    user: &Address,
    token: &Address,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let (mut avatar, _) = existing_or_new(snapshot, user, AvatarType::Signup, ProtocolVersion::V1, provenance)?;
    if avatar.version != ProtocolVersion::V1 {
        debug!(avatar = %user, "Ignoring V1 signup of a migrated avatar");
        return Ok(());
    }

    if let Some(found) = snapshot.address_profile().cloned() {
        merge_profile(snapshot, user, &found)?;
    }

    let token_id = contract_token_id(token);
    avatar.avatar_type = AvatarType::Signup;
    avatar.token_id = Some(token_id.clone());
    avatar.provenance = provenance;
    snapshot.put(EntityRecord::Avatar(avatar));

    if let LoadedToken::Placeholder { id } = snapshot.token(&token_id)? {
        tokens::create(snapshot, id, TokenType::Signup, *user, ProtocolVersion::V1, provenance);
    }

    snapshot.stats_mut()?.signups += 1;
    snapshot.request_source(SourceKind::PersonalToken, *token, envelope.block_number);
    Ok(())
}

pub fn organization_signup(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    organization: &Address,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let (mut avatar, _) = existing_or_new(
        snapshot,
        organization,
        AvatarType::OrganizationSignup,
        ProtocolVersion::V1,
        provenance,
    )?;
    if avatar.version != ProtocolVersion::V1 {
        debug!(avatar = %organization, "Ignoring V1 organization signup of a migrated avatar");
        return Ok(());
    }
    avatar.avatar_type = AvatarType::OrganizationSignup;
    avatar.provenance = provenance;
    snapshot.put(EntityRecord::Avatar(avatar));
    snapshot.stats_mut()?.signups += 1;
    Ok(())
}

// =============================================================================
// HUB V2
// =============================================================================

/// Registers a V2 human, migrating an existing avatar in place.
pub fn register_human(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    human: &Address,
    inviter: &Address,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let inviter = (!inviter.is_zero()).then_some(*inviter);

    match snapshot.avatar_mut(human)? {
        Some(avatar) => {
            avatar.avatar_type = AvatarType::RegisterHuman;
            avatar.version = ProtocolVersion::V2;
            avatar.token_id = Some(human.to_token_id());
            avatar.reset_trust_counters();
            if inviter.is_some() {
                avatar.invited_by = inviter;
            }
            avatar.provenance = provenance;
        }
        None => {
            let mut avatar = Avatar::new(*human, AvatarType::RegisterHuman, ProtocolVersion::V2, provenance);
            avatar.token_id = Some(human.to_token_id());
            avatar.invited_by = inviter;
            snapshot.put(EntityRecord::Avatar(avatar));
            snapshot.stats_mut()?.signups += 1;
        }
    }

    snapshot.request_source(SourceKind::SafeAccount, *human, envelope.block_number);
    Ok(())
}

pub fn register_organization(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    organization: &Address,
    name: &str,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let (mut avatar, _) = existing_or_new(
        snapshot,
        organization,
        AvatarType::RegisterOrganization,
        ProtocolVersion::V2,
        provenance,
    )?;
    avatar.avatar_type = AvatarType::RegisterOrganization;
    avatar.version = ProtocolVersion::V2;
    avatar.token_id = Some(organization.to_token_id());
    avatar.provenance = provenance;
    snapshot.put(EntityRecord::Avatar(avatar));

    let update = ProfileMetadata {
        name: Some(name.to_string()),
        ..Default::default()
    };
    merge_profile(snapshot, organization, &update.stripped())?;
    snapshot.stats_mut()?.signups += 1;
    Ok(())
}

/// Registers a group, completing a provisional `Unknown` avatar if the
/// metadata digest arrived first.
pub fn register_group(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    group: &Address,
    name: &str,
    symbol: &str,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let (mut avatar, _) = existing_or_new(
        snapshot,
        group,
        AvatarType::RegisterGroup,
        ProtocolVersion::V2,
        provenance,
    )?;
    avatar.avatar_type = AvatarType::RegisterGroup;
    avatar.version = ProtocolVersion::V2;
    avatar.token_id = Some(group.to_token_id());
    avatar.provenance = provenance;
    snapshot.put(EntityRecord::Avatar(avatar));

    let update = ProfileMetadata {
        name: Some(name.to_string()),
        symbol: Some(symbol.to_string()),
        ..Default::default()
    };
    merge_profile(snapshot, group, &update.stripped())?;
    snapshot.stats_mut()?.signups += 1;
    Ok(())
}

pub fn update_metadata_digest(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    avatar_id: &Address,
    digest: &TxHash,
) -> Result<(), ProjectionError> {
    let resolved = snapshot.digest().cloned().unwrap_or_else(|| ResolvedDigest {
        cid_v0: digest.to_cid_v0(),
        profile: None,
    });

    match snapshot.avatar_mut(avatar_id)? {
        Some(avatar) => {
            avatar.cid_v0 = Some(resolved.cid_v0.clone());
            if avatar.version == ProtocolVersion::V1 {
                avatar.avatar_type = AvatarType::Migrating;
            }
        }
        None => {
            let mut avatar = Avatar::new(
                *avatar_id,
                AvatarType::Unknown,
                ProtocolVersion::V2,
                envelope.provenance(),
            );
            avatar.token_id = Some(avatar_id.to_token_id());
            avatar.cid_v0 = Some(resolved.cid_v0.clone());
            snapshot.put(EntityRecord::Avatar(avatar));
        }
    }

    let update = resolved.profile.unwrap_or_default();
    merge_profile(snapshot, avatar_id, &update)
}

pub fn record_mint(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    human: &Address,
    end_period: U256,
) -> Result<(), ProjectionError> {
    if let Some(avatar) = snapshot.avatar_mut(human)? {
        avatar.last_mint = Some(envelope.block_timestamp);
        avatar.mint_end_period = Some(saturating_u64(end_period));
    }
    Ok(())
}

pub fn record_demurrage(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    account: &Address,
) -> Result<(), ProjectionError> {
    if let Some(avatar) = snapshot.avatar_mut(account)? {
        avatar.last_demurrage_update = Some(envelope.block_timestamp);
    }
    Ok(())
}

// =============================================================================
// ERC20 LIFT
// =============================================================================

pub fn wrapper_deployed(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    avatar_id: &Address,
    wrapper: &Address,
    circles_type: u8,
) -> Result<(), ProjectionError> {
    if let Some(avatar) = snapshot.avatar_mut(avatar_id)? {
        avatar.wrapped_token_id = Some(*wrapper);
    }

    let token_type = if circles_type == 0 {
        TokenType::WrappedDemurrageToken
    } else {
        TokenType::WrappedStaticToken
    };
    match snapshot.token(&contract_token_id(wrapper))? {
        LoadedToken::Placeholder { id } => tokens::create(
            snapshot,
            id,
            token_type,
            *avatar_id,
            ProtocolVersion::V2,
            envelope.provenance(),
        ),
        LoadedToken::Known(mut token) => {
            token.token_type = token_type;
            token.token_owner = *avatar_id;
            snapshot.put_token(token);
        }
    }

    snapshot.request_source(SourceKind::WrappedErc20, *wrapper, envelope.block_number);
    Ok(())
}
