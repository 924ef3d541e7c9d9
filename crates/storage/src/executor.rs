// Path: crates/storage/src/executor.rs
//! Command execution against a world-state view.
//!
//! Each command kind has its own integrity rules; permission checks are
//! the stateful validator's duty and never happen here, which is what
//! lets the same executor apply both freshly validated proposals and
//! already-agreed blocks (including genesis).

use crate::access::KvWrite;
use crate::queries;
use meridian_types::app::{
    Account, AccountId, Amount, Asset, AssetId, Command, Domain, DomainId, GrantablePermission,
    Peer, PublicKey, RoleName, RolePermissions,
};
use meridian_types::error::{command_error_code as code, CommandError, StorageError};
use meridian_types::{codec, keys};
use std::collections::BTreeSet;

fn fail(command: &Command, error_code: u32) -> CommandError {
    CommandError {
        command_name: command.name(),
        error_code,
    }
}

fn db_fail(command: &Command) -> impl Fn(StorageError) -> CommandError + '_ {
    move |_| fail(command, code::INTERNAL)
}

fn put<T: parity_scale_codec::Encode>(state: &mut dyn KvWrite, key: Vec<u8>, value: &T) {
    state.put_raw(key, codec::to_bytes_canonical(value));
}

/// Executes one command on behalf of `creator`, staging its writes in the
/// given view.
pub fn execute_command(
    state: &mut dyn KvWrite,
    creator: &AccountId,
    command: &Command,
) -> Result<(), CommandError> {
    match command {
        Command::AddAssetQuantity { asset_id, amount } => {
            add_asset_quantity(state, command, creator, asset_id, amount)
        }
        Command::SubtractAssetQuantity { asset_id, amount } => {
            subtract_asset_quantity(state, command, creator, asset_id, amount)
        }
        Command::TransferAsset {
            src_account_id,
            dest_account_id,
            asset_id,
            amount,
            ..
        } => transfer_asset(state, command, src_account_id, dest_account_id, asset_id, amount),
        Command::CreateAccount {
            account_name,
            domain_id,
            public_key,
        } => create_account(state, command, account_name, domain_id, public_key),
        Command::CreateAsset {
            asset_name,
            domain_id,
            precision,
        } => create_asset(state, command, asset_name, domain_id, *precision),
        Command::CreateDomain {
            domain_id,
            default_role,
        } => create_domain(state, command, domain_id, default_role),
        Command::CreateRole {
            role_name,
            permissions,
        } => create_role(state, command, role_name, *permissions),
        Command::AppendRole {
            account_id,
            role_name,
        } => append_role(state, command, account_id, role_name),
        Command::DetachRole {
            account_id,
            role_name,
        } => detach_role(state, command, account_id, role_name),
        Command::GrantPermission {
            account_id,
            permission,
        } => grant_permission(state, command, creator, account_id, *permission),
        Command::RevokePermission {
            account_id,
            permission,
        } => revoke_permission(state, command, creator, account_id, *permission),
        Command::AddSignatory {
            account_id,
            public_key,
        } => add_signatory(state, command, account_id, public_key),
        Command::RemoveSignatory {
            account_id,
            public_key,
        } => remove_signatory(state, command, account_id, public_key),
        Command::SetQuorum { account_id, quorum } => {
            set_quorum(state, command, account_id, *quorum)
        }
        Command::SetAccountDetail {
            account_id,
            key,
            value,
        } => set_account_detail(state, command, creator, account_id, key, value),
        Command::AddPeer { peer } => add_peer(state, command, peer),
    }
}

fn load_asset(
    state: &dyn KvWrite,
    command: &Command,
    asset_id: &AssetId,
) -> Result<Asset, CommandError> {
    queries::get_decoded::<Asset>(state, &keys::asset_key(asset_id))
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))
}

fn require_account(
    state: &dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
) -> Result<Account, CommandError> {
    queries::account(state, account_id)
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))
}

fn add_asset_quantity(
    state: &mut dyn KvWrite,
    command: &Command,
    creator: &AccountId,
    asset_id: &AssetId,
    amount: &Amount,
) -> Result<(), CommandError> {
    let asset = load_asset(state, command, asset_id)?;
    if amount.precision != asset.precision {
        return Err(fail(command, code::INVALID_AMOUNT));
    }
    let balance = queries::balance(state, creator, asset_id)
        .map_err(db_fail(command))?
        .unwrap_or(Amount::new(0, asset.precision));
    let updated = balance
        .checked_add(amount)
        .ok_or_else(|| fail(command, code::INVALID_AMOUNT))?;
    put(state, keys::balance_key(creator, asset_id), &updated);
    Ok(())
}

fn subtract_asset_quantity(
    state: &mut dyn KvWrite,
    command: &Command,
    creator: &AccountId,
    asset_id: &AssetId,
    amount: &Amount,
) -> Result<(), CommandError> {
    let asset = load_asset(state, command, asset_id)?;
    if amount.precision != asset.precision {
        return Err(fail(command, code::INVALID_AMOUNT));
    }
    let balance = queries::balance(state, creator, asset_id)
        .map_err(db_fail(command))?
        .unwrap_or(Amount::new(0, asset.precision));
    let updated = balance
        .checked_sub(amount)
        .ok_or_else(|| fail(command, code::INSUFFICIENT_BALANCE))?;
    put(state, keys::balance_key(creator, asset_id), &updated);
    Ok(())
}

fn transfer_asset(
    state: &mut dyn KvWrite,
    command: &Command,
    src: &AccountId,
    dest: &AccountId,
    asset_id: &AssetId,
    amount: &Amount,
) -> Result<(), CommandError> {
    let asset = load_asset(state, command, asset_id)?;
    if amount.precision != asset.precision {
        return Err(fail(command, code::INVALID_AMOUNT));
    }
    require_account(state, command, src)?;
    require_account(state, command, dest)?;

    let src_balance = queries::balance(state, src, asset_id)
        .map_err(db_fail(command))?
        .unwrap_or(Amount::new(0, asset.precision));
    let dest_balance = queries::balance(state, dest, asset_id)
        .map_err(db_fail(command))?
        .unwrap_or(Amount::new(0, asset.precision));

    let debited = src_balance
        .checked_sub(amount)
        .ok_or_else(|| fail(command, code::INSUFFICIENT_BALANCE))?;
    let credited = dest_balance
        .checked_add(amount)
        .ok_or_else(|| fail(command, code::INVALID_AMOUNT))?;

    put(state, keys::balance_key(src, asset_id), &debited);
    put(state, keys::balance_key(dest, asset_id), &credited);
    Ok(())
}

fn create_account(
    state: &mut dyn KvWrite,
    command: &Command,
    account_name: &str,
    domain_id: &DomainId,
    public_key: &PublicKey,
) -> Result<(), CommandError> {
    let domain = queries::get_decoded::<Domain>(state, &keys::domain_key(domain_id))
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))?;
    let id = AccountId::new(account_name, domain_id.clone())
        .map_err(|_| fail(command, code::INVALID_NAME))?;
    if queries::account(state, &id)
        .map_err(db_fail(command))?
        .is_some()
    {
        return Err(fail(command, code::ALREADY_EXISTS));
    }

    let account = Account {
        id: id.clone(),
        quorum: 1,
    };
    put(state, keys::account_key(&id), &account);

    let signatories: BTreeSet<PublicKey> = std::iter::once(*public_key).collect();
    put(state, keys::signatories_key(&id), &signatories);

    let roles: BTreeSet<RoleName> = std::iter::once(domain.default_role).collect();
    put(state, keys::account_roles_key(&id), &roles);
    Ok(())
}

fn create_asset(
    state: &mut dyn KvWrite,
    command: &Command,
    asset_name: &str,
    domain_id: &DomainId,
    precision: u8,
) -> Result<(), CommandError> {
    queries::get_decoded::<Domain>(state, &keys::domain_key(domain_id))
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))?;
    let id = AssetId::new(asset_name, domain_id.clone())
        .map_err(|_| fail(command, code::INVALID_NAME))?;
    if queries::get_decoded::<Asset>(state, &keys::asset_key(&id))
        .map_err(db_fail(command))?
        .is_some()
    {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    put(
        state,
        keys::asset_key(&id),
        &Asset { id: id.clone(), precision },
    );
    Ok(())
}

fn create_domain(
    state: &mut dyn KvWrite,
    command: &Command,
    domain_id: &DomainId,
    default_role: &RoleName,
) -> Result<(), CommandError> {
    if queries::get_decoded::<Domain>(state, &keys::domain_key(domain_id))
        .map_err(db_fail(command))?
        .is_some()
    {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    queries::role_permissions(state, default_role)
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))?;
    put(
        state,
        keys::domain_key(domain_id),
        &Domain {
            id: domain_id.clone(),
            default_role: default_role.clone(),
        },
    );
    Ok(())
}

fn create_role(
    state: &mut dyn KvWrite,
    command: &Command,
    role_name: &RoleName,
    permissions: RolePermissions,
) -> Result<(), CommandError> {
    if queries::role_permissions(state, role_name)
        .map_err(db_fail(command))?
        .is_some()
    {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    put(state, keys::role_key(role_name), &permissions);
    Ok(())
}

fn append_role(
    state: &mut dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
    role_name: &RoleName,
) -> Result<(), CommandError> {
    require_account(state, command, account_id)?;
    queries::role_permissions(state, role_name)
        .map_err(db_fail(command))?
        .ok_or_else(|| fail(command, code::NO_SUCH_OBJECT))?;
    let mut roles = queries::account_roles(state, account_id).map_err(db_fail(command))?;
    if !roles.insert(role_name.clone()) {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    put(state, keys::account_roles_key(account_id), &roles);
    Ok(())
}

fn detach_role(
    state: &mut dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
    role_name: &RoleName,
) -> Result<(), CommandError> {
    require_account(state, command, account_id)?;
    let mut roles = queries::account_roles(state, account_id).map_err(db_fail(command))?;
    if !roles.remove(role_name) {
        return Err(fail(command, code::NO_SUCH_OBJECT));
    }
    put(state, keys::account_roles_key(account_id), &roles);
    Ok(())
}

fn grant_permission(
    state: &mut dyn KvWrite,
    command: &Command,
    creator: &AccountId,
    grantee: &AccountId,
    permission: GrantablePermission,
) -> Result<(), CommandError> {
    require_account(state, command, grantee)?;
    let mut grants =
        queries::granted_permissions(state, creator, grantee).map_err(db_fail(command))?;
    grants |= permission.as_flag();
    put(state, keys::grant_key(creator, grantee), &grants);
    Ok(())
}

fn revoke_permission(
    state: &mut dyn KvWrite,
    command: &Command,
    creator: &AccountId,
    grantee: &AccountId,
    permission: GrantablePermission,
) -> Result<(), CommandError> {
    let mut grants =
        queries::granted_permissions(state, creator, grantee).map_err(db_fail(command))?;
    if !grants.contains(permission.as_flag()) {
        return Err(fail(command, code::NO_SUCH_OBJECT));
    }
    grants.remove(permission.as_flag());
    put(state, keys::grant_key(creator, grantee), &grants);
    Ok(())
}

fn add_signatory(
    state: &mut dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
    public_key: &PublicKey,
) -> Result<(), CommandError> {
    require_account(state, command, account_id)?;
    let mut signatories = queries::signatories(state, account_id)
        .map_err(db_fail(command))?
        .unwrap_or_default();
    if !signatories.insert(*public_key) {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    put(state, keys::signatories_key(account_id), &signatories);
    Ok(())
}

fn remove_signatory(
    state: &mut dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
    public_key: &PublicKey,
) -> Result<(), CommandError> {
    let account = require_account(state, command, account_id)?;
    let mut signatories = queries::signatories(state, account_id)
        .map_err(db_fail(command))?
        .unwrap_or_default();
    if !signatories.contains(public_key) {
        return Err(fail(command, code::NO_SUCH_OBJECT));
    }
    // Removing must not leave the account unable to meet its own quorum.
    if (signatories.len() as u32).saturating_sub(1) < account.quorum {
        return Err(fail(command, code::QUORUM_CONSTRAINT));
    }
    signatories.remove(public_key);
    put(state, keys::signatories_key(account_id), &signatories);
    Ok(())
}

fn set_quorum(
    state: &mut dyn KvWrite,
    command: &Command,
    account_id: &AccountId,
    quorum: u32,
) -> Result<(), CommandError> {
    let mut account = require_account(state, command, account_id)?;
    let signatories = queries::signatories(state, account_id)
        .map_err(db_fail(command))?
        .unwrap_or_default();
    if quorum == 0 || quorum > signatories.len() as u32 {
        return Err(fail(command, code::QUORUM_CONSTRAINT));
    }
    account.quorum = quorum;
    put(state, keys::account_key(account_id), &account);
    Ok(())
}

fn set_account_detail(
    state: &mut dyn KvWrite,
    command: &Command,
    creator: &AccountId,
    account_id: &AccountId,
    key: &str,
    value: &str,
) -> Result<(), CommandError> {
    require_account(state, command, account_id)?;
    put(
        state,
        keys::account_detail_key(account_id, creator, key),
        &value.to_string(),
    );
    Ok(())
}

fn add_peer(state: &mut dyn KvWrite, command: &Command, peer: &Peer) -> Result<(), CommandError> {
    let mut peers = queries::peers(state).map_err(db_fail(command))?;
    if peers.iter().any(|p| p.public_key == peer.public_key) {
        return Err(fail(command, code::ALREADY_EXISTS));
    }
    peers.push(peer.clone());
    put(state, keys::PEERS_KEY.to_vec(), &peers);
    Ok(())
}
