// Path: crates/validation/src/permissions.rs
//! Per-command permission predicates.
//!
//! A command is permitted by the creator's accumulated role permissions,
//! or for account-scoped commands, by a grantable permission the affected
//! account granted the creator. Integrity of the command (object
//! existence, balances) is checked later by the executor, not here.

use meridian_api::state::WsvQuery;
use meridian_types::app::{AccountId, Command, GrantablePermission, RolePermissions};
use meridian_types::error::{command_error_code as code, CommandError, StorageError};

fn denied(command: &Command) -> CommandError {
    CommandError {
        command_name: command.name(),
        error_code: code::PERMISSION_DENIED,
    }
}

fn internal(command: &Command) -> impl Fn(StorageError) -> CommandError + '_ {
    move |_| CommandError {
        command_name: command.name(),
        error_code: code::INTERNAL,
    }
}

fn require(granted: bool, command: &Command) -> Result<(), CommandError> {
    if granted {
        Ok(())
    } else {
        Err(denied(command))
    }
}

/// Whether the creator may target `account` with a command that needs
/// `own` on the creator's own account or the grantable `delegated`
/// permission otherwise.
fn own_or_granted<W: WsvQuery + ?Sized>(
    wsv: &W,
    command: &Command,
    creator: &AccountId,
    account: &AccountId,
    creator_permissions: RolePermissions,
    own: RolePermissions,
    delegated: GrantablePermission,
) -> Result<(), CommandError> {
    if creator == account {
        return require(creator_permissions.contains(own), command);
    }
    let grants = wsv
        .granted_permissions(account, creator)
        .map_err(internal(command))?;
    require(grants.contains(delegated.as_flag()), command)
}

/// Checks the permission predicate of one command for `creator`.
pub fn check_permission<W: WsvQuery + ?Sized>(
    wsv: &W,
    creator: &AccountId,
    command: &Command,
) -> Result<(), CommandError> {
    let permissions = wsv
        .account_permissions(creator)
        .map_err(internal(command))?;

    match command {
        Command::AddAssetQuantity { .. } => {
            require(permissions.contains(RolePermissions::ADD_ASSET_QTY), command)
        }
        Command::SubtractAssetQuantity { .. } => require(
            permissions.contains(RolePermissions::SUBTRACT_ASSET_QTY),
            command,
        ),
        Command::TransferAsset {
            src_account_id,
            dest_account_id,
            ..
        } => {
            // Transferring out of another account needs that account's
            // delegation on top of the transfer permission.
            if src_account_id != creator {
                let grants = wsv
                    .granted_permissions(src_account_id, creator)
                    .map_err(internal(command))?;
                require(
                    grants.contains(GrantablePermission::TransferMyAssets.as_flag()),
                    command,
                )?;
            } else {
                require(permissions.contains(RolePermissions::TRANSFER), command)?;
            }
            let dest_permissions = wsv
                .account_permissions(dest_account_id)
                .map_err(internal(command))?;
            require(dest_permissions.contains(RolePermissions::RECEIVE), command)
        }
        Command::CreateAccount { .. } => {
            require(permissions.contains(RolePermissions::CREATE_ACCOUNT), command)
        }
        Command::CreateAsset { .. } => {
            require(permissions.contains(RolePermissions::CREATE_ASSET), command)
        }
        Command::CreateDomain { .. } => {
            require(permissions.contains(RolePermissions::CREATE_DOMAIN), command)
        }
        Command::CreateRole {
            permissions: role_permissions,
            ..
        } => {
            require(permissions.contains(RolePermissions::CREATE_ROLE), command)?;
            // A role may not carry permissions its creator lacks.
            require(permissions.contains(*role_permissions), command)
        }
        Command::AppendRole { role_name, .. } => {
            require(permissions.contains(RolePermissions::APPEND_ROLE), command)?;
            if let Some(appended) = wsv
                .role_permissions(role_name)
                .map_err(internal(command))?
            {
                require(permissions.contains(appended), command)?;
            }
            Ok(())
        }
        Command::DetachRole { .. } => {
            require(permissions.contains(RolePermissions::DETACH_ROLE), command)
        }
        Command::GrantPermission { permission, .. } => {
            require(permissions.contains(permission.required_to_grant()), command)
        }
        // Revocation is validated by the executor: it requires only that
        // the grant exists, and the creator owns its own grants.
        Command::RevokePermission { .. } => Ok(()),
        Command::AddSignatory { account_id, .. } => own_or_granted(
            wsv,
            command,
            creator,
            account_id,
            permissions,
            RolePermissions::ADD_SIGNATORY,
            GrantablePermission::AddMySignatory,
        ),
        Command::RemoveSignatory { account_id, .. } => own_or_granted(
            wsv,
            command,
            creator,
            account_id,
            permissions,
            RolePermissions::REMOVE_SIGNATORY,
            GrantablePermission::RemoveMySignatory,
        ),
        Command::SetQuorum { account_id, .. } => own_or_granted(
            wsv,
            command,
            creator,
            account_id,
            permissions,
            RolePermissions::SET_QUORUM,
            GrantablePermission::SetMyQuorum,
        ),
        Command::SetAccountDetail { account_id, .. } => {
            if creator == account_id || permissions.contains(RolePermissions::SET_DETAIL) {
                return Ok(());
            }
            let grants = wsv
                .granted_permissions(account_id, creator)
                .map_err(internal(command))?;
            require(
                grants.contains(GrantablePermission::SetMyAccountDetail.as_flag()),
                command,
            )
        }
        Command::AddPeer { .. } => {
            require(permissions.contains(RolePermissions::ADD_PEER), command)
        }
    }
}
