//! First-time registration: found a new group or join one by code.
//!
//! The group document and the user's profile are written in one batch, so a
//! half-registered user (profile pointing at a group that was never
//! created, or a group listing a user without a profile) cannot occur.

use serde_json::Value;

use crate::error::{PantryError, Result};
use crate::remote::{Fields, RemoteStore, WriteOp, paths};
use crate::sync::decode_group;
use crate::types::{GroupId, Uid};
use crate::utils::validate_name;

/// How the new user gets a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChoice {
    /// Found a new group with this name.
    Create { name: String },
    /// Join an existing group; the code is its id.
    Join { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub uid: Uid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub group: GroupChoice,
}

/// Register `request.uid` and return the id of the group it now belongs to.
pub async fn register(store: &dyn RemoteStore, request: RegisterRequest) -> Result<GroupId> {
    let display_name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let (group_id, group_op) = match &request.group {
        GroupChoice::Create { name } => {
            let name = validate_name(name, "group")?;
            let group_id = uuid::Uuid::new_v4().to_string();
            let fields = Fields::new()
                .set("name", name)
                .set("createdBy", request.uid.as_str())
                .set("members", vec![request.uid.clone()]);
            let op = WriteOp::Insert {
                path: paths::group(&group_id),
                fields,
            };
            (group_id, Some(op))
        }
        GroupChoice::Join { code } => {
            let code = code.trim();
            if code.is_empty() {
                return Err(PantryError::EmptyName("group code"));
            }
            let path = paths::group(code);
            let group = store
                .get_document(&path)
                .await?
                .as_ref()
                .and_then(decode_group)
                .ok_or_else(|| PantryError::GroupCodeNotFound(code.to_string()))?;

            // Members only ever grow.
            let op = (!group.members.contains(&request.uid)).then(|| {
                let mut members = group.members.clone();
                members.push(request.uid.clone());
                WriteOp::Update {
                    path,
                    fields: Fields::new().set("members", members),
                }
            });
            (code.to_string(), op)
        }
    };

    let profile = Fields::new()
        .set("email", request.email.clone().map_or(Value::Null, Value::from))
        .set("name", display_name.map_or(Value::Null, Value::from))
        .set("groupId", group_id.as_str());
    let mut ops: Vec<WriteOp> = group_op.into_iter().collect();
    ops.push(WriteOp::Insert {
        path: paths::user(&request.uid),
        fields: profile,
    });

    store.run_batch(ops).await.inspect_err(|e| {
        tracing::warn!("registration of {} failed: {e}", request.uid);
    })?;
    tracing::info!("registered {} in group {group_id}", request.uid);
    Ok(group_id)
}
