//! Users-groups "logged-in user permissions" document.

use serde::{Deserialize, Serialize};

/// Vendor media type of the permissions resource.
pub const USERSGROUPS_PERMISSIONS_MEDIA_TYPE: &str =
    "application/vnd.usersgroups.get-logged-in-user-permissions+json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroup {
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub prosecuting_authority: Option<String>,
}

impl UserGroup {
    pub fn new(
        group_id: impl Into<String>,
        group_name: impl Into<String>,
        prosecuting_authority: Option<&str>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: group_name.into(),
            prosecuting_authority: prosecuting_authority.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchableRole {
    pub role_id: String,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    pub permission_id: String,
    pub object: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUserPermissions {
    #[serde(default)]
    pub groups: Vec<UserGroup>,
    #[serde(default)]
    pub switchable_roles: Vec<SwitchableRole>,
    #[serde(default)]
    pub permissions: Vec<UserPermission>,
}
