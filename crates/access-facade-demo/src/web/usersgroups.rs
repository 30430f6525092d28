//! Local stand-in for the users-groups "logged-in user permissions" query.
//!
//! Lets the demo run the remote identity provider against itself. The path
//! must be in `authz.skip_path_prefixes`, or the guard would consult the
//! endpoint it is guarding.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use access_facade_core::error::ClientCode;
use access_facade_core::model::{
    LoggedInUserPermissions, UserGroup, USERSGROUPS_PERMISSIONS_MEDIA_TYPE,
};

use crate::app_state::AppState;

pub const PERMISSIONS_PATH: &str =
    "/usersgroups-query-api/query/api/rest/usersgroups/users/logged-in-user/permissions";

const ALL: Option<&str> = Some("ALL");

pub fn sample_for(user_id: &str) -> LoggedInUserPermissions {
    let groups = if user_id.eq_ignore_ascii_case("la-user-1") {
        vec![
            UserGroup::new("63cae459-0e51-4d60-bcf8-c5324be50ba4", "Legal Advisers", ALL),
            UserGroup::new("53292fc8-d164-4a6c-8722-cdbc795cf83a", "Court Administrators", ALL),
        ]
    } else if user_id.eq_ignore_ascii_case("da-user-1") {
        vec![
            UserGroup::new("63cae459-0e51-4d60-bcf8-c5324be50ba4", "Defence Lawyer", ALL),
            UserGroup::new("53292fc8-d164-4a6c-8722-cdbc795cf83a", "Court Clerk", ALL),
        ]
    } else {
        vec![UserGroup::new("guest", "Guests", None)]
    };
    LoggedInUserPermissions {
        groups,
        ..Default::default()
    }
}

pub async fn permissions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_header = state.cfg().authz.user_id_header.as_str();
    let user = headers
        .get(user_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let Some(user) = user else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": ClientCode::BadRequest.as_str(),
                "msg": format!("missing {user_header} header"),
            })),
        )
            .into_response();
    };

    match serde_json::to_vec(&sample_for(user)) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, USERSGROUPS_PERMISSIONS_MEDIA_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "permissions encode failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "code": ClientCode::Internal.as_str() })),
            )
                .into_response()
        }
    }
}
