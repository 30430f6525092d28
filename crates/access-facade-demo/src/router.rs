//! Axum router wiring.
//!
//! Layering, outermost first: HTTP audit, authz guard, routes. Requests the
//! guard refuses are therefore still audited.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, web};

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/api/hello", get(web::echo::hello))
        .route("/api/echo", post(web::echo::echo))
        .route("/api/error", get(web::echo::error))
        .route(
            web::usersgroups::PERMISSIONS_PATH,
            get(web::usersgroups::permissions),
        )
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics));

    let guarded = state.guard().apply(routes);
    state.audit().apply(guarded).with_state(state)
}
