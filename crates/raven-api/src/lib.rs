pub mod error;
pub mod messages;
pub mod middleware;
pub mod push;
pub mod reactions;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{patch, post},
};

use state::AppState;

/// Authenticated message routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/channels/{channel_id}/messages",
            post(messages::send_message).get(messages::get_messages),
        )
        .route(
            "/channels/{channel_id}/messages/{message_id}",
            patch(messages::edit_message).delete(messages::delete_message),
        )
        .route(
            "/channels/{channel_id}/messages/{message_id}/reactions",
            post(reactions::toggle_reaction),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
