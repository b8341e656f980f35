pub mod home;
pub mod posts;
pub mod stream;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole board as one router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(home::router())
        .merge(posts::router())
        .merge(stream::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
