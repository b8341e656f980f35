use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::posts::domain::{DayKey, BODY_MAX_CHARS, TOPIC_MAX_CHARS};
use crate::render::{GridTemplate, PostCard};
use crate::state::AppState;

pub struct DayLink {
    pub key: String,
    pub current: bool,
}

#[derive(Template)]
#[template(path = "pages/wall.html")]
pub struct WallTemplate {
    pub day: String,
    pub days: Vec<DayLink>,
    pub posts: Vec<PostCard>,
    pub difficulty: usize,
    pub topic_max: usize,
    pub body_max: usize,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/day/{day}", get(day_grid))
}

/// Today's wall.
pub async fn index(State(state): State<AppState>) -> AppResult<Html<WallTemplate>> {
    let today = state.posts.today();
    let posts = cards_for(&state, &today).await?;

    let days = state
        .posts
        .browsable_days()
        .into_iter()
        .map(|day| DayLink {
            key: day.to_string(),
            current: day == today,
        })
        .collect();

    Ok(Html(WallTemplate {
        day: today.to_string(),
        days,
        posts,
        difficulty: state.challenges.difficulty(),
        topic_max: TOPIC_MAX_CHARS,
        body_max: BODY_MAX_CHARS,
    }))
}

/// Grid fragment for one day. Days outside the window fall back to today.
async fn day_grid(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> AppResult<Html<GridTemplate>> {
    let day = state.posts.resolve_day(Some(day.as_str()));
    let posts = cards_for(&state, &day).await?;

    Ok(Html(GridTemplate {
        day: day.to_string(),
        posts,
    }))
}

async fn cards_for(state: &AppState, day: &DayKey) -> AppResult<Vec<PostCard>> {
    let now = state.clock.now();
    Ok(state
        .posts
        .feed(day)
        .await?
        .iter()
        .map(|post| PostCard::from_post(post, now))
        .collect())
}
