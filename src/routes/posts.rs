use askama::Template;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::antiabuse::{ActionClass, Challenge};
use crate::error::{AppError, AppResult};
use crate::extractors::ClientIdentity;
use crate::posts::domain::{Origin, Post, PostId};
use crate::render::{PostCard, PostCardTemplate};
use crate::routes::home::Html;
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "components/origin.html")]
pub struct OriginTemplate {
    pub diverged: bool,
    pub topic: String,
    pub body: String,
}

impl From<Origin> for OriginTemplate {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Unchanged => Self {
                diverged: false,
                topic: String::new(),
                body: String::new(),
            },
            Origin::Diverged { topic, body } => Self {
                diverged: true,
                topic,
                body,
            },
        }
    }
}

// --- Forms ---

#[derive(Deserialize)]
pub struct CreatePostForm {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub body: String,
    pub fingerprint: Option<String>,
    pub day_key: Option<String>,
    pub pow_prefix: Option<String>,
    pub pow_nonce: Option<String>,
}

#[derive(Deserialize)]
pub struct EditPostForm {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub body: String,
    pub fingerprint: Option<String>,
}

#[derive(Deserialize)]
pub struct ClaimForm {
    #[serde(default)]
    pub pin: String,
}

#[derive(Deserialize)]
pub struct ClaimedEditForm {
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub body: String,
    pub fingerprint: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pow-challenge", get(pow_challenge))
        .route("/post", post(create_post))
        .route("/post/{id}", put(edit_post))
        .route("/post/{id}/claim", post(claim_post))
        .route("/post/{id}/claimed", put(claimed_edit_post))
        .route("/post/{id}/origin", get(reveal_origin))
}

// --- Handlers ---

async fn pow_challenge(State(state): State<AppState>) -> Json<Challenge> {
    Json(state.challenges.issue())
}

async fn create_post(
    State(state): State<AppState>,
    client: ClientIdentity,
    Form(form): Form<CreatePostForm>,
) -> AppResult<Html<PostCardTemplate>> {
    let fingerprint = form.fingerprint.as_deref();
    admit(&state, &client.key(fingerprint), ActionClass::Create)?;

    let (Some(prefix), Some(nonce)) = (form.pow_prefix.as_deref(), form.pow_nonce.as_deref())
    else {
        return Err(AppError::ProofOfWorkInvalid);
    };
    if !state.challenges.verify(prefix, nonce) {
        return Err(AppError::ProofOfWorkInvalid);
    }

    let post = state
        .posts
        .create(
            &form.topic,
            &form.body,
            client.identity(fingerprint),
            form.day_key.as_deref(),
        )
        .await?;

    Ok(accepted(&state, &post))
}

async fn edit_post(
    State(state): State<AppState>,
    client: ClientIdentity,
    Path(id): Path<String>,
    Form(form): Form<EditPostForm>,
) -> AppResult<Html<PostCardTemplate>> {
    admit(&state, &client.key(form.fingerprint.as_deref()), ActionClass::Edit)?;

    let post = state
        .posts
        .edit(&PostId::new(id), &form.topic, &form.body)
        .await?;

    Ok(accepted(&state, &post))
}

async fn claim_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ClaimForm>,
) -> AppResult<Html<PostCardTemplate>> {
    let post = state.posts.claim(&PostId::new(id), &form.pin).await?;
    Ok(accepted(&state, &post))
}

async fn claimed_edit_post(
    State(state): State<AppState>,
    client: ClientIdentity,
    Path(id): Path<String>,
    Form(form): Form<ClaimedEditForm>,
) -> AppResult<Html<PostCardTemplate>> {
    admit(&state, &client.key(form.fingerprint.as_deref()), ActionClass::Edit)?;

    let post = state
        .posts
        .claimed_edit(&PostId::new(id), &form.pin, &form.topic, &form.body)
        .await?;

    Ok(accepted(&state, &post))
}

async fn reveal_origin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Html<OriginTemplate>> {
    let origin = state.posts.reveal_origin(&PostId::new(id)).await?;
    Ok(Html(origin.into()))
}

// --- Helpers ---

fn admit(state: &AppState, key: &str, class: ActionClass) -> AppResult<()> {
    if state.limiter.admit(key, class) {
        Ok(())
    } else {
        Err(AppError::RateLimited)
    }
}

/// A person's write went through: push the agent back to sleep and hand the
/// fresh card back to the caller.
fn accepted(state: &AppState, post: &Post) -> Html<PostCardTemplate> {
    state.activity.record_human_activity();
    Html(PostCardTemplate {
        post: PostCard::from_post(post, state.clock.now()),
    })
}
