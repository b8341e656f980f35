use askama::Template;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::posts::domain::Post;

/// What a post card needs to render. Built from a `Post` at a point in time
/// so the relative age is stable within one response.
pub struct PostCard {
    pub id: String,
    pub topic: String,
    pub body: String,
    pub day: String,
    pub edit_count: u32,
    pub claimed: bool,
    pub created_at: String,
    pub age: String,
}

impl PostCard {
    pub fn from_post(post: &Post, now: DateTime<Utc>) -> Self {
        Self {
            id: post.id.to_string(),
            topic: post.topic.clone(),
            body: post.body.clone(),
            day: post.day_key.to_string(),
            edit_count: post.edit_count,
            claimed: post.is_claimed(),
            created_at: post.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            age: format_relative_time(post.created_at, now),
        }
    }
}

#[derive(Template)]
#[template(path = "components/post_card.html")]
pub struct PostCardTemplate {
    pub post: PostCard,
}

#[derive(Template)]
#[template(path = "components/grid.html")]
pub struct GridTemplate {
    pub day: String,
    pub posts: Vec<PostCard>,
}

/// HTML fragment pushed to live viewers and returned from write endpoints.
pub fn render_card(post: &Post, now: DateTime<Utc>) -> Result<String, askama::Error> {
    PostCardTemplate {
        post: PostCard::from_post(post, now),
    }
    .render()
}

pub fn format_relative_time(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
