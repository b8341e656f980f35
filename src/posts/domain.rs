// Domain types - Pure, no side effects. bcrypt hashing lives here but is
// only ever called from a blocking task by the service layer.
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

pub const TOPIC_MAX_CHARS: usize = 60;
pub const BODY_MAX_CHARS: usize = 180;
pub const EDIT_BODY_MIN_CHARS: usize = 20;
pub const PIN_MIN_CHARS: usize = 4;
pub const PIN_MAX_CHARS: usize = 8;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    #[error("{0}")]
    Validation(String),

    #[error("Post not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Incorrect PIN")]
    Unauthorized,

    #[error("PIN hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC calendar date a post belongs to. Drives feed grouping and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today(now: DateTime<Utc>) -> Self {
        Self(now.date_naive())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), DAY_KEY_FORMAT)
            .ok()
            .map(Self)
    }

    /// Accept a caller-supplied day only if it falls within the last
    /// `retention_days` days (inclusive) up to today. Anything else,
    /// including garbage, lands on today.
    pub fn resolve(requested: Option<&str>, now: DateTime<Utc>, retention_days: u32) -> Self {
        let today = Self::today(now);
        let oldest = Self::retention_cutoff(now, retention_days);

        match requested.and_then(Self::parse) {
            Some(day) if day >= oldest && day <= today => day,
            _ => today,
        }
    }

    /// Oldest day still inside the retention window. Posts from days
    /// strictly before this are eligible for archival deletion.
    pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> Self {
        Self(now.date_naive() - Duration::days(i64::from(retention_days)))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

/// Who wrote a post. The agent is stored as a NULL fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Human(String),
    Agent,
}

impl Identity {
    pub fn from_fingerprint(fingerprint: Option<String>) -> Self {
        match fingerprint {
            Some(fp) => Self::Human(fp),
            None => Self::Agent,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Self::Human(fp) => Some(fp),
            Self::Agent => None,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent)
    }
}

/// Salted bcrypt hash of a claim PIN. Never holds plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimSecret(String);

impl ClaimSecret {
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Validate and hash a plaintext PIN. CPU-bound; call off the async runtime.
    pub fn hash(pin: &str, cost: u32) -> Result<Self, PostError> {
        validate_pin(pin)?;
        bcrypt::hash(pin, cost)
            .map(Self)
            .map_err(|e| PostError::Hash(e.to_string()))
    }

    /// Constant-time via bcrypt. CPU-bound; call off the async runtime.
    pub fn verify(&self, pin: &str) -> bool {
        bcrypt::verify(pin, &self.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClaimSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClaimSecret(..)")
    }
}

pub fn validate_pin(pin: &str) -> Result<(), PostError> {
    let len = pin.chars().count();
    if !(PIN_MIN_CHARS..=PIN_MAX_CHARS).contains(&len) {
        return Err(PostError::Validation(format!(
            "PIN must be {}-{} characters",
            PIN_MIN_CHARS, PIN_MAX_CHARS
        )));
    }
    Ok(())
}

/// Trimmed, length-checked topic and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostText {
    pub topic: String,
    pub body: String,
}

impl PostText {
    /// Rules for a brand new post.
    pub fn for_create(topic: &str, body: &str) -> Result<Self, PostError> {
        let topic = topic.trim();
        let body = body.trim();

        if topic.is_empty() {
            return Err(PostError::Validation("Topic cannot be empty".into()));
        }
        if body.is_empty() {
            return Err(PostError::Validation("Body cannot be empty".into()));
        }
        if topic.chars().count() > TOPIC_MAX_CHARS {
            return Err(PostError::Validation(format!(
                "Topic must be {} characters or less",
                TOPIC_MAX_CHARS
            )));
        }
        if body.chars().count() > BODY_MAX_CHARS {
            return Err(PostError::Validation(format!(
                "Body must be {} characters or less",
                BODY_MAX_CHARS
            )));
        }

        Ok(Self {
            topic: topic.to_string(),
            body: body.to_string(),
        })
    }

    /// Edits additionally need a body of some substance.
    pub fn for_edit(topic: &str, body: &str) -> Result<Self, PostError> {
        let text = Self::for_create(topic, body)?;
        if text.body.chars().count() < EDIT_BODY_MIN_CHARS {
            return Err(PostError::Validation(format!(
                "Edited body must be at least {} characters",
                EDIT_BODY_MIN_CHARS
            )));
        }
        Ok(text)
    }
}

/// How an edit is being authorised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAccess {
    /// No PIN presented. Only valid on unclaimed posts.
    Open,
    /// The caller's PIN has already been checked against the claim secret.
    PinVerified,
}

/// What `reveal_origin` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Unchanged,
    Diverged { topic: String, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub topic: String,
    pub body: String,
    pub original_topic: String,
    pub original_body: String,
    pub edit_count: u32,
    /// `Some` exactly when the post is claimed.
    pub claim_secret: Option<ClaimSecret>,
    pub origin_identity: Identity,
    pub day_key: DayKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pure state transitions. Each consumes the post and returns the next
/// version, leaving persistence to the caller.
impl Post {
    pub fn create(text: PostText, identity: Identity, day_key: DayKey, now: DateTime<Utc>) -> Self {
        Self {
            id: PostId::generate(),
            original_topic: text.topic.clone(),
            original_body: text.body.clone(),
            topic: text.topic,
            body: text.body,
            edit_count: 0,
            claim_secret: None,
            origin_identity: identity,
            day_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claim_secret.is_some()
    }

    /// Fails unless the post can still be claimed.
    pub fn ensure_claimable(&self) -> Result<(), PostError> {
        if self.is_claimed() {
            return Err(PostError::Conflict("This post has already been claimed".into()));
        }
        Ok(())
    }

    /// The secret a claimed edit must match.
    pub fn require_claim(&self) -> Result<&ClaimSecret, PostError> {
        self.claim_secret
            .as_ref()
            .ok_or_else(|| PostError::Conflict("This post has not been claimed".into()))
    }

    /// Transition: replace current text, bump edit count.
    pub fn edit(self, access: EditAccess, text: PostText, now: DateTime<Utc>) -> Result<Self, PostError> {
        match access {
            EditAccess::Open if self.is_claimed() => Err(PostError::Conflict(
                "This post has been claimed; its PIN is required to edit it".into(),
            )),
            EditAccess::PinVerified => {
                self.require_claim()?;
                Ok(self.revise(text, now))
            }
            EditAccess::Open => Ok(self.revise(text, now)),
        }
    }

    fn revise(self, text: PostText, now: DateTime<Utc>) -> Self {
        Self {
            topic: text.topic,
            body: text.body,
            edit_count: self.edit_count + 1,
            updated_at: now,
            ..self
        }
    }

    /// Transition: unclaimed → claimed. One way.
    pub fn claim(self, secret: ClaimSecret, now: DateTime<Utc>) -> Result<Self, PostError> {
        self.ensure_claimable()?;
        Ok(Self {
            claim_secret: Some(secret),
            updated_at: now,
            ..self
        })
    }

    pub fn origin(&self) -> Origin {
        if self.edit_count == 0 {
            Origin::Unchanged
        } else {
            Origin::Diverged {
                topic: self.original_topic.clone(),
                body: self.original_body.clone(),
            }
        }
    }
}
