//! JSON parsing/serialization helpers with consistent warning logs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// What a JSON payload belongs to, for log fields.
#[derive(Debug, Clone, Copy)]
pub enum JsonContext<'a> {
    /// Persisted read-state set of one user.
    ReadState { user_id: &'a str },
    /// Persisted recovery snapshot of one user's feed.
    FeedSnapshot { user_id: &'a str },
}

impl JsonContext<'_> {
    fn user_id(&self) -> &str {
        match self {
            Self::ReadState { user_id } | Self::FeedSnapshot { user_id } => user_id,
        }
    }

    fn field(&self) -> &'static str {
        match self {
            Self::ReadState { .. } => "read_state",
            Self::FeedSnapshot { .. } => "feed_snapshot",
        }
    }
}

fn warn_parse_error(
    raw_len: usize,
    error: serde_json::Error,
    ctx: JsonContext<'_>,
    msg: &'static str,
) {
    warn!(
        user_id = %ctx.user_id(),
        field = ctx.field(),
        raw_len,
        error = %error,
        "{msg}"
    );
}

fn warn_serialize_error(error: serde_json::Error, ctx: JsonContext<'_>, msg: &'static str) {
    warn!(
        user_id = %ctx.user_id(),
        field = ctx.field(),
        error = %error,
        "{msg}"
    );
}

pub fn parse_optional<T: DeserializeOwned>(
    raw: Option<&str>,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn_parse_error(raw.len(), error, ctx, msg);
            None
        }
    }
}

pub fn parse_optional_or_default<T: DeserializeOwned + Default>(
    raw: Option<&str>,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> T {
    parse_optional(raw, ctx, msg).unwrap_or_default()
}

pub fn to_string_option_or_warn<T: Serialize + ?Sized>(
    value: &T,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(error) => {
            warn_serialize_error(error, ctx, msg);
            None
        }
    }
}
