use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    Auth,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Unknown => "unknown",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Connection Problem",
            ErrorKind::Timeout => "Request Timed Out",
            ErrorKind::RateLimit => "Too Many Requests",
            ErrorKind::Auth => "Authentication Error",
            ErrorKind::Unknown => "Something Went Wrong",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "We couldn't reach your save storage. Check your connection and try again.",
            ErrorKind::Timeout => "Saving took too long to respond. Your progress is still in memory.",
            ErrorKind::RateLimit => "Saves are being throttled right now. Wait a moment before trying again.",
            ErrorKind::Auth => "You are no longer authorized to save. Sign in again to keep your progress.",
            ErrorKind::Unknown => "An unexpected problem stopped your game from saving.",
        }
    }

    pub fn user_error(&self, retryable: bool) -> UserFriendlyError {
        let action_label = match self {
            ErrorKind::Auth => Some("Sign In"),
            _ if retryable => Some("Retry"),
            _ => None,
        };
        UserFriendlyError {
            title: self.title().to_string(),
            message: self.message().to_string(),
            action_label: action_label.map(str::to_string),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text a UI can show as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFriendlyError {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub user_friendly_error: UserFriendlyError,
}

impl Classification {
    fn new(kind: ErrorKind, retryable: bool) -> Self {
        Self {
            kind,
            retryable,
            user_friendly_error: kind.user_error(retryable),
        }
    }
}

/// Everything the rules look at, gathered once from the whole source chain.
#[derive(Debug, Default)]
struct ErrorView {
    text: String,
    io_timed_out: bool,
    flagged_invalid: bool,
}

impl ErrorView {
    fn mentions(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }
}

type Rule = (fn(&ErrorView) -> bool, ErrorKind);

/// Evaluated top to bottom; first match wins.
const RULES: [Rule; 4] = [
    (is_network, ErrorKind::Network),
    (is_timeout, ErrorKind::Timeout),
    (is_rate_limited, ErrorKind::RateLimit),
    (is_unauthorized, ErrorKind::Auth),
];

fn is_network(v: &ErrorView) -> bool {
    v.mentions("network")
}

fn is_timeout(v: &ErrorView) -> bool {
    v.mentions("timeout") || v.io_timed_out
}

fn is_rate_limited(v: &ErrorView) -> bool {
    v.mentions("429") || v.mentions("rate limit")
}

fn is_unauthorized(v: &ErrorView) -> bool {
    v.mentions("401") || v.mentions("unauthorized")
}

/// Fallback for errors no rule recognises: retry, unless the failure is a
/// validation or programming error that would fail the same way again.
fn unknown_is_retryable(view: &ErrorView) -> bool {
    let looks_invalid = ["invalid", "validation", "serializ"]
        .iter()
        .any(|needle| view.mentions(needle));
    !(view.flagged_invalid || looks_invalid)
}

fn classify_view(view: &ErrorView) -> Classification {
    for (matches, kind) in RULES.iter() {
        if matches(view) {
            // Auth is the only recognised kind that is never worth retrying.
            return Classification::new(*kind, *kind != ErrorKind::Auth);
        }
    }
    Classification::new(ErrorKind::Unknown, unknown_is_retryable(view))
}

/// Classifies an error by its message and those of its sources.
pub fn classify(error: &(dyn StdError + 'static)) -> Classification {
    let mut view = ErrorView::default();
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);

    while let Some(err) = current {
        view.text.push_str(&err.to_string().to_lowercase());
        view.text.push('\n');

        if let Some(store) = err.downcast_ref::<StoreError>() {
            match store {
                StoreError::Serialization(_) | StoreError::Rejected(_) => view.flagged_invalid = true,
                _ => {}
            }
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                view.io_timed_out = true;
            }
        }

        current = err.source();
    }

    classify_view(&view)
}

pub fn classify_message(message: &str) -> Classification {
    classify_view(&ErrorView {
        text: message.to_lowercase(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_case_insensitively() {
        let cases = [
            ("Network unreachable", ErrorKind::Network, true),
            ("upstream TIMEOUT after 30s", ErrorKind::Timeout, true),
            ("HTTP 429", ErrorKind::RateLimit, true),
            ("Rate Limit exceeded", ErrorKind::RateLimit, true),
            ("401 from storage api", ErrorKind::Auth, false),
            ("Unauthorized", ErrorKind::Auth, false),
            ("disk on fire", ErrorKind::Unknown, true),
        ];
        for (message, kind, retryable) in cases {
            let c = classify_message(message);
            assert_eq!(c.kind, kind, "{}", message);
            assert_eq!(c.retryable, retryable, "{}", message);
        }
    }

    #[test]
    fn earlier_rules_take_priority() {
        assert_eq!(classify_message("network timeout").kind, ErrorKind::Network);
        assert_eq!(classify_message("timeout: 401").kind, ErrorKind::Timeout);
    }

    #[test]
    fn titles_are_fixed() {
        assert_eq!(classify_message("429").user_friendly_error.title, "Too Many Requests");
        assert_eq!(classify_message("???").user_friendly_error.title, "Something Went Wrong");
    }

    #[test]
    fn auth_offers_sign_in_instead_of_retry() {
        let c = classify_message("unauthorized");
        assert_eq!(c.user_friendly_error.action_label.as_deref(), Some("Sign In"));
    }

    #[test]
    fn rejected_store_writes_are_not_retried() {
        let c = classify(&StoreError::Rejected("quota policy".into()));
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(!c.retryable);
        assert_eq!(c.user_friendly_error.action_label, None);
    }

    #[test]
    fn io_timeouts_map_to_timeout() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert_eq!(classify(&err).kind, ErrorKind::Timeout);
    }

    #[test]
    fn plain_io_failures_are_retryable_unknowns() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::Other, "device busy"));
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(c.retryable);
    }

    #[test]
    fn source_chain_is_inspected() {
        let inner = anyhow::anyhow!("socket closed: network down");
        let outer = inner.context("loading world state");
        let c = classify(&*outer);
        assert_eq!(c.kind, ErrorKind::Network);
    }
}
