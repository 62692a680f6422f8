use std::fmt;

pub const SAVE_KEY_PREFIX: &str = "auto-save-";

/// `auto-save-{session_id}-{epoch_millis}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SaveKey {
    pub session_id: String,
    pub saved_at: u64,
}

impl SaveKey {
    pub fn new(session_id: &str, saved_at: u64) -> Self {
        Self {
            session_id: session_id.to_string(),
            saved_at,
        }
    }

    /// Prefix shared by every save of one session.
    pub fn session_prefix(session_id: &str) -> String {
        format!("{}{}-", SAVE_KEY_PREFIX, session_id)
    }

    /// Splits on the last `-`, so session ids may themselves contain dashes.
    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw.strip_prefix(SAVE_KEY_PREFIX)?;
        let (session_id, millis) = body.rsplit_once('-')?;
        if session_id.is_empty() {
            return None;
        }
        let saved_at = millis.parse().ok()?;
        Some(Self::new(session_id, saved_at))
    }
}

impl fmt::Display for SaveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", SAVE_KEY_PREFIX, self.session_id, self.saved_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_expected_pattern() {
        assert_eq!(SaveKey::new("s1", 1700000000123).to_string(), "auto-save-s1-1700000000123");
    }

    #[test]
    fn parses_dashed_session_ids() {
        let key = SaveKey::parse("auto-save-1b2c-dd-42").unwrap();
        assert_eq!(key.session_id, "1b2c-dd");
        assert_eq!(key.saved_at, 42);
    }

    #[test]
    fn rejects_foreign_keys() {
        assert_eq!(SaveKey::parse("settings"), None);
        assert_eq!(SaveKey::parse("auto-save-s1-notanumber"), None);
        assert_eq!(SaveKey::parse("auto-save--12"), None);
    }
}
