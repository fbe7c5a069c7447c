use std::collections::HashMap;

pub const INVITE_CODE_KEY: &str = "inviteCode";
pub const USERNAME_KEY: &str = "username";
pub const QUIZ_DRAFT_KEY: &str = "quiz_draft";

/// Browser storage as the flows see it: a tab-scoped session area and a
/// persistent local area.
#[derive(Debug, Clone, Default)]
pub struct ClientStorage {
    session: HashMap<String, String>,
    local: HashMap<String, String>,
}

impl ClientStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session(&mut self, key: &str, value: impl Into<String>) {
        self.session.insert(key.to_string(), value.into());
    }

    pub fn set_local(&mut self, key: &str, value: impl Into<String>) {
        self.local.insert(key.to_string(), value.into());
    }

    /// Session value first, then local.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.session
            .get(key)
            .or_else(|| self.local.get(key))
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) {
        self.session.remove(key);
        self.local.remove(key);
    }

    pub fn invite_code(&self) -> Option<&str> {
        self.get(INVITE_CODE_KEY)
    }

    /// Remembers the active quiz in both areas.
    pub fn remember_invite_code(&mut self, code: &str) {
        self.set_session(INVITE_CODE_KEY, code);
        self.set_local(INVITE_CODE_KEY, code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_value_shadows_local() {
        let mut storage = ClientStorage::new();
        storage.set_local(USERNAME_KEY, "old");
        assert_eq!(storage.get(USERNAME_KEY), Some("old"));

        storage.set_session(USERNAME_KEY, "new");
        assert_eq!(storage.get(USERNAME_KEY), Some("new"));

        storage.remove(USERNAME_KEY);
        assert_eq!(storage.get(USERNAME_KEY), None);
    }
}
