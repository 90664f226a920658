
pub const TOKEN_VALUE_STUB: &'static str  = "";
pub const MASK_SUFFIX: &'static str = "****";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// UNIX TIMESTAMP, already reduced by the safety margin
    pub expires_at: i64,
}

impl Token {
    pub fn new(value: String, expires_at: i64) -> Self {
        Self { value, expires_at }
    }

    /// "No token held" sentinel
    pub fn empty() -> Self {
        Self::new(TOKEN_VALUE_STUB.to_owned(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.value == TOKEN_VALUE_STUB
    }

    /// `now == expires_at` is already stale
    pub fn is_fresh(&self, now: i64) -> bool {
        !self.is_empty() && now < self.expires_at
    }

    pub fn masked(&self, prefix_len: usize) -> String {
        mask_token(&self.value, prefix_len)
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::empty()
    }
}

/// Keep only the first `prefix_len` characters of a credential.
pub fn mask_token(value: &str, prefix_len: usize) -> String {
    let prefix: String = value.chars().take(prefix_len).collect();
    format!("{}{}", prefix, MASK_SUFFIX)
}
