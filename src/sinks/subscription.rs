use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::token::Token;

/// Receives the masked token value and its effective expiry (UNIX seconds).
pub type TokenCallback = Arc<dyn Fn(&str, i64) + Send + Sync>;

/// Single notification slot, called synchronously after each token install.
#[derive(Clone, Default)]
pub struct Subscription {
    callback: Option<TokenCallback>,
    prefix_len: usize,
}

impl Subscription {
    pub fn new(prefix_len: usize) -> Self {
        Self { callback: None, prefix_len }
    }

    /// Registers the handler, replacing any previous one.
    pub fn set<F>(&mut self, callback: F)
    where
        F: Fn(&str, i64) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    pub fn is_set(&self) -> bool {
        self.callback.is_some()
    }

    pub fn notify(&self, token: &Token) {
        if let Some(callback) = &self.callback {
            debug!("notifying token subscriber");
            callback(&token.masked(self.prefix_len), token.expires_at);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("registered", &self.is_set())
            .field("prefix_len", &self.prefix_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn empty_slot_is_a_no_op() {
        let subscription = Subscription::new(6);
        assert!(!subscription.is_set());
        subscription.notify(&Token::new("secret-value".into(), 10));
    }

    #[test]
    fn callback_gets_masked_value_only() {
        let seen: Arc<Mutex<Vec<(String, i64)>>> = Arc::default();
        let sink = seen.clone();
        let mut subscription = Subscription::new(6);
        subscription.set(move |masked, expires_at| {
            sink.lock().unwrap().push((masked.to_owned(), expires_at));
        });

        for value in ["ab", "abcdef", "abcdefghijklmnopqrstuvwxyz"] {
            subscription.notify(&Token::new(value.into(), 42));
        }

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("ab****".to_owned(), 42),
                ("abcdef****".to_owned(), 42),
                ("abcdef****".to_owned(), 42),
            ]
        );
    }
}
