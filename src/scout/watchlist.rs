use std::collections::HashSet;

/// Membership test over the configured token watchlist.
/// An empty watchlist admits every token.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    tokens: HashSet<String>,
}

impl Watchlist {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_watched(&self, token_address: &str) -> bool {
        is_watched(token_address, &self.tokens)
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub fn is_watched(token_address: &str, watchlist: &HashSet<String>) -> bool {
    watchlist.is_empty() || watchlist.contains(token_address)
}
