//! Continuation token codec for paginated pulls.

use crate::error::{ProtocolError, ProtocolResult};

/// A pagination cursor over the change log.
///
/// Encodes the `(version, entry id)` of the last row a pull page returned.
/// Entries are ordered by that tuple, so resuming strictly after it is
/// deterministic even when several entries share a version. The wire form is
/// `"{version}:{id}"` and is opaque to clients; it must round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContinuationToken {
    /// Version of the last returned entry.
    pub version: u64,
    /// Log id of the last returned entry.
    pub entry_id: u64,
}

impl ContinuationToken {
    /// Creates a token for the last row of a page.
    pub fn new(version: u64, entry_id: u64) -> Self {
        Self { version, entry_id }
    }

    /// Encodes to the wire form.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.version, self.entry_id)
    }

    /// Decodes from the wire form.
    ///
    /// Both parts must be well-formed unsigned integers.
    pub fn decode(s: &str) -> ProtocolResult<Self> {
        let (version, entry_id) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedToken(s.into()))?;
        let version = version
            .parse()
            .map_err(|_| ProtocolError::MalformedToken(s.into()))?;
        let entry_id = entry_id
            .parse()
            .map_err(|_| ProtocolError::MalformedToken(s.into()))?;
        Ok(Self { version, entry_id })
    }
}

impl std::fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.version, self.entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_decode() {
        let token = ContinuationToken::new(17, 230);
        assert_eq!(token.encode(), "17:230");
        assert_eq!(ContinuationToken::decode("17:230").unwrap(), token);
    }

    #[test]
    fn malformed_tokens_rejected() {
        for bad in ["", "17", "17:", ":230", "a:b", "17:230:4", "-1:2"] {
            assert!(
                ContinuationToken::decode(bad).is_err(),
                "accepted malformed token {bad:?}"
            );
        }
    }

    #[test]
    fn tuple_ordering() {
        // Same version orders by entry id, the pagination tiebreaker.
        assert!(ContinuationToken::new(5, 10) < ContinuationToken::new(5, 11));
        assert!(ContinuationToken::new(5, 999) < ContinuationToken::new(6, 0));
    }

    proptest! {
        #[test]
        fn round_trips_exactly(version in any::<u64>(), entry_id in any::<u64>()) {
            let token = ContinuationToken::new(version, entry_id);
            let decoded = ContinuationToken::decode(&token.encode()).unwrap();
            prop_assert_eq!(decoded, token);
        }
    }
}
