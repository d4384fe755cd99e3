//! Prefixed identifier minting
//!
//! Identifiers look like `mem_4fZk9Qw1xR7p`: a short prefix naming the
//! entity kind, an underscore, and random base62 characters. The random
//! source is the thread RNG, which is cryptographically seeded; collisions
//! are astronomically unlikely and surface as primary-key violations.

use rand::Rng;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Default number of random characters per identifier
pub const ID_LENGTH: usize = 12;

/// Mint an identifier with the given prefix and `ID_LENGTH` random chars
pub fn mint(prefix: &str) -> String {
    mint_with_len(prefix, ID_LENGTH)
}

/// Mint an identifier with an explicit random-character count
pub fn mint_with_len(prefix: &str, len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);

    let mut out = String::with_capacity(prefix.len() + 1 + len);
    out.push_str(prefix);
    out.push('_');
    for b in bytes {
        out.push(ALPHABET[(b % 62) as usize] as char);
    }
    out
}

/// Mint a memory identifier (`mem_…`)
pub fn memory_id() -> String {
    mint("mem")
}

/// Mint a chunk identifier (`ch_…`)
pub fn chunk_id() -> String {
    mint("ch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mint_shape() {
        let id = memory_id();
        assert!(id.starts_with("mem_"));
        assert_eq!(id.len(), 4 + ID_LENGTH);
        assert!(id[4..].bytes().all(|b| b.is_ascii_alphanumeric()));

        let id = chunk_id();
        assert!(id.starts_with("ch_"));
        assert_eq!(id.len(), 3 + ID_LENGTH);
    }

    #[test]
    fn test_mint_custom_length() {
        let id = mint_with_len("x", 4);
        assert_eq!(id.len(), 6);
        assert!(id.starts_with("x_"));
    }

    #[test]
    fn test_mint_uniqueness() {
        let ids: HashSet<String> = (0..10_000).map(|_| memory_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
