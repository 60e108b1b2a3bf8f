use sha2::{Digest, Sha256};

// No 0/O or 1/I so tokens survive being read aloud or written down.
#[cfg(test)]
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
#[cfg(test)]
const TOKEN_LEN: usize = 6;

/// Exams arrive with their token hash already set; generation is only
/// needed by fixtures.
#[cfg(test)]
pub(crate) fn generate_join_token() -> String {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let mut output = String::with_capacity(TOKEN_LEN);
    for _ in 0..TOKEN_LEN {
        let index = rng.gen_range(0..ALPHABET.len());
        output.push(ALPHABET[index] as char);
    }
    output
}

/// Exams store only the hash; join requests are matched by hashing the
/// presented token. Lookup is case-insensitive.
pub(crate) fn hash_join_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().to_ascii_uppercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_use_unambiguous_alphabet() {
        let token = generate_join_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn hash_is_case_and_whitespace_insensitive() {
        assert_eq!(hash_join_token("a1b2c3"), hash_join_token(" A1B2C3 "));
        assert_ne!(hash_join_token("A1B2C3"), hash_join_token("A1B2C4"));
    }
}
