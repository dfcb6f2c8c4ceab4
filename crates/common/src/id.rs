//! Identifier, token, and code generation.

use rand::Rng;
use ulid::Ulid;
use uuid::Uuid;

/// Generator for row ids, bearer tokens, and verification codes.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lowercase ULID.
    ///
    /// Ids sort by creation time, which keeps `until_id` cursors meaningful.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque bearer token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Generate a six digit phone verification code.
    #[must_use]
    pub fn generate_verification_code(&self) -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_token() {
        let token = IdGenerator::new().generate_token();
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_verification_code_is_six_digits() {
        let id_gen = IdGenerator::new();
        for _ in 0..50 {
            let code = id_gen.generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
