//! Password hashing and verification across every token generation the store
//! has ever written.
//!
//! New hashes are always produced by the preferred scheme (Argon2id unless
//! configured otherwise, PBKDF2-HMAC-SHA256 as fallback). Verification walks a
//! fixed chain of [`TokenFormat`] detectors and lets the first one that
//! recognizes the token decide: Argon2, bcrypt, PBKDF2, then crypt(3).
//! Adding a generation means appending a detector.

use crate::error::{Error, Result};
use crate::utils::crypto;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 6;

const PBKDF2_PREFIX: &str = "pbkdf2_sha256";
const PBKDF2_DEFAULT_ITERATIONS: u32 = 390_000;
const PBKDF2_SALT_LEN: usize = 16;
const PBKDF2_KEY_LEN: usize = 32;
const PBKDF2_MAX_KEY_LEN: usize = 256;
/// Stored counts above this are treated as corrupt rather than computed.
const PBKDF2_MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Argon2,
    Pbkdf2,
}

impl FromStr for HashScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(HashScheme::Argon2),
            "pbkdf2" | "pbkdf2_sha256" => Ok(HashScheme::Pbkdf2),
            other => Err(format!("unknown hash scheme '{}'", other)),
        }
    }
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashScheme::Argon2 => f.write_str("argon2"),
            HashScheme::Pbkdf2 => f.write_str("pbkdf2"),
        }
    }
}

/// A self-describing credential token format.
pub trait TokenFormat: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognizes(&self, token: &str) -> bool;

    /// Never fails; malformed tokens simply do not verify.
    fn verify(&self, password: &str, token: &str) -> bool;
}

/// Argon2id PHC strings (`$argon2id$v=19$m=...`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Format;

impl Argon2Format {
    pub fn hash(&self, password: &str) -> Result<String> {
        crypto::hash_password(password)
            .map_err(|e| Error::Storage(format!("argon2 hashing failed: {}", e)))
    }
}

impl TokenFormat for Argon2Format {
    fn name(&self) -> &'static str {
        "argon2"
    }

    fn recognizes(&self, token: &str) -> bool {
        token.starts_with("$argon2")
    }

    fn verify(&self, password: &str, token: &str) -> bool {
        crypto::verify_password(password, token).unwrap_or(false)
    }
}

/// `pbkdf2_sha256$<iterations>$<b64 salt>$<b64 derived key>`
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Format {
    iterations: u32,
}

impl Default for Pbkdf2Format {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_DEFAULT_ITERATIONS,
        }
    }
}

impl Pbkdf2Format {
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = crypto::random_bytes(PBKDF2_SALT_LEN);
        let mut derived = [0u8; PBKDF2_KEY_LEN];
        crypto::pbkdf2_hmac_sha256(password.as_bytes(), &salt, self.iterations, &mut derived);

        Ok(format!(
            "{}${}${}${}",
            PBKDF2_PREFIX,
            self.iterations,
            BASE64.encode(salt),
            BASE64.encode(derived)
        ))
    }

    fn decode(token: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
        let mut parts = token.splitn(4, '$');
        if parts.next()? != PBKDF2_PREFIX {
            return None;
        }
        let iterations: u32 = parts
            .next()?
            .parse()
            .ok()
            .filter(|n| (1..=PBKDF2_MAX_ITERATIONS).contains(n))?;
        let salt = BASE64.decode(parts.next()?).ok()?;
        let derived = BASE64.decode(parts.next()?).ok()?;
        if derived.is_empty() || derived.len() > PBKDF2_MAX_KEY_LEN {
            return None;
        }
        Some((iterations, salt, derived))
    }
}

impl TokenFormat for Pbkdf2Format {
    fn name(&self) -> &'static str {
        PBKDF2_PREFIX
    }

    fn recognizes(&self, token: &str) -> bool {
        token
            .strip_prefix(PBKDF2_PREFIX)
            .is_some_and(|rest| rest.starts_with('$'))
    }

    fn verify(&self, password: &str, token: &str) -> bool {
        let Some((iterations, salt, expected)) = Self::decode(token) else {
            return false;
        };
        let mut candidate = vec![0u8; expected.len()];
        crypto::pbkdf2_hmac_sha256(password.as_bytes(), &salt, iterations, &mut candidate);
        crypto::constant_time_eq(&candidate, &expected)
    }
}

/// bcrypt tokens (`$2a$`, `$2b$`, `$2y$`) from the generation before Argon2.
/// Only ever verified, never produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptFormat;

impl TokenFormat for BcryptFormat {
    fn name(&self) -> &'static str {
        "bcrypt"
    }

    fn recognizes(&self, token: &str) -> bool {
        token.starts_with("$2")
    }

    fn verify(&self, password: &str, token: &str) -> bool {
        bcrypt::verify(password, token).unwrap_or(false)
    }
}

/// Pre-upgrade crypt(3) tokens such as `$1$` md5-crypt and `$5$`/`$6$`
/// sha-crypt. Only ever verified, never produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptFormat;

impl TokenFormat for CryptFormat {
    fn name(&self) -> &'static str {
        "crypt"
    }

    fn recognizes(&self, token: &str) -> bool {
        token.starts_with('$')
    }

    fn verify(&self, password: &str, token: &str) -> bool {
        match pwhash::unix::crypt(password, token) {
            Ok(computed) => crypto::constant_time_eq(computed.as_bytes(), token.as_bytes()),
            Err(_) => false,
        }
    }
}

#[derive(Clone)]
pub struct CredentialService {
    preferred: HashScheme,
    argon2: Argon2Format,
    pbkdf2: Pbkdf2Format,
    formats: Arc<Vec<Box<dyn TokenFormat>>>,
}

impl CredentialService {
    pub fn new(preferred: HashScheme) -> Self {
        Self::with_pbkdf2(preferred, Pbkdf2Format::default())
    }

    pub fn with_pbkdf2(preferred: HashScheme, pbkdf2: Pbkdf2Format) -> Self {
        let formats: Vec<Box<dyn TokenFormat>> = vec![
            Box::new(Argon2Format),
            Box::new(BcryptFormat),
            Box::new(pbkdf2),
            Box::new(CryptFormat),
        ];
        Self {
            preferred,
            argon2: Argon2Format,
            pbkdf2,
            formats: Arc::new(formats),
        }
    }

    pub fn preferred(&self) -> HashScheme {
        self.preferred
    }

    /// Hashes a trimmed password with the strongest scheme available.
    pub fn hash(&self, password: &str) -> Result<String> {
        let password = password.trim();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        match self.preferred {
            HashScheme::Argon2 => match self.argon2.hash(password) {
                Ok(token) => Ok(token),
                Err(e) => {
                    tracing::warn!("Argon2 unavailable, falling back to PBKDF2: {}", e);
                    self.pbkdf2.hash(password)
                }
            },
            HashScheme::Pbkdf2 => self.pbkdf2.hash(password),
        }
    }

    pub fn verify(&self, password: &str, token: &str) -> bool {
        let password = password.trim();
        let token = token.trim();
        if password.is_empty() || token.is_empty() {
            return false;
        }

        match self.formats.iter().find(|f| f.recognizes(token)) {
            Some(format) => {
                tracing::debug!(format = format.name(), "Verifying credential token");
                format.verify(password, token)
            }
            None => false,
        }
    }
}

impl fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialService")
            .field("preferred", &self.preferred)
            .field(
                "formats",
                &self.formats.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_pbkdf2(preferred: HashScheme) -> CredentialService {
        CredentialService::with_pbkdf2(preferred, Pbkdf2Format::with_iterations(1_000))
    }

    #[test]
    fn short_password_is_rejected_after_trimming() {
        let service = fast_pbkdf2(HashScheme::Pbkdf2);
        let err = service.hash("  abcde   ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(service.hash("abcdef").is_ok());
    }

    #[test]
    fn argon2_tokens_verify_and_reject() {
        let service = CredentialService::new(HashScheme::Argon2);
        let token = service.hash("abcdef").unwrap();
        assert!(token.starts_with("$argon2id$"));
        assert!(service.verify("abcdef", &token));
        assert!(service.verify(" abcdef ", &token));
        assert!(!service.verify("wrong1", &token));
    }

    #[test]
    fn pbkdf2_tokens_are_self_describing() {
        let service = fast_pbkdf2(HashScheme::Pbkdf2);
        let token = service.hash("segura123").unwrap();

        let parts: Vec<&str> = token.split('$').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "pbkdf2_sha256");
        assert_eq!(parts[1], "1000");

        // Verification reads the iteration count from the token itself.
        let default_engine = CredentialService::new(HashScheme::Argon2);
        assert!(default_engine.verify("segura123", &token));
        assert!(!default_engine.verify("segura124", &token));
    }

    #[test]
    fn salts_are_random_per_hash() {
        let service = fast_pbkdf2(HashScheme::Pbkdf2);
        let a = service.hash("abcdef").unwrap();
        let b = service.hash("abcdef").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bcrypt_tokens_verify() {
        let service = fast_pbkdf2(HashScheme::Argon2);

        // crypt_blowfish reference vector.
        let reference = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
        assert!(service.verify("U*U", reference));
        assert!(!service.verify("U*V", reference));

        let token = bcrypt::hash("segura123", 4).unwrap();
        assert!(token.starts_with("$2"));
        assert!(service.verify("segura123", &token));
        assert!(service.verify(" segura123 ", &token));
        assert!(!service.verify("segura124", &token));
    }

    #[test]
    fn crypt_tokens_verify() {
        let service = fast_pbkdf2(HashScheme::Argon2);

        // Reference sha512-crypt vector.
        let sha512 = "$6$saltstring$svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1";
        assert!(service.verify("Hello world!", sha512));
        assert!(!service.verify("Hello world?", sha512));

        let md5 = pwhash::md5_crypt::hash("antiga1").unwrap();
        assert!(md5.starts_with("$1$"));
        assert!(service.verify("antiga1", &md5));
        assert!(!service.verify("antiga2", &md5));
    }

    #[test]
    fn excessive_iteration_counts_are_refused() {
        let service = fast_pbkdf2(HashScheme::Argon2);
        let token = service.hash("segura123").unwrap();
        let parts: Vec<&str> = token.split('$').collect();

        let inflated = format!("pbkdf2_sha256${}${}${}", u32::MAX, parts[2], parts[3]);
        assert!(!service.verify("segura123", &inflated));
        let over_cap = format!("pbkdf2_sha256$10000001${}${}", parts[2], parts[3]);
        assert!(!service.verify("segura123", &over_cap));
    }

    #[test]
    fn malformed_or_unknown_tokens_never_verify() {
        let service = fast_pbkdf2(HashScheme::Argon2);
        for token in [
            "",
            "plaintext",
            "$argon2id$garbage",
            "pbkdf2_sha256$0$c2FsdA==$ZGVyaXZlZA==",
            "pbkdf2_sha256$abc$c2FsdA==$ZGVyaXZlZA==",
            "pbkdf2_sha256$10$***$ZGVyaXZlZA==",
            "pbkdf2_sha256$10$c2FsdA==",
            "sha256$salt$deadbeef",
            "$2b$12$not-a-bcrypt-token",
            "$",
            "$9$unknown$scheme",
        ] {
            assert!(!service.verify("abcdef", token), "token {:?} verified", token);
        }
        assert!(!service.verify("", "$2b$04$aaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn scheme_parses_from_config_values() {
        assert_eq!("argon2".parse::<HashScheme>().unwrap(), HashScheme::Argon2);
        assert_eq!(" PBKDF2 ".parse::<HashScheme>().unwrap(), HashScheme::Pbkdf2);
        assert!("bcrypt".parse::<HashScheme>().is_err());
    }
}
