//! Password credentials: PBKDF2-SHA256 hashing, verification and the
//! strength policy applied at registration.
//!
//! Stored form: `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const SCHEME: &str = "pbkdf2_sha256";

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "11111111", "abc12345", "letmein1",
    "welcome1", "admin123", "football", "baseball", "sunshine", "princess",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Stored password hash is malformed")]
    MalformedHash,
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt();
    let mut hash = derive(password, &salt, PBKDF2_ITERATIONS);
    let encoded = format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    );
    hash.zeroize();
    encoded
}

/// Check `password` against a stored hash, in constant time.
///
/// The iteration count is read from the stored value, so hashes made with
/// an older count keep verifying.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::MalformedHash);
    };
    if scheme != SCHEME {
        return Err(PasswordError::MalformedHash);
    }
    let iterations: u32 = iterations
        .parse()
        .map_err(|_| PasswordError::MalformedHash)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| PasswordError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(hash)
        .map_err(|_| PasswordError::MalformedHash)?;
    if expected.len() != HASH_LENGTH || iterations == 0 {
        return Err(PasswordError::MalformedHash);
    }

    let mut candidate = derive(password, &salt, iterations);
    let matches: bool = candidate.as_slice().ct_eq(expected.as_slice()).into();
    candidate.zeroize();
    Ok(matches)
}

/// Reasons `password` is too weak; empty when acceptable.
pub fn password_problems(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();

    if username.chars().count() >= 3 && lowered.contains(&username.to_lowercase()) {
        problems.push("The password is too similar to the username.".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("correct horse battery");
        assert!(stored.starts_with("pbkdf2_sha256$"));
        assert!(verify_password("correct horse battery", &stored).unwrap());
        assert!(!verify_password("wrong horse battery", &stored).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        assert_ne!(hash_password("same-password"), hash_password("same-password"));
    }

    #[test]
    fn malformed_hashes_are_rejected() {
        assert_eq!(verify_password("x", "plain"), Err(PasswordError::MalformedHash));
        assert_eq!(
            verify_password("x", "md5$1$AAAA$AAAA"),
            Err(PasswordError::MalformedHash)
        );
        assert_eq!(
            verify_password("x", "pbkdf2_sha256$ten$AAAA$AAAA"),
            Err(PasswordError::MalformedHash)
        );
    }

    #[test]
    fn stored_iteration_count_is_honoured() {
        let salt = [7u8; SALT_LENGTH];
        let hash = derive("pw-with-old-cost", &salt, 10);
        let stored = format!(
            "pbkdf2_sha256$10${}${}",
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(hash)
        );
        assert!(verify_password("pw-with-old-cost", &stored).unwrap());
    }

    #[test]
    fn policy_flags_weak_passwords() {
        assert!(password_problems("Str0ng-enough!", "ada").is_empty());
        assert_eq!(password_problems("short1A", "").len(), 1);
        let numeric = password_problems("20240615", "");
        assert!(numeric.iter().any(|p| p.contains("entirely numeric")));
        assert!(password_problems("Password", "").iter().any(|p| p.contains("too common")));
        assert!(password_problems("ada-lovelace-1815", "lovelace")
            .iter()
            .any(|p| p.contains("similar")));
    }
}
