use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

const SCHEME: &str = "pbkdf2-sha256";

/// Derived credential bytes: zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
struct DerivedKey([u8; HASH_LENGTH]);

impl DerivedKey {
    fn derive(secret: &str, salt: &[u8], iterations: u32) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut bytes);
        Self(bytes)
    }
}

/// Hash a plaintext credential into the stored form
/// `pbkdf2-sha256$<iterations>$<salt>$<hash>` (base64, unpadded).
pub fn hash_secret(secret: &str, iterations: u32) -> Result<String, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::InvalidIterations(iterations));
    }
    let salt = generate_salt();
    let key = DerivedKey::derive(secret, &salt, iterations);
    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(key.0)
    ))
}

/// Check `secret` against a stored hash in constant time.
/// The iteration count embedded in the hash is used, so older hashes keep
/// verifying after the configured cost changes.
pub fn verify_secret(secret: &str, stored: &str) -> Result<bool, CryptoError> {
    let parsed = ParsedHash::parse(stored)?;
    let key = DerivedKey::derive(secret, &parsed.salt, parsed.iterations);
    Ok(key.0[..].ct_eq(&parsed.hash[..]).into())
}

/// Burn the same work as a real verification. Used when no identity matched
/// so that unknown usernames cost as much as wrong credentials.
pub fn verify_against_nothing(secret: &str, iterations: u32) {
    let salt = [0u8; SALT_LENGTH];
    let _ = DerivedKey::derive(secret, &salt, iterations.max(1));
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Random signing secret, base64 encoded.
pub fn generate_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = STANDARD_NO_PAD.encode(bytes);
    bytes.zeroize();
    encoded
}

struct ParsedHash {
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Result<Self, CryptoError> {
        let mut parts = stored.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(CryptoError::MalformedHash);
        };
        if scheme != SCHEME {
            return Err(CryptoError::MalformedHash);
        }
        let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
        if iterations == 0 {
            return Err(CryptoError::MalformedHash);
        }
        let salt = STANDARD_NO_PAD
            .decode(salt)
            .map_err(|_| CryptoError::MalformedHash)?;
        let hash = STANDARD_NO_PAD
            .decode(hash)
            .map_err(|_| CryptoError::MalformedHash)?;
        if hash.len() != HASH_LENGTH {
            return Err(CryptoError::MalformedHash);
        }
        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn correct_secret_verifies() {
        let stored = hash_secret("doctor123", FAST).unwrap();
        assert!(verify_secret("doctor123", &stored).unwrap());
    }

    #[test]
    fn wrong_secret_fails() {
        let stored = hash_secret("doctor123", FAST).unwrap();
        assert!(!verify_secret("doctor124", &stored).unwrap());
    }

    #[test]
    fn same_secret_hashes_differently() {
        let a = hash_secret("nurse123", FAST).unwrap();
        let b = hash_secret("nurse123", FAST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn stored_form_embeds_cost() {
        let stored = hash_secret("x", FAST).unwrap();
        assert!(stored.starts_with("pbkdf2-sha256$1000$"));
        assert_eq!(stored.split('$').count(), 4);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        for bad in ["", "plain", "bcrypt$10$aa$bb", "pbkdf2-sha256$0$aa$bb", "pbkdf2-sha256$10$!!$bb"] {
            assert!(matches!(verify_secret("x", bad), Err(CryptoError::MalformedHash)), "{bad}");
        }
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(matches!(hash_secret("x", 0), Err(CryptoError::InvalidIterations(0))));
    }

    #[test]
    fn generated_secrets_are_random() {
        assert_ne!(generate_secret(), generate_secret());
        assert_ne!(generate_salt(), generate_salt());
    }
}
