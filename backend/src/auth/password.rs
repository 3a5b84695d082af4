//! bcrypt password hashes in the modular crypt format (`$2b$<cost>$...`).

use bcrypt::BcryptError;

#[cfg(not(test))]
const COST: u32 = bcrypt::DEFAULT_COST;
// lowest cost bcrypt accepts
#[cfg(test)]
const COST: u32 = 4;

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, COST)
}

/// Unparseable stored hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or_else(|e| {
        log::warn!("Stored password hash is unusable: {}", e);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_its_password() {
        let stored = hash_password("StrongP@ssw0rd").unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(verify_password("StrongP@ssw0rd", &stored));
        assert!(!verify_password("strongp@ssw0rd", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let (a, b) = (hash_password("same").unwrap(), hash_password("same").unwrap());
        assert_ne!(a, b);
        assert!(verify_password("same", &a) && verify_password("same", &b));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in ["", "plain", "$2b$04$short", "sha256$1$00$00"] {
            assert!(!verify_password("anything", stored), "{}", stored);
        }
    }
}
