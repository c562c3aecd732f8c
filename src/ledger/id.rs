//! Certificate identifier generation
//!
//! IDs are `CERT-` followed by 10 uppercase hex characters. Generation is
//! side-effect-free; the ledger re-checks uniqueness against the store and
//! regenerates once on collision.

use rand::RngCore;

/// Generate a fresh candidate certificate ID
pub fn generate_certificate_id() -> String {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("CERT-{}", hex::encode(bytes).to_uppercase())
}

/// Normalize a caller-supplied certificate ID (trim, uppercase)
pub fn normalize_certificate_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let id = generate_certificate_id();
        assert!(id.starts_with("CERT-"));
        let suffix = id.strip_prefix("CERT-").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        // Not a uniqueness proof, but catches a constant generator
        let a = generate_certificate_id();
        let b = generate_certificate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_certificate_id("  cert-abc123 "), "CERT-ABC123");
        assert_eq!(normalize_certificate_id("CERT-FF00AA11BB"), "CERT-FF00AA11BB");
    }
}
