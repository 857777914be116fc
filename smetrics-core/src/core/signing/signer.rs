use std::fmt::{Debug, Formatter};

use constant_time_eq::constant_time_eq;
use log::trace;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;
use ring::hmac;

use crate::core::signing;

/// Generates and verifies the keyed signatures of metric payloads.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Signer: Debug + Send + Sync {
    /// Generate the lowercase hex signature of the given input.
    fn generate(&self, input: &str) -> signing::Result<String>;

    /// Verify if both hex signatures are equal.
    ///
    /// It returns `false` when either of the signatures isn't valid hex.
    fn equal(&self, signature1: &str, signature2: &str) -> bool;
}

/// A [Signer] which uses HMAC-SHA256 with a shared secret key.
pub struct HmacSigner {
    key: hmac::Key,
}

impl HmacSigner {
    pub fn new(key: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes()),
        }
    }
}

impl Signer for HmacSigner {
    fn generate(&self, input: &str) -> signing::Result<String> {
        trace!("Generating signature for {}", input);
        let tag = hmac::sign(&self.key, input.as_bytes());
        Ok(hex::encode(tag.as_ref()))
    }

    fn equal(&self, signature1: &str, signature2: &str) -> bool {
        match (hex::decode(signature1), hex::decode(signature2)) {
            (Ok(mac1), Ok(mac2)) => constant_time_eq(mac1.as_slice(), mac2.as_slice()),
            _ => false,
        }
    }
}

impl Debug for HmacSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("algorithm", &"HMAC-SHA256")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let signer = HmacSigner::new("k");

        let result = signer.generate("temp:gauge:37.100000").unwrap();

        assert_eq!(
            "f78548f78fe0222966960888093f1d61c261454f6af20271e8acd3f6753e4fcf",
            result
        );
    }

    #[test]
    fn test_generate_depends_on_key() {
        let input = "requests:counter:5";

        let result1 = HmacSigner::new("k").generate(input).unwrap();
        let result2 = HmacSigner::new("other").generate(input).unwrap();

        assert_eq!(
            "ff5425e438422b09b06ff3a6c08e972510c429bd063ec86c98036ea27ebe6a94",
            result1
        );
        assert_ne!(result1, result2);
    }

    #[test]
    fn test_equal() {
        let signer = HmacSigner::new("secret");
        let signature = signer.generate("PollCount:counter:1").unwrap();

        assert!(signer.equal(&signature, &signer.generate("PollCount:counter:1").unwrap()));
        assert!(signer.equal(&signature, &signature.to_uppercase()));
        assert!(!signer.equal(&signature, &signer.generate("PollCount:counter:2").unwrap()));
    }

    #[test]
    fn test_equal_invalid_hex() {
        let signer = HmacSigner::new("secret");
        let signature = signer.generate("PollCount:counter:1").unwrap();

        assert!(!signer.equal(&signature, "lorem"));
        assert!(!signer.equal("zz", "zz"));
        assert!(!signer.equal(&signature, ""));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = HmacSigner::new("my-secret-key");

        let result = format!("{:?}", signer);

        assert!(!result.contains("my-secret-key"));
    }
}
