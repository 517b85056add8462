use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// An app's signing credentials. Signatures on both the WebSocket
/// subscription path and the HTTP API path are HMAC-SHA-256 over the app
/// secret, transported as lowercase hex.
pub struct Token {
    pub key: String,
    secret: String,
}

impl Token {
    pub fn new(key: String, secret: String) -> Self {
        Self { key, secret }
    }

    /// Hex-encoded HMAC-SHA-256 of `data` under the app secret.
    pub fn sign(&self, data: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies a hex signature against `data`. Malformed hex fails
    /// verification; the comparison itself is constant-time.
    pub fn verify(&self, data: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        let expected = mac.finalize().into_bytes();

        secure_compare(&provided, &expected)
    }
}

/// Constant-time byte comparison. Unequal lengths return early, which leaks
/// only the length, never the content.
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }

    diff == 0
}
