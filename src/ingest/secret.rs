use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The single process-wide credential devices present when submitting.
///
/// Comparison goes through HMAC-SHA256 tags so that `verify` runs in
/// constant time regardless of where the presented value first differs.
/// The raw value never appears in `Debug` output.
#[derive(Clone)]
pub struct SharedSecret {
    secret: String,
    tag: Vec<u8>,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let tag = tag_for(&secret, &secret);
        Self { secret, tag }
    }

    /// True when `presented` is exactly the shared secret.
    pub fn verify(&self, presented: &str) -> bool {
        mac_for(&self.secret)
            .chain_update(presented.as_bytes())
            .verify_slice(&self.tag)
            .is_ok()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

fn mac_for(key: &str) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length")
}

fn tag_for(key: &str, message: &str) -> Vec<u8> {
    mac_for(key)
        .chain_update(message.as_bytes())
        .finalize()
        .into_bytes()
        .to_vec()
}
