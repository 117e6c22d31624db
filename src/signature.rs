use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";

pub fn sign(private_key: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(private_key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify(private_key: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(provided) = signature.map(str::trim) else {
        return false;
    };
    let expected = sign(private_key, body);
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .as_bytes()
        .ct_eq(provided.to_ascii_lowercase().as_bytes())
        .into()
}
