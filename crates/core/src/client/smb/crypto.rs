//! Hash primitives for NTLM authentication and SMB2 signing.

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use sha2::Sha256;

use crate::client::ClientError;

type HmacMd5 = Hmac<Md5>;
type HmacSha256 = Hmac<Sha256>;

/// MD4 (RFC 1320). Only used to derive the NT hash of a password.
pub fn md4(input: &[u8]) -> [u8; 16] {
    Md4::digest(input).into()
}

/// HMAC-MD5 (RFC 2104).
pub fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// HMAC-SHA256 truncated to the 16-byte SMB2 signature.
pub fn smb2_signature(key: &[u8], message: &[u8]) -> Result<[u8; 16], ClientError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| ClientError::Protocol("invalid signing key length".to_string()))?;
    mac.update(message);
    let digest = mac.finalize().into_bytes();
    let mut signature = [0u8; 16];
    signature.copy_from_slice(&digest[..16]);
    Ok(signature)
}

pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// NT one-way function: MD4 of the UTF-16LE password.
pub fn nt_hash(password: &str) -> [u8; 16] {
    md4(&utf16le(password))
}
