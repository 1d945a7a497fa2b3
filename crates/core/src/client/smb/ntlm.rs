//! NTLMv2 authentication messages wrapped in SPNEGO tokens.

use super::crypto::{hmac_md5, nt_hash, utf16le};
use crate::client::ClientError;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_SIGN: u32 = 0x0000_0010;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const CLIENT_FLAGS: u32 = NEGOTIATE_UNICODE
    | REQUEST_TARGET
    | NEGOTIATE_SIGN
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_TARGET_INFO
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// AV pair id carrying the server's FILETIME.
const MSV_AV_TIMESTAMP: u16 = 7;
const MSV_AV_EOL: u16 = 0;

const SPNEGO_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x05, 0x05, 0x02];
const NTLMSSP_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];

/// Account used for a session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// `DOMAIN\user` splits into domain and user. An empty username logs in
    /// as guest.
    pub fn new(username: &str, password: &str) -> Self {
        if username.is_empty() {
            return Self::guest();
        }
        let (domain, user) = match username.split_once('\\') {
            Some((domain, user)) => (domain.to_string(), user.to_string()),
            None => (String::new(), username.to_string()),
        };
        Self {
            domain,
            username: user,
            password: password.to_string(),
        }
    }

    pub fn guest() -> Self {
        Self {
            domain: String::new(),
            username: "GUEST".to_string(),
            password: String::new(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.username.eq_ignore_ascii_case("guest")
    }
}

/// Fields of an NTLM CHALLENGE message that the response depends on.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl Challenge {
    /// Locate and parse the CHALLENGE inside a SPNEGO token.
    pub fn from_token(token: &[u8]) -> Result<Self, ClientError> {
        let start = token
            .windows(SIGNATURE.len())
            .position(|w| w == SIGNATURE)
            .ok_or_else(|| ClientError::Protocol("no NTLMSSP challenge in token".to_string()))?;
        let msg = &token[start..];

        if msg.len() < 48 || le_u32(msg, 8)? != 2 {
            return Err(ClientError::Protocol(
                "malformed NTLM challenge message".to_string(),
            ));
        }

        let flags = le_u32(msg, 20)?;
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&msg[24..32]);

        let info_len = le_u16(msg, 40)? as usize;
        let info_offset = le_u32(msg, 44)? as usize;
        let target_info = msg
            .get(info_offset..info_offset + info_len)
            .ok_or_else(|| ClientError::Protocol("NTLM target info out of bounds".to_string()))?
            .to_vec();

        Ok(Self {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// Server FILETIME from the target info, if advertised.
    pub fn timestamp(&self) -> Option<u64> {
        let info = &self.target_info;
        let mut pos = 0;
        while pos + 4 <= info.len() {
            let id = u16::from_le_bytes([info[pos], info[pos + 1]]);
            let len = u16::from_le_bytes([info[pos + 2], info[pos + 3]]) as usize;
            pos += 4;
            if id == MSV_AV_EOL {
                break;
            }
            if id == MSV_AV_TIMESTAMP && len == 8 && pos + 8 <= info.len() {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&info[pos..pos + 8]);
                return Some(u64::from_le_bytes(raw));
            }
            pos += len;
        }
        None
    }
}

/// NTLMv2 responses and the session key they yield.
#[derive(Debug, Clone)]
pub struct Ntlmv2Response {
    pub lm_response: Vec<u8>,
    pub nt_response: Vec<u8>,
    pub session_base_key: [u8; 16],
}

/// NTOWFv2: HMAC-MD5 keyed by the NT hash over `UPPER(user) + domain`.
pub fn ntowf_v2(credentials: &Credentials) -> [u8; 16] {
    let identity = format!(
        "{}{}",
        credentials.username.to_uppercase(),
        credentials.domain
    );
    hmac_md5(&nt_hash(&credentials.password), &utf16le(&identity))
}

/// Compute the LMv2 and NTLMv2 responses for a challenge.
pub fn compute_response(
    credentials: &Credentials,
    challenge: &Challenge,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Ntlmv2Response {
    let key = ntowf_v2(credentials);

    let mut blob = Vec::with_capacity(28 + challenge.target_info.len() + 4);
    blob.extend_from_slice(&[0x01, 0x01, 0, 0, 0, 0, 0, 0]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0; 4]);

    let mut proof_input = challenge.server_challenge.to_vec();
    proof_input.extend_from_slice(&blob);
    let nt_proof = hmac_md5(&key, &proof_input);

    let mut nt_response = nt_proof.to_vec();
    nt_response.extend_from_slice(&blob);

    // With a server timestamp the LM response must be zeroed.
    let lm_response = if challenge.timestamp().is_some() {
        vec![0; 24]
    } else {
        let mut lm_input = challenge.server_challenge.to_vec();
        lm_input.extend_from_slice(&client_challenge);
        let mut lm = hmac_md5(&key, &lm_input).to_vec();
        lm.extend_from_slice(&client_challenge);
        lm
    };

    Ntlmv2Response {
        lm_response,
        nt_response,
        session_base_key: hmac_md5(&key, &nt_proof),
    }
}

/// NEGOTIATE message (no domain, workstation or version).
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
    msg.extend_from_slice(&[0; 16]);
    msg
}

/// AUTHENTICATE message carrying the computed responses.
pub fn authenticate_message(
    credentials: &Credentials,
    challenge: &Challenge,
    response: &Ntlmv2Response,
    workstation: &str,
) -> Vec<u8> {
    const HEADER_LEN: usize = 64;

    let domain = utf16le(&credentials.domain);
    let user = utf16le(&credentials.username);
    let workstation = utf16le(workstation);
    let fields: [&[u8]; 6] = [
        &response.lm_response,
        &response.nt_response,
        &domain,
        &user,
        &workstation,
        &[],
    ];

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&3u32.to_le_bytes());

    let mut payload = Vec::new();
    for field in fields {
        let offset = (HEADER_LEN + payload.len()) as u32;
        header.extend_from_slice(&(field.len() as u16).to_le_bytes());
        header.extend_from_slice(&(field.len() as u16).to_le_bytes());
        header.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(field);
    }
    header.extend_from_slice(&(challenge.flags & CLIENT_FLAGS).to_le_bytes());

    header.extend_from_slice(&payload);
    header
}

/// DER tag-length-value.
fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = content.len();
    let mut out = vec![tag];
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

/// SPNEGO NegTokenInit offering NTLMSSP with an embedded NEGOTIATE.
pub fn spnego_init(ntlm_negotiate: &[u8]) -> Vec<u8> {
    let mech_types = der(0xa0, &der(0x30, &der(0x06, NTLMSSP_OID)));
    let mech_token = der(0xa2, &der(0x04, ntlm_negotiate));
    let neg_token_init = der(0xa0, &der(0x30, &[mech_types, mech_token].concat()));
    der(0x60, &[der(0x06, SPNEGO_OID), neg_token_init].concat())
}

/// SPNEGO NegTokenResp carrying the AUTHENTICATE message.
pub fn spnego_response(ntlm_authenticate: &[u8]) -> Vec<u8> {
    der(0xa1, &der(0x30, &der(0xa2, &der(0x04, ntlm_authenticate))))
}

fn le_u16(buf: &[u8], offset: usize) -> Result<u16, ClientError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| ClientError::Protocol("truncated NTLM message".to_string()))
}

fn le_u32(buf: &[u8], offset: usize) -> Result<u32, ClientError> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ClientError::Protocol("truncated NTLM message".to_string()))
}
