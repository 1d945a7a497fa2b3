//! SMB2 packet layouts for the subset of commands the client issues.

use chrono::{DateTime, Utc};

use super::crypto::utf16le;
use crate::client::ClientError;

pub const HEADER_LEN: usize = 64;
const PROTOCOL_ID: [u8; 4] = [0xfe, b'S', b'M', b'B'];

pub const DIALECT_202: u16 = 0x0202;
pub const DIALECT_210: u16 = 0x0210;

pub const FLAG_ASYNC: u32 = 0x0000_0002;
pub const FLAG_SIGNED: u32 = 0x0000_0008;

pub const SECURITY_SIGNING_ENABLED: u16 = 0x0001;
pub const SECURITY_SIGNING_REQUIRED: u16 = 0x0002;

pub const SESSION_FLAG_IS_GUEST: u16 = 0x0001;
pub const SESSION_FLAG_IS_NULL: u16 = 0x0002;

pub const STATUS_SUCCESS: u32 = 0x0000_0000;
pub const STATUS_PENDING: u32 = 0x0000_0103;
pub const STATUS_NO_MORE_FILES: u32 = 0x8000_0006;
pub const STATUS_MORE_PROCESSING_REQUIRED: u32 = 0xc000_0016;
pub const STATUS_END_OF_FILE: u32 = 0xc000_0011;

const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
const FILE_DIRECTORY_INFORMATION: u8 = 0x01;
const RESTART_SCANS: u8 = 0x01;

/// Maximum single READ request.
pub const MAX_READ_CHUNK: u32 = 64 * 1024;
pub const QUERY_OUTPUT_BUFFER: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    Negotiate = 0x0000,
    SessionSetup = 0x0001,
    Logoff = 0x0002,
    TreeConnect = 0x0003,
    TreeDisconnect = 0x0004,
    Create = 0x0005,
    Close = 0x0006,
    Read = 0x0008,
    QueryDirectory = 0x000e,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Negotiate => "NEGOTIATE",
            Command::SessionSetup => "SESSION_SETUP",
            Command::Logoff => "LOGOFF",
            Command::TreeConnect => "TREE_CONNECT",
            Command::TreeDisconnect => "TREE_DISCONNECT",
            Command::Create => "CREATE",
            Command::Close => "CLOSE",
            Command::Read => "READ",
            Command::QueryDirectory => "QUERY_DIRECTORY",
        }
    }
}

/// Fixed 64-byte sync header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub credit_charge: u16,
    pub status: u32,
    pub command: u16,
    pub credits: u16,
    pub flags: u32,
    pub message_id: u64,
    pub tree_id: u32,
    pub session_id: u64,
}

impl Header {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&PROTOCOL_ID);
        out.extend_from_slice(&(HEADER_LEN as u16).to_le_bytes());
        out.extend_from_slice(&self.credit_charge.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&self.command.to_le_bytes());
        out.extend_from_slice(&self.credits.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // next command
        out.extend_from_slice(&self.message_id.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // process id
        out.extend_from_slice(&self.tree_id.to_le_bytes());
        out.extend_from_slice(&self.session_id.to_le_bytes());
        out.extend_from_slice(&[0; 16]); // signature
    }

    pub fn decode(packet: &[u8]) -> Result<Self, ClientError> {
        if packet.len() < HEADER_LEN || packet[..4] != PROTOCOL_ID {
            return Err(ClientError::Protocol("not an SMB2 packet".to_string()));
        }
        Ok(Self {
            credit_charge: read_u16(packet, 6)?,
            status: read_u32(packet, 8)?,
            command: read_u16(packet, 12)?,
            credits: read_u16(packet, 14)?,
            flags: read_u32(packet, 16)?,
            message_id: read_u64(packet, 24)?,
            tree_id: read_u32(packet, 36)?,
            session_id: read_u64(packet, 40)?,
        })
    }
}

/// A decoded response packet. Offsets in SMB2 bodies are relative to the
/// start of the header, so the whole packet is kept.
#[derive(Debug, Clone)]
pub struct Response {
    pub header: Header,
    pub packet: Vec<u8>,
}

impl Response {
    pub fn parse(packet: Vec<u8>) -> Result<Self, ClientError> {
        let header = Header::decode(&packet)?;
        Ok(Self { header, packet })
    }

    pub fn body_u16(&self, offset: usize) -> Result<u16, ClientError> {
        read_u16(&self.packet, HEADER_LEN + offset)
    }

    pub fn body_u32(&self, offset: usize) -> Result<u32, ClientError> {
        read_u32(&self.packet, HEADER_LEN + offset)
    }

    pub fn body_u64(&self, offset: usize) -> Result<u64, ClientError> {
        read_u64(&self.packet, HEADER_LEN + offset)
    }

    /// Slice addressed by a header-relative offset.
    pub fn buffer(&self, offset: usize, len: usize) -> Result<&[u8], ClientError> {
        self.packet
            .get(offset..offset + len)
            .ok_or_else(|| ClientError::Protocol("SMB2 buffer out of bounds".to_string()))
    }
}

pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ClientError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(truncated)
}

pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ClientError> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(truncated)
}

pub fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ClientError> {
    buf.get(offset..offset + 8)
        .map(|b| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            u64::from_le_bytes(raw)
        })
        .ok_or_else(truncated)
}

fn truncated() -> ClientError {
    ClientError::Protocol("truncated SMB2 packet".to_string())
}

/// Persistent and volatile halves of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileId(pub [u8; 16]);

// =============================================================================
// Request bodies
// =============================================================================

pub fn negotiate_request(client_guid: [u8; 16]) -> Vec<u8> {
    let dialects = [DIALECT_202, DIALECT_210];
    let mut body = Vec::with_capacity(36 + dialects.len() * 2);
    body.extend_from_slice(&36u16.to_le_bytes());
    body.extend_from_slice(&(dialects.len() as u16).to_le_bytes());
    body.extend_from_slice(&SECURITY_SIGNING_ENABLED.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // capabilities
    body.extend_from_slice(&client_guid);
    body.extend_from_slice(&0u64.to_le_bytes()); // client start time
    for dialect in dialects {
        body.extend_from_slice(&dialect.to_le_bytes());
    }
    body
}

pub fn session_setup_request(security_blob: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(24 + security_blob.len());
    body.extend_from_slice(&25u16.to_le_bytes());
    body.push(0); // flags
    body.push(SECURITY_SIGNING_ENABLED as u8);
    body.extend_from_slice(&0u32.to_le_bytes()); // capabilities
    body.extend_from_slice(&0u32.to_le_bytes()); // channel
    body.extend_from_slice(&((HEADER_LEN + 24) as u16).to_le_bytes());
    body.extend_from_slice(&(security_blob.len() as u16).to_le_bytes());
    body.extend_from_slice(&0u64.to_le_bytes()); // previous session
    body.extend_from_slice(security_blob);
    body
}

pub fn tree_connect_request(unc_path: &str) -> Vec<u8> {
    let path = utf16le(unc_path);
    let mut body = Vec::with_capacity(8 + path.len());
    body.extend_from_slice(&9u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&((HEADER_LEN + 8) as u16).to_le_bytes());
    body.extend_from_slice(&(path.len() as u16).to_le_bytes());
    body.extend_from_slice(&path);
    body
}

/// CREATE with FILE_OPEN disposition, read-only access.
pub fn create_request(path: &str, directory: bool) -> Vec<u8> {
    const IMPERSONATION: u32 = 2;
    const FILE_SHARE_ALL: u32 = 0x7;
    const FILE_OPEN: u32 = 1;
    const FILE_DIRECTORY_FILE: u32 = 0x1;
    const FILE_NON_DIRECTORY_FILE: u32 = 0x40;
    const DIRECTORY_ACCESS: u32 = 0x0010_0081; // list | read attributes | synchronize
    const FILE_GENERIC_READ: u32 = 0x0012_0089;

    let name = utf16le(path);
    let (access, options) = if directory {
        (DIRECTORY_ACCESS, FILE_DIRECTORY_FILE)
    } else {
        (FILE_GENERIC_READ, FILE_NON_DIRECTORY_FILE)
    };

    let mut body = Vec::with_capacity(56 + name.len().max(1));
    body.extend_from_slice(&57u16.to_le_bytes());
    body.push(0); // security flags
    body.push(0); // oplock level
    body.extend_from_slice(&IMPERSONATION.to_le_bytes());
    body.extend_from_slice(&0u64.to_le_bytes()); // create flags
    body.extend_from_slice(&0u64.to_le_bytes()); // reserved
    body.extend_from_slice(&access.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // file attributes
    body.extend_from_slice(&FILE_SHARE_ALL.to_le_bytes());
    body.extend_from_slice(&FILE_OPEN.to_le_bytes());
    body.extend_from_slice(&options.to_le_bytes());
    body.extend_from_slice(&((HEADER_LEN + 56) as u16).to_le_bytes());
    body.extend_from_slice(&(name.len() as u16).to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // contexts offset
    body.extend_from_slice(&0u32.to_le_bytes()); // contexts length
    if name.is_empty() {
        // The share root still needs a one-byte buffer.
        body.push(0);
    } else {
        body.extend_from_slice(&name);
    }
    body
}

pub fn query_directory_request(file_id: FileId, restart: bool) -> Vec<u8> {
    let pattern = utf16le("*");
    let mut body = Vec::with_capacity(32 + pattern.len());
    body.extend_from_slice(&33u16.to_le_bytes());
    body.push(FILE_DIRECTORY_INFORMATION);
    body.push(if restart { RESTART_SCANS } else { 0 });
    body.extend_from_slice(&0u32.to_le_bytes()); // file index
    body.extend_from_slice(&file_id.0);
    body.extend_from_slice(&((HEADER_LEN + 32) as u16).to_le_bytes());
    body.extend_from_slice(&(pattern.len() as u16).to_le_bytes());
    body.extend_from_slice(&QUERY_OUTPUT_BUFFER.to_le_bytes());
    body.extend_from_slice(&pattern);
    body
}

pub fn read_request(file_id: FileId, offset: u64, length: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(49);
    body.extend_from_slice(&49u16.to_le_bytes());
    body.push(0x50); // padding: data right after the response header
    body.push(0); // flags
    body.extend_from_slice(&length.to_le_bytes());
    body.extend_from_slice(&offset.to_le_bytes());
    body.extend_from_slice(&file_id.0);
    body.extend_from_slice(&0u32.to_le_bytes()); // minimum count
    body.extend_from_slice(&0u32.to_le_bytes()); // channel
    body.extend_from_slice(&0u32.to_le_bytes()); // remaining bytes
    body.extend_from_slice(&0u16.to_le_bytes()); // channel info offset
    body.extend_from_slice(&0u16.to_le_bytes()); // channel info length
    body.push(0);
    body
}

pub fn close_request(file_id: FileId) -> Vec<u8> {
    let mut body = Vec::with_capacity(24);
    body.extend_from_slice(&24u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&file_id.0);
    body
}

/// TREE_DISCONNECT and LOGOFF share the same 4-byte body.
pub fn empty_request() -> Vec<u8> {
    let mut body = Vec::with_capacity(4);
    body.extend_from_slice(&4u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body
}

// =============================================================================
// Response bodies
// =============================================================================

#[derive(Debug, Clone)]
pub struct NegotiateResponse {
    pub dialect: u16,
    pub signing_required: bool,
    pub max_read_size: u32,
}

impl NegotiateResponse {
    pub fn parse(response: &Response) -> Result<Self, ClientError> {
        let security_mode = response.body_u16(2)?;
        Ok(Self {
            dialect: response.body_u16(4)?,
            signing_required: security_mode & SECURITY_SIGNING_REQUIRED != 0,
            max_read_size: response.body_u32(32)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionSetupResponse {
    pub session_flags: u16,
    pub security_blob: Vec<u8>,
}

impl SessionSetupResponse {
    pub fn parse(response: &Response) -> Result<Self, ClientError> {
        let session_flags = response.body_u16(2)?;
        let offset = response.body_u16(4)? as usize;
        let len = response.body_u16(6)? as usize;
        let security_blob = if len == 0 {
            Vec::new()
        } else {
            response.buffer(offset, len)?.to_vec()
        };
        Ok(Self {
            session_flags,
            security_blob,
        })
    }

    pub fn is_guest_or_null(&self) -> bool {
        self.session_flags & (SESSION_FLAG_IS_GUEST | SESSION_FLAG_IS_NULL) != 0
    }
}

pub fn parse_create_response(response: &Response) -> Result<(FileId, u64), ClientError> {
    let end_of_file = response.body_u64(48)?;
    let raw = response.buffer(HEADER_LEN + 64, 16)?;
    let mut id = [0u8; 16];
    id.copy_from_slice(raw);
    Ok((FileId(id), end_of_file))
}

pub fn parse_read_response(response: &Response) -> Result<&[u8], ClientError> {
    let offset = response.packet.get(HEADER_LEN + 2).copied().ok_or_else(truncated)? as usize;
    let len = response.body_u32(4)? as usize;
    response.buffer(offset, len)
}

/// One FileDirectoryInformation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub size: u64,
    pub last_write: u64,
    pub is_directory: bool,
}

impl DirectoryEntry {
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.last_write)
    }
}

pub fn parse_query_directory_response(
    response: &Response,
) -> Result<Vec<DirectoryEntry>, ClientError> {
    let offset = response.body_u16(2)? as usize;
    let len = response.body_u32(4)? as usize;
    let buffer = response.buffer(offset, len)?;
    parse_directory_information(buffer)
}

pub fn parse_directory_information(buffer: &[u8]) -> Result<Vec<DirectoryEntry>, ClientError> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    loop {
        let record = buffer.get(pos..).ok_or_else(truncated)?;
        let next = read_u32(record, 0)? as usize;
        let last_write = read_u64(record, 24)?;
        let size = read_u64(record, 40)?;
        let attributes = read_u32(record, 56)?;
        let name_len = read_u32(record, 60)? as usize;
        let raw_name = record.get(64..64 + name_len).ok_or_else(truncated)?;

        let units: Vec<u16> = raw_name
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        entries.push(DirectoryEntry {
            name: String::from_utf16_lossy(&units),
            size,
            last_write,
            is_directory: attributes & FILE_ATTRIBUTE_DIRECTORY != 0,
        });

        if next == 0 {
            break;
        }
        pos += next;
    }

    Ok(entries)
}

/// FILETIME (100ns ticks since 1601) to UTC.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;
    if filetime < UNIX_EPOCH_TICKS {
        return None;
    }
    let ticks = filetime - UNIX_EPOCH_TICKS;
    DateTime::from_timestamp(
        (ticks / 10_000_000) as i64,
        ((ticks % 10_000_000) * 100) as u32,
    )
}

/// Current time as FILETIME.
pub fn now_filetime() -> u64 {
    const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;
    let now = Utc::now();
    let ticks = now.timestamp() as u64 * 10_000_000 + u64::from(now.timestamp_subsec_nanos()) / 100;
    UNIX_EPOCH_TICKS + ticks
}

/// Prefix a message with the 4-byte direct TCP transport header.
pub fn frame(message: &[u8]) -> Vec<u8> {
    let len = message.len() as u32;
    let mut out = Vec::with_capacity(4 + message.len());
    out.push(0);
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(message);
    out
}
