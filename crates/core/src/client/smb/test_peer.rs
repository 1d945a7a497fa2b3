//! Scripted server end of an SMB2 connection for unit tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::crypto::utf16le;
use super::messages::{frame, read_u32, read_u64, Command, Header, HEADER_LEN};

pub const STATUS_ACCESS_DENIED: u32 = 0xc000_0022;

pub struct Peer {
    stream: TcpStream,
}

/// A loopback TCP pair: the client stream and the peer serving it.
pub async fn pair() -> (TcpStream, Peer) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (
        client.unwrap(),
        Peer {
            stream: accepted.unwrap().0,
        },
    )
}

impl Peer {
    /// Next request from the client, or `None` once it has hung up.
    pub async fn receive(&mut self) -> Option<(Header, Vec<u8>)> {
        let mut prefix = [0u8; 4];
        self.stream.read_exact(&mut prefix).await.ok()?;
        let len = u32::from_be_bytes([0, prefix[1], prefix[2], prefix[3]]) as usize;
        let mut packet = vec![0u8; len];
        self.stream.read_exact(&mut packet).await.ok()?;
        let header = Header::decode(&packet).ok()?;
        Some((header, packet[HEADER_LEN..].to_vec()))
    }

    /// Receive a request and check its command.
    pub async fn expect(&mut self, command: Command) -> (Header, Vec<u8>) {
        let (header, body) = self.receive().await.expect("client hung up");
        assert_eq!(header.command, command as u16, "unexpected command");
        (header, body)
    }

    pub async fn reply(&mut self, request: &Header, status: u32, body: &[u8]) {
        let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
        Header {
            status,
            command: request.command,
            credits: 1,
            flags: 0x1,
            message_id: request.message_id,
            tree_id: request.tree_id,
            session_id: request.session_id,
            ..Default::default()
        }
        .encode(&mut packet);
        packet.extend_from_slice(body);
        self.stream.write_all(&frame(&packet)).await.unwrap();
    }

    /// Answer a CREATE with `file_id` and the given end-of-file.
    pub async fn serve_create(&mut self, file_id: u8, size: u64) {
        let (request, _) = self.expect(Command::Create).await;
        let mut body = vec![0u8; 88];
        body[0..2].copy_from_slice(&89u16.to_le_bytes());
        body[48..56].copy_from_slice(&size.to_le_bytes());
        body[64..80].copy_from_slice(&[file_id; 16]);
        self.reply(&request, 0, &body).await;
    }

    pub async fn serve_close(&mut self) {
        let (request, _) = self.expect(Command::Close).await;
        let mut body = vec![0u8; 60];
        body[0..2].copy_from_slice(&60u16.to_le_bytes());
        self.reply(&request, 0, &body).await;
    }

    /// Answer a QUERY_DIRECTORY with one page of entries.
    pub async fn serve_directory_page(&mut self, entries: &[(&str, bool)]) {
        let (request, _) = self.expect(Command::QueryDirectory).await;
        let mut records = Vec::new();
        for (i, (name, directory)) in entries.iter().enumerate() {
            records.extend(directory_record(name, *directory, i + 1 == entries.len()));
        }
        let mut body = vec![0u8; 8];
        body[0..2].copy_from_slice(&9u16.to_le_bytes());
        body[2..4].copy_from_slice(&((HEADER_LEN + 8) as u16).to_le_bytes());
        body[4..8].copy_from_slice(&(records.len() as u32).to_le_bytes());
        body.extend(records);
        self.reply(&request, 0, &body).await;
    }

    /// Answer a READ from `content` at the requested offset and length.
    /// Returns the requested length.
    pub async fn serve_read(&mut self, content: &[u8]) -> u32 {
        let (request, body) = self.expect(Command::Read).await;
        let length = read_u32(&body, 4).unwrap();
        let offset = read_u64(&body, 8).unwrap() as usize;
        let end = (offset + length as usize).min(content.len());
        let data = &content[offset.min(end)..end];

        let mut reply = vec![0u8; 16];
        reply[0..2].copy_from_slice(&17u16.to_le_bytes());
        reply[2] = (HEADER_LEN + 16) as u8;
        reply[4..8].copy_from_slice(&(data.len() as u32).to_le_bytes());
        reply.extend_from_slice(data);
        self.reply(&request, 0, &reply).await;
        length
    }

    /// Answer the next request of `command` with a bare error status.
    pub async fn fail(&mut self, command: Command, status: u32) {
        let (request, _) = self.expect(command).await;
        self.reply(&request, status, &[9, 0, 0, 0, 0, 0, 0, 0, 0]).await;
    }

    /// True once the client has shut its write half.
    pub async fn hung_up(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.stream.read(&mut byte).await, Ok(0))
    }
}

fn directory_record(name: &str, directory: bool, last: bool) -> Vec<u8> {
    let name = utf16le(name);
    let total = (64 + name.len() + 7) & !7;
    let mut record = vec![0u8; 64];
    let next = if last { 0 } else { total as u32 };
    record[0..4].copy_from_slice(&next.to_le_bytes());
    record[24..32].copy_from_slice(&132_000_000_000_000_000u64.to_le_bytes());
    record[40..48].copy_from_slice(&(if directory { 0u64 } else { 1024 }).to_le_bytes());
    let attributes: u32 = if directory { 0x10 } else { 0x20 };
    record[56..60].copy_from_slice(&attributes.to_le_bytes());
    record[60..64].copy_from_slice(&(name.len() as u32).to_le_bytes());
    record.extend_from_slice(&name);
    if !last {
        record.resize(total, 0);
    }
    record
}
