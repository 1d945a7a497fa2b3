//! One authenticated SMB2 session over TCP with a single tree connected.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::crypto::smb2_signature;
use super::messages::{self, Command, DirectoryEntry, FileId, Header, Response};
use super::ntlm::{self, Challenge, Credentials};
use crate::client::ClientError;

const CREDIT_REQUEST: u16 = 64;
const MAX_PACKET: usize = 16 * 1024 * 1024;
const WORKSTATION: &str = "ROMHAUL";

pub struct Connection {
    stream: TcpStream,
    timeout: Duration,
    server: String,
    message_id: u64,
    session_id: u64,
    tree_id: u32,
    signing_required: bool,
    signing_key: Option<[u8; 16]>,
    max_read_size: u32,
}

impl Connection {
    /// Open TCP, negotiate, authenticate and connect `share`.
    pub async fn open(
        host: &str,
        port: u16,
        share: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let address = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ClientError::Connection(format!("timed out connecting to {}", address)))?
            .map_err(|e| ClientError::Connection(format!("cannot reach {}: {}", address, e)))?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            timeout,
            server: host.to_string(),
            message_id: 0,
            session_id: 0,
            tree_id: 0,
            signing_required: false,
            signing_key: None,
            max_read_size: messages::MAX_READ_CHUNK,
        };

        conn.negotiate().await?;
        conn.session_setup(credentials).await?;
        conn.tree_connect(share).await?;
        Ok(conn)
    }

    /// A session that has already authenticated and connected a tree.
    #[cfg(test)]
    pub(super) fn established(stream: TcpStream, session_id: u64, tree_id: u32, max_read_size: u32) -> Self {
        Self {
            stream,
            timeout: Duration::from_secs(5),
            server: "127.0.0.1".to_string(),
            message_id: 10,
            session_id,
            tree_id,
            signing_required: false,
            signing_key: None,
            max_read_size,
        }
    }

    async fn negotiate(&mut self) -> Result<(), ClientError> {
        let guid = *uuid::Uuid::new_v4().as_bytes();
        let response = self
            .request(Command::Negotiate, messages::negotiate_request(guid))
            .await?;
        expect_success(Command::Negotiate, &response)?;

        let negotiated = messages::NegotiateResponse::parse(&response)?;
        if negotiated.dialect != messages::DIALECT_202 && negotiated.dialect != messages::DIALECT_210 {
            return Err(ClientError::Protocol(format!(
                "server selected unsupported dialect {:#06x}",
                negotiated.dialect
            )));
        }
        self.signing_required = negotiated.signing_required;
        self.max_read_size = negotiated.max_read_size.clamp(1, messages::MAX_READ_CHUNK);
        debug!(
            server = %self.server,
            dialect = negotiated.dialect,
            signing_required = self.signing_required,
            "SMB2 negotiated"
        );
        Ok(())
    }

    async fn session_setup(&mut self, credentials: &Credentials) -> Result<(), ClientError> {
        let init = ntlm::spnego_init(&ntlm::negotiate_message());
        let response = self
            .request(Command::SessionSetup, messages::session_setup_request(&init))
            .await?;
        if response.header.status != messages::STATUS_MORE_PROCESSING_REQUIRED {
            return Err(ClientError::Smb {
                command: Command::SessionSetup.name(),
                status: response.header.status,
            });
        }
        self.session_id = response.header.session_id;

        let setup = messages::SessionSetupResponse::parse(&response)?;
        let challenge = Challenge::from_token(&setup.security_blob)?;

        let mut client_challenge = [0u8; 8];
        client_challenge.copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..8]);
        let timestamp = challenge.timestamp().unwrap_or_else(messages::now_filetime);
        let ntlm_response =
            ntlm::compute_response(credentials, &challenge, client_challenge, timestamp);
        let authenticate =
            ntlm::authenticate_message(credentials, &challenge, &ntlm_response, WORKSTATION);

        let response = self
            .request(
                Command::SessionSetup,
                messages::session_setup_request(&ntlm::spnego_response(&authenticate)),
            )
            .await?;
        expect_success(Command::SessionSetup, &response)?;

        let setup = messages::SessionSetupResponse::parse(&response)?;
        let anonymous = setup.is_guest_or_null() || credentials.is_guest();
        if self.signing_required && !anonymous {
            self.signing_key = Some(ntlm_response.session_base_key);
        }
        debug!(
            server = %self.server,
            user = %credentials.username,
            guest = anonymous,
            signed = self.signing_key.is_some(),
            "SMB2 session established"
        );
        Ok(())
    }

    async fn tree_connect(&mut self, share: &str) -> Result<(), ClientError> {
        let unc = format!("\\\\{}\\{}", self.server, share.trim_matches(['\\', '/']));
        let response = self
            .request(Command::TreeConnect, messages::tree_connect_request(&unc))
            .await?;
        expect_success(Command::TreeConnect, &response)?;
        self.tree_id = response.header.tree_id;
        debug!(share = %unc, tree_id = self.tree_id, "SMB2 tree connected");
        Ok(())
    }

    /// Enumerate a directory relative to the share root.
    pub async fn list(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, ClientError> {
        let (file_id, _) = self.open_handle(path, true).await?;
        let result = self.query_all(file_id).await;
        let closed = self.close_handle(file_id).await;
        let entries = result?;
        closed?;
        Ok(entries)
    }

    async fn query_all(&mut self, file_id: FileId) -> Result<Vec<DirectoryEntry>, ClientError> {
        let mut entries = Vec::new();
        let mut restart = true;
        loop {
            let response = self
                .request(
                    Command::QueryDirectory,
                    messages::query_directory_request(file_id, restart),
                )
                .await?;
            restart = false;
            match response.header.status {
                messages::STATUS_SUCCESS => {
                    entries.extend(messages::parse_query_directory_response(&response)?)
                }
                messages::STATUS_NO_MORE_FILES => break,
                status => {
                    return Err(ClientError::Smb {
                        command: Command::QueryDirectory.name(),
                        status,
                    })
                }
            }
        }
        Ok(entries)
    }

    /// Read a whole file into memory.
    pub async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, ClientError> {
        let (file_id, size) = self.open_handle(path, false).await?;
        let result = self.read_all(file_id, size).await;
        let closed = self.close_handle(file_id).await;
        let data = result?;
        closed?;
        Ok(data)
    }

    async fn read_all(&mut self, file_id: FileId, size: u64) -> Result<Vec<u8>, ClientError> {
        let mut data = Vec::with_capacity(size.min(MAX_PACKET as u64) as usize);
        let mut offset = 0u64;
        while offset < size {
            let chunk = (size - offset).min(u64::from(self.max_read_size)) as u32;
            let response = self
                .request(Command::Read, messages::read_request(file_id, offset, chunk))
                .await?;
            match response.header.status {
                messages::STATUS_SUCCESS => {
                    let bytes = messages::parse_read_response(&response)?;
                    if bytes.is_empty() {
                        break;
                    }
                    offset += bytes.len() as u64;
                    data.extend_from_slice(bytes);
                }
                messages::STATUS_END_OF_FILE => break,
                status => {
                    return Err(ClientError::Smb {
                        command: Command::Read.name(),
                        status,
                    })
                }
            }
        }
        Ok(data)
    }

    async fn open_handle(&mut self, path: &str, directory: bool) -> Result<(FileId, u64), ClientError> {
        let response = self
            .request(Command::Create, messages::create_request(path, directory))
            .await?;
        expect_success(Command::Create, &response)?;
        messages::parse_create_response(&response)
    }

    async fn close_handle(&mut self, file_id: FileId) -> Result<(), ClientError> {
        let response = self
            .request(Command::Close, messages::close_request(file_id))
            .await?;
        expect_success(Command::Close, &response)
    }

    pub async fn tree_disconnect(&mut self) -> Result<(), ClientError> {
        if self.tree_id == 0 {
            return Ok(());
        }
        let response = self
            .request(Command::TreeDisconnect, messages::empty_request())
            .await?;
        self.tree_id = 0;
        expect_success(Command::TreeDisconnect, &response)
    }

    pub async fn logoff(&mut self) -> Result<(), ClientError> {
        if self.session_id == 0 {
            return Ok(());
        }
        let response = self
            .request(Command::Logoff, messages::empty_request())
            .await?;
        self.session_id = 0;
        self.signing_key = None;
        expect_success(Command::Logoff, &response)
    }

    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await.map_err(ClientError::from)
    }

    /// Send one request and wait for its final response.
    async fn request(&mut self, command: Command, body: Vec<u8>) -> Result<Response, ClientError> {
        let message_id = self.send(command, body).await?;
        loop {
            let response = self.receive().await?;
            if response.header.message_id != message_id {
                warn!(
                    expected = message_id,
                    got = response.header.message_id,
                    "Discarding unexpected SMB2 response"
                );
                continue;
            }
            if response.header.status == messages::STATUS_PENDING
                && response.header.flags & messages::FLAG_ASYNC != 0
            {
                continue;
            }
            return Ok(response);
        }
    }

    async fn send(&mut self, command: Command, body: Vec<u8>) -> Result<u64, ClientError> {
        let message_id = self.message_id;
        self.message_id += 1;

        let header = Header {
            credit_charge: 0,
            command: command as u16,
            credits: CREDIT_REQUEST,
            flags: if self.signing_key.is_some() {
                messages::FLAG_SIGNED
            } else {
                0
            },
            message_id,
            tree_id: self.tree_id,
            session_id: self.session_id,
            ..Default::default()
        };

        let mut packet = Vec::with_capacity(messages::HEADER_LEN + body.len());
        header.encode(&mut packet);
        packet.extend_from_slice(&body);

        if let Some(key) = &self.signing_key {
            let signature = smb2_signature(key, &packet)?;
            packet[48..64].copy_from_slice(&signature);
        }

        let framed = messages::frame(&packet);
        tokio::time::timeout(self.timeout, self.stream.write_all(&framed))
            .await
            .map_err(|_| timed_out(command))??;
        Ok(message_id)
    }

    async fn receive(&mut self) -> Result<Response, ClientError> {
        let timeout = self.timeout;
        let read = async {
            let mut prefix = [0u8; 4];
            self.stream.read_exact(&mut prefix).await?;
            let len = u32::from_be_bytes([0, prefix[1], prefix[2], prefix[3]]) as usize;
            if len > MAX_PACKET {
                return Err(ClientError::Protocol(format!(
                    "SMB2 packet too large: {} bytes",
                    len
                )));
            }
            let mut packet = vec![0u8; len];
            self.stream.read_exact(&mut packet).await?;
            Response::parse(packet)
        };
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| ClientError::Connection("timed out waiting for SMB2 response".to_string()))?
    }
}

fn expect_success(command: Command, response: &Response) -> Result<(), ClientError> {
    if response.header.status == messages::STATUS_SUCCESS {
        Ok(())
    } else {
        Err(ClientError::Smb {
            command: command.name(),
            status: response.header.status,
        })
    }
}

fn timed_out(command: Command) -> ClientError {
    ClientError::Connection(format!("timed out sending SMB2 {}", command.name()))
}
