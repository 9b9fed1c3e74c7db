//! Blocking IMAP4rev1 client over TLS (rustls).
//!
//! Only the handful of commands the label run needs: LOGIN, SELECT,
//! SEARCH, FETCH, STORE and LOGOUT. Message bodies arrive as IMAP literals
//! (`{n}\r\n` followed by exactly `n` bytes) and are read by byte count.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mailbox::Mailbox;

/// Socket read timeout; bounds a hung server.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS stream used for real connections.
pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Live mailbox: an IMAP session over TLS.
pub type ImapMailbox = ImapSession<TlsStream>;

/// Completion status of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    No,
    Bad,
}

/// Everything the server sent for one command.
#[derive(Debug, Default)]
struct Response {
    /// Untagged and continuation lines, CRLF stripped.
    lines: Vec<String>,
    /// Literal payloads in arrival order.
    literals: Vec<Vec<u8>>,
    /// Text after the status word on the tagged line.
    text: String,
}

/// An authenticated (or about to be) IMAP session over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    tag_counter: u32,
}

impl ImapSession<TlsStream> {
    /// Connect over TLS and log in. Any failure here is fatal for the run.
    pub fn connect(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let connection_error = |reason: String| MailboxError::Connection {
            host: config.imap_host.clone(),
            port: config.imap_port,
            reason,
        };

        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))
            .map_err(|e| connection_error(e.to_string()))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| connection_error(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = ServerName::try_from(config.imap_host.clone())
            .map_err(|e| connection_error(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connection_error(e.to_string()))?;

        let mut session = Self::new(rustls::StreamOwned::new(conn, tcp));
        session
            .read_greeting()
            .map_err(|e| connection_error(e.to_string()))?;
        session.login(&config.username, config.password.expose_secret())?;

        info!(host = %config.imap_host, user = %config.username, "Connected to mailbox");
        Ok(session)
    }
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            tag_counter: 0,
        }
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{}", self.tag_counter)
    }

    /// Read one CRLF-terminated line, terminator included.
    fn read_line(&mut self) -> Result<Vec<u8>, MailboxError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(MailboxError::Protocol("connection closed".into()));
        }
        Ok(buf)
    }

    /// Expect the untagged `* OK` server greeting.
    pub fn read_greeting(&mut self) -> Result<(), MailboxError> {
        let line = self.read_line()?;
        let text = String::from_utf8_lossy(&line);
        if text.starts_with("* OK") || text.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                text.trim_end()
            )))
        }
    }

    /// Send `command` and collect the response up to its tagged completion.
    fn command(&mut self, command: &str) -> Result<(Status, Response), MailboxError> {
        let tag = self.next_tag();
        let writer = self.stream.get_mut();
        writer.write_all(format!("{tag} {command}\r\n").as_bytes())?;
        writer.flush()?;

        let tagged_prefix = format!("{tag} ");
        let mut response = Response::default();
        loop {
            let raw = self.read_line()?;
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\r', '\n'])
                .to_string();

            if let Some(rest) = line.strip_prefix(&tagged_prefix) {
                let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let status = match word.to_ascii_uppercase().as_str() {
                    "OK" => Status::Ok,
                    "NO" => Status::No,
                    "BAD" => Status::Bad,
                    other => {
                        return Err(MailboxError::Protocol(format!(
                            "unknown status {other:?} for {tag}"
                        )));
                    }
                };
                response.text = text.to_string();
                return Ok((status, response));
            }

            if let Some(size) = literal_size(&line) {
                let mut literal = vec![0u8; size];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }

    /// `LOGIN`; a `NO` answer is an authentication failure.
    pub fn login(&mut self, user: &str, password: &str) -> Result<(), MailboxError> {
        let (status, response) =
            self.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        match status {
            Status::Ok => Ok(()),
            _ => Err(MailboxError::AuthFailed {
                user: user.to_string(),
                reason: response.text,
            }),
        }
    }

    fn select_inbox(&mut self) -> Result<(), MailboxError> {
        let (status, response) = self.command("SELECT \"INBOX\"")?;
        match status {
            Status::Ok => Ok(()),
            _ => Err(MailboxError::Search(format!(
                "cannot select INBOX: {}",
                response.text
            ))),
        }
    }
}

impl<S: Read + Write> Mailbox for ImapSession<S> {
    fn search_unseen(&mut self, subject_keyword: &str) -> Result<Vec<String>, MailboxError> {
        self.select_inbox()?;
        let (status, response) = self.command(&format!(
            "SEARCH UNSEEN SUBJECT {}",
            quote(subject_keyword)
        ))?;
        if status != Status::Ok {
            return Err(MailboxError::Search(response.text));
        }

        let ids: Vec<String> = response
            .lines
            .iter()
            .filter_map(|line| line.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace().map(str::to_string))
            .collect();
        debug!(count = ids.len(), "IMAP search complete");
        Ok(ids)
    }

    fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError> {
        let fetch_error = |reason: String| MailboxError::Fetch {
            id: id.to_string(),
            reason,
        };
        let (status, mut response) = self
            .command(&format!("FETCH {id} RFC822"))
            .map_err(|e| fetch_error(e.to_string()))?;
        if status != Status::Ok {
            return Err(fetch_error(response.text));
        }
        if response.literals.is_empty() {
            return Err(fetch_error("no message body in response".into()));
        }
        Ok(response.literals.swap_remove(0))
    }

    fn mark_seen(&mut self, id: &str) -> Result<(), MailboxError> {
        let (status, response) = self.command(&format!("STORE {id} +FLAGS (\\Seen)"))?;
        if status != Status::Ok {
            warn!(id, reason = %response.text, "Could not flag message as seen");
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        self.command("LOGOUT")?;
        Ok(())
    }
}

/// Byte count of a trailing `{n}` literal marker.
fn literal_size(line: &str) -> Option<usize> {
    let inner = line.strip_suffix('}')?;
    let start = inner.rfind('{')?;
    inner[start + 1..].trim_end_matches('+').parse().ok()
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
