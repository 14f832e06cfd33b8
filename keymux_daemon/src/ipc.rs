//! Unix-socket IPC so the `dump` CLI subcommand can reach a running
//! daemon (SPEC_FULL.md §4.14). Mirrors a sibling remapper's
//! `ipc::unix_socket` request/response shape (one JSON object per line,
//! request then response, connection closed after) but stays on
//! `std::os::unix::net` rather than a cross-platform socket crate: this
//! project only ever runs on Linux, so there is nothing to abstract over.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use keymux_core::engine::DiagnosticsReport;

use crate::error::IpcError;

pub fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(|dir| Path::new(&dir).join("keymuxd.sock"))
        .unwrap_or_else(|| PathBuf::from("/tmp/keymuxd.sock"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    Dump,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    Dump(DiagnosticsDto),
    Error { message: String },
}

/// A serializable mirror of `keymux_core::engine::DiagnosticsReport`,
/// which is `Debug`-only by design (it's meant to be logged, not carried
/// over a wire). This is the one place that shape needs to cross a
/// process boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsDto {
    pub suspended: bool,
    pub suspended_until_ms: Option<u64>,
    pub sticky_binding: Option<String>,
    pub tracked_keystates: usize,
    pub pressed_keys: usize,
    pub pressed_modifier_keys: usize,
    pub suspended_mod_keys_queued: usize,
}

impl From<&DiagnosticsReport> for DiagnosticsDto {
    fn from(report: &DiagnosticsReport) -> Self {
        Self {
            suspended: report.suspended,
            suspended_until_ms: report.suspended_until_ms,
            sticky_binding: report.sticky_binding.clone(),
            tracked_keystates: report.tracked_keystates,
            pressed_keys: report.pressed_keys,
            pressed_modifier_keys: report.pressed_modifier_keys,
            suspended_mod_keys_queued: report.suspended_mod_keys_queued,
        }
    }
}

/// Server side: binds the control socket and answers one request per
/// accepted connection. Integrated into the daemon's `nix::poll` loop via
/// `as_raw_fd`, so accepting never blocks the keyboard event path.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    pub fn bind(path: &Path) -> Result<Self, IpcError> {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
        let listener = UnixListener::bind(path).map_err(|source| IpcError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| IpcError::Bind { path: path.to_path_buf(), source })?;
        Ok(Self { listener, path: path.to_path_buf() })
    }

    pub fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.listener.as_raw_fd()
    }

    /// Accepts every connection currently pending and answers it with
    /// `handler`. Returns immediately (no pending connections is not an
    /// error) so it can be called once per event-loop tick.
    pub fn handle_pending(&self, handler: impl Fn(&IpcRequest) -> IpcResponse) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = respond_once(stream, &handler) {
                        log::debug!("IPC client connection failed: {e}");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("IPC accept() failed: {e}");
                    break;
                }
            }
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn respond_once(mut stream: UnixStream, handler: impl Fn(&IpcRequest) -> IpcResponse) -> Result<(), IpcError> {
    stream.set_nonblocking(false)?;
    let mut line = String::new();
    let mut reader = BufReader::new(&stream);
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(IpcError::ClosedEarly);
    }
    let request: IpcRequest = serde_json::from_str(line.trim_end())?;
    let response = handler(&request);
    let mut json = serde_json::to_string(&response)?;
    json.push('\n');
    stream.write_all(json.as_bytes())?;
    Ok(())
}

/// Client side: used by the `dump` subcommand. Connects, sends one
/// request, reads one response, and returns.
pub fn request_dump(socket_path: &Path) -> Result<DiagnosticsDto, IpcError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|source| IpcError::Connect {
        path: socket_path.to_path_buf(),
        source,
    })?;

    let mut json = serde_json::to_string(&IpcRequest::Dump)?;
    json.push('\n');
    stream.write_all(json.as_bytes())?;

    let mut line = String::new();
    let mut reader = BufReader::new(&stream);
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(IpcError::ClosedEarly);
    }

    match serde_json::from_str(line.trim_end())? {
        IpcResponse::Dump(dto) => Ok(dto),
        IpcResponse::Error { message } => Err(IpcError::Remote(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;

    #[test]
    fn server_answers_a_dump_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).expect("bind");

        let client_path = socket_path.clone();
        let client = thread::spawn(move || {
            // Busy-poll briefly until the listener has a chance to register.
            for _ in 0..50 {
                if let Ok(mut stream) = UnixStream::connect(&client_path) {
                    stream.write_all(b"{\"type\":\"dump\"}\n").expect("write request");
                    let mut buf = String::new();
                    stream.read_to_string(&mut buf).expect("read response");
                    return buf;
                }
                thread::sleep(std::time::Duration::from_millis(10));
            }
            String::new()
        });

        for _ in 0..50 {
            server.handle_pending(|_req| {
                IpcResponse::Dump(DiagnosticsDto {
                    suspended: false,
                    suspended_until_ms: None,
                    sticky_binding: None,
                    tracked_keystates: 0,
                    pressed_keys: 0,
                    pressed_modifier_keys: 0,
                    suspended_mod_keys_queued: 0,
                })
            });
            thread::sleep(std::time::Duration::from_millis(10));
        }

        let response = client.join().expect("client thread");
        assert!(response.contains("\"dump\""));
    }
}
