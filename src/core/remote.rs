//! Client side of the shared-server channel.
//!
//! Several tern instances can share one server listening on a unix socket. The server
//! protocol is line based:
//!
//! - `conn <id>` opens a long lived connection. Every line the server writes back on it is
//!   a command-language fragment for this client.
//! - Any other line is a one-shot request. The client shuts down its write half and reads
//!   the reply until the server closes the connection.
//!
//! The reactor uses [RemoteClient::disconnect] and [RemoteClient::quit_server] during
//! shutdown. The listener started by [RemoteClient::listen] feeds the remote source of the
//! reactor.

use crate::core::command::{Expr, Parser};

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;

/// Sends one request line to the server at `socket` and returns its reply.
pub fn send(socket: &Path, cmd: &str) -> io::Result<String> {
    let mut stream = UnixStream::connect(socket)?;
    writeln!(stream, "{cmd}")?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    Ok(reply)
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    socket: PathBuf,
    id: u32,
}

impl RemoteClient {
    pub fn new(socket: PathBuf, id: u32) -> Self {
        Self { socket, id }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn send(&self, cmd: &str) -> io::Result<String> {
        send(&self.socket, cmd)
    }

    /// Tells the server this client is gone.
    pub fn disconnect(&self) -> io::Result<()> {
        self.send(&format!("drop {}", self.id)).map(|_| ())
    }

    pub fn quit_server(&self) -> io::Result<()> {
        self.send("quit").map(|_| ())
    }

    /// Opens the long lived connection and forwards every line received on it, parsed
    /// as command language, to `remote_tx`.
    ///
    /// Parse errors are forwarded as `echoerr` so they show up in the UI.
    pub fn listen(&self, remote_tx: Sender<Expr>) -> io::Result<()> {
        let mut stream = UnixStream::connect(&self.socket)?;
        writeln!(stream, "conn {}", self.id)?;
        let reader = BufReader::new(stream);

        thread::Builder::new()
            .name("remote".into())
            .spawn(move || {
                for line in reader.lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("reading from server: {e}");
                            break;
                        }
                    };
                    debug!("remote: {line}");
                    for parsed in Parser::new(&line) {
                        let expr = match parsed {
                            Ok(expr) => expr,
                            Err(e) => Expr::call("echoerr", [e.to_string()]),
                        };
                        if remote_tx.send(expr).is_err() {
                            return;
                        }
                    }
                }
                debug!("server connection closed");
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::os::unix::net::UnixListener;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn send_writes_line_and_reads_reply() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let sock = dir.path().join("tern.sock");
        let listener = UnixListener::bind(&sock)?;

        let server = thread::spawn(move || -> io::Result<String> {
            let (mut conn, _) = listener.accept()?;
            let mut req = String::new();
            conn.read_to_string(&mut req)?;
            conn.write_all(b"ok\n")?;
            Ok(req)
        });

        let client = RemoteClient::new(sock, 7);
        client.disconnect()?;
        let req = server.join().map_err(|_| "server panicked")??;
        assert_eq!(req, "drop 7\n");
        Ok(())
    }

    #[test]
    fn listen_forwards_parsed_lines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let sock = dir.path().join("tern.sock");
        let listener = UnixListener::bind(&sock)?;

        let server = thread::spawn(move || -> io::Result<String> {
            let (conn, _) = listener.accept()?;
            let mut reader = BufReader::new(conn.try_clone()?);
            let mut hello = String::new();
            reader.read_line(&mut hello)?;
            let mut conn = conn;
            conn.write_all(b"down; echo hi\nset nosuch\"\n")?;
            Ok(hello)
        });

        let (tx, rx) = unbounded();
        RemoteClient::new(sock, 3).listen(tx)?;

        let hello = server.join().map_err(|_| "server panicked")??;
        assert_eq!(hello, "conn 3\n");

        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout)?, Expr::simple("down"));
        assert_eq!(rx.recv_timeout(timeout)?, Expr::call("echo", ["hi"]));
        let err = rx.recv_timeout(timeout)?;
        assert!(matches!(err, Expr::Call { ref name, .. } if name == "echoerr"));
        Ok(())
    }
}
