//! Connection handling and command dispatch.

use engine::{Barrel, Error};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// A reply to one request line.
pub enum Reply {
    /// Send the line and keep the connection open.
    Line(String),
    /// Send the line and close the connection.
    Close(String),
}

/// Accept loop: one handler thread per connection, all sharing the engine.
pub fn serve(listener: TcpListener, barrel: Arc<Barrel>) -> anyhow::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let barrel = Arc::clone(&barrel);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &barrel) {
                        debug!(error = %e, "connection closed with error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to accept connection"),
        }
    }
    Ok(())
}

/// Reads request lines and writes one reply line per request until the
/// client disconnects or sends `QUIT`.
fn handle_connection(stream: TcpStream, barrel: &Barrel) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    debug!(%peer, "client connected");

    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    for line in reader.lines() {
        let line = line?;
        match respond(barrel, &line) {
            Reply::Line(reply) => writeln!(writer, "{}", reply)?,
            Reply::Close(reply) => {
                writeln!(writer, "{}", reply)?;
                break;
            }
        }
    }

    debug!(%peer, "client disconnected");
    Ok(())
}

/// Dispatches one request line against the engine.
pub fn respond(barrel: &Barrel, line: &str) -> Reply {
    let mut parts = line.split_whitespace();

    let Some(cmd) = parts.next() else {
        return Reply::Line("ERR empty command".to_string());
    };

    match cmd.to_uppercase().as_str() {
        "PING" => Reply::Line("PONG".to_string()),
        "QUIT" => Reply::Close("BYE".to_string()),
        "SET" => {
            let Some(key) = parts.next() else {
                return Reply::Line("ERR usage: SET key value".to_string());
            };
            let value: String = parts.collect::<Vec<&str>>().join(" ");
            if value.is_empty() {
                return Reply::Line("ERR usage: SET key value".to_string());
            }
            match barrel.put(key, value.as_bytes()) {
                Ok(()) => Reply::Line("OK".to_string()),
                Err(e) => Reply::Line(format!("ERR {}", e)),
            }
        }
        "GET" => {
            let Some(key) = parts.next() else {
                return Reply::Line("ERR usage: GET key".to_string());
            };
            match barrel.get(key) {
                Ok(value) => Reply::Line(String::from_utf8_lossy(&value).to_string()),
                Err(Error::MissingKey) => Reply::Line("(nil)".to_string()),
                Err(e) => Reply::Line(format!("ERR {}", e)),
            }
        }
        "DEL" => {
            let Some(key) = parts.next() else {
                return Reply::Line("ERR usage: DEL key".to_string());
            };
            match barrel.delete(key) {
                Ok(()) => Reply::Line("OK".to_string()),
                Err(e) => Reply::Line(format!("ERR {}", e)),
            }
        }
        other => Reply::Line(format!("ERR unknown command '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::Options;
    use tempfile::tempdir;

    fn line(reply: Reply) -> String {
        match reply {
            Reply::Line(s) | Reply::Close(s) => s,
        }
    }

    #[test]
    fn dispatch_covers_the_protocol() {
        let dir = tempdir().unwrap();
        let barrel = Barrel::init(Options::new(dir.path())).unwrap();

        assert_eq!(line(respond(&barrel, "PING")), "PONG");
        assert_eq!(line(respond(&barrel, "SET name alice")), "OK");
        assert_eq!(line(respond(&barrel, "GET name")), "alice");
        assert_eq!(line(respond(&barrel, "DEL name")), "OK");
        assert_eq!(line(respond(&barrel, "GET name")), "(nil)");
        assert_eq!(line(respond(&barrel, "QUIT")), "BYE");
    }

    #[test]
    fn set_joins_value_words() {
        let dir = tempdir().unwrap();
        let barrel = Barrel::init(Options::new(dir.path())).unwrap();

        assert_eq!(line(respond(&barrel, "SET msg hello world")), "OK");
        assert_eq!(line(respond(&barrel, "GET msg")), "hello world");
    }

    #[test]
    fn commands_are_case_insensitive() {
        let dir = tempdir().unwrap();
        let barrel = Barrel::init(Options::new(dir.path())).unwrap();

        assert_eq!(line(respond(&barrel, "ping")), "PONG");
        assert_eq!(line(respond(&barrel, "set k v")), "OK");
        assert_eq!(line(respond(&barrel, "get k")), "v");
    }

    #[test]
    fn malformed_requests_answer_err() {
        let dir = tempdir().unwrap();
        let barrel = Barrel::init(Options::new(dir.path())).unwrap();

        assert!(line(respond(&barrel, "")).starts_with("ERR"));
        assert!(line(respond(&barrel, "SET")).starts_with("ERR"));
        assert!(line(respond(&barrel, "SET lonely")).starts_with("ERR"));
        assert!(line(respond(&barrel, "GET")).starts_with("ERR"));
        assert!(line(respond(&barrel, "DEL")).starts_with("ERR"));
        assert!(line(respond(&barrel, "BLORP x")).starts_with("ERR"));
    }

    #[test]
    fn read_only_store_reports_err_on_writes() {
        let dir = tempdir().unwrap();
        {
            let barrel = Barrel::init(Options::new(dir.path())).unwrap();
            barrel.put("k", b"v").unwrap();
            barrel.shutdown().unwrap();
        }
        let barrel = Barrel::init(Options::new(dir.path()).read_only(true)).unwrap();

        assert_eq!(line(respond(&barrel, "GET k")), "v");
        assert!(line(respond(&barrel, "SET k v2")).starts_with("ERR"));
        assert!(line(respond(&barrel, "DEL k")).starts_with("ERR"));
    }
}
