#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use cloud_photo_frame::config::FrameConfig;
use cloud_photo_frame::display::CommandRunner;

/// Default configuration with every field defaulted, ready to be tweaked.
pub fn default_config() -> FrameConfig {
    serde_yaml::from_str::<FrameConfig>("{}")
        .expect("default config parses")
        .validated()
        .expect("default config is valid")
}

/// Writes a minimal persisted token file.
pub async fn write_token(path: &Path, access: &str, refresh: Option<&str>) {
    let mut token = serde_json::json!({ "access_token": access });
    if let Some(refresh) = refresh {
        token["refresh_token"] = refresh.into();
    }
    tokio::fs::write(path, serde_json::to_vec(&token).expect("token json"))
        .await
        .expect("write token file");
}

/// Provider feed body for a list of (title, mime, src) photo entries.
pub fn feed_json(entries: &[(&str, &str, &str)]) -> String {
    let entries: Vec<String> = entries
        .iter()
        .map(|(title, mime, src)| {
            format!(
                r#"{{"title":{{"$t":"{title}"}},"content":{{"type":"{mime}","src":"{src}"}},"gphoto$timestamp":{{"$t":"1280707111000"}}}}"#
            )
        })
        .collect();
    format!(r#"{{"feed":{{"entry":[{}]}}}}"#, entries.join(","))
}

/// Command runner that records invocations instead of spawning anything.
/// Every command exits with `exit_code` (0 by default).
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    exit_code: AtomicI32,
}

impl RecordingRunner {
    pub fn failing(exit_code: i32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_code: AtomicI32::new(exit_code),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("runner lock").clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<i32> {
        self.calls
            .lock()
            .expect("runner lock")
            .push(format!("{program} {}", args.join(" ")));
        Ok(self.exit_code.load(Ordering::SeqCst))
    }

    fn run_to_file(&self, program: &str, args: &[String], output: &Path) -> Result<i32> {
        self.calls.lock().expect("runner lock").push(format!(
            "{program} {} > {}",
            args.join(" "),
            output.display()
        ));
        Ok(self.exit_code.load(Ordering::SeqCst))
    }
}

/// Minimal scripted HTTP server: serves one canned response per connection,
/// in order, recording each raw request (head + body) for assertions.
/// Responses carry `Connection: close` so the client reconnects every time.
pub struct ScriptedServer {
    addr: SocketAddr,
    requests: Arc<tokio::sync::Mutex<Vec<String>>>,
    served: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub fn uri(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

pub async fn serve(responses: Vec<String>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind scripted server");
    let addr = listener.local_addr().expect("scripted server address");
    let requests = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let served = Arc::new(AtomicUsize::new(0));

    {
        let requests = requests.clone();
        let served = served.clone();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut socket).await {
                    requests.lock().await.push(request);
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                served.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    ScriptedServer {
        addr,
        requests,
        served,
    }
}

pub fn http_response(status: u16, reason: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(head_len) = head_end(&data) {
            let head = String::from_utf8_lossy(&data[..head_len]).to_string();
            if data.len() >= head_len + content_length(&head) {
                return Some(String::from_utf8_lossy(&data).to_string());
            }
        }
        match socket.read(&mut buf).await {
            Ok(0) => {
                if data.is_empty() {
                    return None;
                }
                return Some(String::from_utf8_lossy(&data).to_string());
            }
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(_) => return None,
        }
    }
}

fn head_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            line.to_ascii_lowercase()
                .strip_prefix("content-length:")
                .map(|value| value.trim().parse().unwrap_or(0))
        })
        .unwrap_or(0)
}
