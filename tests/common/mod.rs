//! Shared fixtures: a blocking mock detection server, a scripted frame source
//! and a surface that records what it was shown.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use framelink::codec::decode_message;
use framelink::{Config, DisplayError, DisplaySurface, Frame, FrameSource, ResponseMode, SourceError};

pub const GREEN: [u8; 3] = [0, 255, 0];

/// Serve one client on an ephemeral port. `respond` gets the request index
/// and the JPEG payload; returning `None` drops the connection. The handle
/// yields the number of requests read.
pub fn spawn_server<F>(mut respond: F) -> (u16, JoinHandle<usize>)
where
    F: FnMut(usize, &[u8]) -> Option<Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return 0,
        };
        let mut served = 0;
        let mut pending = Vec::new();
        while let Some(payload) = read_request(&mut stream, &mut pending) {
            assert_eq!(&payload[..2], &[0xFF, 0xD8], "payload is not a JPEG");
            served += 1;
            match respond(served - 1, &payload) {
                Some(reply) => {
                    if stream.write_all(&reply).is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        served
    });

    (port, handle)
}

/// Next complete request, reading more from the socket as needed. `None`
/// once the client hangs up.
fn read_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some((payload, used)) = decode_message(pending) {
            pending.drain(..used);
            return Some(payload.to_vec());
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
        }
    }
}

/// A port nothing is listening on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn test_config(port: u16, mode: ResponseMode) -> Config {
    let mut config = Config::default();
    config.client.server_port = port;
    config.codec.response_mode = mode;
    config.pipeline.io_timeout_ms = 2000;
    config.display.headless = true;
    config
}

/// Yields a fixed list of frames, then ends
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    delay: Duration,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(count: u64, width: u32, height: u32) -> Self {
        Self {
            frames: (1..=count)
                .map(|seq| Frame::filled(seq, width, height, [0, 0, 0]))
                .collect(),
            delay: Duration::ZERO,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before each frame, like a camera would
    pub fn paced(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        format!("scripted source ({} left)", self.frames.len())
    }
}

/// Records each shown frame. Optionally asks to quit after `quit_after`
/// frames.
#[derive(Default)]
pub struct RecordingSurface {
    pub shown: Vec<Frame>,
    pub quit_after: Option<usize>,
    pub shutdowns: usize,
}

impl RecordingSurface {
    pub fn quitting_after(frames: usize) -> Self {
        Self {
            quit_after: Some(frames),
            ..Default::default()
        }
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.shown.iter().map(Frame::sequence).collect()
    }
}

impl DisplaySurface for RecordingSurface {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.shown.push(frame.clone());
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        self.quit_after.is_some_and(|n| self.shown.len() >= n)
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

/// Fails on the first frame
pub struct BrokenSurface;

impl DisplaySurface for BrokenSurface {
    fn show(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
        Err(DisplayError::Render("no display attached".into()))
    }

    fn poll_quit(&mut self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}
