//! Scripted ELM327 adapter for tests
//!
//! Emulates the adapter side of the serial link: commands written to it are
//! parsed on their terminator and answered with a reply followed by the `>`
//! prompt. The emulated vehicle holds stored and pending trouble codes so
//! Mode 01 PID 01, Mode 03, Mode 04 and Mode 07 behave consistently.

use crate::error::ObdError;
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};

/// Default reset banner
const FIRMWARE: &str = "ELM327 v1.5";

/// Default reply to the supported-PIDs probe
const SUPPORTED_PIDS_REPLY: &str = "41 00 BE 1F A8 13";

/// Trouble codes carried per Mode 03/07 frame
const CODES_PER_FRAME: usize = 3;

/// Transport-level activity, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    FlushInput,
    FlushOutput,
    Write(Vec<u8>),
}

/// In-memory ELM327 emulator implementing [`Transport`]
#[derive(Debug, Default)]
pub struct MockAdapter {
    /// Bytes waiting to be read by the session
    pending: VecDeque<u8>,
    /// Partially written command line
    line: Vec<u8>,
    /// Every byte ever written
    written: Vec<u8>,
    /// Commands received, normalized to upper case
    commands: Vec<String>,
    events: Vec<MockEvent>,
    /// Scripted replies; the last one repeats
    scripted: HashMap<String, VecDeque<String>>,
    muted: HashSet<String>,
    silent: bool,
    failing: bool,
    closed: bool,
    firmware: Option<String>,
    stored_codes: Vec<u16>,
    pending_codes: Vec<u16>,
    stored_cursor: usize,
    empty_reads: usize,
}

impl MockAdapter {
    /// Adapter with no trouble codes
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that never answers
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    /// Vehicle holding these stored (confirmed) codes
    pub fn with_stored_codes(mut self, codes: &[u16]) -> Self {
        self.stored_codes = codes.to_vec();
        self
    }

    /// Vehicle holding these pending codes (Mode 07)
    pub fn with_pending_codes(mut self, codes: &[u16]) -> Self {
        self.pending_codes = codes.to_vec();
        self
    }

    /// Banner returned on reset
    pub fn with_firmware(mut self, firmware: &str) -> Self {
        self.firmware = Some(firmware.to_string());
        self
    }

    /// Script the reply to a command; repeated calls queue further replies
    pub fn respond(mut self, command: &str, reply: &str) -> Self {
        self.scripted
            .entry(normalize_command(command))
            .or_default()
            .push_back(reply.to_string());
        self
    }

    /// Never answer this command
    pub fn mute(mut self, command: &str) -> Self {
        self.muted.insert(normalize_command(command));
        self
    }

    /// Make every subsequent I/O call fail
    pub fn fail_io(&mut self) {
        self.failing = true;
    }

    /// Queue raw bytes for the session to read
    pub fn inject(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Number of times a command was received
    pub fn command_count(&self, command: &str) -> usize {
        let command = normalize_command(command);
        self.commands.iter().filter(|c| **c == command).count()
    }

    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    /// Reads that returned no bytes
    pub fn empty_reads(&self) -> usize {
        self.empty_reads
    }

    /// Bytes not yet read
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn input_flushes(&self) -> usize {
        self.count_events(&MockEvent::FlushInput)
    }

    pub fn output_flushes(&self) -> usize {
        self.count_events(&MockEvent::FlushOutput)
    }

    /// Whether both buffers were flushed right before the latest write
    pub fn flushed_before_last_write(&self) -> bool {
        let Some(last_write) = self
            .events
            .iter()
            .rposition(|e| matches!(e, MockEvent::Write(_)))
        else {
            return false;
        };
        let before = &self.events[..last_write];
        let flushes: Vec<_> = before
            .iter()
            .rev()
            .take_while(|e| !matches!(e, MockEvent::Write(_)))
            .collect();
        flushes.contains(&&MockEvent::FlushInput) && flushes.contains(&&MockEvent::FlushOutput)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn stored_codes(&self) -> &[u16] {
        &self.stored_codes
    }

    fn count_events(&self, event: &MockEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    fn check_io(&self) -> Result<(), ObdError> {
        if self.failing {
            return Err(ObdError::Transport("mock I/O failure".to_string()));
        }
        if self.closed {
            return Err(ObdError::Transport("mock adapter closed".to_string()));
        }
        Ok(())
    }

    /// Pull complete command lines out of the write buffer
    fn process_line_buffer(&mut self) {
        while let Some(end) = self.line.iter().position(|&b| b == b'\r' || b == b'\n') {
            let raw: Vec<u8> = self.line.drain(..=end).collect();
            let command = normalize_command(&String::from_utf8_lossy(&raw));
            if command.is_empty() {
                continue;
            }
            self.commands.push(command.clone());
            if let Some(reply) = self.reply_for(&command) {
                self.inject(format!("{reply}\r\r>").as_bytes());
            }
        }
    }

    fn reply_for(&mut self, command: &str) -> Option<String> {
        if self.silent || self.muted.contains(command) {
            return None;
        }

        if let Some(replies) = self.scripted.get_mut(command) {
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            if reply.is_some() {
                return reply;
            }
        }

        let reply = match command {
            "ATZ" | "ATI" => self.firmware.clone().unwrap_or_else(|| FIRMWARE.to_string()),
            _ if is_setting_command(command) => "OK".to_string(),
            _ if command.starts_with("AT") => "?".to_string(),
            "0100" => SUPPORTED_PIDS_REPLY.to_string(),
            "0101" => self.monitor_status_reply(),
            "03" => self.stored_frame(),
            "04" => {
                self.stored_codes.clear();
                self.pending_codes.clear();
                self.stored_cursor = 0;
                "44".to_string()
            }
            "07" if self.pending_codes.is_empty() => "NO DATA".to_string(),
            "07" => {
                let shown = self.pending_codes.len().min(CODES_PER_FRAME);
                dtc_frame(0x47, &self.pending_codes[..shown])
            }
            _ => "NO DATA".to_string(),
        };
        Some(reply)
    }

    fn monitor_status_reply(&self) -> String {
        let count = self.stored_codes.len().min(0x7F) as u8;
        let mil = if self.stored_codes.is_empty() { 0 } else { 0x80 };
        format!("41 01 {:02X} 07 65 00", mil | count)
    }

    fn stored_frame(&mut self) -> String {
        let frames: Vec<&[u16]> = self.stored_codes.chunks(CODES_PER_FRAME).collect();
        if frames.is_empty() {
            return dtc_frame(0x43, &[]);
        }
        let frame = frames[self.stored_cursor % frames.len()];
        self.stored_cursor += 1;
        dtc_frame(0x43, frame)
    }
}

/// Mode reply byte followed by three code slots, zero padded
fn dtc_frame(mode: u8, codes: &[u16]) -> String {
    let mut frame = format!("{mode:02X}");
    for slot in 0..CODES_PER_FRAME {
        let code = codes.get(slot).copied().unwrap_or(0);
        frame.push_str(&format!(" {:02X} {:02X}", code >> 8, code & 0xFF));
    }
    frame
}

fn normalize_command(command: &str) -> String {
    command
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn is_setting_command(command: &str) -> bool {
    matches!(
        command,
        "ATE0" | "ATE1" | "ATL0" | "ATL1" | "ATS0" | "ATS1" | "ATH0" | "ATH1"
    ) || command.starts_with("ATSP")
        || command.starts_with("ATST")
        || command.starts_with("ATAT")
}

#[async_trait]
impl Transport for MockAdapter {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ObdError> {
        self.check_io()?;
        let mut count = 0;
        while count < buf.len() {
            match self.pending.pop_front() {
                Some(b) => {
                    buf[count] = b;
                    count += 1;
                }
                None => break,
            }
        }
        if count == 0 {
            self.empty_reads += 1;
        }
        Ok(count)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ObdError> {
        self.check_io()?;
        self.events.push(MockEvent::Write(data.to_vec()));
        self.written.extend_from_slice(data);
        self.line.extend_from_slice(data);
        self.process_line_buffer();
        Ok(())
    }

    fn flush_input(&mut self) -> Result<(), ObdError> {
        self.check_io()?;
        self.events.push(MockEvent::FlushInput);
        self.pending.clear();
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), ObdError> {
        self.check_io()?;
        self.events.push(MockEvent::FlushOutput);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ObdError> {
        if self.failing {
            return Err(ObdError::Transport("mock I/O failure".to_string()));
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{read_result, send_command};

    async fn exchange(adapter: &mut MockAdapter, command: &str) -> Option<String> {
        send_command(adapter, command).await.unwrap();
        read_result(adapter).await.unwrap()
    }

    #[tokio::test]
    async fn test_at_commands() {
        let mut adapter = MockAdapter::new();
        assert_eq!(exchange(&mut adapter, "atz").await.as_deref(), Some("ELM327 v1.5"));
        assert_eq!(exchange(&mut adapter, "ate0").await.as_deref(), Some("OK"));
        assert_eq!(exchange(&mut adapter, "atxyz").await.as_deref(), Some("?"));
        assert_eq!(adapter.commands(), ["ATZ", "ATE0", "ATXYZ"]);
    }

    #[tokio::test]
    async fn test_stored_codes_frames() {
        let mut adapter = MockAdapter::new().with_stored_codes(&[0x0133, 0x0300, 0x4123, 0xC001]);
        assert_eq!(
            exchange(&mut adapter, "0101").await.as_deref(),
            Some("41 01 84 07 65 00")
        );
        assert_eq!(
            exchange(&mut adapter, "03").await.as_deref(),
            Some("43 01 33 03 00 41 23")
        );
        assert_eq!(
            exchange(&mut adapter, "03").await.as_deref(),
            Some("43 C0 01 00 00 00 00")
        );
    }

    #[tokio::test]
    async fn test_clear_resets_vehicle() {
        let mut adapter = MockAdapter::new()
            .with_stored_codes(&[0x0133])
            .with_pending_codes(&[0x0171]);
        assert_eq!(exchange(&mut adapter, "04").await.as_deref(), Some("44"));
        assert!(adapter.stored_codes().is_empty());
        assert_eq!(
            exchange(&mut adapter, "0101").await.as_deref(),
            Some("41 01 00 07 65 00")
        );
        assert_eq!(exchange(&mut adapter, "07").await.as_deref(), Some("NO DATA"));
    }

    #[tokio::test]
    async fn test_scripted_sequence_repeats_last() {
        let mut adapter = MockAdapter::new()
            .respond("010D", "41 0D 10")
            .respond("010D", "41 0D 20");
        assert_eq!(exchange(&mut adapter, "010D").await.as_deref(), Some("41 0D 10"));
        assert_eq!(exchange(&mut adapter, "010D").await.as_deref(), Some("41 0D 20"));
        assert_eq!(exchange(&mut adapter, "010D").await.as_deref(), Some("41 0D 20"));
    }

    #[tokio::test]
    async fn test_failing_io() {
        let mut adapter = MockAdapter::new();
        adapter.fail_io();
        assert!(send_command(&mut adapter, "atz").await.is_err());
        assert!(adapter.close().await.is_err());
    }
}
