//! Command/Response Framing
//!
//! Adapter replies carry no length field: a reply ends when the adapter
//! prints its `>` prompt. Reads are byte-at-a-time and bounded by a fixed
//! number of consecutive empty reads so a silent adapter cannot hang a query.

use crate::error::ObdError;
use crate::transport::Transport;
use tracing::{debug, trace, warn};

/// Adapter ready prompt
pub const PROMPT: u8 = b'>';

/// Terminator appended to every command
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Consecutive empty reads after which a reply is considered absent
pub const MAX_EMPTY_READS: usize = 5;

/// Bytes written on the wire for a command
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + COMMAND_TERMINATOR.len());
    bytes.extend_from_slice(command.as_bytes());
    bytes.extend_from_slice(COMMAND_TERMINATOR);
    bytes
}

/// Discard stale bytes, then write `command` and its terminator
pub async fn send_command<T>(transport: &mut T, command: &str) -> Result<(), ObdError>
where
    T: Transport + ?Sized,
{
    transport.flush_output()?;
    transport.flush_input()?;
    transport.write(&encode_command(command)).await?;
    debug!(command, "Sent command");
    Ok(())
}

/// Read one reply up to (excluding) the prompt
///
/// Carriage returns are dropped. A prompt that arrives before any content is
/// ignored. Returns `None` when nothing arrived before [`MAX_EMPTY_READS`]
/// consecutive empty reads.
pub async fn read_result<T>(transport: &mut T) -> Result<Option<String>, ObdError>
where
    T: Transport + ?Sized,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut empty_reads = 0;
    let mut byte = [0u8; 1];

    loop {
        if transport.read(&mut byte).await? == 0 {
            empty_reads += 1;
            trace!(empty_reads, "Got nothing");
            if empty_reads == MAX_EMPTY_READS {
                if !buffer.is_empty() {
                    warn!(empty_reads, "Reply ended without prompt");
                }
                break;
            }
            continue;
        }
        empty_reads = 0;

        match byte[0] {
            b'\r' => continue,
            PROMPT if buffer.is_empty() => {
                trace!("Skipping leading prompt");
                continue;
            }
            PROMPT => break,
            b => buffer.push(b),
        }
    }

    let result = String::from_utf8_lossy(&buffer).into_owned();
    debug!(response = %result, "Got result");

    if result.is_empty() {
        Ok(None)
    } else {
        Ok(Some(result))
    }
}
