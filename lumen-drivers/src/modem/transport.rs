//! Line transport between the driver and the modem UART

use core::future::Future;

use lumen_hal::LinkError;

use super::at::{is_event, Line};
use crate::warn;

/// Line-oriented modem connection
///
/// The board side splits incoming lines in two streams: command responses
/// and unsolicited `+EVT:` events.
pub trait ModemTransport {
    /// Send one command line; the transport appends CRLF
    fn send_line(&mut self, line: &str) -> impl Future<Output = Result<(), LinkError>>;

    /// Next response line, `None` after `timeout_ms`
    fn next_response(&mut self, timeout_ms: u32) -> impl Future<Output = Option<Line>>;

    /// Next event line, `None` after `timeout_ms` (0 polls without waiting)
    fn next_event(&mut self, timeout_ms: u32) -> impl Future<Output = Option<Line>>;
}

/// Which stream a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineKind {
    Response,
    Event,
}

/// Splits the modem byte stream into lines
///
/// CR is dropped, LF ends a line, empty lines are skipped. A line longer
/// than [`super::at::MAX_LINE`] is discarded whole.
#[derive(Default)]
pub struct LineFramer {
    line: Line,
    overflow: bool,
}

impl LineFramer {
    pub const fn new() -> Self {
        Self {
            line: Line::new(),
            overflow: false,
        }
    }

    /// Feed one byte, returns a complete line
    pub fn push(&mut self, byte: u8) -> Option<(LineKind, Line)> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let line = core::mem::take(&mut self.line);
                if core::mem::take(&mut self.overflow) {
                    warn!("modem line too long, dropped");
                    return None;
                }
                if line.is_empty() {
                    return None;
                }
                let kind = if is_event(&line) {
                    LineKind::Event
                } else {
                    LineKind::Response
                };
                Some((kind, line))
            }
            _ => {
                if !self.overflow && self.line.push(byte as char).is_err() {
                    self.overflow = true;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::at::MAX_LINE;

    fn feed(framer: &mut LineFramer, bytes: &[u8]) -> std::vec::Vec<(LineKind, std::string::String)> {
        bytes
            .iter()
            .filter_map(|&b| framer.push(b))
            .map(|(kind, line)| (kind, line.as_str().into()))
            .collect()
    }

    #[test]
    fn test_splits_and_classifies() {
        let mut framer = LineFramer::new();
        let lines = feed(&mut framer, b"AT+NJS=1\r\nOK\r\n\r\n+EVT:RX_C:-45:7:UNICAST:1:AA\r\n");
        assert_eq!(
            lines,
            [
                (LineKind::Response, "AT+NJS=1".into()),
                (LineKind::Response, "OK".into()),
                (LineKind::Event, "+EVT:RX_C:-45:7:UNICAST:1:AA".into()),
            ]
        );
    }

    #[test]
    fn test_partial_line_waits() {
        let mut framer = LineFramer::new();
        assert!(feed(&mut framer, b"O").is_empty());
        assert_eq!(feed(&mut framer, b"K\n"), [(LineKind::Response, "OK".into())]);
    }

    #[test]
    fn test_overlong_line_dropped() {
        let mut framer = LineFramer::new();
        let long = std::vec![b'A'; MAX_LINE + 10];
        assert!(feed(&mut framer, &long).is_empty());
        assert!(feed(&mut framer, b"\n").is_empty());
        assert_eq!(feed(&mut framer, b"OK\n"), [(LineKind::Response, "OK".into())]);
    }
}
