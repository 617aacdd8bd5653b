//! RUI3 AT command set
//!
//! Commands are ASCII lines terminated by CRLF. Every command answers with
//! zero or more value lines followed by `OK` or an `AT_*_ERROR` status.
//! Asynchronous events (join result, transmit done, received downlinks)
//! arrive as `+EVT:` lines at any time.
//!
//! ```text
//! AT+SEND=3:01FF0000        -> OK, then +EVT:TX_DONE
//! AT+DEVADDR=?              -> AT+DEVADDR=26011A2B, OK
//! +EVT:RX_C:-45:7:UNICAST:3:01FF0000
//! ```

use core::fmt::Write;

use heapless::String;
use lumen_hal::{Bandwidth, FrameInfo, LinkError, LinkEvent};

/// Longest line exchanged with the modem (a full 242-byte hex payload plus
/// the event header)
pub const MAX_LINE: usize = 560;

/// Largest application payload the modem accepts
pub const MAX_APP_PAYLOAD: usize = 242;

/// One line to or from the modem, without the terminator
pub type Line = String<MAX_LINE>;

/// Fixed commands
pub mod cmd {
    /// Join once with OTAA, no auto-join: `join:auto:interval:attempts`
    pub const JOIN: &str = "AT+JOIN=1:0:10:1";
    /// Network join status, `1` when joined
    pub const JOIN_STATUS: &str = "AT+NJS=?";
    pub const DEVADDR: &str = "AT+DEVADDR=?";
    pub const CLASS_QUERY: &str = "AT+CLASS=?";
    pub const CLASS_C: &str = "AT+CLASS=C";
}

/// Event prefixes
pub mod evt {
    pub const PREFIX: &str = "+EVT:";
    pub const JOINED: &str = "+EVT:JOINED";
    pub const JOIN_FAILED: &str = "+EVT:JOIN_FAILED";
    pub const TX_DONE: &str = "+EVT:TX_DONE";
    pub const SEND_CONFIRMED_OK: &str = "+EVT:SEND_CONFIRMED_OK";
    pub const SEND_CONFIRMED_FAILED: &str = "+EVT:SEND_CONFIRMED_FAILED";
    pub const RX: &str = "+EVT:RX_";
}

/// A response line, classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    Ok,
    Error(LinkError),
    /// Value line, with any `AT+CMD=` echo stripped
    Value(&'a str),
    /// Unsolicited event
    Event,
}

/// Classify one line
pub fn classify(line: &str) -> Response<'_> {
    match line {
        "OK" => Response::Ok,
        "AT_BUSY_ERROR" => Response::Error(LinkError::Busy),
        "AT_PARAM_ERROR" => Response::Error(LinkError::UnsupportedParameter),
        "AT_NO_NETWORK_JOINED" => Response::Error(LinkError::Rejected),
        _ if line.starts_with(evt::PREFIX) => Response::Event,
        _ if line.starts_with("AT_") && line.ends_with("ERROR") => {
            Response::Error(LinkError::Rejected)
        }
        _ if line == "AT_COMMAND_NOT_FOUND" => Response::Error(LinkError::Rejected),
        _ if line.starts_with("AT+") => match line.split_once('=') {
            Some((_, value)) => Response::Value(value),
            None => Response::Value(line),
        },
        _ => Response::Value(line),
    }
}

pub fn is_event(line: &str) -> bool {
    line.starts_with(evt::PREFIX)
}

pub fn is_rx_event(line: &str) -> bool {
    line.starts_with(evt::RX)
}

/// Join or uplink outcome carried by an event line
pub fn completion(line: &str) -> Option<LinkEvent> {
    match line {
        evt::JOINED => Some(LinkEvent::JoinDone(Ok(()))),
        _ if line.starts_with(evt::JOIN_FAILED) => {
            Some(LinkEvent::JoinDone(Err(LinkError::Rejected)))
        }
        evt::TX_DONE | evt::SEND_CONFIRMED_OK => Some(LinkEvent::UplinkDone(Ok(()))),
        evt::SEND_CONFIRMED_FAILED => Some(LinkEvent::UplinkDone(Err(LinkError::Rejected))),
        _ => None,
    }
}

/// US915 downlink data rate for a spreading factor and bandwidth
///
/// RX2 downlinks use DR8..DR13 (500 kHz); the 125 kHz rates DR0..DR3 are
/// uplink rates that some firmware also accepts. 250 kHz has no US915 rate.
pub fn us915_data_rate(spreading_factor: u8, bandwidth: Bandwidth) -> Option<u8> {
    match (bandwidth, spreading_factor) {
        (Bandwidth::Khz500, 7..=12) => Some(8 + (12 - spreading_factor)),
        (Bandwidth::Khz125, 7..=10) => Some(10 - spreading_factor),
        _ => None,
    }
}

/// `AT+SEND=<port>:<hex>`
pub fn send_command(port: u8, payload: &[u8]) -> Result<Line, LinkError> {
    if payload.len() > MAX_APP_PAYLOAD {
        return Err(LinkError::PayloadTooLarge);
    }
    let mut line = Line::new();
    write!(line, "AT+SEND={}:", port).map_err(|_| LinkError::PayloadTooLarge)?;
    encode_hex(payload, &mut line)?;
    Ok(line)
}

/// `AT+CFM=<0|1>`
pub fn confirm_command(confirmed: bool) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "AT+CFM={}", confirmed as u8);
    line
}

/// `AT+RX2FQ=<hz>`
pub fn rx2_frequency_command(frequency_hz: u32) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "AT+RX2FQ={}", frequency_hz);
    line
}

/// `AT+RX2DR=<dr>`
pub fn rx2_data_rate_command(data_rate: u8) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "AT+RX2DR={}", data_rate);
    line
}

/// Radio metadata of a received downlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMeta {
    pub rssi: i16,
    pub snr: i8,
}

/// Parse `+EVT:RX_<win>:<rssi>:<snr>:<cast>:<port>:<hex>` into `buf`
///
/// Returns `None` if `line` is not a receive event. A malformed event or an
/// undecodable payload is an integrity failure.
pub fn parse_rx_event(
    line: &str,
    buf: &mut [u8],
) -> Option<Result<(FrameInfo, RxMeta), LinkError>> {
    let body = line.strip_prefix(evt::RX)?;
    Some(parse_rx_body(body, buf))
}

fn parse_rx_body(body: &str, buf: &mut [u8]) -> Result<(FrameInfo, RxMeta), LinkError> {
    let mut fields = body.split(':');
    let _window = fields.next().ok_or(LinkError::Integrity)?;
    let rssi = parse_field::<i16>(fields.next())?;
    let snr = parse_field::<i8>(fields.next())?;
    let _cast = fields.next().ok_or(LinkError::Integrity)?;
    let port = parse_field::<u8>(fields.next())?;
    let hex = fields.next().unwrap_or("");
    if fields.next().is_some() {
        return Err(LinkError::Integrity);
    }

    let len = decode_hex(hex, buf)?;
    Ok((FrameInfo { port, len }, RxMeta { rssi, snr }))
}

fn parse_field<T: core::str::FromStr>(field: Option<&str>) -> Result<T, LinkError> {
    field
        .and_then(|f| f.trim().parse().ok())
        .ok_or(LinkError::Integrity)
}

/// Append `bytes` as uppercase hex
pub fn encode_hex<const N: usize>(bytes: &[u8], out: &mut String<N>) -> Result<(), LinkError> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char)
            .and_then(|_| out.push(DIGITS[(b & 0x0F) as usize] as char))
            .map_err(|_| LinkError::PayloadTooLarge)?;
    }
    Ok(())
}

/// Decode hex into `buf`, returns the byte count
pub fn decode_hex(hex: &str, buf: &mut [u8]) -> Result<usize, LinkError> {
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(LinkError::Integrity);
    }
    let len = digits.len() / 2;
    if len > buf.len() {
        return Err(LinkError::PayloadTooLarge);
    }
    for (slot, pair) in buf.iter_mut().zip(digits.chunks_exact(2)) {
        *slot = (nibble(pair[0])? << 4) | nibble(pair[1])?;
    }
    Ok(len)
}

fn nibble(digit: u8) -> Result<u8, LinkError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(LinkError::Integrity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("OK"), Response::Ok);
        assert_eq!(classify("AT_BUSY_ERROR"), Response::Error(LinkError::Busy));
        assert_eq!(
            classify("AT_PARAM_ERROR"),
            Response::Error(LinkError::UnsupportedParameter)
        );
        assert_eq!(classify("AT_ERROR"), Response::Error(LinkError::Rejected));
        assert_eq!(classify("AT+NJS=1"), Response::Value("1"));
        assert_eq!(classify("26011A2B"), Response::Value("26011A2B"));
        assert_eq!(classify("+EVT:TX_DONE"), Response::Event);
    }

    #[test]
    fn test_completion_events() {
        assert_eq!(completion("+EVT:JOINED"), Some(LinkEvent::JoinDone(Ok(()))));
        assert_eq!(
            completion("+EVT:JOIN_FAILED_RX_TIMEOUT"),
            Some(LinkEvent::JoinDone(Err(LinkError::Rejected)))
        );
        assert_eq!(completion("+EVT:TX_DONE"), Some(LinkEvent::UplinkDone(Ok(()))));
        assert_eq!(
            completion("+EVT:SEND_CONFIRMED_FAILED"),
            Some(LinkEvent::UplinkDone(Err(LinkError::Rejected)))
        );
        assert_eq!(completion("+EVT:RX_C:-50:9:UNICAST:4:F0"), None);
    }

    #[test]
    fn test_data_rates() {
        assert_eq!(us915_data_rate(12, Bandwidth::Khz500), Some(8));
        assert_eq!(us915_data_rate(7, Bandwidth::Khz500), Some(13));
        assert_eq!(us915_data_rate(10, Bandwidth::Khz125), Some(0));
        assert_eq!(us915_data_rate(12, Bandwidth::Khz125), None);
        assert_eq!(us915_data_rate(12, Bandwidth::Khz250), None);
    }

    #[test]
    fn test_send_command() {
        let line = send_command(3, &[0x01, 0xFF, 0x00, 0xAB]).unwrap();
        assert_eq!(line.as_str(), "AT+SEND=3:01FF00AB");
        assert_eq!(
            send_command(1, &[0; 243]),
            Err(LinkError::PayloadTooLarge)
        );
        // A maximum payload still fits a line
        assert!(send_command(223, &[0xEE; MAX_APP_PAYLOAD]).is_ok());
    }

    #[test]
    fn test_settings_commands() {
        assert_eq!(confirm_command(false).as_str(), "AT+CFM=0");
        assert_eq!(rx2_frequency_command(923_300_000).as_str(), "AT+RX2FQ=923300000");
        assert_eq!(rx2_data_rate_command(8).as_str(), "AT+RX2DR=8");
    }

    #[test]
    fn test_parse_rx_event() {
        let mut buf = [0u8; 16];
        let (info, meta) = parse_rx_event("+EVT:RX_C:-45:7:UNICAST:3:01ff0000", &mut buf)
            .unwrap()
            .unwrap();
        assert_eq!(info, FrameInfo { port: 3, len: 4 });
        assert_eq!(&buf[..4], &[0x01, 0xFF, 0x00, 0x00]);
        assert_eq!(meta, RxMeta { rssi: -45, snr: 7 });
    }

    #[test]
    fn test_parse_rx_event_without_payload() {
        let mut buf = [0u8; 4];
        let (info, _) = parse_rx_event("+EVT:RX_C:-90:-3:UNICAST:0:", &mut buf)
            .unwrap()
            .unwrap();
        assert_eq!(info, FrameInfo { port: 0, len: 0 });
    }

    #[test]
    fn test_parse_rx_event_rejects_corruption() {
        let mut buf = [0u8; 16];
        assert_eq!(
            parse_rx_event("+EVT:RX_C:-45:7:UNICAST:3:01F", &mut buf),
            Some(Err(LinkError::Integrity))
        );
        assert_eq!(
            parse_rx_event("+EVT:RX_C:-45:7:UNICAST:3:01XZ", &mut buf),
            Some(Err(LinkError::Integrity))
        );
        assert_eq!(
            parse_rx_event("+EVT:RX_C:-45:UNICAST:3:01", &mut buf),
            Some(Err(LinkError::Integrity))
        );
        assert_eq!(parse_rx_event("+EVT:TX_DONE", &mut buf), None);
    }

    #[test]
    fn test_parse_rx_event_buffer_too_small() {
        let mut buf = [0u8; 1];
        assert_eq!(
            parse_rx_event("+EVT:RX_C:-45:7:UNICAST:3:0102", &mut buf),
            Some(Err(LinkError::PayloadTooLarge))
        );
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut hex: String<128> = String::new();
            encode_hex(&bytes, &mut hex).unwrap();
            let mut buf = [0u8; 64];
            let len = decode_hex(&hex, &mut buf).unwrap();
            prop_assert_eq!(&buf[..len], &bytes[..]);
        }

        #[test]
        fn prop_rx_parser_never_panics(line in "\\+EVT:RX_[A-Z0-9:\\-]{0,40}") {
            let mut buf = [0u8; 8];
            prop_assert!(parse_rx_event(&line, &mut buf).is_some());
        }
    }
}
