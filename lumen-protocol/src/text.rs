//! JSON downlink formats
//!
//! ```text
//! {"lights":[{"address":1,"channels":[255,0,0,0]}]}
//! {"pattern":"rainbow"}
//! {"pattern":{"type":"chase","speed":100,"cycles":3,"staggered":true}}
//! {"test":"ping"}
//! {"test":{"pattern":"continuous","speed":40}}
//! {"cmd":"red"}
//! ```
//!
//! `serde-json-core` has no untagged enums, so a document is probed for its
//! top-level keys first and then parsed into the typed shape for that key.
//! Keys are tried in the order lights, pattern, test, cmd.

use core::fmt;
use core::marker::PhantomData;

use heapless::Vec;
use serde::de::{IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::command::{
    PatternKind, PatternSpec, SimpleColor, DEFAULT_CYCLES, DEFAULT_SPEED_MS, MAX_LIGHTS,
    MAX_LIGHT_CHANNELS,
};
use crate::decode::{DecodeError, RawLight};

// A 242 byte document cannot describe more lights than this
const MAX_JSON_LIGHTS: usize = 24;

/// Command recognised in a JSON document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    /// `dropped` counts lights past the per-document limit
    Lights {
        lights: Vec<RawLight, MAX_LIGHTS>,
        dropped: usize,
    },
    Pattern(PatternSpec),
    Stop,
    Color(SimpleColor),
    Ping,
}

#[derive(Deserialize)]
struct Probe {
    lights: Option<IgnoredAny>,
    pattern: Option<IgnoredAny>,
    test: Option<IgnoredAny>,
    cmd: Option<IgnoredAny>,
}

#[derive(Deserialize)]
struct LightsDoc {
    lights: Capped<LightDoc, MAX_JSON_LIGHTS>,
}

#[derive(Deserialize)]
struct LightDoc {
    address: i32,
    channels: Capped<i32, MAX_LIGHT_CHANNELS>,
}

/// Array that keeps its first `N` elements and counts the rest
///
/// One over-long light must not fail the whole document.
struct Capped<T, const N: usize> {
    items: Vec<T, N>,
    dropped: usize,
}

impl<'de, T: Deserialize<'de>, const N: usize> Deserialize<'de> for Capped<T, N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CappedVisitor<T, const N: usize>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>, const N: usize> Visitor<'de> for CappedVisitor<T, N> {
            type Value = Capped<T, N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                let mut dropped = 0;
                while let Some(item) = seq.next_element()? {
                    if items.push(item).is_err() {
                        dropped += 1;
                    }
                }
                Ok(Capped { items, dropped })
            }
        }

        deserializer.deserialize_seq(CappedVisitor(PhantomData))
    }
}

#[derive(Deserialize)]
struct PatternDoc<'a> {
    #[serde(rename = "type", borrow)]
    kind: Option<&'a str>,
    #[serde(borrow)]
    pattern: Option<&'a str>,
    speed: Option<i64>,
    cycles: Option<i64>,
    staggered: Option<bool>,
}

#[derive(Deserialize)]
struct NamedPattern<'a> {
    pattern: &'a str,
}

#[derive(Deserialize)]
struct ObjectPattern<'a> {
    #[serde(borrow)]
    pattern: PatternDoc<'a>,
}

#[derive(Deserialize)]
struct NamedTest<'a> {
    test: &'a str,
}

#[derive(Deserialize)]
struct ObjectTest<'a> {
    #[serde(borrow)]
    test: PatternDoc<'a>,
}

#[derive(Deserialize)]
struct CmdDoc<'a> {
    cmd: &'a str,
}

/// Parse a JSON document
///
/// `None` means the payload is not a document this controller understands
/// and should be kept as raw bytes.
pub fn parse(payload: &[u8]) -> Option<Result<TextCommand, DecodeError>> {
    let (probe, _) = serde_json_core::from_slice::<Probe>(payload).ok()?;

    if probe.lights.is_some() {
        return Some(lights(payload));
    }
    if probe.pattern.is_some() {
        return Some(pattern(payload));
    }
    if probe.test.is_some() {
        return Some(test(payload));
    }
    if probe.cmd.is_some() {
        return cmd(payload);
    }
    None
}

fn lights(payload: &[u8]) -> Result<TextCommand, DecodeError> {
    let (doc, _) = serde_json_core::from_slice::<LightsDoc>(payload)
        .map_err(|_| DecodeError::Malformed)?;
    let lights = doc
        .lights
        .items
        .into_iter()
        .map(|light| RawLight {
            address: light.address,
            // Too many channels: leave it empty so validation skips it
            channels: if light.channels.dropped > 0 {
                Vec::new()
            } else {
                light.channels.items
            },
        })
        .collect();
    Ok(TextCommand::Lights {
        lights,
        dropped: doc.lights.dropped,
    })
}

fn pattern(payload: &[u8]) -> Result<TextCommand, DecodeError> {
    if let Ok((doc, _)) = serde_json_core::from_slice::<NamedPattern>(payload) {
        return by_name(doc.pattern, None, None, None, false);
    }
    let (doc, _) = serde_json_core::from_slice::<ObjectPattern>(payload)
        .map_err(|_| DecodeError::Malformed)?;
    let doc = doc.pattern;
    let name = doc.kind.or(doc.pattern).ok_or(DecodeError::Malformed)?;
    by_name(name, doc.speed, doc.cycles, doc.staggered, false)
}

fn test(payload: &[u8]) -> Result<TextCommand, DecodeError> {
    if let Ok((doc, _)) = serde_json_core::from_slice::<NamedTest>(payload) {
        return by_name(doc.test, None, None, None, true);
    }
    let (doc, _) =
        serde_json_core::from_slice::<ObjectTest>(payload).map_err(|_| DecodeError::Malformed)?;
    let doc = doc.test;
    let name = doc.pattern.or(doc.kind).ok_or(DecodeError::Malformed)?;
    by_name(name, doc.speed, doc.cycles, doc.staggered, true)
}

fn cmd(payload: &[u8]) -> Option<Result<TextCommand, DecodeError>> {
    let Ok((doc, _)) = serde_json_core::from_slice::<CmdDoc>(payload) else {
        return Some(Err(DecodeError::Malformed));
    };
    match doc.cmd {
        // Redirects to a sibling field; reaching here means it is missing
        "lights" | "pattern" => Some(Err(DecodeError::Malformed)),
        "stop" => Some(Ok(TextCommand::Stop)),
        "ping" => Some(Ok(TextCommand::Ping)),
        name => {
            if let Some(color) = SimpleColor::from_name(name) {
                return Some(Ok(TextCommand::Color(color)));
            }
            PatternKind::from_name(name)
                .map(|kind| Ok(TextCommand::Pattern(PatternSpec::shorthand(kind))))
        }
    }
}

fn by_name(
    name: &str,
    speed: Option<i64>,
    cycles: Option<i64>,
    staggered: Option<bool>,
    test: bool,
) -> Result<TextCommand, DecodeError> {
    let speed = speed.unwrap_or(DEFAULT_SPEED_MS as i64);
    match name {
        "stop" => return Ok(TextCommand::Stop),
        "ping" if test => return Ok(TextCommand::Ping),
        "continuous" if test => return Ok(TextCommand::Pattern(PatternSpec::continuous(speed))),
        _ => {}
    }
    let kind = PatternKind::from_name(name).ok_or(DecodeError::UnknownPattern)?;
    Ok(TextCommand::Pattern(PatternSpec::clamped(
        kind,
        speed,
        cycles.unwrap_or(DEFAULT_CYCLES as i64),
        staggered.unwrap_or(false),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(json: &str) -> TextCommand {
        parse(json.as_bytes())
            .expect("document recognised")
            .expect("document valid")
    }

    #[test]
    fn test_lights_document() {
        let TextCommand::Lights { lights, dropped } =
            parsed(r#"{"lights":[{"address":5,"channels":[255,0,128]},{"address":9,"channels":[1]}]}"#)
        else {
            panic!("expected lights");
        };
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].address, 5);
        assert_eq!(&lights[0].channels[..], &[255, 0, 128]);
        assert_eq!(lights[1].address, 9);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_lights_over_channel_limit_stay_in_document() {
        let TextCommand::Lights { lights, dropped } = parsed(
            r#"{"lights":[{"address":1,"channels":[9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9]},{"address":100,"channels":[5]}]}"#,
        ) else {
            panic!("expected lights");
        };
        assert_eq!(dropped, 0);
        assert_eq!(lights.len(), 2);
        assert!(lights[0].channels.is_empty());
        assert!(lights[0].validate().is_none());
        assert_eq!(lights[1].address, 100);
        assert_eq!(&lights[1].channels[..], &[5]);
    }

    #[test]
    fn test_lights_past_document_limit_are_counted() {
        let mut json = std::string::String::from(r#"{"lights":["#);
        for i in 0..MAX_JSON_LIGHTS + 2 {
            if i > 0 {
                json.push(',');
            }
            json.push_str(r#"{"address":1,"channels":[]}"#);
        }
        json.push_str("]}");

        let TextCommand::Lights { lights, dropped } = parsed(&json) else {
            panic!("expected lights");
        };
        assert_eq!(lights.len(), MAX_JSON_LIGHTS);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_pattern_shorthand_uses_defaults() {
        assert_eq!(
            parsed(r#"{"pattern":"strobe"}"#),
            TextCommand::Pattern(PatternSpec {
                kind: PatternKind::Strobe,
                speed_ms: 50,
                cycles: 5,
                staggered: false,
            })
        );
    }

    #[test]
    fn test_pattern_object() {
        assert_eq!(
            parsed(r#"{"pattern":{"type":"chase","speed":120,"cycles":0,"staggered":true}}"#),
            TextCommand::Pattern(PatternSpec {
                kind: PatternKind::Chase,
                speed_ms: 120,
                cycles: 0,
                staggered: true,
            })
        );
    }

    #[test]
    fn test_pattern_object_speed_floor() {
        let TextCommand::Pattern(spec) = parsed(r#"{"pattern":{"type":"fade","speed":1}}"#) else {
            panic!("expected pattern");
        };
        assert_eq!(spec.speed_ms, 5);
        assert_eq!(spec.kind, PatternKind::ColorFade);
    }

    #[test]
    fn test_pattern_stop() {
        assert_eq!(parsed(r#"{"pattern":"stop"}"#), TextCommand::Stop);
    }

    #[test]
    fn test_unknown_pattern_name() {
        assert_eq!(
            parse(br#"{"pattern":"disco"}"#),
            Some(Err(DecodeError::UnknownPattern))
        );
    }

    #[test]
    fn test_test_forms() {
        assert_eq!(parsed(r#"{"test":"ping"}"#), TextCommand::Ping);
        assert_eq!(parsed(r#"{"test":{"pattern":"ping"}}"#), TextCommand::Ping);

        let TextCommand::Pattern(spec) = parsed(r#"{"test":{"pattern":"continuous"}}"#) else {
            panic!("expected pattern");
        };
        assert_eq!(spec.kind, PatternKind::Rainbow);
        assert_eq!(spec.cycles, 0);
        assert!(spec.staggered);

        let TextCommand::Pattern(spec) =
            parsed(r#"{"test":{"pattern":"strobe","speed":80,"cycles":2}}"#)
        else {
            panic!("expected pattern");
        };
        assert_eq!(spec.kind, PatternKind::Strobe);
        assert_eq!(spec.speed_ms, 80);
        assert_eq!(spec.cycles, 2);
    }

    #[test]
    fn test_ping_only_under_test() {
        assert_eq!(
            parse(br#"{"pattern":"ping"}"#),
            Some(Err(DecodeError::UnknownPattern))
        );
    }

    #[test]
    fn test_cmd_forms() {
        assert_eq!(parsed(r#"{"cmd":"blue"}"#), TextCommand::Color(SimpleColor::Blue));
        assert_eq!(parsed(r#"{"cmd":"off"}"#), TextCommand::Color(SimpleColor::Off));
        assert_eq!(parsed(r#"{"cmd":"stop"}"#), TextCommand::Stop);
        assert_eq!(
            parsed(r#"{"cmd":"rainbow"}"#),
            TextCommand::Pattern(PatternSpec::shorthand(PatternKind::Rainbow))
        );
        assert!(parse(br#"{"cmd":"reboot"}"#).is_none());
    }

    #[test]
    fn test_cmd_redirects() {
        let TextCommand::Lights { lights, .. } =
            parsed(r#"{"cmd":"lights","lights":[{"address":3,"channels":[7]}]}"#)
        else {
            panic!("expected lights");
        };
        assert_eq!(lights[0].address, 3);

        assert_eq!(
            parse(br#"{"cmd":"pattern"}"#),
            Some(Err(DecodeError::Malformed))
        );
    }

    #[test]
    fn test_not_json() {
        assert!(parse(b"plain text").is_none());
        assert!(parse(br#"{"other":1}"#).is_none());
    }
}
