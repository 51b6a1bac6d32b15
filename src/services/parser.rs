//! Command Parser
//!
//! Extracts machine-readable tool commands from free-form model text.
//! Commands arrive inside fenced blocks tagged `query` or `action`; each
//! block may hold several concatenated JSON objects with no separator at
//! all. Parsing is best-effort: a malformed fragment is skipped and decoding
//! resumes at the next object, so a broken fragment never costs the rest of
//! its block or the document.

use serde_json::Value;

use cellflow_core::{CommandKind, ToolCommand};

/// Parse every command block out of a model response, preserving source
/// order across blocks. Pure function; payload semantics are not checked
/// here (the executor's typed decode does that).
pub fn parse_commands(text: &str) -> Vec<ToolCommand> {
    let mut commands = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let (tag, body_start) = match after_fence.find('\n') {
            Some(nl) => (after_fence[..nl].trim(), nl + 1),
            None => break,
        };
        let kind = match tag {
            "query" => Some(CommandKind::Query),
            "action" => Some(CommandKind::Action),
            _ => None,
        };
        let body = &after_fence[body_start..];
        let (block, consumed) = match body.find("```") {
            Some(close) => (&body[..close], open + 3 + body_start + close + 3),
            None => (body, rest.len()),
        };
        if let Some(kind) = kind {
            decode_block(kind, block, &mut commands);
        }
        rest = &rest[consumed.min(rest.len())..];
    }

    commands
}

/// Decode concatenated JSON objects one at a time. A decode error abandons
/// only the malformed fragment: the stream restarts at the next `{`, so
/// well-formed objects on either side of it are kept.
fn decode_block(kind: CommandKind, block: &str, out: &mut Vec<ToolCommand>) {
    let mut rest = block;
    loop {
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let error_at = loop {
            match stream.next() {
                Some(Ok(payload)) if payload.is_object() => {
                    out.push(ToolCommand { kind, payload });
                }
                Some(Ok(_)) => {}
                Some(Err(_)) => break Some(stream.byte_offset()),
                None => break None,
            }
        };
        let Some(offset) = error_at else { break };
        // Resynchronize past the malformed fragment's own opening byte
        let tail = &rest[offset..];
        match tail.char_indices().skip(1).find(|&(_, c)| c == '{') {
            Some((next, _)) => rest = &tail[next..],
            None => break,
        }
    }
}
