//! Lenient extraction of tool invocations from model output.
//!
//! The preamble asks for a bare JSON object, but models wrap it in prose or
//! code fences often enough that three explicit strategies run in order:
//! the whole trimmed output, every fenced block, and finally the slice from
//! the first `{` to the last `}`. Anything that fails all three is a
//! terminal assistant answer.

use serde_json::Value;

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub tool: String,
    pub arguments: Value,
}

/// Try to extract a tool call from model output.
pub fn extract_tool_call(text: &str) -> Option<ParsedToolCall> {
    let trimmed = text.trim();
    if let Some(call) = parse_call(trimmed) {
        return Some(call);
    }

    for block in fenced_blocks(text) {
        if let Some(call) = parse_call(block.trim()) {
            return Some(call);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_call(&text[start..=end])
}

/// Parse one candidate string as the tool-call object. A missing or
/// non-object `arguments` field defaults to `{}`.
fn parse_call(candidate: &str) -> Option<ParsedToolCall> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    if value.get("type")?.as_str()? != "tool_call" {
        return None;
    }
    let tool = value.get("tool")?.as_str()?.to_owned();
    let arguments = match value.get("arguments") {
        Some(args @ Value::Object(_)) => args.clone(),
        _ => Value::Object(Default::default()),
    };
    Some(ParsedToolCall { tool, arguments })
}

/// The inner contents of every ``` fence, with a leading language tag line
/// (one that carries no `{`) stripped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut sections = text.split("```");
    // Sections alternate outside/inside; the first is always outside.
    sections.next();
    while let Some(inside) = sections.next() {
        let block = match inside.split_once('\n') {
            Some((first_line, rest)) if !first_line.contains('{') => rest,
            _ => inside,
        };
        blocks.push(block);
        // Skip the following outside section.
        sections.next();
    }
    blocks
}
