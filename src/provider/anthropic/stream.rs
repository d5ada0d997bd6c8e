use super::types::AnthropicStreamEvent;

/// Text arrives as `content_block_delta` events whose delta type is `text_delta`;
/// gateways that omit the delta type are accepted too.
pub(crate) fn extract_anthropic_deltas(data: &str) -> Result<Vec<String>, serde_json::Error> {
    let event: AnthropicStreamEvent = serde_json::from_str(data)?;
    Ok(event
        .delta
        .filter(|delta| delta.kind.as_deref().is_none_or(|kind| kind == "text_delta"))
        .and_then(|delta| delta.text)
        .into_iter()
        .collect())
}
