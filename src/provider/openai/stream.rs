use super::types::OpenAiStreamChunk;

/// One delta per event, at `choices[0].delta.content`.
pub(crate) fn extract_openai_deltas(data: &str) -> Result<Vec<String>, serde_json::Error> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .into_iter()
        .collect())
}
