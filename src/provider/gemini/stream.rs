use super::types::GeminiGenerateResponse;

/// One delta per text part of the first candidate.
pub(crate) fn extract_gemini_deltas(data: &str) -> Result<Vec<String>, serde_json::Error> {
    let chunk: GeminiGenerateResponse = serde_json::from_str(data)?;
    Ok(chunk.first_candidate_texts().unwrap_or_default())
}
