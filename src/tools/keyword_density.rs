//! Keyword density tool — first-generation wrapper still on the legacy
//! text-in/text-out contract, loaded through the adapter path.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{RankError, Result};
use crate::tools::LegacyTool;

/// Counts keyword occurrences in a text and reports the density percentage.
pub struct KeywordDensityTool;

#[async_trait]
impl LegacyTool for KeywordDensityTool {
    fn tool_name(&self) -> &str {
        "keyword_density"
    }

    fn summary(&self) -> &str {
        "Count how often a keyword appears in a text and report its density. \
         Input is a JSON object with \"text\" and \"keyword\" fields."
    }

    async fn call(&self, args_text: &str) -> Result<String> {
        let args: Value = serde_json::from_str(args_text)
            .map_err(|e| RankError::Tool(format!("keyword_density expects JSON input: {e}")))?;
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| RankError::Tool("missing required field: text".into()))?;
        let keyword = args
            .get("keyword")
            .and_then(Value::as_str)
            .ok_or_else(|| RankError::Tool("missing required field: keyword".into()))?;

        let needle = keyword.to_lowercase();
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Ok("the text contains no words".to_string());
        }

        let matches = words.iter().filter(|w| **w == needle).count();
        let density = matches as f64 / words.len() as f64 * 100.0;
        Ok(format!(
            "\"{}\" appears {} times in {} words ({:.2}% density)",
            keyword,
            matches,
            words.len(),
            density
        ))
    }
}
