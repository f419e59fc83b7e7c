//! Context compression before synthesis.
//!
//! The extract cap applies BEFORE compression, so at most `max_extracts`
//! expanded windows are ever sent to the provider. Each surviving extract
//! is distilled through the compression prompt and bounded by a character
//! ceiling. Compression never grows an input: a short extract passes
//! through untouched.
use tracing::warn;

use super::expand::ExpandedHit;
use crate::config::SynthesisConfig;
use crate::llm::{LlmError, LlmRouter};
use crate::prompts::COMPRESSION_PROMPT;

/// One compressed source ready for prompt assembly.
#[derive(Debug, Clone)]
pub struct CompressedExtract {
    pub hit: ExpandedHit,
    pub text: String,
}

pub struct Compressor<'a> {
    llm: &'a LlmRouter,
    cfg: &'a SynthesisConfig,
}

impl<'a> Compressor<'a> {
    pub fn new(llm: &'a LlmRouter, cfg: &'a SynthesisConfig) -> Self {
        Self { llm, cfg }
    }

    /// Cap the extract list, then compress each entry.
    ///
    /// A failed compression degrades to a truncated raw window rather
    /// than failing the whole query.
    pub async fn compress(
        &self,
        hits: Vec<ExpandedHit>,
    ) -> Result<Vec<CompressedExtract>, LlmError> {
        let mut capped = hits;
        capped.truncate(self.cfg.max_extracts);

        let mut out = Vec::with_capacity(capped.len());
        for hit in capped {
            let text = self.compress_one(&hit.context).await;
            out.push(CompressedExtract { hit, text });
        }
        Ok(out)
    }

    async fn compress_one(&self, context: &str) -> String {
        // Already under the ceiling: compression cannot improve on it.
        if context.len() < self.cfg.extract_ceiling_chars {
            return context.to_string();
        }

        match self.llm.complete(COMPRESSION_PROMPT, context).await {
            Ok(compressed) => {
                let bounded = truncate_at_sentence(&compressed, self.cfg.extract_ceiling_chars);
                // A "compression" longer than the source means the model
                // padded; fall back to the bounded raw window.
                if bounded.len() >= context.len() {
                    truncate_at_sentence(context, self.cfg.extract_ceiling_chars)
                } else {
                    bounded
                }
            }
            Err(e) => {
                warn!("Extract compression failed, using raw window: {e}");
                truncate_at_sentence(context, self.cfg.extract_ceiling_chars)
            }
        }
    }
}

/// Truncate to strictly below `max_chars`, preferring to cut at the last
/// sentence end when one falls in the final fifth of the budget.
#[must_use]
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    if text.len() < max_chars {
        return text.to_string();
    }

    // Reserve room for the ellipsis so the hard cut stays under the budget.
    let mut cut = max_chars.saturating_sub(4).min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = &text[..cut];

    if let Some(last_period) = truncated.rfind('.') {
        if last_period > (max_chars * 4) / 5 {
            return truncated[..=last_period].to_string();
        }
    }
    format!("{truncated}...")
}
