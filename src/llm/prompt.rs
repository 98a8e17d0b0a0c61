use crate::config::SiteConfig;
use crate::models::RetrievedDocument;

/// Chat-template control tokens that must never reach the model verbatim
/// from user input or retrieved records.
const CONTROL_TOKENS: &[&str] = &[
    "<|im_start|>",
    "<|im_end|>",
    "<|endoftext|>",
    "<start_of_turn>",
    "<end_of_turn>",
];

/// Remove chat-template control tokens from untrusted text.
pub fn sanitize_for_prompt(text: &str) -> String {
    let mut out = text.to_string();
    for token in CONTROL_TOKENS {
        if out.contains(token) {
            out = out.replace(token, "");
        }
    }
    out
}

/// Truncate a string to at most `max_bytes` without splitting a UTF-8 char.
pub(crate) fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Prompt grounded in retrieved documents. Documents are joined with a
/// blank line in retrieval order.
pub fn build_rag_prompt(site: &SiteConfig, docs: &[RetrievedDocument], query: &str) -> String {
    let context = docs
        .iter()
        .map(|d| sanitize_for_prompt(&d.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following context about {topic}, answer the question accurately and helpfully:\n\n\
         Context:\n{context}\n\n\
         Question: {query}\n\n\
         Please provide a clear, informative answer based on the context provided. \
         If the context doesn't contain relevant information, use your general knowledge about {domain}.",
        topic = site.topic,
        domain = short_domain(&site.domain),
    )
}

/// Prompt used when no documents could be retrieved.
pub fn build_fallback_prompt(site: &SiteConfig, query: &str) -> String {
    format!(
        "You are a helpful assistant for {subject} information.\n\
         Answer the following question about {domain}:\n\n\
         Question: {query}\n\n\
         If the question is not related to {short}, politely redirect to {short}-related topics.",
        subject = short_domain(&site.domain),
        domain = site.domain,
        short = short_domain(&site.domain),
    )
}

/// First item of a comma-separated domain description,
/// e.g. "electrical grids" for "electrical grids, power systems, or related topics".
fn short_domain(domain: &str) -> &str {
    domain.split(',').next().unwrap_or(domain).trim()
}
