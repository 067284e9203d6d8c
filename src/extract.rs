//! Text extraction for ingested content.
//!
//! Callers supply bytes and a content type; this module returns plain UTF-8
//! text or a [`ChunkingError::Unreadable`] so the pipeline can skip the item.

use askdocs_core::error::ChunkingError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_HTML: &str = "text/html";

/// Content type for a file extension, if the loader supports it.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" | "text" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "html" | "htm" => Some(MIME_HTML),
        _ => None,
    }
}

pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ChunkingError> {
    // Ignore parameters such as "; charset=utf-8".
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ChunkingError::Unreadable(format!("PDF extraction failed: {e}"))),
        MIME_TEXT | MIME_MARKDOWN => utf8(bytes),
        MIME_HTML => utf8(bytes).map(|html| html_to_text(&html)),
        other => Err(ChunkingError::Unreadable(format!(
            "unsupported content-type: {other}"
        ))),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ChunkingError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ChunkingError::Unreadable(format!("not valid UTF-8: {e}")))
}

/// Elements whose content is never visible text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "head", "svg", "template"];

/// Tags that end a line of visible text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "section", "article", "header", "footer", "blockquote", "pre", "hr", "title",
];

/// Reduce an HTML page to its visible text.
///
/// Drops tags, comments and non-visible elements, decodes common entities,
/// breaks lines at block elements and collapses runs of whitespace.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;
    let mut skipping: Option<String> = None;

    while let Some(lt) = rest.find('<') {
        if skipping.is_none() {
            push_text(&mut out, &rest[..lt]);
        }
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            rest = rest.find("-->").map_or("", |end| &rest[end + 3..]);
            continue;
        }

        let Some(gt) = rest.find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[1..gt];
        rest = &rest[gt + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match &skipping {
            Some(open) => {
                if closing && *open == name {
                    skipping = None;
                }
            }
            None => {
                if !closing && !tag.ends_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
                    skipping = Some(name);
                } else if BLOCK_ELEMENTS.contains(&name.as_str()) {
                    out.push('\n');
                }
            }
        }
    }
    if skipping.is_none() {
        push_text(&mut out, rest);
    }

    out.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(out: &mut String, text: &str) {
    out.push_str(&decode_entities(text));
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
