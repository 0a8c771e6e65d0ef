//! Attachment extraction from agent response text.
//!
//! Agents embed images as markdown/HTML and documents as `DOCUMENT:` lines;
//! adapters send those natively and the cleaned text separately.

use regex::Regex;
use std::sync::OnceLock;

/// Hosts whose URLs are treated as images even without a file extension.
const IMAGE_HOSTS: [&str; 3] = ["fal.media", "fal-cdn", "replicate.delivery"];
const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

fn md_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[([^\]]*)\]\((https?://[^\s\)]+)\)").unwrap())
}

fn html_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<img\s+src=["']?(https?://[^\s"'<>]+)["']?\s*/?>(?:\s*</img>)?"#).unwrap()
    })
}

fn document_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^DOCUMENT:([^|\r\n]+?)(?:\|([^\r\n]*))?$").unwrap())
}

/// Extract image URLs from markdown `![alt](url)` and HTML `<img src=…>`
/// forms.
///
/// Returns `(images, cleaned)` where `images` is `(url, alt_text)` in
/// source order and `cleaned` is the text with the image syntax removed
/// and excess blank lines collapsed.
pub fn extract_images(content: &str) -> (Vec<(String, String)>, String) {
    let mut found: Vec<(usize, String, String)> = Vec::new();

    for caps in md_image_re().captures_iter(content) {
        let url = caps.get(2).unwrap().as_str();
        if looks_like_image(url) {
            let alt = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            found.push((caps.get(0).unwrap().start(), url.to_string(), alt.to_string()));
        }
    }
    for caps in html_image_re().captures_iter(content) {
        let url = caps.get(1).unwrap().as_str();
        found.push((caps.get(0).unwrap().start(), url.to_string(), String::new()));
    }

    if found.is_empty() {
        return (Vec::new(), content.to_string());
    }
    found.sort_by_key(|(start, _, _)| *start);

    // Only strip markdown matches that passed the image filter.
    let mut cleaned = content.to_string();
    for caps in md_image_re().captures_iter(content) {
        if looks_like_image(caps.get(2).unwrap().as_str()) {
            cleaned = cleaned.replace(caps.get(0).unwrap().as_str(), "");
        }
    }
    cleaned = html_image_re().replace_all(&cleaned, "").to_string();
    let images = found.into_iter().map(|(_, url, alt)| (url, alt)).collect();
    (images, collapse_blank_lines(&cleaned))
}

/// Extract `DOCUMENT:<path>[|<caption>]` lines.
///
/// Returns `(documents, cleaned)` with `(path, caption)` pairs in source
/// order.
pub fn extract_documents(content: &str) -> (Vec<(String, String)>, String) {
    let mut docs = Vec::new();
    for caps in document_re().captures_iter(content) {
        let path = caps.get(1).unwrap().as_str().trim().to_string();
        let caption = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        docs.push((path, caption));
    }
    if docs.is_empty() {
        return (Vec::new(), content.to_string());
    }
    let cleaned = document_re().replace_all(content, "").to_string();
    (docs, collapse_blank_lines(&cleaned))
}

fn looks_like_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        || IMAGE_HOSTS.iter().any(|host| lower.contains(host))
}

fn collapse_blank_lines(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    re.replace_all(text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_image_extracted_with_alt() {
        let content = "Look:\n![a cat](https://example.com/cat.png)\nNice.";
        let (images, cleaned) = extract_images(content);
        assert_eq!(images, vec![("https://example.com/cat.png".to_string(), "a cat".to_string())]);
        assert!(!cleaned.contains("!["));
        assert!(cleaned.contains("Look:"));
        assert!(cleaned.contains("Nice."));
    }

    #[test]
    fn html_image_extracted() {
        let content = r#"<img src="https://example.com/pic.jpg">"#;
        let (images, cleaned) = extract_images(content);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].0, "https://example.com/pic.jpg");
        assert!(cleaned.is_empty());
    }

    #[test]
    fn known_image_host_without_extension() {
        let content = "![gen](https://v3.fal.media/files/abc123)";
        let (images, _) = extract_images(content);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn non_image_link_is_left_alone() {
        let content = "![doc](https://example.com/report.pdf) stays";
        let (images, cleaned) = extract_images(content);
        assert!(images.is_empty());
        assert_eq!(cleaned, content);
    }

    #[test]
    fn extraction_preserves_source_order() {
        let content = concat!(
            r#"<img src="https://example.com/first.png">"#,
            "\ntext\n",
            "![second](https://example.com/second.png)",
        );
        let (images, _) = extract_images(content);
        assert_eq!(images[0].0, "https://example.com/first.png");
        assert_eq!(images[1].0, "https://example.com/second.png");
    }

    #[test]
    fn image_roundtrip_on_clean_text() {
        let text = "Report follows.\n\nAll good.";
        let composed = format!("{text}\n![chart](https://example.com/chart.png)");
        let (images, cleaned) = extract_images(&composed);
        assert_eq!(images.len(), 1);
        assert_eq!(cleaned, text);
    }

    #[test]
    fn single_document_extracted() {
        let content = "Here is the file:\nDOCUMENT:/tmp/report.pdf\nDone.";
        let (docs, cleaned) = extract_documents(content);
        assert_eq!(docs, vec![("/tmp/report.pdf".to_string(), String::new())]);
        assert!(!cleaned.contains("DOCUMENT:"));
        assert!(cleaned.contains("Done."));
    }

    #[test]
    fn document_with_caption() {
        let content = "DOCUMENT:/tmp/report.pdf|Monthly revenue report";
        let (docs, _) = extract_documents(content);
        assert_eq!(docs[0].0, "/tmp/report.pdf");
        assert_eq!(docs[0].1, "Monthly revenue report");
    }

    #[test]
    fn multiple_documents_in_order() {
        let content = "Files:\nDOCUMENT:/tmp/a.pdf\nDOCUMENT:/tmp/b.xlsx\n";
        let (docs, _) = extract_documents(content);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, "/tmp/a.pdf");
        assert_eq!(docs[1].0, "/tmp/b.xlsx");
    }

    #[test]
    fn no_documents_leaves_text_untouched() {
        let content = "No documents here, just text.";
        let (docs, cleaned) = extract_documents(content);
        assert!(docs.is_empty());
        assert_eq!(cleaned, content);
    }

    #[test]
    fn extraction_collapses_blank_runs() {
        let content = "Before\n\n\nDOCUMENT:/tmp/file.pdf\n\n\n\nAfter";
        let (docs, cleaned) = extract_documents(content);
        assert_eq!(docs.len(), 1);
        assert!(!cleaned.contains("\n\n\n"));
    }
}
