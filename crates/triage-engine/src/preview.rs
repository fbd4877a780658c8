// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preview text extraction from raw message bodies.
//!
//! Email bodies are stored exactly as they arrived; this cleaner renders
//! HTML to text and strips quoted history and signatures at read time,
//! for list previews and default case descriptions.

use regex::Regex;

use triage_core::{PreviewCleaner, PreviewOptions};

const RENDER_WIDTH: usize = 400;

/// [`PreviewCleaner`] over html2text with quote and signature stripping.
pub struct HtmlPreviewCleaner {
    html_marker: Regex,
    quote_header: Regex,
    signature_start: Regex,
    whitespace: Regex,
}

impl HtmlPreviewCleaner {
    pub fn new() -> Self {
        Self {
            html_marker: Regex::new(r"<\s*[a-zA-Z!/]").expect("static regex"),
            // "On <date>, <someone> wrote:" introducing quoted history.
            quote_header: Regex::new(r"(?mi)^On .{0,200}wrote:").expect("static regex"),
            // Conventional signature delimiter on its own line.
            signature_start: Regex::new(r"(?m)^-- ?$").expect("static regex"),
            whitespace: Regex::new(r"\s+").expect("static regex"),
        }
    }

    fn render(&self, raw: &str) -> String {
        if self.html_marker.is_match(raw) {
            html2text::from_read(raw.as_bytes(), RENDER_WIDTH)
                .unwrap_or_else(|_| raw.to_string())
        } else {
            raw.to_string()
        }
    }

    fn strip_quotes(&self, text: &str) -> String {
        let cut = match self.quote_header.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        };
        cut.lines()
            .filter(|line| !line.trim_start().starts_with('>'))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn strip_signature<'a>(&self, text: &'a str) -> &'a str {
        match self.signature_start.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        }
    }
}

impl Default for HtmlPreviewCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewCleaner for HtmlPreviewCleaner {
    fn clean_preview(&self, raw_body: &str, options: &PreviewOptions) -> String {
        let mut text = self.render(raw_body);
        if options.remove_quotes {
            text = self.strip_quotes(&text);
        }
        if options.remove_signature {
            text = self.strip_signature(&text).to_string();
        }
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str) -> String {
        HtmlPreviewCleaner::new().clean_preview(raw, &PreviewOptions::default())
    }

    #[test]
    fn renders_html_to_plain_text() {
        let out = clean("<p>Hello <b>there</b>,<br>how are you?</p>");
        assert!(out.contains("Hello"));
        assert!(out.contains("there"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean("Just checking in."), "Just checking in.");
    }

    #[test]
    fn strips_quoted_history() {
        let raw = "Thanks, that works.\n\nOn Mon, 3 Feb 2026, Sam Doe wrote:\n> earlier\n> message";
        assert_eq!(clean(raw), "Thanks, that works.");

        let raw = "Agreed.\n> previous line\nSee you then.";
        assert_eq!(clean(raw), "Agreed. See you then.");
    }

    #[test]
    fn strips_signature_block() {
        let raw = "Can you call me back?\n-- \nJo Berg\n+45 12 34 56 78";
        assert_eq!(clean(raw), "Can you call me back?");
    }

    #[test]
    fn options_can_keep_quotes_and_signature() {
        let raw = "Reply.\n> quoted\n-- \nSig";
        let cleaner = HtmlPreviewCleaner::new();
        let kept = cleaner.clean_preview(
            raw,
            &PreviewOptions {
                remove_quotes: false,
                remove_signature: false,
            },
        );
        assert!(kept.contains("quoted"));
        assert!(kept.contains("Sig"));
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean("a\n\n\n  b\t\tc"), "a b c");
    }
}
