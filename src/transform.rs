//! Thinking-phase content transform.
//!
//! The upstream wraps reasoning output in `<details>`/`<summary>` markup and
//! quote prefixes. This module rewrites a fragment according to the configured
//! tag policy before it is forwarded as `reasoning_content`.

use std::borrow::Cow;

use regex_lite::Regex;

use crate::config::ThinkTagsMode;
use crate::protocol::upstream::Phase;

/// Stateless per-fragment transformer. Build once per process and share.
pub struct ContentTagTransformer {
    mode: ThinkTagsMode,
    summary_span: Regex,
    details_open: Regex,
}

/// Split of a transformed delta onto the two client channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedDelta {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
}

impl ClassifiedDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.reasoning_content.is_none()
    }
}

impl ContentTagTransformer {
    #[must_use]
    pub fn new(mode: ThinkTagsMode) -> Self {
        Self {
            mode,
            // Non-greedy, spans newlines.
            summary_span: Regex::new(r"(?s)<summary>.*?</summary>").expect("static summary regex"),
            details_open: Regex::new(r"<details[^>]*>").expect("static details regex"),
        }
    }

    /// Transform one fragment. No-op unless `phase` is thinking.
    ///
    /// Idempotent: transforming an already-transformed fragment yields the
    /// same output.
    #[must_use]
    pub fn transform<'a>(&self, fragment: &'a str, phase: Phase) -> Cow<'a, str> {
        if phase != Phase::Thinking {
            return Cow::Borrowed(fragment);
        }

        let text = match self.summary_span.replace_all(fragment, "") {
            Cow::Borrowed(_) => Cow::Borrowed(fragment),
            Cow::Owned(owned) => Cow::Owned(owned),
        };
        let text = strip_stray_markers(text);

        let text = match self.mode {
            ThinkTagsMode::Think => {
                let rewritten = self.details_open.replace_all(&text, "<think>");
                let rewritten = rewritten.replace("</details>", "</think>");
                Cow::Owned(rewritten)
            }
            ThinkTagsMode::Strip => {
                let stripped = self.details_open.replace_all(&text, "");
                let stripped = stripped.replace("</details>", "");
                Cow::Owned(stripped)
            }
            ThinkTagsMode::Keep => text,
        };

        let text = strip_quote_prefixes(&text);
        match text {
            Cow::Borrowed(s) => {
                let trimmed = s.trim();
                if trimmed.len() == fragment.len() {
                    Cow::Borrowed(fragment)
                } else {
                    Cow::Owned(trimmed.to_string())
                }
            }
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        }
    }

    /// Split a delta onto the content/reasoning channels.
    ///
    /// Thinking-phase deltas become `reasoning_content` only; everything else
    /// becomes `content` only. Fragments that transform to empty are dropped.
    #[must_use]
    pub fn classify(&self, delta: &str, phase: Phase) -> ClassifiedDelta {
        if phase == Phase::Thinking {
            let transformed = self.transform(delta, phase);
            if transformed.is_empty() {
                ClassifiedDelta::default()
            } else {
                ClassifiedDelta {
                    content: None,
                    reasoning_content: Some(transformed.into_owned()),
                }
            }
        } else if delta.is_empty() {
            ClassifiedDelta::default()
        } else {
            ClassifiedDelta {
                content: Some(delta.to_string()),
                reasoning_content: None,
            }
        }
    }
}

const STRAY_MARKERS: [&str; 3] = ["</thinking>", "<Full>", "</Full>"];

fn strip_stray_markers(text: Cow<'_, str>) -> Cow<'_, str> {
    if !STRAY_MARKERS.iter().any(|marker| text.contains(marker)) {
        return text;
    }
    let mut owned = text.into_owned();
    for marker in STRAY_MARKERS {
        owned = owned.replace(marker, "");
    }
    Cow::Owned(owned)
}

/// Drop a leading `"> "` at the trimmed start and every `"> "` that directly
/// follows a newline. Both rules apply, not either/or.
fn strip_quote_prefixes<'a>(text: &'a str) -> Cow<'a, str> {
    let trimmed_start = text.trim_start();
    let needs_leading = trimmed_start.starts_with("> ");
    let needs_inline = text.contains("\n> ");
    if !needs_leading && !needs_inline {
        return Cow::Borrowed(text);
    }

    let mut out = if needs_leading {
        let lead_len = text.len() - trimmed_start.len();
        let mut s = String::with_capacity(text.len());
        s.push_str(&text[..lead_len]);
        s.push_str(&trimmed_start[2..]);
        s
    } else {
        text.to_string()
    };
    while out.contains("\n> ") {
        out = out.replace("\n> ", "\n");
    }
    Cow::Owned(out)
}
