//! Built-in phrasing patterns used by the intent scorer.
//!
//! These are fixed heuristics, not configuration. Keyword lists and force
//! patterns come from [`crate::config::ClassifierConfig`]; the patterns here
//! carry fixed score bonuses on top of keyword hits.

use regex_lite::Regex;

/// Bonus added when [`BuiltinPatterns::time_sensitive`] matches.
pub const TIME_SENSITIVE_BONUS: f64 = 2.0;
/// Bonus added when [`BuiltinPatterns::explicit_search`] matches.
pub const EXPLICIT_SEARCH_BONUS: f64 = 3.0;
/// Bonus added when [`BuiltinPatterns::complex_analysis`] matches.
pub const COMPLEX_ANALYSIS_BONUS: f64 = 3.0;

/// Bonus added once when a prior assistant turn signalled stale knowledge.
pub const STALE_KNOWLEDGE_BONUS: f64 = 1.0;
/// Bonus added per prior assistant turn longer than [`LONG_TURN_CHARS`].
pub const LONG_TURN_BONUS: f64 = 0.5;
/// Character threshold for the long-assistant-turn bonus.
pub const LONG_TURN_CHARS: usize = 200;

/// Bonus added when the current message exceeds [`LONG_MESSAGE_CHARS`].
pub const LONG_MESSAGE_BONUS: f64 = 0.5;
/// Character threshold for the long-message bonus.
pub const LONG_MESSAGE_CHARS: usize = 100;

/// Precompiled phrasing detectors, built once at startup.
pub struct BuiltinPatterns {
    /// Queries about the present moment, favouring search.
    pub time_sensitive: Regex,
    /// The user literally asked to search or look something up.
    pub explicit_search: Regex,
    /// Multi-step reasoning requests, favouring thinking.
    pub complex_analysis: Regex,
    /// Assistant turns admitting stale or missing knowledge.
    pub stale_knowledge: Regex,
}

impl BuiltinPatterns {
    #[must_use]
    pub fn new() -> Self {
        Self {
            time_sensitive: Regex::new(
                r"(?i)\b(right now|as of (today|now)|this (week|month|year)|breaking)\b|今天|现在|目前|这周|本月",
            )
            .expect("static time-sensitive regex"),
            explicit_search: Regex::new(
                r"(?i)\b(search (the web|for|online)|look up|google|web search|browse the (web|internet)|find the latest)\b|搜索|搜一下|查一下|查询|上网查",
            )
            .expect("static explicit-search regex"),
            complex_analysis: Regex::new(
                r"(?i)\b(step[ -]by[ -]step|in depth|in detail|trade[ -]?offs?|pros and cons|root cause|from first principles)\b|一步一步|逐步|深入分析|详细分析|推导",
            )
            .expect("static complex-analysis regex"),
            stale_knowledge: Regex::new(
                r"(?i)(don't have (access to )?(real[ -]?time|current)|knowledge cutoff|cannot browse|can't access the internet|may be (outdated|out of date)|无法获取实时|知识截止|无法联网)",
            )
            .expect("static stale-knowledge regex"),
        }
    }
}

impl Default for BuiltinPatterns {
    fn default() -> Self {
        Self::new()
    }
}
