//! Heuristic intent classification.
//!
//! Maps a message history plus a model alias to the upstream feature set.
//! Fixed-mode aliases short-circuit to their bound flags; auto-mode aliases
//! run keyword scoring over the latest user message.

pub mod rules;

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex_lite::Regex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{ClassifierConfig, ModelMode};
use crate::protocol::{ChatMessage, FeatureFlags, Role};
use crate::util::text_hash;

use self::rules::{
    BuiltinPatterns, COMPLEX_ANALYSIS_BONUS, EXPLICIT_SEARCH_BONUS, LONG_MESSAGE_BONUS,
    LONG_MESSAGE_CHARS, LONG_TURN_BONUS, LONG_TURN_CHARS, STALE_KNOWLEDGE_BONUS,
    TIME_SENSITIVE_BONUS,
};

/// Outcome of scoring. Search implies thinking upstream, so the combined
/// case collapses to `Search` rather than a distinct bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Basic,
    Thinking,
    Search,
}

impl Intent {
    fn flags(self) -> FeatureFlags {
        match self {
            Intent::Basic => FeatureFlags::basic(),
            Intent::Thinking => FeatureFlags::with_thinking(),
            Intent::Search => FeatureFlags::with_search(),
        }
    }
}

struct CacheEntry {
    intent: Intent,
    expires_at: Instant,
}

const CACHE_PRUNE_LEN: usize = 1024;

struct WeightedKeyword {
    /// Lowercased needle for case-insensitive substring matching.
    needle: String,
    weight: f64,
}

/// Compiled classifier. Build once from config and share via app state.
pub struct IntentClassifier {
    search_threshold: f64,
    thinking_threshold: f64,
    combined_threshold: f64,
    context_depth: usize,
    cache_ttl: Duration,
    search_keywords: Vec<WeightedKeyword>,
    thinking_keywords: Vec<WeightedKeyword>,
    force_search: Vec<Regex>,
    force_thinking: Vec<Regex>,
    patterns: BuiltinPatterns,
    cache: Mutex<FxHashMap<u64, CacheEntry>>,
}

impl IntentClassifier {
    /// Patterns are assumed valid; config validation rejects bad ones, and
    /// any that still fail to compile here are skipped.
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        let compile = |sources: &[String]| -> Vec<Regex> {
            sources
                .iter()
                .filter_map(|s| Regex::new(s).ok())
                .collect()
        };
        let weigh = |keywords: &[String]| -> Vec<WeightedKeyword> {
            keywords
                .iter()
                .map(|k| WeightedKeyword {
                    needle: k.to_lowercase(),
                    weight: 1.0 + config.keyword_weights.get(k).copied().unwrap_or(0.0),
                })
                .collect()
        };
        Self {
            search_threshold: config.search_threshold,
            thinking_threshold: config.thinking_threshold,
            combined_threshold: config.combined_threshold,
            context_depth: config.context_depth,
            cache_ttl: Duration::from_secs(config.intent_cache_ttl_secs),
            search_keywords: weigh(&config.search_keywords),
            thinking_keywords: weigh(&config.thinking_keywords),
            force_search: compile(&config.force_search_patterns),
            force_thinking: compile(&config.force_thinking_patterns),
            patterns: BuiltinPatterns::new(),
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Derive the feature set for one request.
    ///
    /// Non-auto modes return their statically bound flags without looking at
    /// the messages. Auto mode with no user message fails closed to basic.
    #[must_use]
    pub fn classify(&self, messages: &[ChatMessage], mode: ModelMode) -> FeatureFlags {
        match mode {
            ModelMode::Basic => return FeatureFlags::basic(),
            ModelMode::Thinking => return FeatureFlags::with_thinking(),
            ModelMode::Search => return FeatureFlags::with_search(),
            ModelMode::Auto => {}
        }

        let Some(current) = messages.iter().rev().find(|m| m.role == Role::User) else {
            return FeatureFlags::basic();
        };
        let text = current.content.as_str();

        if let Some(intent) = self.cache_get(text) {
            return intent.flags();
        }

        let intent = self.analyze(text, messages);
        self.cache_put(text, intent);
        intent.flags()
    }

    fn analyze(&self, text: &str, messages: &[ChatMessage]) -> Intent {
        for pattern in &self.force_search {
            if pattern.is_match(text) {
                return Intent::Search;
            }
        }
        for pattern in &self.force_thinking {
            if pattern.is_match(text) {
                return Intent::Thinking;
            }
        }

        let lowered = text.to_lowercase();
        let mut search_score = keyword_score(&lowered, &self.search_keywords);
        let mut thinking_score = keyword_score(&lowered, &self.thinking_keywords);

        if self.patterns.time_sensitive.is_match(text) {
            search_score += TIME_SENSITIVE_BONUS;
        }
        if self.patterns.explicit_search.is_match(text) {
            search_score += EXPLICIT_SEARCH_BONUS;
        }
        if self.patterns.complex_analysis.is_match(text) {
            thinking_score += COMPLEX_ANALYSIS_BONUS;
        }

        let mut stale_seen = false;
        for message in messages.iter().rev().take(self.context_depth) {
            if message.role != Role::Assistant {
                continue;
            }
            if !stale_seen && self.patterns.stale_knowledge.is_match(&message.content) {
                search_score += STALE_KNOWLEDGE_BONUS;
                stale_seen = true;
            }
            if message.content.chars().count() > LONG_TURN_CHARS {
                thinking_score += LONG_TURN_BONUS;
            }
        }

        if text.chars().count() > LONG_MESSAGE_CHARS {
            thinking_score += LONG_MESSAGE_BONUS;
        }

        let intent = if search_score >= self.search_threshold
            && thinking_score >= self.thinking_threshold
            && search_score + thinking_score >= self.combined_threshold
        {
            Intent::Search
        } else if search_score >= self.search_threshold {
            Intent::Search
        } else if thinking_score >= self.thinking_threshold {
            Intent::Thinking
        } else {
            Intent::Basic
        };

        debug!(
            search_score,
            thinking_score,
            intent = ?intent,
            "intent classified"
        );
        intent
    }

    fn cache_get(&self, text: &str) -> Option<Intent> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let key = text_hash(text);
        let cache = self.cache.lock();
        cache
            .get(&key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.intent)
    }

    fn cache_put(&self, text: &str, intent: Intent) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let key = text_hash(text);
        let now = Instant::now();
        let mut cache = self.cache.lock();
        if cache.len() >= CACHE_PRUNE_LEN {
            cache.retain(|_, entry| entry.expires_at > now);
        }
        cache.insert(
            key,
            CacheEntry {
                intent,
                expires_at: now + self.cache_ttl,
            },
        );
    }
}

fn keyword_score(lowered_text: &str, keywords: &[WeightedKeyword]) -> f64 {
    keywords
        .iter()
        .filter(|k| lowered_text.contains(k.needle.as_str()))
        .map(|k| k.weight)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(&ClassifierConfig::default())
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            role: Role::User,
            content: text.to_string(),
            reasoning_content: None,
        }
    }

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: text.to_string(),
            reasoning_content: None,
        }
    }

    #[test]
    fn test_fixed_modes_skip_analysis() {
        let c = classifier();
        let messages = [user("search for the latest news today")];
        assert_eq!(c.classify(&messages, ModelMode::Basic), FeatureFlags::basic());
        assert_eq!(
            c.classify(&messages, ModelMode::Thinking),
            FeatureFlags::with_thinking()
        );
        assert_eq!(
            c.classify(&messages, ModelMode::Search),
            FeatureFlags::with_search()
        );
    }

    #[test]
    fn test_no_user_message_fails_closed() {
        let c = classifier();
        let messages = [assistant("hello there")];
        assert_eq!(c.classify(&messages, ModelMode::Auto), FeatureFlags::basic());
        assert_eq!(c.classify(&[], ModelMode::Auto), FeatureFlags::basic());
    }

    #[test]
    fn test_two_search_keywords_reach_threshold() {
        // search_threshold defaults to 2.0; two keyword hits score 2.0.
        let c = classifier();
        let messages = [user("latest news about rust")];
        let flags = c.classify(&messages, ModelMode::Auto);
        assert!(flags.enable_web_search);
    }

    #[test]
    fn test_single_keyword_stays_basic() {
        let c = classifier();
        let messages = [user("any news?")];
        assert_eq!(c.classify(&messages, ModelMode::Auto), FeatureFlags::basic());
    }

    #[test]
    fn test_plain_greeting_is_basic() {
        let c = classifier();
        assert_eq!(
            c.classify(&[user("hello")], ModelMode::Auto),
            FeatureFlags::basic()
        );
    }

    #[test]
    fn test_complex_analysis_bonus_triggers_thinking() {
        // +3.0 pattern bonus alone meets the 3.0 thinking threshold.
        let c = classifier();
        let messages = [user("walk me through this step by step")];
        let flags = c.classify(&messages, ModelMode::Auto);
        assert!(flags.enable_thinking);
        assert!(!flags.enable_web_search);
    }

    #[test]
    fn test_force_search_pattern_short_circuits() {
        let config = ClassifierConfig {
            force_search_patterns: vec!["(?i)^/search ".to_string()],
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let flags = c.classify(&[user("/search quiet phrase")], ModelMode::Auto);
        assert!(flags.enable_web_search);
    }

    #[test]
    fn test_force_thinking_pattern_short_circuits() {
        let config = ClassifierConfig {
            force_thinking_patterns: vec!["(?i)^/think ".to_string()],
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let flags = c.classify(&[user("/think quiet phrase")], ModelMode::Auto);
        assert!(flags.enable_thinking);
        assert!(!flags.enable_web_search);
    }

    #[test]
    fn test_force_search_beats_force_thinking() {
        let config = ClassifierConfig {
            force_search_patterns: vec!["both".to_string()],
            force_thinking_patterns: vec!["both".to_string()],
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let flags = c.classify(&[user("both patterns match")], ModelMode::Auto);
        assert!(flags.enable_web_search);
    }

    #[test]
    fn test_keyword_weights_add_on_top_of_hits() {
        let mut config = ClassifierConfig::default();
        config
            .keyword_weights
            .insert("weather".to_string(), 1.0);
        let c = IntentClassifier::new(&config);
        // One hit worth 2.0 total meets the 2.0 search threshold.
        let flags = c.classify(&[user("weather in berlin?")], ModelMode::Auto);
        assert!(flags.enable_web_search);
    }

    #[test]
    fn test_stale_assistant_turn_adds_search_bonus() {
        let c = classifier();
        let messages = [
            user("what is the price?"),
            assistant("I don't have access to real-time data."),
            user("then estimate the price"),
        ];
        // One keyword (1.0) + stale-knowledge bonus (1.0) reaches 2.0.
        let flags = c.classify(&messages, ModelMode::Auto);
        assert!(flags.enable_web_search);
    }

    #[test]
    fn test_context_depth_limits_scan() {
        let config = ClassifierConfig {
            context_depth: 1,
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let messages = [
            assistant("I don't have access to real-time data."),
            user("then estimate the price"),
        ];
        // The stale turn is outside the depth-1 window, so a single keyword
        // stays below threshold.
        assert_eq!(c.classify(&messages, ModelMode::Auto), FeatureFlags::basic());
    }

    #[test]
    fn test_long_assistant_turns_push_thinking() {
        let config = ClassifierConfig {
            context_depth: 5,
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let long_turn = assistant(&"x".repeat(250));
        let messages = [
            long_turn.clone(),
            long_turn.clone(),
            long_turn,
            user("why does it behave like this and how can I explain it"),
        ];
        // Keywords why/how/explain (3.0) would already hit the threshold;
        // the long-turn bonuses keep it there even with higher thresholds.
        let flags = c.classify(&messages, ModelMode::Auto);
        assert!(flags.enable_thinking);
    }

    #[test]
    fn test_combined_route_yields_search_flags() {
        let config = ClassifierConfig {
            search_threshold: 1.0,
            thinking_threshold: 1.0,
            combined_threshold: 2.0,
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        let flags = c.classify(
            &[user("explain the latest news and analyze why")],
            ModelMode::Auto,
        );
        // Combined case collapses to the search flag set.
        assert_eq!(flags, FeatureFlags::with_search());
    }

    #[test]
    fn test_cache_returns_same_intent() {
        let c = classifier();
        let messages = [user("latest news about rust")];
        let first = c.classify(&messages, ModelMode::Auto);
        let second = c.classify(&messages, ModelMode::Auto);
        assert_eq!(first, second);
        assert!(second.enable_web_search);
    }

    #[test]
    fn test_invalid_force_pattern_is_skipped() {
        let config = ClassifierConfig {
            force_search_patterns: vec!["(unclosed".to_string()],
            ..ClassifierConfig::default()
        };
        let c = IntentClassifier::new(&config);
        assert_eq!(
            c.classify(&[user("hello")], ModelMode::Auto),
            FeatureFlags::basic()
        );
    }
}
