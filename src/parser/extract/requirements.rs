use std::collections::HashSet;

use indexmap::IndexMap;

use crate::keywords::{KeywordSet, RequirementDictionary};

/// Sentences starting with these are site navigation, not policy text.
const BOILERPLATE_PREFIXES: &[&str] = &["首页", "返回", "上一页", "下一页", "点击"];

const SENTENCE_BREAKS: &[char] = &['。', '！', '？', '；', '!', '?', ';', '\n', '\r'];

pub const SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceRules {
    /// Exclusive lower bound on trimmed length, in chars.
    pub min_chars: usize,
    /// Exclusive upper bound on trimmed length, in chars.
    pub max_chars: usize,
    pub max_per_label: usize,
}

impl Default for SentenceRules {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 500,
            max_per_label: 5,
        }
    }
}

impl SentenceRules {
    fn accepts(&self, sentence: &str) -> bool {
        let len = sentence.chars().count();
        len > self.min_chars
            && len < self.max_chars
            && !BOILERPLATE_PREFIXES.iter().any(|p| sentence.starts_with(p))
    }
}

/// Trimmed, non-empty sentences in document order.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_BREAKS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// One entry per dictionary label, in dictionary order. Labels with no
/// qualifying sentence map to an empty string.
pub fn extract_requirements(
    title: &str,
    body: &str,
    dictionary: &RequirementDictionary,
    rules: SentenceRules,
) -> IndexMap<String, String> {
    let text = format!("{} {}", title, body);
    let sentences: Vec<&str> = split_sentences(&text)
        .into_iter()
        .filter(|s| rules.accepts(s))
        .collect();

    dictionary
        .iter()
        .map(|set| (set.label.clone(), collect_for(set, &sentences, rules.max_per_label)))
        .collect()
}

fn collect_for(set: &KeywordSet, sentences: &[&str], cap: usize) -> String {
    let mut seen = HashSet::new();
    sentences
        .iter()
        .filter(|s| set.matches(s))
        .filter(|s| seen.insert(**s))
        .take(cap)
        .copied()
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
