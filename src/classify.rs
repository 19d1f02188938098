//! Keyword-based topic and tag classification.
//!
//! Both vocabularies map a category name to a list of lower-case keywords.
//! A keyword "matches" a field when it occurs as a substring of the
//! lower-cased field.
//!
//! - **Topic**: every keyword scores one point per field (text, url) it
//!   occurs in. The highest total wins; ties yield all tied topics joined
//!   with `", "` in vocabulary order. No match yields [`FALLBACK_TOPIC`].
//! - **Tags**: every category with at least one matching keyword, plus
//!   whatever the optional [`Tagger`] returns, sorted and deduplicated.
//!
//! The classifier holds no per-call state; results depend only on the
//! inputs, the vocabularies, and the tagger.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::config::{CategoryConfig, ClassifierConfig};
use crate::extract::extract_search_query;
use crate::models::{ClassifiedEntry, HistoryEntry, SearchQuery};
use crate::traits::Tagger;

/// Topic assigned when no keyword matches.
pub const FALLBACK_TOPIC: &str = "Misc";

const BUILTIN_TOPICS: &[(&str, &[&str])] = &[
    ("AI", &["openai", "llama", "gpt", "huggingface", "langchain", "transformer"]),
    ("Coding", &["stackoverflow", "github", "python", "javascript", "rust", "golang"]),
    ("News", &["nytimes", "bbc", "cnn", "reuters", "bloomberg", "washingtonpost"]),
    ("Shopping", &["amazon.", "ebay", "bestbuy", "shopping", "checkout", "cart"]),
    ("Video", &["youtube", "vimeo", "watch", "video"]),
    ("Reference", &["wikipedia.org", "wikihow", "docs", "developer.mozilla", "mdn"]),
    ("Social", &["twitter.com", "x.com", "facebook.com", "instagram.com"]),
    ("Cloud/Infra", &["aws.amazon", "azure", "gcp", "docker", "kubernetes"]),
];

const BUILTIN_TAGS: &[(&str, &[&str])] = &[
    ("Troubleshooting", &["error", "fix", "issue", "exception", "stacktrace"]),
    ("Programming", &["tutorial", "example", "library", "programming"]),
    ("Research", &["paper", "arxiv", "study"]),
    ("Reference", &["docs", "documentation", "api"]),
    ("Shopping", &["price", "buy", "coupon"]),
    ("Video", &["youtube", "watch", "video"]),
];

/// A named keyword category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

/// An ordered keyword → category mapping.
///
/// Order matters only for presenting tied topics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    categories: Vec<Category>,
}

impl Vocabulary {
    pub fn builtin_topics() -> Self {
        Self::from_static(BUILTIN_TOPICS)
    }

    pub fn builtin_tags() -> Self {
        Self::from_static(BUILTIN_TAGS)
    }

    fn from_static(table: &[(&str, &[&str])]) -> Self {
        let mut vocabulary = Self::default();
        for (name, keywords) in table {
            vocabulary.extend(name, keywords.iter().copied());
        }
        vocabulary
    }

    /// Add keywords to a category, creating it at the end if needed.
    ///
    /// Keywords are lower-cased; duplicates within a category are ignored.
    pub fn extend<'a>(&mut self, name: &str, keywords: impl IntoIterator<Item = &'a str>) {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                self.categories.push(Category {
                    name: name.to_string(),
                    keywords: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        let category = &mut self.categories[index];
        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !category.keywords.contains(&keyword) {
                category.keywords.push(keyword);
            }
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Built-ins extended (or replaced) by configured categories.
    fn configured(builtin: Self, replace: bool, extra: &[CategoryConfig]) -> Self {
        let mut vocabulary = if replace { Self::default() } else { builtin };
        for category in extra {
            vocabulary.extend(&category.name, category.keywords.iter().map(String::as_str));
        }
        vocabulary
    }
}

/// Result of classifying a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub topic: String,
    pub tags: Vec<String>,
    pub search: Option<SearchQuery>,
}

/// Topic and tag classifier.
pub struct Classifier {
    topics: Vocabulary,
    tags: Vocabulary,
    tagger: Option<Box<dyn Tagger>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Vocabulary::builtin_topics(), Vocabulary::builtin_tags())
    }
}

impl Classifier {
    pub fn new(topics: Vocabulary, tags: Vocabulary) -> Self {
        Self {
            topics,
            tags,
            tagger: None,
        }
    }

    /// Build from the `[classifier]` config section. No tagger is attached.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            Vocabulary::configured(
                Vocabulary::builtin_topics(),
                config.replace_topics,
                &config.topics,
            ),
            Vocabulary::configured(Vocabulary::builtin_tags(), config.replace_tags, &config.tags),
        )
    }

    pub fn with_tagger(mut self, tagger: Box<dyn Tagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn topics(&self) -> &Vocabulary {
        &self.topics
    }

    pub fn tags(&self) -> &Vocabulary {
        &self.tags
    }

    /// Per-topic scores, in vocabulary order, including zeros.
    pub fn topic_scores(&self, text: &str, url: &str) -> Vec<(&str, usize)> {
        let text = text.to_lowercase();
        let url = url.to_lowercase();
        self.topics
            .categories
            .iter()
            .map(|topic| {
                let score = topic
                    .keywords
                    .iter()
                    .map(|kw| {
                        usize::from(text.contains(kw.as_str()))
                            + usize::from(url.contains(kw.as_str()))
                    })
                    .sum::<usize>();
                (topic.name.as_str(), score)
            })
            .collect()
    }

    /// The best-scoring topic, all tied topics joined with `", "`, or
    /// [`FALLBACK_TOPIC`].
    pub fn classify_topic(&self, text: &str, url: &str) -> String {
        let scores = self.topic_scores(text, url);
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if best == 0 {
            return FALLBACK_TOPIC.to_string();
        }
        scores
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Built-in keyword tags plus tagger tags, sorted and deduplicated.
    pub fn classify_tags(&self, text: &str, url: &str) -> Vec<String> {
        let mut tags: BTreeSet<String> = self.external_tags(text, url).into_iter().collect();

        let text = text.to_lowercase();
        let url = url.to_lowercase();
        for category in &self.tags.categories {
            if category
                .keywords
                .iter()
                .any(|kw| text.contains(kw.as_str()) || url.contains(kw.as_str()))
            {
                tags.insert(category.name.clone());
            }
        }

        tags.into_iter().collect()
    }

    /// Classify a page by title and URL.
    ///
    /// Search URLs are classified by their decoded query rather than the
    /// page title, which for result pages is mostly boilerplate.
    pub fn classify_visit(&self, title: &str, url: &str) -> Classification {
        let search = extract_search_query(url);
        let text = match &search {
            Some(sq) => sq.query.as_str(),
            None => title,
        };
        Classification {
            topic: self.classify_topic(text, url),
            tags: self.classify_tags(text, url),
            search,
        }
    }

    pub fn classify_entry(&self, entry: &HistoryEntry) -> ClassifiedEntry {
        let Classification {
            topic,
            tags,
            search,
        } = self.classify_visit(&entry.title, &entry.url);
        ClassifiedEntry {
            entry: entry.clone(),
            topic,
            tags,
            search,
        }
    }

    pub fn classify_all(&self, entries: &[HistoryEntry]) -> Vec<ClassifiedEntry> {
        entries.iter().map(|e| self.classify_entry(e)).collect()
    }

    fn external_tags(&self, text: &str, url: &str) -> Vec<String> {
        let Some(tagger) = &self.tagger else {
            return Vec::new();
        };
        match tagger.tags(text, url, &HashMap::new()) {
            Ok(tags) => tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) => {
                warn!(tagger = tagger.name(), url, error = %e, "tagger failed, ignoring its tags");
                Vec::new()
            }
        }
    }
}
