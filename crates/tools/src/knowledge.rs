//! The static dental knowledge base.
//!
//! Everything here is compiled into the binary and never mutated. Topic and
//! FAQ order is declaration order; listings and FAQ matching depend on it.

use serde::Serialize;

/// A dental condition the assistant can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Topic {
    /// Lowercase topic name, also the lookup key.
    pub name: &'static str,
    pub purpose: &'static str,
    pub how_to_use: &'static str,
    pub benefits: &'static str,
}

/// A canned answer keyed by a lowercase question fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Faq {
    pub key: &'static str,
    pub answer: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        name: "gum infection",
        purpose: "Detect gum inflammation or gingivitis",
        how_to_use: "Upload a photo of your gums and answer quiz questions",
        benefits: "Helps early detection and prevents progression",
    },
    Topic {
        name: "tooth decay",
        purpose: "Identify cavities or decay",
        how_to_use: "Upload a tooth photo, select pain area, answer sensitivity quiz",
        benefits: "Provides early treatment recommendations",
    },
    Topic {
        name: "sensitivity",
        purpose: "Detect enamel thinning or exposed roots",
        how_to_use: "Describe your symptoms (cold/hot/chewing pain)",
        benefits: "Guides next steps for treatment",
    },
];

const OVERVIEW: &[&str] = &[
    "Smart Dental Assistant: Upload a photo + symptoms to get a diagnosis",
    "Symptom Quiz: Guided questions about your pain",
    "Voice Assistant: Ask about dental health",
    "Doctor Connect: Schedule appointments after diagnosis",
];

const FAQS: &[Faq] = &[
    Faq {
        key: "what is this app",
        answer: "It’s an AI-powered dental health checker that provides initial assessments.",
    },
    Faq {
        key: "how do i use it",
        answer: "Take a clear photo of your teeth, upload it, and answer guided questions.",
    },
    Faq {
        key: "is this a replacement for a dentist",
        answer: "No, it provides initial advice only. You should always consult a licensed dentist.",
    },
];

/// Read-only view over the dental content.
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeBase {
    topics: &'static [Topic],
    faqs: &'static [Faq],
    overview: &'static [&'static str],
}

impl KnowledgeBase {
    /// The content shipped with the binary.
    pub const fn builtin() -> Self {
        Self {
            topics: TOPICS,
            faqs: FAQS,
            overview: OVERVIEW,
        }
    }

    /// Exact, case-insensitive topic lookup.
    pub fn topic(&self, name: &str) -> Option<&'static Topic> {
        let name = name.to_lowercase();
        self.topics.iter().find(|t| t.name == name)
    }

    /// First FAQ (in declaration order) whose key occurs in `question`.
    pub fn faq(&self, question: &str) -> Option<&'static Faq> {
        let question = question.trim().to_lowercase();
        self.faqs.iter().find(|f| question.contains(f.key))
    }

    /// Topic names in declaration order.
    pub fn topic_names(&self) -> Vec<&'static str> {
        self.topics.iter().map(|t| t.name).collect()
    }

    pub fn overview(&self) -> &'static [&'static str] {
        self.overview
    }

    pub fn faqs(&self) -> &'static [Faq] {
        self.faqs
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}
