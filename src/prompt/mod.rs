//! Query classification and prompt construction
//!
//! Classification is rule-based pattern matching over the normalized query:
//! the rule table is evaluated in order and the first match wins, defaulting
//! to `General`. Each query type carries a total mapping to a response
//! format, which explicit cues in the query may override.

use regex::Regex;
use serde::{Deserialize, Serialize};

mod builder;

pub use builder::{PromptBuilder, PromptMetadata};

/// Query intent categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Eligibility,
    Services,
    Process,
    Cost,
    Provider,
    /// Count-style provider questions ("how many providers...") get
    /// dedicated anti-fabrication prompt handling
    ProviderCount,
    Definition,
    Comparison,
    General,
}

impl QueryType {
    pub const ALL: [QueryType; 9] = [
        QueryType::Eligibility,
        QueryType::Services,
        QueryType::Process,
        QueryType::Cost,
        QueryType::Provider,
        QueryType::ProviderCount,
        QueryType::Definition,
        QueryType::Comparison,
        QueryType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Eligibility => "eligibility",
            QueryType::Services => "services",
            QueryType::Process => "process",
            QueryType::Cost => "cost",
            QueryType::Provider => "provider",
            QueryType::ProviderCount => "provider_count",
            QueryType::Definition => "definition",
            QueryType::Comparison => "comparison",
            QueryType::General => "general",
        }
    }

    /// Default response format for this query type; total over all variants
    pub fn default_format(&self) -> ResponseFormat {
        match self {
            QueryType::Eligibility => ResponseFormat::Concise,
            QueryType::Services => ResponseFormat::BulletPoints,
            QueryType::Process => ResponseFormat::StepByStep,
            QueryType::Cost => ResponseFormat::Concise,
            QueryType::Provider => ResponseFormat::Concise,
            QueryType::ProviderCount => ResponseFormat::Concise,
            QueryType::Definition => ResponseFormat::Concise,
            QueryType::Comparison => ResponseFormat::Detailed,
            QueryType::General => ResponseFormat::Concise,
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response formats for prompt templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Concise,
    Detailed,
    BulletPoints,
    StepByStep,
    Faq,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Concise => "concise",
            ResponseFormat::Detailed => "detailed",
            ResponseFormat::BulletPoints => "bullet_points",
            ResponseFormat::StepByStep => "step_by_step",
            ResponseFormat::Faq => "faq",
        }
    }
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rule-based query classifier with pre-compiled patterns
pub struct QueryClassifier {
    rules: Vec<(QueryType, Vec<Regex>)>,
    format_cues: Vec<(ResponseFormat, Regex)>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClassifier {
    pub fn new() -> Self {
        // Order matters: the first matching rule wins. Count-style provider
        // questions are matched before the broader provider rule, and cost
        // before process/services so "what does X cost" lands on cost.
        let rule_table: [(QueryType, &[&str]); 8] = [
            (
                QueryType::ProviderCount,
                &[
                    r"\b(how many|number of|total number|count of)\b.*\b(provider|clinic|agenc)",
                    r"\bprovider\s+count\b",
                ],
            ),
            (
                QueryType::Eligibility,
                &[
                    r"\b(eligible|eligibility|qualify|qualifies|who can|requirements?)\b",
                    r"\b(age limit|criteria)\b",
                ],
            ),
            (
                QueryType::Cost,
                &[
                    r"\b(cost|costs|price|fee|fees|payment|insurance|coverage|covered|pay|pays|copay)\b",
                    r"\b(medical assistance|medicaid)\b",
                ],
            ),
            (
                QueryType::Process,
                &[
                    r"\b(how to|how do i|process|steps?|procedure|apply|application)\b",
                    r"\b(get started|begin|enroll|sign up|referral|assessment|evaluation)\b",
                ],
            ),
            (
                QueryType::Provider,
                &[
                    r"\b(providers?|therapists?|professionals?|staff|who provides|specialists?)\b",
                    r"\b(qualifications?|certified|licensed|training)\b",
                ],
            ),
            (
                QueryType::Services,
                &[
                    r"\b(services?|treatment|therapy|intervention|what is provided)\b",
                    r"\b(types? of|kinds? of|offered|available)\b",
                ],
            ),
            (
                QueryType::Definition,
                &[r"\b(what is|what are|define|definition|meaning|means)\b"],
            ),
            (
                QueryType::Comparison,
                &[
                    r"\b(difference|compare|comparison|versus|vs|better|alternative)\b",
                    r"\b(similar to|same as|different from)\b",
                ],
            ),
        ];

        let rules = rule_table
            .into_iter()
            .map(|(query_type, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("static classifier pattern"))
                    .collect();
                (query_type, compiled)
            })
            .collect();

        let cue_table: [(ResponseFormat, &str); 4] = [
            (
                ResponseFormat::StepByStep,
                r"\b(step by step|steps|how to|how do i|procedure)\b",
            ),
            (ResponseFormat::BulletPoints, r"\b(list|types|kinds)\b"),
            (
                ResponseFormat::Concise,
                r"\b(brief|briefly|quick|summary|short)\b",
            ),
            (
                ResponseFormat::Detailed,
                r"\b(detailed|comprehensive|in depth|explain|tell me about)\b",
            ),
        ];

        let format_cues = cue_table
            .into_iter()
            .map(|(format, pattern)| {
                (format, Regex::new(pattern).expect("static cue pattern"))
            })
            .collect();

        Self { rules, format_cues }
    }

    /// Classify the query; the first matching rule wins, default `General`
    pub fn classify(&self, query: &str) -> QueryType {
        let normalized = query.to_lowercase();

        for (query_type, patterns) in &self.rules {
            if patterns.iter().any(|p| p.is_match(&normalized)) {
                return *query_type;
            }
        }

        QueryType::General
    }

    /// Resolve the response format: explicit cues in the query override the
    /// query type's default mapping
    pub fn response_format(&self, query: &str, query_type: QueryType) -> ResponseFormat {
        let normalized = query.to_lowercase();

        for (format, cue) in &self.format_cues {
            if cue.is_match(&normalized) {
                return *format;
            }
        }

        query_type.default_format()
    }
}
