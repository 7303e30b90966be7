//! Prompt template construction

use serde::{Deserialize, Serialize};

use crate::config::ProgramConfig;
use crate::prompt::{QueryType, ResponseFormat};
use crate::retrieval::ScoredCandidate;

/// Record of how a prompt was constructed, carried through the response for
/// observability and test assertions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub query_type: QueryType,
    pub response_format: ResponseFormat,
    /// Template identifier, e.g. "cost_concise" or "basic"
    pub template: String,
    /// Number of context chunks included
    pub context_chunks: usize,
}

/// Builds generation prompts from the classified query and retrieved context
pub struct PromptBuilder {
    program: ProgramConfig,
}

impl PromptBuilder {
    pub fn new(program: ProgramConfig) -> Self {
        Self { program }
    }

    /// Build the final prompt: instruction header, source-attributed context,
    /// then the user question
    pub fn build(
        &self,
        query: &str,
        query_type: QueryType,
        format: ResponseFormat,
        context: &[ScoredCandidate],
        enhanced: bool,
    ) -> (String, PromptMetadata) {
        let metadata = PromptMetadata {
            query_type,
            response_format: format,
            template: if enhanced {
                format!("{}_{}", query_type.as_str(), format.as_str())
            } else {
                "basic".to_string()
            },
            context_chunks: context.len(),
        };

        let prompt = if enhanced {
            self.enhanced_prompt(query, query_type, format, context)
        } else {
            self.basic_prompt(query, context)
        };

        (prompt, metadata)
    }

    fn enhanced_prompt(
        &self,
        query: &str,
        query_type: QueryType,
        format: ResponseFormat,
        context: &[ScoredCandidate],
    ) -> String {
        let mut instructions = vec![
            "Base your answer strictly on the provided context; if the information is not there, say so clearly".to_string(),
        ];
        instructions.extend(self.type_instructions(query_type));
        instructions.extend(format_instructions(format));

        let bullet_list = instructions
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an expert on the {} ({}) program.\n\n\
             Question: {}\n\n\
             Context:\n{}\n\n\
             Instructions:\n{}\n\n\
             Answer:",
            self.program.full_name,
            self.program.name,
            query,
            format_context(context),
            bullet_list
        )
    }

    fn basic_prompt(&self, query: &str, context: &[ScoredCandidate]) -> String {
        format!(
            "You are an expert assistant knowledgeable about the {} ({}) program.\n\
             Answer the following question based *only* on the provided context. \
             If the context does not contain the answer, say 'I cannot answer the \
             question based on the provided information.'\n\n\
             Question: {}\n\n\
             Context:\n{}\n\n\
             Answer:",
            self.program.full_name,
            self.program.name,
            query,
            format_context(context)
        )
    }

    fn type_instructions(&self, query_type: QueryType) -> Vec<String> {
        match query_type {
            QueryType::Eligibility => vec![
                "Provide a direct, clear answer about eligibility requirements".to_string(),
                "Include the key criteria (age, diagnosis, insurance)".to_string(),
            ],
            QueryType::Services => vec![
                "List the main types of services provided, grouping related services together"
                    .to_string(),
            ],
            QueryType::Process => vec![
                "Make each step actionable and specific, including who to contact".to_string(),
            ],
            QueryType::Cost => vec![
                "State clearly what is covered and what is not, naming the specific insurance programs".to_string(),
            ],
            QueryType::Provider => vec![
                "Describe provider qualifications using only information from the context"
                    .to_string(),
                "Include actionable next steps for finding a provider when possible".to_string(),
            ],
            QueryType::ProviderCount => vec![
                "Check whether an exact provider count is present in the context".to_string(),
                format!(
                    "If an exact count is NOT found in the context, explicitly state: \
                     \"The exact number of {} providers is not specified in the available \
                     information.\" Do not invent or estimate a number",
                    self.program.name
                ),
                format!(
                    "Recommend consulting the {} at {} for the most current provider count",
                    self.program.authoritative_source, self.program.authoritative_url
                ),
            ],
            QueryType::Definition => vec![
                "Lead with a one-sentence definition before any detail".to_string(),
            ],
            QueryType::Comparison => vec![
                "Compare the options point by point, noting where the context is silent"
                    .to_string(),
            ],
            QueryType::General => vec!["Answer directly and specifically".to_string()],
        }
    }
}

fn format_instructions(format: ResponseFormat) -> Vec<String> {
    match format {
        ResponseFormat::Concise => vec![
            "Keep the response focused and under 150 words".to_string(),
        ],
        ResponseFormat::Detailed => vec![
            "Cover the topic thoroughly, organized with clear headings where helpful".to_string(),
        ],
        ResponseFormat::BulletPoints => vec![
            "Use bullet points with a brief description for each item".to_string(),
        ],
        ResponseFormat::StepByStep => vec![
            "Break the answer into numbered steps in order".to_string(),
            "Mention typical timeframes if available".to_string(),
        ],
        ResponseFormat::Faq => vec![
            "Structure the answer as a clear question and answer, addressing likely follow-ups"
                .to_string(),
        ],
    }
}

/// Context chunks separated and tagged with their source attribution
fn format_context(context: &[ScoredCandidate]) -> String {
    if context.is_empty() {
        return "No relevant context available.".to_string();
    }

    context
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let attribution = match &candidate.source_url {
                Some(url) => format!("{} ({})", candidate.source, url),
                None => candidate.source.clone(),
            };
            format!(
                "Context {} [Source: {}]:\n{}",
                i + 1,
                attribution,
                candidate.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::CandidateKind;

    fn program() -> ProgramConfig {
        crate::config::Config::default().program
    }

    fn candidate(id: &str, text: &str, url: Option<&str>) -> ScoredCandidate {
        ScoredCandidate {
            id: id.to_string(),
            text: text.to_string(),
            score: 0.5,
            source: "Program Manual".to_string(),
            source_url: url.map(String::from),
            updated: None,
            kind: CandidateKind::Chunk,
        }
    }

    #[test]
    fn prompt_contains_query_context_and_attribution() {
        let builder = PromptBuilder::new(program());
        let context = vec![candidate(
            "a",
            "Services are covered by Medical Assistance.",
            Some("https://example.gov/manual"),
        )];

        let (prompt, metadata) = builder.build(
            "What does EIDBI cost?",
            QueryType::Cost,
            ResponseFormat::Concise,
            &context,
            true,
        );

        assert!(prompt.contains("What does EIDBI cost?"));
        assert!(prompt.contains("Services are covered by Medical Assistance."));
        assert!(prompt.contains("[Source: Program Manual (https://example.gov/manual)]"));
        assert!(prompt.ends_with("Answer:"));
        assert_eq!(metadata.template, "cost_concise");
        assert_eq!(metadata.context_chunks, 1);
    }

    #[test]
    fn provider_count_prompt_has_anti_fabrication_instructions() {
        let builder = PromptBuilder::new(program());

        let (prompt, _) = builder.build(
            "How many providers are there?",
            QueryType::ProviderCount,
            ResponseFormat::Concise,
            &[],
            true,
        );

        assert!(prompt.contains("not specified in the available information"));
        assert!(prompt.contains("Minnesota DHS Provider Directory"));
        assert!(prompt.contains("Do not invent or estimate a number"));
    }

    #[test]
    fn empty_context_is_stated_explicitly() {
        let builder = PromptBuilder::new(program());
        let (prompt, metadata) = builder.build(
            "Anything",
            QueryType::General,
            ResponseFormat::Concise,
            &[],
            true,
        );

        assert!(prompt.contains("No relevant context available."));
        assert_eq!(metadata.context_chunks, 0);
    }

    #[test]
    fn basic_prompt_skips_type_specific_instructions() {
        let builder = PromptBuilder::new(program());
        let context = vec![candidate("a", "Some context.", None)];

        let (prompt, metadata) = builder.build(
            "How many providers are there?",
            QueryType::ProviderCount,
            ResponseFormat::Concise,
            &context,
            false,
        );

        assert_eq!(metadata.template, "basic");
        assert!(prompt.contains("based *only* on the provided context"));
        assert!(!prompt.contains("Do not invent or estimate a number"));
        // Classification metadata is still recorded for the response
        assert_eq!(metadata.query_type, QueryType::ProviderCount);
    }

    #[test]
    fn step_by_step_format_requests_numbered_steps() {
        let builder = PromptBuilder::new(program());
        let (prompt, _) = builder.build(
            "How do I apply?",
            QueryType::Process,
            ResponseFormat::StepByStep,
            &[],
            true,
        );

        assert!(prompt.contains("numbered steps"));
    }
}
