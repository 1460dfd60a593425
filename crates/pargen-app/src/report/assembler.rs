//! Drives section generation in dependency order and assembles the report.

use tracing::info;

use crate::report::{
    cover_page, prompts, table_of_contents, ExtractedInputs, SectionContext, SectionId,
};
use crate::services::generator::{GenerateError, GenerationRequest, TextGenerator};

/// The fully assembled report: static cover and toc blocks plus the generated
/// body, with the per-section texts retained in generation order.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub cover: String,
    pub toc: String,
    pub body: String,
    pub sections: Vec<(SectionId, String)>,
}

/// Generate every section group strictly in order, threading the accumulated
/// prior-section context into the groups that depend on it.
///
/// Sections are never skipped or reordered; empty input text is valid and
/// simply yields a thinner prompt. The first failed call aborts the whole
/// assembly — nothing partial is persisted anywhere.
pub async fn assemble_report(
    inputs: &ExtractedInputs,
    generator: &dyn TextGenerator,
) -> Result<AssembledReport, GenerateError> {
    let mut context = SectionContext::default();

    for section in SectionId::ordered() {
        let request = GenerationRequest {
            system: prompts::role_instruction(section).to_string(),
            user: prompts::user_prompt(section, inputs, &context),
            max_output_tokens: section.max_output_tokens(),
        };

        info!(
            section = section.as_ref(),
            generated = context.len(),
            max_output_tokens = request.max_output_tokens,
            "generating report section"
        );

        let text = generator.generate(request).await?;
        context.push(section, text);
    }

    debug_assert_eq!(context.len(), SectionId::ordered().len());

    let body = context.concatenated();
    Ok(AssembledReport {
        cover: cover_page().to_string(),
        toc: table_of_contents().to_string(),
        body,
        sections: context.into_sections(),
    })
}
