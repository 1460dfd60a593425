//! Report domain model: input slots, section groups, and assembly order.

pub mod assembler;
pub mod prompts;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

pub use assembler::{assemble_report, AssembledReport};

/// File name of the rendered document inside a submission's key prefix.
pub const OUTPUT_FILE_NAME: &str = "generated_par.pdf";

/// The nine named input slots of a submission. Declaration order is the
/// canonical slot order used for prompt embedding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
pub enum InputSlot {
    Transcript,
    IntakeForm,
    Catq,
    Gad,
    Gars,
    Kbit,
    Raadsr,
    Srs2,
    Vineland,
}

impl InputSlot {
    pub const COUNT: usize = 9;

    pub fn all() -> impl Iterator<Item = InputSlot> {
        Self::iter()
    }

    /// Upload file name for this slot (fixed, case- and suffix-sensitive).
    pub fn file_name(self) -> &'static str {
        match self {
            InputSlot::Transcript => "Transcript.pdf",
            InputSlot::IntakeForm => "IntakeForm_Results.pdf",
            InputSlot::Catq => "CATQ_Results.pdf",
            InputSlot::Gad => "GAD_Results.pdf",
            InputSlot::Gars => "GARS_Results.pdf",
            InputSlot::Kbit => "KBIT_Results.pdf",
            InputSlot::Raadsr => "RAADSR_Results.pdf",
            InputSlot::Srs2 => "SRS2_Results.pdf",
            InputSlot::Vineland => "Vineland_Results.pdf",
        }
    }

    /// Logical name used to label this slot's text inside prompts.
    pub fn stem(self) -> &'static str {
        match self {
            InputSlot::Transcript => "Transcript",
            InputSlot::IntakeForm => "IntakeForm_Results",
            InputSlot::Catq => "CATQ_Results",
            InputSlot::Gad => "GAD_Results",
            InputSlot::Gars => "GARS_Results",
            InputSlot::Kbit => "KBIT_Results",
            InputSlot::Raadsr => "RAADSR_Results",
            InputSlot::Srs2 => "SRS2_Results",
            InputSlot::Vineland => "Vineland_Results",
        }
    }

    pub fn from_file_name(name: &str) -> Option<InputSlot> {
        Self::iter().find(|slot| slot.file_name() == name)
    }

    /// The eight `*_Results` slots feeding the assessment-measure sections.
    pub fn is_result(self) -> bool {
        !matches!(self, InputSlot::Transcript)
    }
}

/// Extracted text per input slot. Missing slots read as empty strings; an
/// empty string is valid input and simply yields a thinner prompt.
#[derive(Debug, Default, Clone)]
pub struct ExtractedInputs {
    texts: BTreeMap<InputSlot, String>,
}

impl ExtractedInputs {
    pub fn insert(&mut self, slot: InputSlot, text: String) {
        self.texts.insert(slot, text);
    }

    pub fn text(&self, slot: InputSlot) -> &str {
        self.texts.get(&slot).map(String::as_str).unwrap_or("")
    }

    /// All nine texts, each labeled with its logical name.
    pub fn labeled_all(&self) -> String {
        self.labeled(InputSlot::all())
    }

    /// The eight result texts, each labeled with its logical name.
    pub fn labeled_results(&self) -> String {
        self.labeled(InputSlot::all().filter(|slot| slot.is_result()))
    }

    fn labeled(&self, slots: impl Iterator<Item = InputSlot>) -> String {
        slots
            .map(|slot| format!("{}:\n{}", slot.stem(), self.text(slot)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The nine generated section groups, in their fixed generation order.
/// The last three groups embed the accumulated text of every earlier group,
/// so this order is a correctness requirement, not a preference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum SectionId {
    /// Sections I–III: identification, consent, collaterals.
    PatientIdentification,
    /// Section IV: background information.
    BackgroundInformation,
    /// Section V: assessment measures.
    AssessmentMeasures,
    /// Sections VI–VII: behavioral observations and mental status exam.
    BehavioralObservations,
    /// Section VIII: interpretation of results.
    Interpretation,
    /// Sections IX–XI: DSM-5 criteria, strengths/challenges, risk factors.
    DiagnosticFormulation,
    /// Sections XII–XIV: recommendations, prognosis, follow-up plan.
    Recommendations,
    /// Section XV: interpretive summary.
    InterpretiveSummary,
    /// Section XVI: diagnosis and resources.
    DiagnosisAndResources,
}

/// Which inputs a section group's prompt embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionInputs {
    IntakeAndTranscript,
    ResultTexts,
    AllInputs,
    PriorSections,
    AllInputsAndPriorSections,
}

impl SectionId {
    /// Generation order (declaration order).
    pub fn ordered() -> Vec<SectionId> {
        Self::iter().collect()
    }

    pub fn inputs(self) -> SectionInputs {
        match self {
            SectionId::PatientIdentification
            | SectionId::BackgroundInformation
            | SectionId::BehavioralObservations => SectionInputs::IntakeAndTranscript,
            SectionId::AssessmentMeasures | SectionId::Interpretation => {
                SectionInputs::ResultTexts
            }
            SectionId::DiagnosticFormulation => SectionInputs::AllInputs,
            SectionId::Recommendations | SectionId::InterpretiveSummary => {
                SectionInputs::PriorSections
            }
            SectionId::DiagnosisAndResources => SectionInputs::AllInputsAndPriorSections,
        }
    }

    /// Maximum output length requested from the generation service.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            SectionId::PatientIdentification => 1000,
            SectionId::BackgroundInformation => 2000,
            SectionId::AssessmentMeasures => 3000,
            SectionId::BehavioralObservations => 2000,
            SectionId::Interpretation => 3000,
            SectionId::DiagnosticFormulation => 3000,
            SectionId::Recommendations => 3000,
            SectionId::InterpretiveSummary => 2000,
            SectionId::DiagnosisAndResources => 3000,
        }
    }
}

/// Ordered accumulator of generated sections. Later prompts embed the full
/// concatenation of everything generated so far.
#[derive(Debug, Default, Clone)]
pub struct SectionContext {
    sections: Vec<(SectionId, String)>,
}

impl SectionContext {
    pub fn push(&mut self, section: SectionId, text: String) {
        debug_assert!(!self.contains(section));
        self.sections.push((section, text));
    }

    pub fn contains(&self, section: SectionId) -> bool {
        self.sections.iter().any(|(id, _)| *id == section)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Full text of all sections so far, blank-line separated, in order.
    pub fn concatenated(&self) -> String {
        self.sections
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn into_sections(self) -> Vec<(SectionId, String)> {
        self.sections
    }
}

/// Static cover block. Rendered as one plain paragraph followed by a forced
/// page break.
pub fn cover_page() -> &'static str {
    "CONFIDENTIAL Psychological Assessment Report\n\n\
     Patient's Name:\n\
     Date of Report:\n\
     Examining Clinician:\n\n\
     CONFIDENTIAL DOCUMENT\n\n\
     This document contains confidential and privileged information intended \
     only for the individual named above. If you are not the intended \
     recipient, please notify the sender immediately and delete this document. \
     Any unauthorized review, use, disclosure, or distribution is prohibited."
}

/// Static table-of-contents block. Rendered as one plain paragraph followed
/// by a forced page break.
pub fn table_of_contents() -> &'static str {
    "Table of Contents\n\n\
     1. Patient Identification and Referral Information\n\
     2. Informed Consent\n\
     3. Collaterals Involved\n\
     4. Background Information\n\
     \u{20}  a. Family History and Composition\n\
     \u{20}  b. Developmental History\n\
     \u{20}  c. Educational History\n\
     \u{20}  d. Medical and Psychiatric History\n\
     5. Assessment Procedures and Results\n\
     6. Behavioral Observations\n\
     7. Documentation of Validity Challenges\n\
     8. Mental Status Examination (MSE)\n\
     9. DSM-5 Diagnostic Criteria for Autism Spectrum Disorder\n\
     10. Strengths and Challenges\n\
     11. Risk and Protective Factors\n\
     12. Recommendations\n\
     13. Prognosis\n\
     14. Follow-Up Plan\n\
     15. Interpretive Summary\n\
     16. Conclusion\n\
     17. Resources\n\
     18. References\n\
     19. DSM-5 Diagnostic Criteria Table"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_slots_with_fixed_file_names() {
        let names: Vec<&str> = InputSlot::all().map(InputSlot::file_name).collect();
        assert_eq!(names.len(), InputSlot::COUNT);
        assert_eq!(names[0], "Transcript.pdf");
        assert!(names.iter().skip(1).all(|name| name.ends_with("_Results.pdf")));
        assert_eq!(
            InputSlot::from_file_name("Vineland_Results.pdf"),
            Some(InputSlot::Vineland)
        );
        assert_eq!(InputSlot::from_file_name("vineland_results.pdf"), None);
    }

    #[test]
    fn eight_result_slots() {
        assert_eq!(InputSlot::all().filter(|slot| slot.is_result()).count(), 8);
    }

    #[test]
    fn generation_order_ends_with_context_dependent_groups() {
        let order = SectionId::ordered();
        assert_eq!(order.len(), 9);
        assert_eq!(order[0], SectionId::PatientIdentification);
        assert_eq!(
            &order[6..],
            &[
                SectionId::Recommendations,
                SectionId::InterpretiveSummary,
                SectionId::DiagnosisAndResources,
            ]
        );
    }

    #[test]
    fn max_output_tokens_stay_in_documented_range() {
        for section in SectionId::ordered() {
            let bound = section.max_output_tokens();
            assert!((1000..=3000).contains(&bound), "{section:?} bound {bound}");
        }
    }

    #[test]
    fn context_concatenates_in_order_with_blank_lines() {
        let mut context = SectionContext::default();
        context.push(SectionId::PatientIdentification, "first".to_string());
        context.push(SectionId::BackgroundInformation, "second".to_string());
        assert_eq!(context.concatenated(), "first\n\nsecond");
    }

    #[test]
    fn missing_slot_reads_as_empty_text() {
        let inputs = ExtractedInputs::default();
        assert_eq!(inputs.text(InputSlot::Gad), "");
        assert!(inputs.labeled_results().contains("GAD_Results:\n"));
    }
}
