//! Fixed instructional templates for every report section group.
//!
//! Each group has a role-setting system instruction and a user prompt built
//! from its instruction body plus the input texts it depends on. The supplied
//! texts are embedded verbatim; the service response is used unmodified.

use crate::report::{ExtractedInputs, InputSlot, SectionContext, SectionId, SectionInputs};

/// Role-setting system instruction for a section group.
pub fn role_instruction(section: SectionId) -> &'static str {
    match section {
        SectionId::PatientIdentification => {
            "You are a highly skilled psychologist tasked with generating Sections I, II, and III \
             of a Psychological Assessment Report based on provided information. Use markdown \
             formatting for headers and bullet points."
        }
        SectionId::BackgroundInformation => {
            "You are a highly skilled psychologist tasked with generating the Background \
             Information section of a Psychological Assessment Report based on provided \
             information."
        }
        SectionId::AssessmentMeasures => {
            "You are a highly skilled psychologist tasked with generating the Assessment \
             Measures section of a Psychological Assessment Report based on provided test \
             results. Use markdown formatting for headers and bullet points."
        }
        SectionId::BehavioralObservations => {
            "You are a highly skilled psychologist tasked with generating the Behavioral \
             Observations and Mental Status Examination sections of a Psychological Assessment \
             Report based on provided information."
        }
        SectionId::Interpretation => {
            "You are a highly skilled psychologist tasked with interpreting assessment results \
             for a Psychological Assessment Report."
        }
        SectionId::DiagnosticFormulation => {
            "You are a highly skilled psychologist tasked with generating DSM-5 Criteria \
             Analysis, Strengths and Challenges, and Risk and Protective Factors sections of a \
             Psychological Assessment Report based on provided information."
        }
        SectionId::Recommendations => {
            "You are a highly skilled psychologist tasked with generating Recommendations, \
             Prognosis, and Follow-Up Plan sections of a Psychological Assessment Report based \
             on previous sections."
        }
        SectionId::InterpretiveSummary => {
            "You are a highly skilled psychologist tasked with summarizing a Psychological \
             Assessment Report based on previous sections."
        }
        SectionId::DiagnosisAndResources => {
            "You are a highly skilled psychologist tasked with providing the Diagnosis and \
             Resources sections of a Psychological Assessment Report based on all provided \
             information."
        }
    }
}

const PATIENT_IDENTIFICATION_INSTRUCTIONS: &str = "\
Based on the following intake form and transcript, generate Sections I, II, and III of the \
Psychological Assessment Report (PAR). Use markdown formatting for headers and bullet points.

## I. Patient Identification and Reason for Referral
- Include patient's name, date of birth, home address, and physical location during remote assessment.
- State the reason for referral, including age, presenting concerns, and who conducted the evaluation.

## II. Informed Consent and Assessment Scope
- Summarize the informed consent process, including details provided and agreed upon.
- Outline the assessment scope, including domains covered and reasons for selecting specific assessments.

## III. Collateral Information
- List individuals providing information and assessments used.

Use professional language appropriate for a psychological assessment report.";

const BACKGROUND_INSTRUCTIONS: &str = "\
Using the following intake form and transcript, generate Section IV (Background Information) of \
the Psychological Assessment Report. Include detailed information in the following subsections:

IV. Background Information

Family History and Composition:
- Provide detailed information about the patient's family, including parental background, family \
medical and psychiatric history, and current household composition.

Developmental History:
- Outline developmental milestones, any delays, and early signs of atypical neurodevelopment.

Educational/Occupational History:
- Describe the patient's educational journey, academic achievements, and occupational history, \
including any challenges faced.

Medical and Psychiatric History:
- Detail medical conditions, psychiatric diagnoses, treatments received, medications, and sensory \
sensitivities.

Use professional language and ensure the content aligns with the structure provided.";

const ASSESSMENT_MEASURES_INSTRUCTIONS: &str = "\
Based on the following test results, generate Section V (Assessment Measures) of the \
Psychological Assessment Report. Use markdown formatting for headers and bullet points. For each \
assessment, include:

- A brief description of the assessment's purpose.
- The patient's scores and percentiles.
- An interpretation of the results.

Ensure to cover the following assessments:

- Vineland Adaptive Behavior Scales, Third Edition (Vineland-3)
- Social Responsiveness Scale, Second Edition (SRS-2)
- Gilliam Autism Rating Scale, Third Edition (GARS-3)
- Brief Observation of Symptoms of Autism (BOSA-F2)
- Generalized Anxiety Disorder 7-item (GAD-7) Scale
- Ritvo Autism Asperger Diagnostic Scale-Revised (RAADS-R)
- Kaufman Brief Intelligence Test, Second Edition (KBIT-2)
- Camouflaging Autistic Traits Questionnaire (CAT-Q)

Use professional language and align with the structure provided.";

const BEHAVIORAL_INSTRUCTIONS: &str = "\
Using the following intake form and transcript, generate Sections VI and VII of the \
Psychological Assessment Report.

VI. Behavioral Observations
- Describe observed behaviors consistent with assessment data.
- Provide specific examples illustrating social avoidance, adaptive strategies, and any notable \
behaviors.

VII. Mental Status Examination
- General Appearance
- Behavior
- Speech
- Mood and Affect
- Cognition
- Sensory Processing

Use professional language and ensure the content aligns with the structure provided.";

const INTERPRETATION_INSTRUCTIONS: &str = "\
Based on the following test results, generate Section VIII (Interpretation) of the Psychological \
Assessment Report. Provide:

- An interpretation of each assessment result.
- A synthesis that integrates findings across assessments.
- Discuss how the results relate to the patient's functioning.

Use professional language and ensure the content aligns with the structure provided.";

const DIAGNOSTIC_FORMULATION_INSTRUCTIONS: &str = "\
Based on all the provided information, generate Sections IX, X, and XI of the Psychological \
Assessment Report.

IX. DSM-5 Criteria for Autism Spectrum Disorder
- Match the patient's symptoms to DSM-5 criteria for ASD.
- Provide specific examples and assessment data supporting each criterion.

X. Strengths and Challenges
- List the patient's strengths, leveraging assessment data.
- Outline challenges, including social communication and emotional regulation.

XI. Risk and Protective Factors
- Identify risk factors impacting prognosis.
- Highlight protective factors that can aid in intervention.

Use professional language and ensure the content aligns with the structure provided.";

const RECOMMENDATIONS_INSTRUCTIONS: &str = "\
Based on the following sections of the report, generate Sections XII, XIII, and XIV of the \
Psychological Assessment Report.

XII. Recommendations
- Provide specific, actionable recommendations for interventions.
- Include therapies, support services, and strategies.

XIII. Prognosis
- Discuss the patient's prognosis with and without intervention.
- Consider risk and protective factors.

XIV. Follow-Up Plan
- Outline goals, objectives, and strategies.
- Include timelines for re-evaluation.

Use professional language and ensure the content aligns with the structure provided.";

const INTERPRETIVE_SUMMARY_INSTRUCTIONS: &str = "\
Based on the following sections of the report, generate Section XV (Interpretive Summary) of the \
Psychological Assessment Report. Provide:

- A concise summary of findings.
- Highlight key strengths and challenges.
- Summarize recommendations.

Use professional language and ensure the content aligns with the structure provided.";

const DIAGNOSIS_RESOURCES_INSTRUCTIONS: &str = "\
Based on all the information from the files and the previous sections of the report, generate \
Section XVI (Diagnosis and Resources) of the Psychological Assessment Report.

- Provide the primary and secondary diagnoses with justification based on DSM-5 criteria.
- List resources for the patient, including local services, support groups, and therapy options.

Use professional language and ensure the content aligns with the structure provided.";

fn instructions(section: SectionId) -> &'static str {
    match section {
        SectionId::PatientIdentification => PATIENT_IDENTIFICATION_INSTRUCTIONS,
        SectionId::BackgroundInformation => BACKGROUND_INSTRUCTIONS,
        SectionId::AssessmentMeasures => ASSESSMENT_MEASURES_INSTRUCTIONS,
        SectionId::BehavioralObservations => BEHAVIORAL_INSTRUCTIONS,
        SectionId::Interpretation => INTERPRETATION_INSTRUCTIONS,
        SectionId::DiagnosticFormulation => DIAGNOSTIC_FORMULATION_INSTRUCTIONS,
        SectionId::Recommendations => RECOMMENDATIONS_INSTRUCTIONS,
        SectionId::InterpretiveSummary => INTERPRETIVE_SUMMARY_INSTRUCTIONS,
        SectionId::DiagnosisAndResources => DIAGNOSIS_RESOURCES_INSTRUCTIONS,
    }
}

/// Build the user prompt for one section group: its instruction body followed
/// by the input texts the group depends on, embedded verbatim.
pub fn user_prompt(
    section: SectionId,
    inputs: &ExtractedInputs,
    prior: &SectionContext,
) -> String {
    let body = instructions(section);

    match section.inputs() {
        SectionInputs::IntakeAndTranscript => format!(
            "{body}\n\nIntake Form:\n{}\n\nTranscript:\n{}",
            inputs.text(InputSlot::IntakeForm),
            inputs.text(InputSlot::Transcript),
        ),
        SectionInputs::ResultTexts => {
            format!("{body}\n\n{}", inputs.labeled_results())
        }
        SectionInputs::AllInputs => {
            format!("{body}\n\n{}", inputs.labeled_all())
        }
        SectionInputs::PriorSections => {
            format!("{body}\n\nPrevious Sections:\n{}", prior.concatenated())
        }
        SectionInputs::AllInputsAndPriorSections => format!(
            "{body}\n\nAll Files Text:\n{}\n\nPrevious Sections:\n{}",
            inputs.labeled_all(),
            prior.concatenated(),
        ),
    }
}
