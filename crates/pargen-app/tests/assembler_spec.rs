mod common;

use common::MockGenerator;
use pargen_app::report::{assemble_report, ExtractedInputs, InputSlot, SectionId};

#[tokio::test]
async fn body_is_ordered_concatenation_of_responses() {
    let generator = MockGenerator::scripted();
    let inputs = ExtractedInputs::default();

    let report = assemble_report(&inputs, generator.as_ref())
        .await
        .expect("assembly succeeds");

    let expected = (1..=9)
        .map(MockGenerator::response_for)
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(report.body, expected);

    let order: Vec<SectionId> = report.sections.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, SectionId::ordered());

    assert!(!report.cover.is_empty());
    assert!(report.toc.contains("Table of Contents"));
}

#[tokio::test]
async fn sections_are_requested_strictly_in_order() {
    let generator = MockGenerator::scripted();
    let mut inputs = ExtractedInputs::default();
    inputs.insert(InputSlot::Transcript, "transcript words".to_string());
    inputs.insert(InputSlot::IntakeForm, "intake words".to_string());

    assemble_report(&inputs, generator.as_ref())
        .await
        .expect("assembly succeeds");

    let calls = generator.recorded_calls();
    assert_eq!(calls.len(), 9);

    // The recommendations group (seventh call) must carry every earlier
    // group's output, which is only possible if all six predecessors had
    // already returned.
    let recommendations = &calls[6];
    for call in 1..=6 {
        assert!(
            recommendations
                .user
                .contains(&MockGenerator::response_for(call)),
            "call 7 prompt missing output of call {call}"
        );
    }
    assert!(recommendations.user.contains("Previous Sections:"));

    // The interpretive summary (eighth call) additionally embeds the
    // recommendations output.
    assert!(calls[7].user.contains(&MockGenerator::response_for(7)));

    // The final group embeds both every extracted text and all prior output.
    let last = &calls[8];
    assert!(last.user.contains("All Files Text:"));
    assert!(last.user.contains("transcript words"));
    assert!(last.user.contains(&MockGenerator::response_for(8)));
}

#[tokio::test]
async fn per_call_output_bounds_follow_the_section_table() {
    let generator = MockGenerator::scripted();
    assemble_report(&ExtractedInputs::default(), generator.as_ref())
        .await
        .expect("assembly succeeds");

    let bounds: Vec<u32> = generator
        .recorded_calls()
        .iter()
        .map(|call| call.max_output_tokens)
        .collect();
    assert_eq!(
        bounds,
        vec![1000, 2000, 3000, 2000, 3000, 3000, 3000, 2000, 3000]
    );
}

#[tokio::test]
async fn empty_inputs_do_not_skip_sections() {
    let generator = MockGenerator::scripted();
    assemble_report(&ExtractedInputs::default(), generator.as_ref())
        .await
        .expect("assembly succeeds");
    assert_eq!(generator.recorded_calls().len(), 9);
}

#[tokio::test]
async fn failure_aborts_without_requesting_later_sections() {
    let generator = MockGenerator::failing_on(4);
    let result = assemble_report(&ExtractedInputs::default(), generator.as_ref()).await;

    assert!(result.is_err());
    assert_eq!(
        generator.recorded_calls().len(),
        4,
        "no section may be requested after the failed call"
    );
}
