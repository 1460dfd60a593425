use pargen_app::render::{
    body_blocks, document_elements, render_report, Block, DocElement, TextStyle,
};
use pargen_app::report::{cover_page, table_of_contents};

#[test]
fn forced_page_breaks_follow_cover_and_toc() {
    for body in ["", "plain body", "# Heading\ntext\n\nmore"] {
        let blocks = body_blocks(body);
        let elements = document_elements(cover_page(), table_of_contents(), &blocks);

        assert!(
            matches!(elements[0], DocElement::Paragraph { .. }),
            "cover paragraph first"
        );
        assert_eq!(elements[1], DocElement::PageBreak, "page break after cover");
        assert!(
            matches!(elements[2], DocElement::Paragraph { .. }),
            "toc paragraph third"
        );
        assert_eq!(elements[3], DocElement::PageBreak, "page break after toc");
    }
}

#[test]
fn line_classification_matrix() {
    let cases: Vec<(&str, Block)> = vec![
        ("# Heading", Block::Heading1("Heading".to_string())),
        ("## Heading", Block::Heading2("Heading".to_string())),
        ("", Block::Spacer),
        ("   ", Block::Spacer),
        ("ordinary sentence", Block::Paragraph("ordinary sentence".to_string())),
        (
            "score < 10 & <unclosed",
            Block::Paragraph("score < 10 & <unclosed".to_string()),
        ),
        ("- bullet stays literal", Block::Paragraph("- bullet stays literal".to_string())),
        ("### deeper", Block::Paragraph("### deeper".to_string())),
    ];

    for (line, expected) in cases {
        let blocks = body_blocks(line);
        assert_eq!(blocks.len(), if line.is_empty() { 0 } else { 1 }, "line {line:?}");
        if !line.is_empty() {
            assert_eq!(blocks[0], expected, "line {line:?}");
        }
    }

    // A lone blank line inside a body yields exactly one spacer.
    let blocks = body_blocks("a\n\nb");
    assert_eq!(
        blocks,
        vec![
            Block::Paragraph("a".to_string()),
            Block::Spacer,
            Block::Paragraph("b".to_string()),
        ]
    );
}

#[test]
fn heading_blocks_use_heading_styles() {
    let blocks = body_blocks("# One\n## Two\nthree");
    let elements = document_elements("c", "t", &blocks);
    assert!(matches!(
        elements[4],
        DocElement::Paragraph { style: TextStyle::Heading1, .. }
    ));
    assert!(matches!(
        elements[5],
        DocElement::Paragraph { style: TextStyle::Heading2, .. }
    ));
    assert!(matches!(
        elements[6],
        DocElement::Paragraph { style: TextStyle::Body, .. }
    ));
}

#[test]
fn renders_unescaped_markup_without_error() {
    let body = "# Section <IX>\nDSM-5 criteria: score < 10 & symptoms > baseline\n\n<divider>";
    let bytes =
        render_report(cover_page(), table_of_contents(), body).expect("render tolerates markup");
    assert!(bytes.starts_with(b"%PDF"));
    assert!(bytes.len() > 1000);
}

#[test]
fn long_report_spans_multiple_pages() {
    let paragraph = "This sentence is repeated to force pagination across page boundaries. ";
    let body = (0..400)
        .map(|i| format!("{paragraph}{i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let bytes = render_report("cover", "toc", &body).expect("long render succeeds");
    assert!(bytes.starts_with(b"%PDF"));

    // Two forced breaks plus overflow pagination: the page tree must hold
    // more than the three seed pages.
    let page_count = bytes
        .windows(b"/Type /Page".len())
        .filter(|window| window == b"/Type /Page")
        .count();
    assert!(page_count > 3, "expected pagination, found {page_count} page markers");
}
