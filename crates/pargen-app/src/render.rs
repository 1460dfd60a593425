//! Renders an assembled report into a paginated PDF document.
//!
//! The input is plain text with two recognised heading markers (`# ` and
//! `## `); everything else is rendered literally. The renderer draws text
//! runs directly, so markup-significant characters (`<`, `&`, ...) in
//! generated text can never cause a structural failure.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 25.4;
const PT_PER_MM: f32 = 2.834_65;
/// Fixed vertical spacing emitted for a blank body line.
const SPACER_MM: f32 = 5.08;
/// Approximate average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH_RATIO: f32 = 0.5;
const LINE_HEIGHT_RATIO: f32 = 1.45;

const LEVEL1_PREFIX: &str = "# ";
const LEVEL2_PREFIX: &str = "## ";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to assemble pdf document: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// One classified line of the report body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading1(String),
    Heading2(String),
    Paragraph(String),
    Spacer,
}

/// Text style attached to a rendered paragraph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Body,
    Heading1,
    Heading2,
}

impl TextStyle {
    fn font_size(self) -> f32 {
        match self {
            TextStyle::Body => 11.0,
            TextStyle::Heading1 => 16.0,
            TextStyle::Heading2 => 13.0,
        }
    }

    fn is_bold(self) -> bool {
        !matches!(self, TextStyle::Body)
    }

    fn space_before_mm(self) -> f32 {
        match self {
            TextStyle::Body => 0.0,
            TextStyle::Heading1 => 3.0,
            TextStyle::Heading2 => 2.0,
        }
    }

    fn line_height_mm(self) -> f32 {
        self.font_size() * LINE_HEIGHT_RATIO / PT_PER_MM
    }

    fn max_chars_per_line(self) -> usize {
        let usable_width_pt = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) * PT_PER_MM;
        let max = usable_width_pt / (self.font_size() * AVG_GLYPH_WIDTH_RATIO);
        (max as usize).max(1)
    }
}

/// One element of the laid-out document, in render order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocElement {
    Paragraph { text: String, style: TextStyle },
    PageBreak,
    Spacer,
}

/// Classify the report body line by line.
///
/// `# ` starts a level-1 heading, `## ` a level-2 heading, a blank line
/// becomes one spacer, and any other line one plain paragraph. No other
/// markdown construct is recognised.
pub fn body_blocks(body: &str) -> Vec<Block> {
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                Block::Spacer
            } else if let Some(rest) = line.strip_prefix(LEVEL2_PREFIX) {
                Block::Heading2(rest.to_string())
            } else if let Some(rest) = line.strip_prefix(LEVEL1_PREFIX) {
                Block::Heading1(rest.to_string())
            } else {
                Block::Paragraph(line.to_string())
            }
        })
        .collect()
}

/// Build the full element sequence: cover paragraph, forced page break, toc
/// paragraph, forced page break, then the classified body blocks.
pub fn document_elements(cover: &str, toc: &str, blocks: &[Block]) -> Vec<DocElement> {
    let mut elements = Vec::with_capacity(blocks.len() + 4);
    elements.push(DocElement::Paragraph {
        text: cover.to_string(),
        style: TextStyle::Body,
    });
    elements.push(DocElement::PageBreak);
    elements.push(DocElement::Paragraph {
        text: toc.to_string(),
        style: TextStyle::Body,
    });
    elements.push(DocElement::PageBreak);

    for block in blocks {
        elements.push(match block {
            Block::Heading1(text) => DocElement::Paragraph {
                text: text.clone(),
                style: TextStyle::Heading1,
            },
            Block::Heading2(text) => DocElement::Paragraph {
                text: text.clone(),
                style: TextStyle::Heading2,
            },
            Block::Paragraph(text) => DocElement::Paragraph {
                text: text.clone(),
                style: TextStyle::Body,
            },
            Block::Spacer => DocElement::Spacer,
        });
    }

    elements
}

/// Render the assembled report to PDF bytes.
pub fn render_report(cover: &str, toc: &str, body: &str) -> Result<Vec<u8>, RenderError> {
    let blocks = body_blocks(body);
    let elements = document_elements(cover, toc, &blocks);
    render_elements(&elements)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn for_style(&self, style: TextStyle) -> &IndirectFontRef {
        if style.is_bold() {
            &self.bold
        } else {
            &self.regular
        }
    }
}

struct PageCursor {
    layer: PdfLayerReference,
    /// Baseline position of the next line, measured from the bottom edge.
    y_mm: f32,
}

impl PageCursor {
    fn fresh(doc: &PdfDocumentReference) -> Self {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        Self {
            layer: doc.get_page(page).get_layer(layer),
            y_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn advance(&mut self, doc: &PdfDocumentReference, step_mm: f32) {
        self.y_mm -= step_mm;
        if self.y_mm < MARGIN_MM {
            *self = Self::fresh(doc);
            self.y_mm -= step_mm;
        }
    }

    fn write_line(
        &mut self,
        doc: &PdfDocumentReference,
        text: &str,
        style: TextStyle,
        fonts: &Fonts,
    ) {
        self.advance(doc, style.line_height_mm());
        self.layer.use_text(
            text.to_string(),
            style.font_size(),
            Mm(MARGIN_MM),
            Mm(self.y_mm),
            fonts.for_style(style),
        );
    }
}

fn render_elements(elements: &[DocElement]) -> Result<Vec<u8>, RenderError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        "Psychological Assessment Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
    };

    let mut cursor = PageCursor {
        layer: doc.get_page(first_page).get_layer(first_layer),
        y_mm: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    for element in elements {
        match element {
            DocElement::Paragraph { text, style } => {
                cursor.advance(&doc, style.space_before_mm());
                for source_line in text.lines() {
                    if source_line.trim().is_empty() {
                        cursor.advance(&doc, style.line_height_mm() * 0.5);
                        continue;
                    }
                    for wrapped in wrap_line(source_line, style.max_chars_per_line()) {
                        cursor.write_line(&doc, &wrapped, *style, &fonts);
                    }
                }
            }
            DocElement::PageBreak => {
                cursor = PageCursor::fresh(&doc);
            }
            DocElement::Spacer => {
                cursor.advance(&doc, SPACER_MM);
            }
        }
    }

    Ok(doc.save_to_bytes()?)
}

/// Greedy word wrap. Words longer than the budget are hard-split so a single
/// token can never overflow the usable width.
fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    debug_assert!(max_chars > 0);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for word in line.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars) {
                lines.push(chunk.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn heading_markers_classify_lines() {
        let body = "# Heading\n## Subheading\nplain text\n\n#not a heading\n ";
        let blocks = body_blocks(body);
        assert_eq!(
            blocks,
            vec![
                Block::Heading1("Heading".to_string()),
                Block::Heading2("Subheading".to_string()),
                Block::Paragraph("plain text".to_string()),
                Block::Spacer,
                Block::Paragraph("#not a heading".to_string()),
                Block::Spacer,
            ]
        );
    }

    #[test]
    fn raw_angle_brackets_stay_literal_paragraphs() {
        let blocks = body_blocks("score was < 10 & rising");
        assert_eq!(
            blocks,
            vec![Block::Paragraph("score was < 10 & rising".to_string())]
        );
    }

    #[test]
    fn cover_and_toc_are_followed_by_page_breaks() {
        let blocks = body_blocks("# Section\nbody text");
        let elements = document_elements("cover text", "toc text", &blocks);

        assert!(matches!(
            elements[0],
            DocElement::Paragraph { ref text, style: TextStyle::Body } if text == "cover text"
        ));
        assert_eq!(elements[1], DocElement::PageBreak);
        assert!(matches!(
            elements[2],
            DocElement::Paragraph { ref text, style: TextStyle::Body } if text == "toc text"
        ));
        assert_eq!(elements[3], DocElement::PageBreak);
        assert!(matches!(
            elements[4],
            DocElement::Paragraph { style: TextStyle::Heading1, .. }
        ));
    }

    #[test]
    fn render_produces_pdf_bytes_for_hostile_input() {
        let body = "# Heading\n<tag> & unclosed <\nplain";
        let bytes = render_report("cover", "toc", body).expect("render must tolerate raw markup");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn wrap_splits_oversized_words() {
        let lines = wrap_line(&"x".repeat(25), 10);
        assert_eq!(lines, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn wrap_keeps_short_lines_intact() {
        assert_eq!(wrap_line("short line", 80), vec!["short line".to_string()]);
    }

    proptest! {
        #[test]
        fn wrapped_lines_respect_budget(words in proptest::collection::vec("[a-z]{1,12}", 0..40)) {
            let line = words.join(" ");
            for wrapped in wrap_line(&line, 20) {
                prop_assert!(wrapped.chars().count() <= 20);
            }
        }

        #[test]
        fn wrapping_preserves_words(words in proptest::collection::vec("[a-z]{1,12}", 1..40)) {
            let line = words.join(" ");
            let rejoined = wrap_line(&line, 20).join(" ");
            prop_assert_eq!(rejoined.split_whitespace().count(), words.len());
        }
    }
}
