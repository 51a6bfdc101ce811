use lopdf::{dictionary, Document, Object, Stream};

use super::{CertificateDocument, PdfRenderer, RenderError};
use crate::model::CertificateKind;

/// A4 landscape, in points.
const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const COMPETENCIES_WRAP: usize = 95;
const MAX_COMPETENCY_LINES: usize = 6;

/// Renders certificates as a single landscape page using the standard
/// Helvetica fonts with WinAnsi encoding.
#[derive(Debug, Clone, Default)]
pub struct CertificatePdf;

impl CertificatePdf {
    pub fn new() -> Self {
        Self
    }
}

impl PdfRenderer for CertificatePdf {
    fn render(&self, document: &CertificateDocument) -> Result<Vec<u8>, RenderError> {
        let _span = tracing::info_span!("render.certificate_pdf", serial = %document.serial)
            .entered();

        if document.participant_name.trim().is_empty() {
            return Err(RenderError::MissingField("participant_name"));
        }
        if document.serial.is_empty() {
            return Err(RenderError::MissingField("serial"));
        }
        if document.kind.requires_competencies() && document.competencies.is_none() {
            return Err(RenderError::MissingField("competencies"));
        }

        build_pdf(&layout(document))
    }
}

/// One positioned line of text.
struct Line {
    text: String,
    bold: bool,
    size: f32,
    y: f32,
}

fn layout(doc: &CertificateDocument) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut y = PAGE_HEIGHT - 110.0;
    let mut push = |text: String, bold: bool, size: f32, gap: f32| {
        lines.push(Line { text, bold, size, y });
        y -= gap;
    };

    push(doc.kind.title().to_string(), true, 30.0, 55.0);
    push("This certifies that".to_string(), false, 14.0, 40.0);
    push(doc.participant_name.clone(), true, 26.0, 40.0);
    push(achievement(doc.kind).to_string(), false, 14.0, 30.0);
    push(doc.product_name.clone(), true, 18.0, 28.0);
    push(
        format!("with a duration of {} hours", doc.hours),
        false,
        12.0,
        26.0,
    );

    if let Some(competencies) = &doc.competencies {
        for line in wrap(competencies, COMPETENCIES_WRAP)
            .into_iter()
            .take(MAX_COMPETENCY_LINES)
        {
            push(line, false, 10.0, 14.0);
        }
        push(String::new(), false, 10.0, 8.0);
    }

    if !doc.teacher_names.is_empty() {
        push(
            format!("Taught by {}", doc.teacher_names.join(", ")),
            false,
            11.0,
            22.0,
        );
    }
    push(
        format!("Issued on {}", doc.issue_date.format("%Y-%m-%d")),
        false,
        11.0,
        0.0,
    );

    lines.push(Line {
        text: format!("Folio: {}", doc.serial),
        bold: true,
        size: 10.0,
        y: 60.0,
    });
    lines.push(Line {
        text: format!("Verify at {}", doc.verification_url),
        bold: false,
        size: 9.0,
        y: 45.0,
    });
    lines
}

fn achievement(kind: CertificateKind) -> &'static str {
    match kind {
        CertificateKind::Attendance => "has attended",
        CertificateKind::Approval => "has successfully completed",
        CertificateKind::Participation => "has participated in",
        CertificateKind::Competencies => "has completed and demonstrated the competencies of",
    }
}

fn build_pdf(lines: &[Line]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let content = content_stream(lines);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Failed(e.to_string()))?;
    Ok(buffer)
}

fn content_stream(lines: &[Line]) -> String {
    let mut content = String::new();

    // Border
    content.push_str("2 w 30 30 782 535 re S\n");
    content.push_str("0.5 w 40 40 762 515 re S\n");

    for line in lines.iter().filter(|l| !l.text.is_empty()) {
        let font = if line.bold { "F2" } else { "F1" };
        let x = centered_x(&line.text, line.size, line.bold);
        content.push_str("BT\n");
        content.push_str(&format!("/{} {} Tf\n", font, line.size));
        content.push_str(&format!("{:.1} {:.1} Td\n", x, line.y));
        content.push_str(&format!("({}) Tj\n", escape_pdf_string(&line.text)));
        content.push_str("ET\n");
    }

    content
}

/// Approximate centering from the average Helvetica glyph width.
fn centered_x(text: &str, size: f32, bold: bool) -> f32 {
    let avg = if bold { 0.58 } else { 0.52 };
    let width = text.chars().count() as f32 * size * avg;
    ((PAGE_WIDTH - width) / 2.0).max(45.0)
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Escapes a string for a PDF literal. Latin-1 characters are written as
/// octal escapes (WinAnsi matches Latin-1 there); anything else becomes `?`.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_control() => out.push(c),
            c if ('\u{a0}'..='\u{ff}').contains(&c) => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            _ => out.push('?'),
        }
    }
    out
}
