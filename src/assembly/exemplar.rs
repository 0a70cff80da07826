use crate::types::{FieldNames, GroundTruthLabel};

/// One retrieved document as it enters an exemplar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExemplarDoc<'a> {
    pub text: &'a str,
    /// `None` suppresses the ground-truth block, rating included.
    pub ground_truth: Option<&'a str>,
    pub rating: Option<&'a str>,
}

/// Render `doc` under the dataset's field labels:
///
/// ```text
/// Label:
/// text
/// Ground_truth_label:
/// ground truth
/// Rating_label:
/// rating
/// ```
///
/// Lines after the first block appear only when the dataset defines the
/// label and the document carries the value.
pub fn format_exemplar(fields: &FieldNames, doc: ExemplarDoc<'_>) -> String {
    let mut out = format!("{}:\n{}", capitalize(&fields.prompt), doc.text);

    let Some(gt) = doc.ground_truth else {
        return out;
    };

    match &fields.ground_truth {
        GroundTruthLabel::None => {}
        GroundTruthLabel::Text { name } => {
            out.push_str(&format!("\n{}:\n{}", capitalize(name), gt));
        }
        GroundTruthLabel::TextWithRating { name, rating } => {
            out.push_str(&format!("\n{}:\n{}", capitalize(name), gt));
            if let Some(value) = doc.rating {
                out.push_str(&format!("\n{}:\n{}", capitalize(rating), value));
            }
        }
    }

    out
}

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
