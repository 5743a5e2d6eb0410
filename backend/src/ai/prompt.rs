//! Prompt construction and answer parsing for VOC type inference.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker the model is asked to put in front of its answer.
pub const ANSWER_MARKER: &str = "VOC 유형:";

/// Build the classification prompt for one complaint.
///
/// # Example
/// ```
/// use vocload::ai::prompt::build_voc_type_prompt;
///
/// let prompt = build_voc_type_prompt("printer jammed", "", &["H/W".into(), "S/W".into()]);
/// assert!(prompt.contains("H/W, S/W"));
/// ```
pub fn build_voc_type_prompt(content: &str, action: &str, valid_types: &[String]) -> String {
    format!(
        "다음은 고객 VOC 내용입니다.\n\
         - 내용: {}\n\
         - 조치계획: {}\n\n\
         VOC 유형은 아래 목록 중에서 가장 적절한 것을 하나만 선택하세요:\n\
         {}\n\
         선택한 VOC 유형과 그 이유를 설명해주세요.\n\n\
         형식:\n\
         {} [여기에 유형]\n\
         이유: [여기에 이유]\n",
        content.trim(),
        action.trim(),
        valid_types.join(", "),
        ANSWER_MARKER
    )
}

// "VOC 유형: [label]" with optional spacing, full-width colon and brackets.
static ANSWER_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\**\s*VOC\s*유형\s*\**\s*[:：]\s*\[?([^\]\n]*?)\]?\s*$").ok());

/// Pick the predicted label out of a model answer.
///
/// The marked answer line wins when it names a valid label. Otherwise the
/// longest valid label contained anywhere in the text is used, so that a
/// label which is a prefix of another never shadows it.
pub fn pick_label(answer: &str, valid_types: &[String]) -> Option<String> {
    let marked = ANSWER_LINE.as_ref().and_then(|re| {
        re.captures_iter(answer)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find_map(|candidate| valid_types.iter().find(|t| t.as_str() == candidate))
    });

    if let Some(label) = marked {
        return Some(label.clone());
    }

    valid_types
        .iter()
        .filter(|t| !t.is_empty() && answer.contains(t.as_str()))
        .max_by_key(|t| t.chars().count())
        .cloned()
}

/// Rough token estimate used for quota accounting.
pub fn estimate_tokens(prompt: &str) -> u64 {
    (prompt.chars().count() / 2) as u64
}
