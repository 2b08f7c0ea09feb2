//! Joins translated chunks back into one text.

use crate::caller::TranslationOutcome;
use crate::error::{ChunkFailure, TranslateError};
use crate::request::JoinPolicy;
use crate::segment::BoundaryKind;

/// Rebuild a single text from its chunk outcomes.
///
/// All-or-nothing: if any outcome failed, the result is
/// [`TranslateError::TranslationFailed`] listing every failed chunk and no
/// partial text is returned. Outcomes are joined in chunk index order.
///
/// With `preserve_format` each chunk's recorded separator is replayed
/// verbatim. Otherwise paragraph breaks follow `join_policy`, sentence and
/// word boundaries become one space, and pieces of a hard-cut word are glued
/// back without a gap.
pub fn reassemble(
    mut outcomes: Vec<TranslationOutcome>,
    preserve_format: bool,
    join_policy: JoinPolicy,
) -> Result<String, TranslateError> {
    outcomes.sort_by_key(|o| o.chunk.index);

    let failures: Vec<ChunkFailure> = outcomes
        .iter()
        .filter_map(|o| {
            o.error.as_ref().map(|error| ChunkFailure {
                index: o.chunk.index,
                error: error.clone(),
            })
        })
        .collect();
    if !failures.is_empty() {
        return Err(TranslateError::TranslationFailed { failures });
    }

    let last = outcomes.len().saturating_sub(1);
    let mut text = String::new();
    for (position, outcome) in outcomes.iter().enumerate() {
        // Success without text cannot happen, but an empty piece is the safe reading.
        text.push_str(outcome.translated.as_deref().unwrap_or_default());

        if preserve_format {
            text.push_str(&outcome.chunk.separator);
        } else if position < last {
            text.push_str(joiner(outcome.chunk.boundary, join_policy));
        }
    }

    Ok(text)
}

fn joiner(boundary: BoundaryKind, join_policy: JoinPolicy) -> &'static str {
    match (boundary, join_policy) {
        (BoundaryKind::Paragraph, JoinPolicy::Newline) => "\n",
        (BoundaryKind::Paragraph, JoinPolicy::Space)
        | (BoundaryKind::Sentence, _)
        | (BoundaryKind::Word, _) => " ",
        (BoundaryKind::Hard, _) => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::segment::{segment, Chunk};

    fn identity(chunks: Vec<Chunk>) -> Vec<TranslationOutcome> {
        chunks
            .into_iter()
            .map(|chunk| TranslationOutcome {
                translated: Some(chunk.text.clone()),
                chunk,
                error: None,
                attempts: 1,
            })
            .collect()
    }

    #[test]
    fn test_concrete_scenario_round_trips() {
        let input = "Hello.\n\nHow are you?";
        let outcomes = identity(segment(input, 10, true));
        assert_eq!(outcomes.len(), 3);
        assert_eq!(reassemble(outcomes, true, JoinPolicy::Space).unwrap(), input);
    }

    #[test]
    fn test_out_of_order_outcomes_are_reordered() {
        let input = "one two three four";
        let mut outcomes = identity(segment(input, 4, true));
        outcomes.reverse();
        assert_eq!(reassemble(outcomes, true, JoinPolicy::Space).unwrap(), input);
    }

    #[test]
    fn test_without_format_joins_with_single_space() {
        let input = "First para.\n\n\nSecond   para here.";
        let outcomes = identity(segment(input, 12, false));
        assert_eq!(
            reassemble(outcomes, false, JoinPolicy::Space).unwrap(),
            "First para. Second para here."
        );
    }

    #[test]
    fn test_newline_policy_keeps_paragraphs() {
        let input = "First para.\n\nSecond para.";
        let outcomes = identity(segment(input, 12, false));
        assert_eq!(
            reassemble(outcomes, false, JoinPolicy::Newline).unwrap(),
            "First para.\nSecond para."
        );
    }

    #[test]
    fn test_hard_cut_pieces_are_glued_back() {
        let outcomes = identity(segment("abcdefghij", 4, false));
        assert_eq!(
            reassemble(outcomes, false, JoinPolicy::Space).unwrap(),
            "abcdefghij"
        );
    }

    #[test]
    fn test_any_failure_fails_the_text() {
        let mut outcomes = identity(segment("one two three", 4, true));
        outcomes[1].translated = None;
        outcomes[1].error = Some(TranslateError::PermanentFailure(ProviderError::http(
            400, "bad",
        )));

        let err = reassemble(outcomes, true, JoinPolicy::Space).unwrap_err();
        assert_eq!(err.failed_indices(), vec![1]);
    }

    #[test]
    fn test_no_outcomes_is_empty_text() {
        assert_eq!(reassemble(Vec::new(), true, JoinPolicy::Space).unwrap(), "");
    }
}
