use crate::error::SelectionError;

use super::TestDescriptor;

/// How ordinals without a matching test are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Unknown ordinals are a `SelectionError::UnknownOrdinal`.
    #[default]
    Strict,
    /// Unknown ordinals are dropped silently.
    Lenient,
}

/// Resolves a selection expression (`all`, `1,3`, `2-4`, or a mix) against
/// a scene's tests.
///
/// Ordinals match `TestDescriptor::ordinal`, not the position in `catalog`.
/// The result is de-duplicated and keeps the order in which tests were first
/// named. A descending range such as `4-2` contributes nothing.
///
/// # Errors
///
/// Returns an error for an empty expression, a malformed token, an unknown
/// ordinal in strict mode, or when nothing was selected.
pub fn parse_selection(
    expression: &str,
    catalog: &[TestDescriptor],
    mode: SelectionMode,
) -> Result<Vec<TestDescriptor>, SelectionError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(SelectionError::EmptyExpression);
    }

    if trimmed.eq_ignore_ascii_case("all") {
        if catalog.is_empty() {
            return Err(SelectionError::EmptySelection {
                expression: trimmed.to_owned(),
            });
        }
        return Ok(catalog.to_vec());
    }

    let mut selected: Vec<TestDescriptor> = Vec::new();
    for token in trimmed.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let (start, end) = parse_token(token)?;
        if start > end {
            continue;
        }

        let mut matched: Vec<&TestDescriptor> = catalog
            .iter()
            .filter(|test| test.ordinal >= start && test.ordinal <= end)
            .collect();
        matched.sort_by_key(|test| test.ordinal);

        if mode == SelectionMode::Strict
            && let Some(missing) = first_missing_ordinal(start, end, &matched)
        {
            return Err(SelectionError::UnknownOrdinal {
                expression: trimmed.to_owned(),
                ordinal: missing,
            });
        }

        for test in matched {
            if !selected
                .iter()
                .any(|existing| existing.identifier == test.identifier)
            {
                selected.push(test.clone());
            }
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::EmptySelection {
            expression: trimmed.to_owned(),
        });
    }

    Ok(selected)
}

fn parse_token(token: &str) -> Result<(u32, u32), SelectionError> {
    let invalid = || SelectionError::InvalidToken {
        token: token.to_owned(),
    };
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse::<u32>().ok().ok_or_else(invalid)?;
            let end = end.trim().parse::<u32>().ok().ok_or_else(invalid)?;
            Ok((start, end))
        }
        None => {
            let ordinal = token.parse::<u32>().ok().ok_or_else(invalid)?;
            Ok((ordinal, ordinal))
        }
    }
}

/// `matched` is sorted by ordinal and only holds ordinals within the range.
fn first_missing_ordinal(start: u32, end: u32, matched: &[&TestDescriptor]) -> Option<u32> {
    let mut expected = start;
    for test in matched {
        if test.ordinal > expected {
            return Some(expected);
        }
        if test.ordinal == expected {
            if expected == end {
                return None;
            }
            expected = expected.saturating_add(1);
        }
    }
    Some(expected)
}
