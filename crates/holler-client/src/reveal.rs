//! The streaming-reveal animation, reduced to its pure core: a lazy,
//! restartable sequence of growing prefixes of a finite string. The timer
//! driving it (one item per tick) lives with the UI, not here.

/// Yield prefixes of `text` growing by `step` characters, always ending on
/// a char boundary, with the full text as the final item. A `step` of 0 is
/// treated as 1. Calling again restarts the sequence from the beginning.
pub fn reveal_steps(text: &str, step: usize) -> impl Iterator<Item = &str> {
    let step = step.max(1);
    let mut ends: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .skip(step)
        .step_by(step)
        .collect();
    ends.push(text.len());
    ends.into_iter().map(move |end| &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_grow_by_step() {
        let steps: Vec<&str> = reveal_steps("abcdef", 2).collect();
        assert_eq!(steps, vec!["ab", "abcd", "abcdef"]);
    }

    #[test]
    fn test_final_item_is_always_full_text() {
        let steps: Vec<&str> = reveal_steps("abcde", 2).collect();
        assert_eq!(steps.last(), Some(&"abcde"));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let steps: Vec<&str> = reveal_steps("héllo ✓", 3).collect();
        assert_eq!(steps, vec!["hél", "héllo ", "héllo ✓"]);
    }

    #[test]
    fn test_restartable() {
        let text = "restart me";
        let first: Vec<&str> = reveal_steps(text, 4).collect();
        let second: Vec<&str> = reveal_steps(text, 4).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_step_is_clamped() {
        let steps: Vec<&str> = reveal_steps("ab", 0).collect();
        assert_eq!(steps, vec!["a", "ab"]);
    }

    #[test]
    fn test_empty_text() {
        let steps: Vec<&str> = reveal_steps("", 2).collect();
        assert_eq!(steps, vec![""]);
    }

    #[test]
    fn test_text_shorter_than_step() {
        let steps: Vec<&str> = reveal_steps("hi", 5).collect();
        assert_eq!(steps, vec!["hi"]);
    }
}
