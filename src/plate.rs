/// Longest recognized text kept after whitespace removal; the rest is dropped.
const MAX_PLATE_CHARS: usize = 13;

const COUNTRY_TAG: &str = "RUS";

/// Turns raw OCR text into a canonical plate string such as "A 123 45 RUS".
///
/// Total over every input: short or empty text just produces empty segments.
pub fn format_plate(raw_text: &str) -> String {
    let cleaned: String = raw_text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(MAX_PLATE_CHARS)
        .collect();

    if cleaned.contains(COUNTRY_TAG) {
        let without_tag = cleaned.replace(COUNTRY_TAG, "");
        format!("{} {}", slice_segments(&without_tag), COUNTRY_TAG)
    } else {
        slice_segments(&cleaned)
    }
}

// Offsets 0..1, 1..4, 4..6 and 7.. ; the character at 6 is dropped.
fn slice_segments(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let segment = |start: usize, end: usize| -> String {
        let end = end.min(chars.len());
        let start = start.min(end);
        chars[start..end].iter().collect()
    };
    format!(
        "{} {} {} {}",
        segment(0, 1),
        segment(1, 4),
        segment(4, 6),
        segment(7, chars.len())
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_formats_to_empty() {
        assert_eq!(format_plate(""), "");
        assert_eq!(format_plate("   \t "), "");
    }

    #[test]
    fn country_tag_is_moved_to_the_end() {
        assert_eq!(format_plate("A12345RUS"), "A 123 45 RUS");
    }

    #[test]
    fn noisy_lowercase_text_is_normalized() {
        // "A123BC45" keeps its last character at offset 7.
        assert_eq!(format_plate("a 123bc45rus"), "A 123 BC 5 RUS");
    }

    #[test]
    fn character_at_offset_six_is_dropped() {
        assert_eq!(format_plate("A123BC7890"), "A 123 BC 890");
    }

    #[test]
    fn text_is_truncated_before_tag_detection() {
        // The tag starts at offset 12, so only "R" survives truncation.
        assert_eq!(format_plate("A123BC45XXXXRUS"), "A 123 BC 5XXXXR");
    }

    #[test]
    fn every_occurrence_of_the_tag_is_removed() {
        assert_eq!(format_plate("RUSA12345RUS"), "A 123 45 RUS");
    }

    #[test]
    fn short_inputs_never_fail() {
        let samples = ["a", "ab", "abc", "abcd", "abcde", "abcdef", "abcdefg", "abcdefghijkl"];
        for sample in samples.iter() {
            let formatted = format_plate(sample);
            assert_eq!(formatted, formatted.trim());
        }
        assert_eq!(format_plate("ab"), "A B");
        assert_eq!(format_plate("abcde"), "A BCD E");
        assert_eq!(format_plate("abcdefg"), "A BCD EF");
    }

    #[test]
    fn tag_only_input_keeps_the_suffix() {
        assert_eq!(format_plate("rus"), " RUS");
    }

    #[test]
    fn non_ascii_text_is_sliced_by_character() {
        assert_eq!(format_plate("а123вс77"), "А 123 ВС 7");
    }
}
