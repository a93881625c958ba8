//! Character classes and unit splitting.
//!
//! A *unit* is the atom the segmenter and the lexicon work on: every CJK
//! ideograph is its own unit, any other run of non-whitespace characters is
//! one unit, and whitespace only separates.

/// Class of a single character, decided purely by code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Control,
    Splitter,
    Symbol,
    Digit,
    Upper,
    Lower,
    Cjk,
    Other,
}

/// Classify a character. Ranges are inclusive code points; the CJK range
/// covers Extension A through the end of the basic block (U+3400..=U+9FD5).
pub fn classify(ch: char) -> CharClass {
    match ch as u32 {
        0..=8 | 14..=31 | 127 => CharClass::Control,
        9..=13 | 32 => CharClass::Splitter,
        33..=47 | 58..=64 | 91..=96 | 123..=126 => CharClass::Symbol,
        48..=57 => CharClass::Digit,
        65..=90 => CharClass::Upper,
        97..=122 => CharClass::Lower,
        13312..=40917 => CharClass::Cjk,
        _ => CharClass::Other,
    }
}

pub fn is_cjk(ch: char) -> bool {
    classify(ch) == CharClass::Cjk
}

/// Same test on a raw UTF-16 code unit, for the binary lexicon keys.
pub fn is_cjk_unit(unit: u16) -> bool {
    (13312..=40917).contains(&unit)
}

/// Split text into units.
///
/// # Example
/// ```
/// use libchat_core::units::split_units;
///
/// assert_eq!(split_units("我有3个apple pie"), vec!["我", "有", "3", "个", "apple", "pie"]);
/// ```
pub fn split_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut run = String::new();
    for ch in text.chars() {
        match classify(ch) {
            CharClass::Cjk => {
                if !run.is_empty() {
                    units.push(std::mem::take(&mut run));
                }
                units.push(ch.to_string());
            }
            CharClass::Splitter => {
                if !run.is_empty() {
                    units.push(std::mem::take(&mut run));
                }
            }
            _ => run.push(ch),
        }
    }
    if !run.is_empty() {
        units.push(run);
    }
    units
}

/// Join `units` back into surface text. CJK units attach directly to their
/// neighbours; adjacent non-CJK units are separated by one space.
///
/// # Example
/// ```
/// use libchat_core::units::join_units;
///
/// let units = ["hello", "world", "你", "好", "ok"];
/// assert_eq!(join_units(&units), "hello world你好ok");
/// ```
pub fn join_units<S: AsRef<str>>(units: &[S]) -> String {
    let mut out = String::new();
    let mut spaced = false;
    for unit in units {
        let unit = unit.as_ref();
        let cjk = unit.chars().next().map(is_cjk).unwrap_or(false);
        if cjk {
            if spaced {
                out.pop();
            }
            out.push_str(unit);
            spaced = false;
        } else {
            out.push_str(unit);
            out.push(' ');
            spaced = true;
        }
    }
    if spaced {
        out.pop();
    }
    out
}

/// True when every character is an ASCII digit. The empty word counts as
/// numeric.
pub fn is_numeric(word: &str) -> bool {
    word.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_code_point_ranges() {
        assert_eq!(classify('\u{0}'), CharClass::Control);
        assert_eq!(classify('\u{7f}'), CharClass::Control);
        assert_eq!(classify('\t'), CharClass::Splitter);
        assert_eq!(classify('\n'), CharClass::Splitter);
        assert_eq!(classify(' '), CharClass::Splitter);
        assert_eq!(classify('!'), CharClass::Symbol);
        assert_eq!(classify('{'), CharClass::Symbol);
        assert_eq!(classify('7'), CharClass::Digit);
        assert_eq!(classify('Q'), CharClass::Upper);
        assert_eq!(classify('q'), CharClass::Lower);
        assert_eq!(classify('中'), CharClass::Cjk);
        assert_eq!(classify('㐀'), CharClass::Cjk);
        assert_eq!(classify('，'), CharClass::Other);
        assert_eq!(classify('é'), CharClass::Other);
    }

    #[test]
    fn split_drops_whitespace_and_isolates_cjk() {
        assert_eq!(split_units("  你好 "), vec!["你", "好"]);
        assert_eq!(split_units("a1,b c"), vec!["a1,b", "c"]);
        assert!(split_units(" \t\n").is_empty());
    }

    #[test]
    fn join_is_inverse_of_split_for_mixed_text() {
        let text = "iPhone 15很贵";
        assert_eq!(join_units(&split_units(text)), text);
        assert_eq!(join_units(&["a"]), "a");
        assert_eq!(join_units::<&str>(&[]), "");
    }

    #[test]
    fn numeric_words() {
        assert!(is_numeric("2024"));
        assert!(is_numeric(""));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric("一"));
    }
}
