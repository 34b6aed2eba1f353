/// Category labels and the note keywords that suggest them, in the order
/// suggestions are reported. Keywords are lowercase whole words.
pub const CATEGORY_KEYWORDS: [(&str, &[&str]); 7] = [
    (
        "Food & Dining",
        &[
            "coffee",
            "starbucks",
            "kfc",
            "mcdonald",
            "7-eleven",
            "restaurant",
            "rice",
            "food",
        ],
    ),
    (
        "Transportation",
        &[
            "grab", "taxi", "bts", "mrt", "train", "fuel", "shell", "uber", "transport",
        ],
    ),
    (
        "Shopping",
        &[
            "clothes", "shoes", "bag", "shopping", "mall", "robinson", "shopee", "lazada",
        ],
    ),
    (
        "Entertainment",
        &[
            "movie",
            "concert",
            "netflix",
            "spotify",
            "cinema",
            "game",
            "entertainment",
        ],
    ),
    (
        "Health",
        &[
            "hospital", "clinic", "pharmacy", "medicine", "vitamin", "fitness",
        ],
    ),
    (
        "Education",
        &[
            "book",
            "course",
            "udemy",
            "school",
            "university",
            "education",
        ],
    ),
    (
        "Bills & Utilities",
        &[
            "electric",
            "electricity",
            "water",
            "internet",
            "phone bill",
            "bill",
        ],
    ),
];

/// Every label with at least one keyword appearing as a word in `note`,
/// compared case-insensitively. Labels are not exclusive.
pub fn suggest_categories(note: &str) -> Vec<&'static str> {
    let note = note.trim().to_lowercase();
    if note.is_empty() {
        return Vec::new();
    }

    CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| contains_word(&note, keyword)))
        .map(|(label, _)| *label)
        .collect()
}

/// `word` bounded by non-alphanumerics on both sides. A trailing `s` or `'s`
/// still counts, so "books" and "mcdonald's" match.
fn contains_word(note: &str, word: &str) -> bool {
    note.match_indices(word).any(|(start, _)| {
        let starts_word = note[..start]
            .chars()
            .next_back()
            .is_none_or(|before| !before.is_alphanumeric());
        let rest = &note[start + word.len()..];
        starts_word
            && (ends_word(rest)
                || ["s", "'s", "\u{2019}s"]
                    .iter()
                    .any(|suffix| rest.strip_prefix(suffix).is_some_and(ends_word)))
    })
}

fn ends_word(rest: &str) -> bool {
    rest.chars().next().is_none_or(|after| !after.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::suggest_categories;

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(suggest_categories("Coffee at STARBUCKS"), vec!["Food & Dining"]);
    }

    #[test]
    fn a_note_can_suggest_several_labels() {
        assert_eq!(
            suggest_categories("grab to the mall"),
            vec!["Transportation", "Shopping"]
        );
    }

    #[test]
    fn keywords_inside_longer_words_do_not_match() {
        assert!(suggest_categories("price check").is_empty());
        assert!(suggest_categories("baguette").is_empty());
        assert_eq!(suggest_categories("training course"), vec!["Education"]);
        assert!(suggest_categories("waterproof").is_empty());
    }

    #[test]
    fn plurals_and_possessives_still_match() {
        assert_eq!(suggest_categories("McDonald's lunch"), vec!["Food & Dining"]);
        assert_eq!(suggest_categories("two movies"), vec!["Entertainment"]);
        assert_eq!(suggest_categories("rice, 7-eleven"), vec!["Food & Dining"]);
        assert_eq!(suggest_categories("electricity"), vec!["Bills & Utilities"]);
    }

    #[test]
    fn empty_or_unmatched_notes_suggest_nothing() {
        assert!(suggest_categories("").is_empty());
        assert!(suggest_categories("   ").is_empty());
        assert!(suggest_categories("zzz").is_empty());
    }
}
