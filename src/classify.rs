use crate::model::Category;
use regex::Regex;
use std::sync::LazyLock;

/// Keyword rules in priority order; the first rule with a hit wins.
const RULES: [(Category, &[&str]); 5] = [
    (
        Category::Exercise,
        &["gym", "run", "yoga", "workout", "walk", "lift"],
    ),
    (Category::Class, &["class", "study", "lecture", "exam"]),
    (
        Category::Work,
        &["meeting", "work", "deadline", "interview", "shift"],
    ),
    (
        Category::Social,
        &["party", "dinner", "hangout", "brunch", "lunch"],
    ),
    (
        Category::Personal,
        &["doctor", "errand", "call", "appointment"],
    ),
];

/// Three or four letters, an optional whitespace character, then three to
/// five digits, e.g. `MATH 221` or `PHYS2210`.
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]{3,4}\s?\d{3,5}").expect("Invalid regex"));

/// Picks a category for a free-text title, falling back to `Personal`.
pub fn categorize(title: &str) -> Category {
    let lower = title.to_lowercase();
    for (category, keywords) in RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category;
        }
        if category == Category::Class && has_course_code(title) {
            return Category::Class;
        }
    }
    Category::Personal
}

fn has_course_code(title: &str) -> bool {
    COURSE_CODE.is_match(title)
}
