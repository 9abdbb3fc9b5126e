//! Local keyword classifier. Works offline and backs up the HTTP service.

use crate::classifier::IntentClassifier;
use crate::error::IntentError;
use crate::result::{IntentResult, MenuIntent};
use async_trait::async_trait;
use kiosk_core::{fold, Grade};

/// Word stems per menu choice, checked in this order ("rehber öğretmen" is staff, not a grade).
const MENU_STEMS: [(MenuIntent, &[&str]); 4] = [
    (MenuIntent::Attendance, &["devamsiz", "yoklama", "attendance", "absen"]),
    (MenuIntent::Registration, &["kayit", "kaydol", "kaydi", "kaydet", "register", "enrol"]),
    (MenuIntent::DirectStaff, &["mudur", "rehber", "sekreter", "principal", "counsel"]),
    (MenuIntent::GradeSelection, &["sinif", "ogretmen", "grade", "teacher"]),
];

const KEYWORD_CONFIDENCE: f32 = 0.9;

const NO_STEMS: [&str; 6] = ["hayir", "istemiyorum", "etmiyorum", "redd", "vazgec", "iptal"];
const YES_STEMS: [&str; 7] = ["evet", "kabul", "onay", "tamam", "olur", "peki", "yes"];

fn has_stem(words: &[&str], stems: &[&str]) -> bool {
    words
        .iter()
        .any(|word| stems.iter().any(|stem| word.starts_with(stem)))
}

/// Find a grade in free speech: digits ("9", "12."), ordinals and number words
/// ("dokuzuncu", "on bir", "onikinci").
pub fn grade_from_text(text: &str) -> Option<Grade> {
    let folded = fold(text);
    let words: Vec<&str> = folded.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let digits: String = word.chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            if let Some(grade) = digits.parse::<u8>().ok().and_then(Grade::new) {
                return Some(grade);
            }
            continue;
        }
        let number = if word.starts_with("dokuz") {
            9
        } else if word.starts_with("onbir") {
            11
        } else if word.starts_with("onik") {
            12
        } else if *word == "on" || word.starts_with("onuncu") {
            match words.get(i + 1) {
                Some(next) if *word == "on" && next.starts_with("bir") => 11,
                Some(next) if *word == "on" && next.starts_with("iki") => 12,
                _ => 10,
            }
        } else {
            continue;
        };
        return Grade::new(number);
    }
    None
}

/// Yes/no answer, `None` when the text is neither. Refusals win over agreement so
/// "kabul etmiyorum" reads as no.
pub fn affirmation(text: &str) -> Option<bool> {
    let folded = fold(text);
    let words: Vec<&str> = folded.split_whitespace().collect();
    if has_stem(&words, &NO_STEMS) {
        Some(false)
    } else if has_stem(&words, &YES_STEMS) {
        Some(true)
    } else {
        None
    }
}

/// Matches Turkish (and a few English) stems against the folded transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(&self, text: &str) -> IntentResult {
        let folded = fold(text);
        let words: Vec<&str> = folded.split_whitespace().collect();
        let menu = MENU_STEMS
            .iter()
            .find(|(_, stems)| has_stem(&words, stems))
            .map(|(intent, _)| *intent);
        let grade = grade_from_text(text);

        let mut result = match menu {
            Some(intent) => IntentResult::intent(intent.tag(), KEYWORD_CONFIDENCE),
            None if grade.is_some() => IntentResult {
                confidence: Some(KEYWORD_CONFIDENCE),
                ..IntentResult::default()
            },
            None => IntentResult::not_understood(),
        };
        if let Some(grade) = grade {
            result = result.with_grade(grade);
        }
        result
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, text: &str) -> Result<IntentResult, IntentError> {
        Ok(self.classify_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_words() {
        let g = |t: &str| grade_from_text(t).map(Grade::number);
        assert_eq!(g("dokuz"), Some(9));
        assert_eq!(g("Dokuzuncu sınıf"), Some(9));
        assert_eq!(g("on"), Some(10));
        assert_eq!(g("onuncu sınıf lütfen"), Some(10));
        assert_eq!(g("on bir"), Some(11));
        assert_eq!(g("On Birinci"), Some(11));
        assert_eq!(g("onikinci sınıf"), Some(12));
        assert_eq!(g("12. sınıf"), Some(12));
        assert_eq!(g("8. sınıf"), None);
        assert_eq!(g("merhaba"), None);
    }

    #[test]
    fn menu_keywords() {
        let k = KeywordClassifier::new();
        let intent = |t: &str| k.classify_text(t).menu_intent();
        assert_eq!(intent("Devamsızlık sorgulamak istiyorum"), Some(MenuIntent::Attendance));
        assert_eq!(intent("kayıt işlemleri"), Some(MenuIntent::Registration));
        assert_eq!(intent("öğretmenle görüşmek istiyorum"), Some(MenuIntent::GradeSelection));
        assert_eq!(intent("rehber öğretmen"), Some(MenuIntent::DirectStaff));
        assert_eq!(intent("Okul müdürü"), Some(MenuIntent::DirectStaff));
        assert_eq!(intent("hava nasıl"), None);
    }

    #[test]
    fn bare_grade_is_a_result() {
        let r = KeywordClassifier::new().classify_text("dokuz");
        assert_eq!(r.intent, None);
        assert_eq!(r.grade(), Grade::new(9));
        assert!(r.is_usable(0.4));
    }

    #[test]
    fn yes_and_no() {
        assert_eq!(affirmation("Evet, kabul ediyorum"), Some(true));
        assert_eq!(affirmation("Kabul etmiyorum"), Some(false));
        assert_eq!(affirmation("hayır"), Some(false));
        assert_eq!(affirmation("bilmiyorum"), None);
    }
}
