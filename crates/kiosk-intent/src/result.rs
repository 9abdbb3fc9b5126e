//! Classification result model.

use crate::error::IntentError;
use kiosk_core::{fold, Grade, ScreenKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a classifier made of one transcript. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Option<String>,
    /// Grade tag, "9" to "12".
    pub grade: Option<String>,
    pub confidence: Option<f32>,
}

impl IntentResult {
    pub fn not_understood() -> Self {
        Self::default()
    }

    pub fn intent(tag: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: Some(tag.into()),
            grade: None,
            confidence: Some(confidence),
        }
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade.to_string());
        self
    }

    /// Parse a service payload leniently: the object may sit at the top level or under
    /// `result`/`data`; `grade` and `confidence` may be numbers or strings; unknown fields
    /// are ignored.
    pub fn from_value(value: &Value) -> Result<Self, IntentError> {
        let object = ["result", "data"]
            .iter()
            .find_map(|key| value.get(key).filter(|v| v.is_object()))
            .unwrap_or(value);
        let Some(map) = object.as_object() else {
            return Err(IntentError::Malformed(format!("expected an object, got {value}")));
        };

        let intent = map
            .get("intent")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let grade = map.get("grade").and_then(|g| match g {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => n.as_u64().map(|n| n.to_string()),
            _ => None,
        });
        let confidence = map.get("confidence").and_then(|c| match c {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        });

        Ok(Self {
            intent,
            grade,
            confidence,
        })
    }

    pub fn menu_intent(&self) -> Option<MenuIntent> {
        self.intent.as_deref().and_then(MenuIntent::from_tag)
    }

    /// The grade, accepting tags like "9", "9. sınıf" or "dokuz".
    pub fn grade(&self) -> Option<Grade> {
        let tag = self.grade.as_deref()?;
        Grade::parse_tag(tag).or_else(|| crate::keyword::grade_from_text(tag))
    }

    /// Carries an intent or a grade.
    pub fn is_empty(&self) -> bool {
        self.intent.is_none() && self.grade.is_none()
    }

    /// Non-empty and at or above `min_confidence` (a missing confidence counts as sure).
    pub fn is_usable(&self, min_confidence: f32) -> bool {
        !self.is_empty() && self.confidence.map_or(true, |c| c >= min_confidence)
    }
}

/// Menu choices the controller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuIntent {
    Attendance,
    Registration,
    GradeSelection,
    DirectStaff,
}

impl MenuIntent {
    pub const ALL: [MenuIntent; 4] = [
        MenuIntent::Attendance,
        MenuIntent::Registration,
        MenuIntent::GradeSelection,
        MenuIntent::DirectStaff,
    ];

    /// Map a classifier tag (English or Turkish, any casing) to a menu choice.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match fold(tag).as_str() {
            "attendance" | "absence" | "devamsizlik" | "yoklama" => Some(MenuIntent::Attendance),
            "registration" | "register" | "enrollment" | "kayit" => Some(MenuIntent::Registration),
            "grade" | "grade selection" | "teacher" | "sinif" | "ogretmen" => {
                Some(MenuIntent::GradeSelection)
            }
            "staff" | "direct staff" | "principal" | "mudur" | "yonetim" => {
                Some(MenuIntent::DirectStaff)
            }
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MenuIntent::Attendance => "attendance",
            MenuIntent::Registration => "registration",
            MenuIntent::GradeSelection => "grade_selection",
            MenuIntent::DirectStaff => "direct_staff",
        }
    }

    /// Screen the menu moves to for this choice.
    pub fn target(self) -> ScreenKind {
        match self {
            MenuIntent::Attendance => ScreenKind::AttendanceLookup,
            MenuIntent::Registration => ScreenKind::RegistrationContract,
            MenuIntent::GradeSelection => ScreenKind::GradeSelection,
            MenuIntent::DirectStaff => ScreenKind::DirectStaffDirection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_payloads() {
        let r = IntentResult::from_value(&json!({
            "intent": "attendance", "grade": 10, "confidence": "0.8", "extra": true
        }))
        .unwrap();
        assert_eq!(r.menu_intent(), Some(MenuIntent::Attendance));
        assert_eq!(r.grade(), Grade::new(10));
        assert_eq!(r.confidence, Some(0.8));

        let nested = IntentResult::from_value(&json!({"result": {"grade": "9. sınıf"}})).unwrap();
        assert_eq!(nested.grade(), Grade::new(9));
        assert_eq!(nested.intent, None);

        let empty = IntentResult::from_value(&json!({"intent": "  ", "grade": null})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(matches!(
            IntentResult::from_value(&json!(["attendance"])),
            Err(IntentError::Malformed(_))
        ));
    }

    #[test]
    fn confidence_threshold() {
        assert!(IntentResult::intent("kayit", 0.4).is_usable(0.4));
        assert!(!IntentResult::intent("kayit", 0.39).is_usable(0.4));
        let unsure = IntentResult {
            intent: Some("kayit".into()),
            ..Default::default()
        };
        assert!(unsure.is_usable(0.4));
        assert!(!IntentResult::not_understood().is_usable(0.0));
    }

    #[test]
    fn tags_map_to_targets() {
        assert_eq!(MenuIntent::from_tag("Devamsızlık"), Some(MenuIntent::Attendance));
        assert_eq!(MenuIntent::from_tag("direct_staff"), Some(MenuIntent::DirectStaff));
        assert_eq!(MenuIntent::from_tag("weather"), None);
        for intent in MenuIntent::ALL {
            assert_eq!(MenuIntent::from_tag(intent.tag()), Some(intent));
            assert!(ScreenKind::Menu.can_transition_to(intent.target()));
        }
    }
}
