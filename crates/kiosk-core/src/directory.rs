//! Staff directory: which staff member handles which grade, and who can be asked for by name.

use crate::screen::Grade;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A staff member the kiosk can direct visitors to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub title: String,
    /// Where to find them (e.g. "2. kat, 204 numaralı oda").
    pub office: String,
    /// Spoken forms that should select this member (folded, see [`fold`]).
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl StaffMember {
    pub fn new(name: &str, title: &str, office: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            office: office.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Grade → responsible staff, plus everyone reachable directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffDirectory {
    /// Keyed by grade number as a string ("9".."12") so TOML tables stay readable.
    pub by_grade: BTreeMap<String, StaffMember>,
    pub members: Vec<StaffMember>,
}

impl Default for StaffDirectory {
    fn default() -> Self {
        let mut by_grade = BTreeMap::new();
        by_grade.insert(
            "9".to_string(),
            StaffMember::new("Ayşe Yılmaz", "Müdür Yardımcısı", "zemin kat, 104 numaralı oda", &[]),
        );
        by_grade.insert(
            "10".to_string(),
            StaffMember::new("Mehmet Demir", "Müdür Yardımcısı", "birinci kat, 112 numaralı oda", &[]),
        );
        by_grade.insert(
            "11".to_string(),
            StaffMember::new("Zeynep Kaya", "Müdür Yardımcısı", "birinci kat, 118 numaralı oda", &[]),
        );
        by_grade.insert(
            "12".to_string(),
            StaffMember::new("Ali Çelik", "Müdür Yardımcısı", "ikinci kat, 204 numaralı oda", &[]),
        );
        let members = vec![
            StaffMember::new("Hasan Öztürk", "Okul Müdürü", "zemin kat, müdürlük", &["mudur", "okul muduru"]),
            StaffMember::new("Elif Arslan", "Rehber Öğretmen", "zemin kat, rehberlik servisi", &["rehber", "rehberlik", "psikolojik danisman"]),
            StaffMember::new("Fatma Şahin", "Okul Sekreteri", "zemin kat, idari ofis", &["sekreter", "idari"]),
        ];
        Self { by_grade, members }
    }
}

impl StaffDirectory {
    pub fn for_grade(&self, grade: Grade) -> Option<&StaffMember> {
        self.by_grade.get(&grade.number().to_string())
    }

    /// First directly reachable member whose name or alias occurs in the transcript.
    pub fn match_transcript(&self, transcript: &str) -> Option<&StaffMember> {
        let folded = fold(transcript);
        // Longest alias wins so "okul muduru" beats "mudur yardimcisi" style overlaps.
        self.members
            .iter()
            .flat_map(|m| {
                std::iter::once(fold(&m.name))
                    .chain(m.aliases.iter().map(|a| fold(a)))
                    .map(move |key| (key, m))
            })
            .filter(|(key, _)| !key.is_empty() && folded.contains(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, m)| m)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&StaffMember> {
        let wanted = fold(name);
        self.members
            .iter()
            .chain(self.by_grade.values())
            .find(|m| fold(&m.name) == wanted)
    }
}

/// Lowercase with Turkish casing rules and strip Turkish diacritics, collapsing whitespace.
/// "Devamsızlık İşlemleri" → "devamsizlik islemleri".
pub fn fold(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(|c| match c {
            'I' | 'ı' => vec!['i'],
            'İ' => vec!['i'],
            'Ç' | 'ç' => vec!['c'],
            'Ğ' | 'ğ' => vec!['g'],
            'Ö' | 'ö' => vec!['o'],
            'Ş' | 'ş' => vec!['s'],
            'Ü' | 'ü' => vec!['u'],
            'Â' | 'â' => vec!['a'],
            'Î' | 'î' => vec!['i'],
            'Û' | 'û' => vec!['u'],
            c if c.is_alphanumeric() => c.to_lowercase().collect(),
            _ => vec![' '],
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_handles_turkish_letters() {
        assert_eq!(fold("Devamsızlık İşlemleri"), "devamsizlik islemleri");
        assert_eq!(fold("  ÖĞRETMEN,  ŞUBE! "), "ogretmen sube");
        assert_eq!(fold("IŞIK"), "isik");
    }

    #[test]
    fn every_grade_has_staff() {
        let dir = StaffDirectory::default();
        for n in 9..=12 {
            let grade = Grade::new(n).unwrap();
            assert!(dir.for_grade(grade).is_some(), "grade {n} unmapped");
        }
    }

    #[test]
    fn transcript_match_prefers_longest_alias() {
        let dir = StaffDirectory::default();
        let m = dir.match_transcript("Okul Müdürü ile görüşmek istiyorum").unwrap();
        assert_eq!(m.title, "Okul Müdürü");
        let m = dir.match_transcript("rehberlik servisi nerede").unwrap();
        assert_eq!(m.name, "Elif Arslan");
        assert!(dir.match_transcript("kantin").is_none());
    }

    #[test]
    fn find_by_name_searches_grade_staff_too() {
        let dir = StaffDirectory::default();
        assert!(dir.find_by_name("ali çelik").is_some());
        assert!(dir.find_by_name("Nobody").is_none());
    }
}
