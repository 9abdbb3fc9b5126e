//! Screen state model.
//!
//! `Screen` is the single tagged state owned by the controller. `ScreenKind` is its
//! payload-free identifier, used for navigation, transition rules and logging.
//!
//! ```text
//! Start → PresenceCheck → Menu ─┬→ AttendanceLookup → AttendanceResult
//!                               ├→ RegistrationContract → RegistrationForm
//!                               ├→ GradeSelection → StaffDirection
//!                               └→ DirectStaffDirection
//! terminal screens ──(timeout)──→ Menu | Start        any ──(reset)──→ Start
//! ```

use crate::directory::StaffMember;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A school grade the kiosk can route for (9–12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grade(u8);

impl Grade {
    pub const ALL: [Grade; 4] = [Grade(9), Grade(10), Grade(11), Grade(12)];

    pub fn new(number: u8) -> Option<Self> {
        (9..=12).contains(&number).then_some(Self(number))
    }

    /// Parse a classifier grade tag such as `"9"` or `" 12 "`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        tag.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload-free screen identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenKind {
    Start,
    PresenceCheck,
    Menu,
    AttendanceLookup,
    AttendanceResult,
    RegistrationContract,
    RegistrationForm,
    GradeSelection,
    StaffDirection,
    DirectStaffDirection,
}

impl ScreenKind {
    pub const ALL: [ScreenKind; 10] = [
        ScreenKind::Start,
        ScreenKind::PresenceCheck,
        ScreenKind::Menu,
        ScreenKind::AttendanceLookup,
        ScreenKind::AttendanceResult,
        ScreenKind::RegistrationContract,
        ScreenKind::RegistrationForm,
        ScreenKind::GradeSelection,
        ScreenKind::StaffDirection,
        ScreenKind::DirectStaffDirection,
    ];

    /// Navigation identifier (kebab-case).
    pub fn id(self) -> &'static str {
        match self {
            ScreenKind::Start => "start",
            ScreenKind::PresenceCheck => "presence-check",
            ScreenKind::Menu => "menu",
            ScreenKind::AttendanceLookup => "attendance-lookup",
            ScreenKind::AttendanceResult => "attendance-result",
            ScreenKind::RegistrationContract => "registration-contract",
            ScreenKind::RegistrationForm => "registration-form",
            ScreenKind::GradeSelection => "grade-selection",
            ScreenKind::StaffDirection => "staff-direction",
            ScreenKind::DirectStaffDirection => "direct-staff-direction",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Screens reachable from this one by a regular (non-reset) transition.
    pub fn allowed_next(self) -> &'static [ScreenKind] {
        use ScreenKind::*;
        match self {
            Start => &[PresenceCheck],
            PresenceCheck => &[Menu, Start],
            Menu => &[
                AttendanceLookup,
                RegistrationContract,
                GradeSelection,
                DirectStaffDirection,
                Start,
            ],
            AttendanceLookup => &[AttendanceResult, Menu],
            AttendanceResult => &[Menu, Start],
            RegistrationContract => &[RegistrationForm, Menu],
            RegistrationForm => &[Menu, Start],
            GradeSelection => &[StaffDirection, Menu],
            StaffDirection => &[Menu, Start],
            DirectStaffDirection => &[Menu, Start],
        }
    }

    pub fn can_transition_to(self, next: ScreenKind) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Where this screen's countdown leads, if it has one.
    pub fn timeout_target(self) -> Option<ScreenKind> {
        match self {
            ScreenKind::AttendanceResult => Some(ScreenKind::Menu),
            ScreenKind::RegistrationForm
            | ScreenKind::StaffDirection
            | ScreenKind::DirectStaffDirection => Some(ScreenKind::Start),
            _ => None,
        }
    }

    pub fn has_countdown(self) -> bool {
        self.timeout_target().is_some()
    }

    /// Screens that wait for a spoken answer after their prompt.
    pub fn listens(self) -> bool {
        matches!(
            self,
            ScreenKind::Menu
                | ScreenKind::AttendanceLookup
                | ScreenKind::RegistrationContract
                | ScreenKind::GradeSelection
        )
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Screen state with its payload. Owned by the controller, published read-only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "kebab-case")]
pub enum Screen {
    #[default]
    Start,
    PresenceCheck,
    Menu,
    AttendanceLookup,
    AttendanceResult {
        student: String,
    },
    RegistrationContract,
    RegistrationForm,
    GradeSelection,
    StaffDirection {
        grade: Grade,
        staff: StaffMember,
    },
    DirectStaffDirection {
        staff: StaffMember,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Screen {
    pub fn kind(&self) -> ScreenKind {
        match self {
            Screen::Start => ScreenKind::Start,
            Screen::PresenceCheck => ScreenKind::PresenceCheck,
            Screen::Menu => ScreenKind::Menu,
            Screen::AttendanceLookup => ScreenKind::AttendanceLookup,
            Screen::AttendanceResult { .. } => ScreenKind::AttendanceResult,
            Screen::RegistrationContract => ScreenKind::RegistrationContract,
            Screen::RegistrationForm => ScreenKind::RegistrationForm,
            Screen::GradeSelection => ScreenKind::GradeSelection,
            Screen::StaffDirection { .. } => ScreenKind::StaffDirection,
            Screen::DirectStaffDirection { .. } => ScreenKind::DirectStaffDirection,
        }
    }

    /// Build the payload-free screen for a kind; `None` for kinds that need a payload.
    pub fn plain(kind: ScreenKind) -> Option<Self> {
        match kind {
            ScreenKind::Start => Some(Screen::Start),
            ScreenKind::PresenceCheck => Some(Screen::PresenceCheck),
            ScreenKind::Menu => Some(Screen::Menu),
            ScreenKind::AttendanceLookup => Some(Screen::AttendanceLookup),
            ScreenKind::RegistrationContract => Some(Screen::RegistrationContract),
            ScreenKind::RegistrationForm => Some(Screen::RegistrationForm),
            ScreenKind::GradeSelection => Some(Screen::GradeSelection),
            ScreenKind::AttendanceResult
            | ScreenKind::StaffDirection
            | ScreenKind::DirectStaffDirection => None,
        }
    }
}

/// Why the controller moved between screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Presence,
    Handoff,
    Voice,
    Navigation,
    Timeout,
    CameraLost,
    Reset,
}

/// One entered screen, as published on the signal bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ScreenKind,
    pub to: ScreenKind,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn now(from: ScreenKind, to: ScreenKind, cause: TransitionCause) -> Self {
        Self {
            from,
            to,
            cause,
            at: Utc::now(),
        }
    }
}
