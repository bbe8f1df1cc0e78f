//! The fixed set of report sections

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the nine semantic sections a research report is organized into.
///
/// The set is closed. Declaration order is report order, and `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    /// Purpose and overview of the bill or topic
    Purpose,
    /// Where the matter currently stands
    CurrentStatus,
    /// Chronology of events
    Timeline,
    /// Key points of the content
    KeyPoints,
    /// Background and context
    Background,
    /// Main points of contention
    MainIssues,
    /// Why a change is being proposed
    ReasonsForChange,
    /// Expected effects
    ImpactAnalysis,
    /// Summary of past debates in the legislature
    PastDebates,
}

impl SectionKey {
    /// All sections, in report order
    pub const ALL: [SectionKey; 9] = [
        SectionKey::Purpose,
        SectionKey::CurrentStatus,
        SectionKey::Timeline,
        SectionKey::KeyPoints,
        SectionKey::Background,
        SectionKey::MainIssues,
        SectionKey::ReasonsForChange,
        SectionKey::ImpactAnalysis,
        SectionKey::PastDebates,
    ];

    /// Number of sections
    pub const COUNT: usize = Self::ALL.len();

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Purpose => "purpose",
            SectionKey::CurrentStatus => "current_status",
            SectionKey::Timeline => "timeline",
            SectionKey::KeyPoints => "key_points",
            SectionKey::Background => "background",
            SectionKey::MainIssues => "main_issues",
            SectionKey::ReasonsForChange => "reasons_for_change",
            SectionKey::ImpactAnalysis => "impact_analysis",
            SectionKey::PastDebates => "past_debates",
        }
    }

    /// Heading used in prompts and rendered reports
    pub fn display_name(&self) -> &'static str {
        match self {
            SectionKey::Purpose => "Purpose & Overview",
            SectionKey::CurrentStatus => "Current Status",
            SectionKey::Timeline => "Timeline",
            SectionKey::KeyPoints => "Key Points",
            SectionKey::Background => "Background",
            SectionKey::MainIssues => "Main Issues",
            SectionKey::ReasonsForChange => "Reasons for Change",
            SectionKey::ImpactAnalysis => "Impact Analysis",
            SectionKey::PastDebates => "Past Debate Summary",
        }
    }

    /// Terms appended to a subquery to steer a search towards this section
    pub fn search_focus(&self) -> &'static str {
        match self {
            SectionKey::Purpose => "purpose overview",
            SectionKey::CurrentStatus => "current status latest",
            SectionKey::Timeline => "timeline history dates",
            SectionKey::KeyPoints => "key provisions contents",
            SectionKey::Background => "background context",
            SectionKey::MainIssues => "issues controversy criticism",
            SectionKey::ReasonsForChange => "reasons for amendment",
            SectionKey::ImpactAnalysis => "impact effects analysis",
            SectionKey::PastDebates => "committee debate deliberation",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown section: {}", s))
    }
}
