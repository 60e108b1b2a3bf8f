use crate::db::models::Exam;
use crate::db::types::ViolationKind;

/// Reason recorded on attempts force-submitted by the tab-switch policy.
pub(crate) const VIOLATION_LIMIT_REASON: &str = "violation-limit-exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ViolationPolicy {
    pub(crate) max_tab_switches: i32,
    pub(crate) require_fullscreen: bool,
}

impl ViolationPolicy {
    pub(crate) fn from_exam(exam: &Exam) -> Self {
        Self {
            max_tab_switches: exam.max_tab_switches,
            require_fullscreen: exam.require_fullscreen,
        }
    }

    /// The Nth tab switch at limit N is still tolerated; the transition
    /// fires only once the counter strictly exceeds the limit.
    pub(crate) fn exceeds_tab_switch_limit(&self, count: i32) -> bool {
        count > self.max_tab_switches
    }

    /// Tab switches only count against the limit when the exam requires
    /// fullscreen focus; other kinds are always recorded but never forcing.
    pub(crate) fn counts_toward_limit(&self, kind: ViolationKind) -> bool {
        kind == ViolationKind::TabSwitch && self.require_fullscreen
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ViolationEvidence {
    pub(crate) duration_ms: Option<i64>,
    pub(crate) content: Option<String>,
}

/// Normalizes client-supplied evidence: negative durations are clock skew
/// artifacts and collapse to zero, copied text is truncated at a char
/// boundary, and payloads irrelevant to the kind are dropped.
pub(crate) fn normalize_evidence(
    kind: ViolationKind,
    duration_ms: Option<i64>,
    content: Option<String>,
    content_max_chars: usize,
) -> ViolationEvidence {
    match kind {
        ViolationKind::TabSwitch => ViolationEvidence {
            duration_ms: Some(duration_ms.unwrap_or(0).max(0)),
            content: None,
        },
        ViolationKind::CopyPaste => ViolationEvidence {
            duration_ms: None,
            content: content.map(|text| truncate_chars(&text, content_max_chars)),
        },
        ViolationKind::RightClick | ViolationKind::FullscreenExit => {
            ViolationEvidence { duration_ms: None, content: None }
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_tab_switches: i32, require_fullscreen: bool) -> ViolationPolicy {
        ViolationPolicy { max_tab_switches, require_fullscreen }
    }

    #[test]
    fn third_switch_tolerated_fourth_exceeds() {
        let policy = policy(3, true);
        assert!(!policy.exceeds_tab_switch_limit(3));
        assert!(policy.exceeds_tab_switch_limit(4));
    }

    #[test]
    fn only_tab_switches_count_and_only_under_fullscreen() {
        let strict = policy(3, true);
        assert!(strict.counts_toward_limit(ViolationKind::TabSwitch));
        assert!(!strict.counts_toward_limit(ViolationKind::RightClick));
        assert!(!strict.counts_toward_limit(ViolationKind::CopyPaste));
        assert!(!strict.counts_toward_limit(ViolationKind::FullscreenExit));

        let relaxed = policy(3, false);
        assert!(!relaxed.counts_toward_limit(ViolationKind::TabSwitch));
    }

    #[test]
    fn tab_switch_duration_defaults_to_zero_and_clamps_negative() {
        let evidence = normalize_evidence(ViolationKind::TabSwitch, None, None, 512);
        assert_eq!(evidence.duration_ms, Some(0));

        let evidence = normalize_evidence(ViolationKind::TabSwitch, Some(-40), None, 512);
        assert_eq!(evidence.duration_ms, Some(0));

        let evidence = normalize_evidence(ViolationKind::TabSwitch, Some(1500), None, 512);
        assert_eq!(evidence.duration_ms, Some(1500));
    }

    #[test]
    fn copy_paste_content_is_truncated() {
        let long = "x".repeat(600);
        let evidence = normalize_evidence(ViolationKind::CopyPaste, None, Some(long), 512);
        assert_eq!(evidence.content.as_ref().map(|c| c.chars().count()), Some(512));
        assert_eq!(evidence.duration_ms, None);
    }

    #[test]
    fn irrelevant_payloads_are_dropped() {
        let evidence = normalize_evidence(
            ViolationKind::RightClick,
            Some(100),
            Some("noise".to_string()),
            512,
        );
        assert_eq!(evidence, ViolationEvidence { duration_ms: None, content: None });
    }
}
