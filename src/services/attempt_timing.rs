use time::{Duration, PrimitiveDateTime};

/// Authoritative submission deadline for an attempt: the exam duration
/// measured from the actual start, capped by the exam window end. Any
/// client-side countdown is advisory only.
pub(crate) fn compute_deadline(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    exam_end: PrimitiveDateTime,
) -> PrimitiveDateTime {
    let duration_deadline = started_at + Duration::minutes(duration_minutes as i64);
    if duration_deadline < exam_end {
        duration_deadline
    } else {
        exam_end
    }
}

pub(crate) fn is_past_deadline(now: PrimitiveDateTime, deadline: PrimitiveDateTime) -> bool {
    now.assume_utc().unix_timestamp() >= deadline.assume_utc().unix_timestamp()
}

pub(crate) fn remaining_seconds(now: PrimitiveDateTime, deadline: PrimitiveDateTime) -> i64 {
    let remaining =
        deadline.assume_utc().unix_timestamp() - now.assume_utc().unix_timestamp();
    remaining.max(0)
}

/// Violations reported shortly after submission are still accepted so the
/// client can flush its final events. A terminal attempt is never re-opened.
pub(crate) fn within_violation_grace(
    now: PrimitiveDateTime,
    submitted_at: PrimitiveDateTime,
    grace_seconds: i64,
) -> bool {
    now.assume_utc().unix_timestamp()
        <= submitted_at.assume_utc().unix_timestamp() + grace_seconds
}
