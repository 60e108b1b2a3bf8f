pub(crate) mod attempt_timing;
pub(crate) mod exam_tokens;
pub(crate) mod proctoring;
pub(crate) mod scoring;
