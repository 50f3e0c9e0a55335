// src/services/progress.rs

//! Lesson completion and enrollment rollup.

use crate::config::LESSON_COMPLETION_RATIO;

/// Stored state of one lesson for one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LessonState {
    pub watched_seconds: i32,
    pub completed: bool,
}

/// Result of folding a progress report into the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonUpdate {
    pub state: LessonState,
    /// True only on the report that crossed the completion threshold.
    pub newly_completed: bool,
}

/// Whether `watched_seconds` crosses the completion threshold of a lesson
/// lasting `duration_seconds`. Lessons without a duration complete on the
/// first report.
pub fn crosses_threshold(watched_seconds: i32, duration_seconds: i32) -> bool {
    if duration_seconds <= 0 {
        return true;
    }
    f64::from(watched_seconds) >= f64::from(duration_seconds) * LESSON_COMPLETION_RATIO
}

/// Folds a report into the previous state.
///
/// Watched time only grows and completion never reverts, so replaying the
/// same report, or a smaller one, leaves the state unchanged.
pub fn apply_report(
    previous: LessonState,
    reported_seconds: i32,
    marked_complete: bool,
    duration_seconds: i32,
) -> LessonUpdate {
    let watched_seconds = previous.watched_seconds.max(reported_seconds.max(0));
    let completed = previous.completed
        || marked_complete
        || crosses_threshold(watched_seconds, duration_seconds);

    LessonUpdate {
        state: LessonState {
            watched_seconds,
            completed,
        },
        newly_completed: completed && !previous.completed,
    }
}

/// Completed lessons over total lessons, as a percentage with two decimals.
/// A course with no lessons reports zero.
pub fn completion_percentage(completed_lessons: i64, total_lessons: i64) -> f64 {
    if total_lessons <= 0 {
        return 0.0;
    }
    let completed = completed_lessons.clamp(0, total_lessons);
    round2(completed as f64 / total_lessons as f64 * 100.0)
}

/// Watch-time weighted progress over `(watched_seconds, duration_seconds)`
/// pairs. Watching past the end of a video does not count extra.
pub fn watch_time_percentage(lessons: &[(i32, i32)]) -> f64 {
    let total: i64 = lessons.iter().map(|&(_, d)| i64::from(d.max(0))).sum();
    if total == 0 {
        return 0.0;
    }
    let watched: i64 = lessons
        .iter()
        .map(|&(w, d)| i64::from(w.clamp(0, d.max(0))))
        .sum();
    round2(watched as f64 / total as f64 * 100.0)
}

/// An enrollment completes once every lesson of a non-empty course is done.
pub fn is_course_complete(completed_lessons: i64, total_lessons: i64) -> bool {
    total_lessons > 0 && completed_lessons >= total_lessons
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
