/// Router Module Index
///
/// Screens are grouped by the capability they require. Each group gets its guard as a
/// route layer in `create_router`, so a handler only runs once the stored credential
/// claims the right role.

/// Login, logout and health. No guard.
pub mod public;

/// Screens for any logged-in user: dashboard, courses, exam taking, own transcript.
pub mod authenticated;

/// Exam authoring, grading and course material. Nested under `/profesor`.
pub mod professor;

/// User, course, enrollment and transcript administration. Nested under `/admin`.
pub mod admin;
