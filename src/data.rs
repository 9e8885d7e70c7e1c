use serde::{Deserialize, Serialize};

use crate::evolution::StopReason;
use crate::timetable::{ExamRow, TimetableView};

/// A course and the sections sitting its exam.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrollmentInput {
    pub course: String,
    pub sections: Vec<String>,
}

/// The complete input for one timetable solve.
///
/// Without `enrollments`, every section sits every course in `courses`.
/// Optional fields fall back to the service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub enrollments: Vec<EnrollmentInput>,
    pub rooms: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: Option<u32>,
    pub excluded_weekday: Option<String>,
    pub population_size: Option<usize>,
    pub mutation_rate: Option<f64>,
    pub generations: Option<usize>,
    pub seed: Option<u64>,
    pub time_limit_ms: Option<u64>,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub timetable: TimetableView,
    pub exams: Vec<ExamRow>,
    pub fitness: f64,
    pub best_generation: usize,
    pub generations_run: usize,
    pub stop_reason: StopReason,
}
