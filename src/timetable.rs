//! Presentation view of a solved schedule: a date x timeslot grid.

use serde::Serialize;

use crate::schedule::Schedule;
use crate::timegrid::ExamDate;

/// Longest course label shown in a grid cell.
pub const LABEL_MAX_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamEntry {
    pub course: String,
    pub label: String,
    pub sections: Vec<String>,
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub timeslot: String,
    pub exams: Vec<ExamEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableDay {
    pub date: String,
    pub weekday: String,
    pub label: String,
    pub slots: Vec<TimetableSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableView {
    pub days: Vec<TimetableDay>,
    pub unassigned_courses: usize,
    pub total_courses: usize,
}

/// One section sitting one exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRow {
    pub section: String,
    pub course: String,
    pub date: String,
    pub weekday: String,
    pub date_label: String,
    pub timeslot: String,
    pub rooms: Vec<String>,
}

impl TimetableView {
    /// Flat per-section listing ordered by date, then timeslot.
    pub fn exam_rows(&self) -> Vec<ExamRow> {
        let mut rows = Vec::new();
        for day in &self.days {
            for slot in &day.slots {
                for exam in &slot.exams {
                    for section in &exam.sections {
                        rows.push(ExamRow {
                            section: section.clone(),
                            course: exam.course.clone(),
                            date: day.date.clone(),
                            weekday: day.weekday.clone(),
                            date_label: day.label.clone(),
                            timeslot: slot.timeslot.clone(),
                            rooms: exam.rooms.clone(),
                        });
                    }
                }
            }
        }
        rows
    }

    pub fn exam_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|day| &day.slots)
            .map(|slot| slot.exams.len())
            .sum()
    }
}

/// Shortens long course names: an initialism of the words when there are
/// at least two and it fits, otherwise a truncation ending in an ellipsis.
pub fn course_label(name: &str) -> String {
    if name.chars().count() <= LABEL_MAX_LEN {
        return name.to_string();
    }

    let initials: Vec<char> = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .collect();
    if initials.len() >= 2 && initials.len() <= LABEL_MAX_LEN {
        return initials.into_iter().collect();
    }

    let mut truncated: String = name.chars().take(LABEL_MAX_LEN - 1).collect();
    truncated.push('…');
    truncated
}

/// Cells are looked up by the exam's date and timeslot indices, so `dates`
/// and `timeslots` must be the universes the schedule was solved against.
/// An exam with no cell in the grid is reported as unassigned.
pub fn to_timetable(best: &Schedule<'_>, dates: &[ExamDate], timeslots: &[String]) -> TimetableView {
    let mut days: Vec<TimetableDay> = dates
        .iter()
        .map(|date| TimetableDay {
            date: date.key(),
            weekday: date.weekday.clone(),
            label: date.label.clone(),
            slots: timeslots
                .iter()
                .map(|timeslot| TimetableSlot {
                    timeslot: timeslot.clone(),
                    exams: Vec::new(),
                })
                .collect(),
        })
        .collect();

    let mut unassigned_courses = 0;
    for (exam, resolved) in best.exams().iter().zip(best.resolved()) {
        let cell = match (exam.date, exam.timeslot) {
            (Some(date), Some(slot)) => days.get_mut(date).and_then(|day| day.slots.get_mut(slot)),
            _ => None,
        };
        match cell {
            Some(cell) => cell.exams.push(ExamEntry {
                course: resolved.course.to_string(),
                label: course_label(resolved.course),
                sections: resolved.sections.iter().map(|s| s.to_string()).collect(),
                rooms: resolved.rooms.iter().map(|r| r.to_string()).collect(),
            }),
            None => unassigned_courses += 1,
        }
    }

    TimetableView {
        days,
        unassigned_courses,
        total_courses: best.len(),
    }
}
