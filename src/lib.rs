//! Exam timetabling by genetic search.
//!
//! [`timegrid`] turns a date window and daily hours into candidate dates and
//! timeslots, [`evolution`] searches for a [`schedule::Schedule`] that
//! avoids double-booked rooms, room shortages and uneven exam days, and
//! [`timetable`] lays the best result out as a date x timeslot grid.
//! [`server`] exposes the whole pipeline over HTTP.

pub mod config;
pub mod data;
pub mod error;
pub mod evolution;
pub mod schedule;
pub mod server;
pub mod timegrid;
pub mod timetable;

pub use error::{Result, TimetableError};
pub use evolution::{Evolution, EvolutionConfig, Scheduler, StopReason, evolve, solve};
pub use schedule::{CourseExam, ExamProblem, FitnessBreakdown, Schedule};
pub use timegrid::{ExamDate, TimeGrid, TimeSlot, build_time_grid, generate_dates, generate_timeslots};
pub use timetable::{TimetableView, to_timetable};
