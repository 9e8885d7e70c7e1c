//! Candidate timetables and their fitness.
//!
//! An [`ExamProblem`] holds the shared universes (courses with their
//! enrolled sections, rooms, dates, timeslots) and is built once per solve.
//! A [`Schedule`] borrows it and stores one compact [`CourseExam`] record per
//! course: indices into the date, timeslot and room universes. Copying a
//! schedule therefore never copies names, and crossover is a swap of index
//! records.
//!
//! One record covers every section of a course, so all sections of a course
//! always sit the exam together. Splitting a course into per-section records
//! would lose that property unless a same-slot constraint is added back.

use itertools::Itertools;
use log::trace;
use rand::Rng;
use rand::seq::index;
use std::collections::HashMap;

pub const BASE_FITNESS: f64 = 1000.0;
pub const CONFLICT_WEIGHT: f64 = 100.0;
pub const SHORTAGE_WEIGHT: f64 = 50.0;
pub const DISTRIBUTION_WEIGHT: f64 = 2.0;
pub const EFFICIENCY_BONUS: f64 = 10.0;

/// Share of mutation events that move the date; the next equal share moves
/// the timeslot and the rest resample rooms.
const DATE_MUTATION_SHARE: f64 = 0.4;
const TIMESLOT_MUTATION_SHARE: f64 = 0.4;

/// A course and the sections (indices into [`ExamProblem::sections`]) that sit its exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseEnrollment {
    pub name: String,
    pub sections: Vec<usize>,
}

/// The universes a solve runs against.
#[derive(Debug, Clone, Default)]
pub struct ExamProblem {
    courses: Vec<CourseEnrollment>,
    sections: Vec<String>,
    rooms: Vec<String>,
    dates: Vec<String>,
    timeslots: Vec<String>,
}

impl ExamProblem {
    /// Every section is enrolled in every course.
    pub fn new(
        courses: Vec<String>,
        sections: Vec<String>,
        rooms: Vec<String>,
        dates: Vec<String>,
        timeslots: Vec<String>,
    ) -> Self {
        let all_sections: Vec<usize> = (0..sections.len()).collect();
        let courses = courses
            .into_iter()
            .map(|name| CourseEnrollment {
                name,
                sections: all_sections.clone(),
            })
            .collect();
        Self {
            courses,
            sections,
            rooms,
            dates,
            timeslots,
        }
    }

    /// Explicit per-course section lists. Section names shared between
    /// courses map to the same section.
    pub fn with_enrollments(
        enrollments: Vec<(String, Vec<String>)>,
        rooms: Vec<String>,
        dates: Vec<String>,
        timeslots: Vec<String>,
    ) -> Self {
        let sections: Vec<String> = enrollments
            .iter()
            .flat_map(|(_, sections)| sections.iter().cloned())
            .unique()
            .collect();
        let section_index: HashMap<&str, usize> = sections
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();

        let courses = enrollments
            .iter()
            .map(|(name, enrolled)| CourseEnrollment {
                name: name.clone(),
                sections: enrolled
                    .iter()
                    .map(|s| section_index[s.as_str()])
                    .unique()
                    .collect(),
            })
            .collect();

        Self {
            courses,
            sections,
            rooms,
            dates,
            timeslots,
        }
    }

    pub fn courses(&self) -> &[CourseEnrollment] {
        &self.courses
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn timeslots(&self) -> &[String] {
        &self.timeslots
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }
}

/// One course's exam placement. `course` indexes [`ExamProblem::courses`];
/// the rest index the date, timeslot and room universes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseExam {
    pub course: usize,
    pub date: Option<usize>,
    pub timeslot: Option<usize>,
    pub rooms: Vec<usize>,
}

impl CourseExam {
    fn unassigned(course: usize) -> Self {
        Self {
            course,
            date: None,
            timeslot: None,
            rooms: Vec::new(),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.date.is_some() && self.timeslot.is_some()
    }

    fn swap_placement(&mut self, other: &mut CourseExam) {
        std::mem::swap(&mut self.date, &mut other.date);
        std::mem::swap(&mut self.timeslot, &mut other.timeslot);
        std::mem::swap(&mut self.rooms, &mut other.rooms);
    }
}

/// A [`CourseExam`] with its indices resolved to names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExam<'p> {
    pub course: &'p str,
    pub sections: Vec<&'p str>,
    pub date: Option<&'p str>,
    pub timeslot: Option<&'p str>,
    pub rooms: Vec<&'p str>,
}

/// Each term of the fitness score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitnessBreakdown {
    pub room_conflicts: u32,
    pub conflict_penalty: f64,
    pub shortage_penalty: f64,
    pub distribution_penalty: f64,
    pub efficiency_bonus: f64,
}

impl FitnessBreakdown {
    pub fn fitness(&self) -> f64 {
        (BASE_FITNESS + self.efficiency_bonus)
            - self.conflict_penalty
            - self.distribution_penalty
            - self.shortage_penalty
    }
}

/// One complete candidate timetable.
#[derive(Debug, Clone)]
pub struct Schedule<'p> {
    problem: &'p ExamProblem,
    exams: Vec<CourseExam>,
    fitness: f64,
}

impl<'p> Schedule<'p> {
    /// A schedule with every exam unplaced.
    pub fn new(problem: &'p ExamProblem) -> Self {
        let exams = (0..problem.course_count())
            .map(CourseExam::unassigned)
            .collect();
        let mut schedule = Self {
            problem,
            exams,
            fitness: 0.0,
        };
        schedule.calculate_fitness();
        schedule
    }

    pub fn random<R: Rng + ?Sized>(problem: &'p ExamProblem, rng: &mut R) -> Self {
        let mut schedule = Self::new(problem);
        schedule.randomize(rng);
        schedule
    }

    pub fn problem(&self) -> &'p ExamProblem {
        self.problem
    }

    pub fn exams(&self) -> &[CourseExam] {
        &self.exams
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }

    /// Cached score from the last structural change.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Exams still missing a date or a timeslot.
    pub fn unassigned_count(&self) -> usize {
        self.exams.iter().filter(|e| !e.is_scheduled()).count()
    }

    pub fn resolved(&self) -> impl Iterator<Item = ResolvedExam<'p>> + '_ {
        let problem = self.problem;
        self.exams.iter().map(move |exam| {
            let course = &problem.courses[exam.course];
            ResolvedExam {
                course: &course.name,
                sections: course
                    .sections
                    .iter()
                    .map(|&s| problem.sections[s].as_str())
                    .collect(),
                date: exam.date.map(|d| problem.dates[d].as_str()),
                timeslot: exam.timeslot.map(|t| problem.timeslots[t].as_str()),
                rooms: exam
                    .rooms
                    .iter()
                    .map(|&r| problem.rooms[r].as_str())
                    .collect(),
            }
        })
    }

    /// Draws a uniform date, timeslot and room set for every exam.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let problem = self.problem;
        for exam in &mut self.exams {
            exam.date = random_index(problem.dates.len(), rng);
            exam.timeslot = random_index(problem.timeslots.len(), rng);
            exam.rooms = sample_rooms(problem, exam.course, rng);
        }
        self.calculate_fitness();
    }

    /// Single-point crossover at a uniform cut in `[1, len - 1]`.
    /// Schedules with fewer than two exams have no valid cut and are copied.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> (Self, Self) {
        if self.exams.len() < 2 {
            return (self.clone(), other.clone());
        }
        let cut = rng.gen_range(1..self.exams.len());
        self.crossover_at(other, cut)
    }

    /// Children keep their own parent's placements before `cut` and trade
    /// placements from `cut` on.
    pub fn crossover_at(&self, other: &Self, cut: usize) -> (Self, Self) {
        debug_assert!(std::ptr::eq(self.problem, other.problem));
        debug_assert_eq!(self.exams.len(), other.exams.len());

        let mut first = self.clone();
        let mut second = other.clone();
        let cut = cut.min(first.exams.len());
        for (a, b) in first.exams[cut..]
            .iter_mut()
            .zip(second.exams[cut..].iter_mut())
        {
            a.swap_placement(b);
        }
        first.calculate_fitness();
        second.calculate_fitness();
        (first, second)
    }

    /// Perturbs each exam with probability `rate`, changing exactly one of
    /// date, timeslot or rooms. Returns the number of perturbed exams.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f64, rng: &mut R) -> usize {
        let problem = self.problem;
        let mut mutated = 0;
        for exam in &mut self.exams {
            if rng.r#gen::<f64>() >= rate {
                continue;
            }
            mutated += 1;
            let roll = rng.r#gen::<f64>();
            if roll < DATE_MUTATION_SHARE {
                exam.date = random_index(problem.dates.len(), rng);
            } else if roll < DATE_MUTATION_SHARE + TIMESLOT_MUTATION_SHARE {
                exam.timeslot = random_index(problem.timeslots.len(), rng);
            } else {
                exam.rooms = sample_rooms(problem, exam.course, rng);
            }
        }
        if mutated > 0 {
            trace!("Mutated {} of {} exams", mutated, self.exams.len());
            self.calculate_fitness();
        }
        mutated
    }

    /// Recomputes and caches the fitness score.
    pub fn calculate_fitness(&mut self) -> f64 {
        self.fitness = self.fitness_breakdown().fitness();
        self.fitness
    }

    pub fn fitness_breakdown(&self) -> FitnessBreakdown {
        let problem = self.problem;

        // every use of a (date, timeslot, room) beyond the first is one conflict
        let room_conflicts: usize = self
            .exams
            .iter()
            .filter_map(|exam| Some((exam.date?, exam.timeslot?, &exam.rooms)))
            .flat_map(|(date, slot, rooms)| rooms.iter().map(move |&room| (date, slot, room)))
            .counts()
            .values()
            .map(|uses| uses - 1)
            .sum();

        let mut shortage_penalty = 0.0;
        let mut efficiency_bonus = 0.0;
        for exam in &self.exams {
            let enrolled = problem.courses[exam.course].sections.len();
            let assigned = exam.rooms.len();
            if assigned < enrolled {
                shortage_penalty += (enrolled - assigned) as f64 * SHORTAGE_WEIGHT;
            } else {
                efficiency_bonus += EFFICIENCY_BONUS;
            }
        }

        FitnessBreakdown {
            room_conflicts: room_conflicts as u32,
            conflict_penalty: room_conflicts as f64 * CONFLICT_WEIGHT,
            shortage_penalty,
            distribution_penalty: self.date_variance() * DISTRIBUTION_WEIGHT,
            efficiency_bonus,
        }
    }

    /// Population variance of per-date exam counts; zero without dates.
    fn date_variance(&self) -> f64 {
        let date_count = self.problem.dates.len();
        if date_count == 0 {
            return 0.0;
        }
        let mut per_date = vec![0usize; date_count];
        for date in self.exams.iter().filter_map(|e| e.date) {
            per_date[date] += 1;
        }
        let mean = self.exams.len() as f64 / date_count as f64;
        per_date
            .iter()
            .map(|&count| (count as f64 - mean).powi(2))
            .sum::<f64>()
            / date_count as f64
    }

    #[cfg(test)]
    pub(crate) fn place(&mut self, exam: usize, date: usize, timeslot: usize, rooms: Vec<usize>) {
        let record = &mut self.exams[exam];
        record.date = Some(date);
        record.timeslot = Some(timeslot);
        record.rooms = rooms;
        self.calculate_fitness();
    }
}

fn random_index<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Option<usize> {
    (len > 0).then(|| rng.gen_range(0..len))
}

/// Rooms without replacement, one per enrolled section when supply allows.
fn sample_rooms<R: Rng + ?Sized>(problem: &ExamProblem, course: usize, rng: &mut R) -> Vec<usize> {
    let available = problem.rooms.len();
    let wanted = problem.courses[course].sections.len().min(available);
    index::sample(rng, available, wanted).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn problem(courses: usize, sections: usize, rooms: usize, dates: usize, slots: usize) -> ExamProblem {
        ExamProblem::new(
            names("Course ", courses),
            names("S", sections),
            names("R", rooms),
            names("D", dates),
            names("T", slots),
        )
    }

    #[test]
    fn perfect_schedule_scores_base_plus_bonus() {
        let problem = problem(2, 2, 4, 2, 1);
        let mut schedule = Schedule::new(&problem);
        schedule.place(0, 0, 0, vec![0, 1]);
        schedule.place(1, 1, 0, vec![2, 3]);

        let breakdown = schedule.fitness_breakdown();
        assert_eq!(breakdown.room_conflicts, 0);
        assert_eq!(breakdown.shortage_penalty, 0.0);
        assert_eq!(breakdown.distribution_penalty, 0.0);
        assert_eq!(breakdown.efficiency_bonus, 20.0);
        assert_eq!(schedule.fitness(), BASE_FITNESS + breakdown.efficiency_bonus);
    }

    #[test]
    fn fitness_is_idempotent() {
        let problem = problem(5, 3, 4, 3, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let mut schedule = Schedule::random(&problem, &mut rng);
        let first = schedule.calculate_fitness();
        let second = schedule.calculate_fitness();
        assert_eq!(first, second);
        assert_eq!(first, schedule.fitness());
    }

    #[test]
    fn each_extra_room_use_is_one_conflict() {
        let problem = problem(3, 1, 1, 1, 1);
        let mut schedule = Schedule::new(&problem);
        for exam in 0..3 {
            schedule.place(exam, 0, 0, vec![0]);
        }
        let breakdown = schedule.fitness_breakdown();
        assert_eq!(breakdown.room_conflicts, 2);
        assert_eq!(breakdown.conflict_penalty, 200.0);
        // all on the only date: counts [3], mean 3
        assert_eq!(breakdown.distribution_penalty, 0.0);
        assert_eq!(schedule.fitness(), 1000.0 + 30.0 - 200.0);
    }

    #[test]
    fn different_slots_do_not_conflict() {
        let problem = problem(2, 1, 1, 1, 2);
        let mut schedule = Schedule::new(&problem);
        schedule.place(0, 0, 0, vec![0]);
        schedule.place(1, 0, 1, vec![0]);
        assert_eq!(schedule.fitness_breakdown().room_conflicts, 0);
    }

    #[test]
    fn room_shortage_is_penalised_per_missing_room() {
        let problem = problem(1, 3, 1, 1, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let schedule = Schedule::random(&problem, &mut rng);
        assert_eq!(schedule.exams()[0].rooms.len(), 1);
        let breakdown = schedule.fitness_breakdown();
        assert_eq!(breakdown.shortage_penalty, 100.0);
        assert_eq!(breakdown.efficiency_bonus, 0.0);
        assert_eq!(schedule.fitness(), 900.0);
    }

    #[test]
    fn uneven_dates_are_penalised() {
        let problem = problem(2, 1, 2, 2, 1);
        let mut schedule = Schedule::new(&problem);
        schedule.place(0, 0, 0, vec![0]);
        schedule.place(1, 0, 0, vec![1]);
        // counts [2, 0], mean 1, variance 1
        assert_eq!(schedule.fitness_breakdown().distribution_penalty, 2.0);
        assert_eq!(schedule.fitness(), 1000.0 + 20.0 - 2.0);
    }

    #[test]
    fn empty_universes_do_not_fault() {
        let problem = problem(3, 2, 2, 0, 0);
        let mut rng = StdRng::seed_from_u64(3);
        let schedule = Schedule::random(&problem, &mut rng);
        assert_eq!(schedule.unassigned_count(), 3);
        let breakdown = schedule.fitness_breakdown();
        assert_eq!(breakdown.distribution_penalty, 0.0);
        assert_eq!(breakdown.room_conflicts, 0);
        assert!(schedule.fitness().is_finite());
    }

    #[test]
    fn empty_course_list_scores_base() {
        let problem = problem(0, 2, 2, 2, 2);
        let schedule = Schedule::new(&problem);
        assert!(schedule.is_empty());
        assert_eq!(schedule.fitness(), BASE_FITNESS);
    }

    #[test]
    fn randomize_draws_from_universes() {
        let problem = problem(6, 2, 3, 4, 3);
        let mut rng = StdRng::seed_from_u64(11);
        let schedule = Schedule::random(&problem, &mut rng);
        for exam in schedule.exams() {
            assert!(exam.date.unwrap() < 4);
            assert!(exam.timeslot.unwrap() < 3);
            assert_eq!(exam.rooms.len(), 2);
            assert_ne!(exam.rooms[0], exam.rooms[1]);
        }
    }

    #[test]
    fn crossover_preserves_length_at_every_cut() {
        let problem = problem(5, 2, 4, 3, 2);
        let mut rng = StdRng::seed_from_u64(5);
        let p1 = Schedule::random(&problem, &mut rng);
        let p2 = Schedule::random(&problem, &mut rng);
        for cut in 1..p1.len() {
            let (c1, c2) = p1.crossover_at(&p2, cut);
            assert_eq!(c1.len(), p1.len());
            assert_eq!(c2.len(), p2.len());
            for i in 0..cut {
                assert_eq!(c1.exams()[i], p1.exams()[i]);
                assert_eq!(c2.exams()[i], p2.exams()[i]);
            }
            for i in cut..p1.len() {
                assert_eq!(c1.exams()[i].date, p2.exams()[i].date);
                assert_eq!(c1.exams()[i].rooms, p2.exams()[i].rooms);
                assert_eq!(c2.exams()[i].timeslot, p1.exams()[i].timeslot);
                assert_eq!(c1.exams()[i].course, i);
            }
            assert_eq!(c1.fitness(), c1.fitness_breakdown().fitness());
        }
    }

    #[test]
    fn crossover_of_single_exam_copies_parents() {
        let problem = problem(1, 1, 2, 2, 2);
        let mut rng = StdRng::seed_from_u64(9);
        let p1 = Schedule::random(&problem, &mut rng);
        let p2 = Schedule::random(&problem, &mut rng);
        let (c1, c2) = p1.crossover(&p2, &mut rng);
        assert_eq!(c1.exams(), p1.exams());
        assert_eq!(c2.exams(), p2.exams());
    }

    #[test]
    fn mutation_keeps_course_identity() {
        let problem = ExamProblem::with_enrollments(
            vec![
                ("Algorithms".into(), vec!["A".into(), "B".into()]),
                ("Networking".into(), vec!["B".into()]),
                ("Databases".into(), vec!["A".into(), "C".into()]),
            ],
            names("R", 3),
            names("D", 3),
            names("T", 3),
        );
        let mut rng = StdRng::seed_from_u64(21);
        let mut schedule = Schedule::random(&problem, &mut rng);
        let before: Vec<(String, Vec<String>)> = schedule
            .resolved()
            .map(|e| (e.course.to_string(), e.sections.iter().map(|s| s.to_string()).collect()))
            .collect();

        let mutated = schedule.mutate(1.0, &mut rng);
        assert_eq!(mutated, 3);

        let after: Vec<(String, Vec<String>)> = schedule
            .resolved()
            .map(|e| (e.course.to_string(), e.sections.iter().map(|s| s.to_string()).collect()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(schedule.fitness(), schedule.fitness_breakdown().fitness());
    }

    #[test]
    fn each_mutation_changes_exactly_one_field() {
        // wide universes so a re-draw almost never lands on the old value
        let problem = problem(2000, 3, 50, 1000, 1000);
        let mut rng = StdRng::seed_from_u64(13);
        let mut schedule = Schedule::random(&problem, &mut rng);
        let before = schedule.exams().to_vec();

        assert_eq!(schedule.mutate(1.0, &mut rng), 2000);

        let (mut dates, mut slots, mut rooms) = (0, 0, 0);
        for (old, new) in before.iter().zip(schedule.exams()) {
            let changed = [
                old.date != new.date,
                old.timeslot != new.timeslot,
                old.rooms != new.rooms,
            ];
            assert!(changed.iter().filter(|&&c| c).count() <= 1, "{:?} -> {:?}", old, new);
            dates += changed[0] as usize;
            slots += changed[1] as usize;
            rooms += changed[2] as usize;

            assert_eq!(new.rooms.len(), 3);
            assert_eq!(new.rooms.iter().unique().count(), 3);
            assert!(new.rooms.iter().all(|&r| r < 50));
        }
        assert!((700..=900).contains(&dates), "date share {dates}");
        assert!((700..=900).contains(&slots), "timeslot share {slots}");
        assert!((320..=480).contains(&rooms), "room share {rooms}");
    }

    #[test]
    fn room_redraw_is_capped_by_supply() {
        let problem = problem(50, 4, 2, 1, 1);
        let mut rng = StdRng::seed_from_u64(6);
        let mut schedule = Schedule::random(&problem, &mut rng);
        for _ in 0..5 {
            schedule.mutate(1.0, &mut rng);
        }
        for exam in schedule.exams() {
            assert_eq!(exam.rooms.len(), 2);
            assert_ne!(exam.rooms[0], exam.rooms[1]);
        }
    }

    #[test]
    fn zero_rate_mutation_changes_nothing() {
        let problem = problem(4, 2, 3, 3, 3);
        let mut rng = StdRng::seed_from_u64(2);
        let mut schedule = Schedule::random(&problem, &mut rng);
        let before = schedule.exams().to_vec();
        assert_eq!(schedule.mutate(0.0, &mut rng), 0);
        assert_eq!(schedule.exams(), before.as_slice());
    }

    #[test]
    fn enrollments_share_section_names() {
        let problem = ExamProblem::with_enrollments(
            vec![
                ("Math".into(), vec!["A".into(), "B".into()]),
                ("Physics".into(), vec!["B".into(), "C".into(), "B".into()]),
            ],
            names("R", 1),
            names("D", 1),
            names("T", 1),
        );
        assert_eq!(problem.sections(), &["A", "B", "C"]);
        assert_eq!(problem.courses()[1].sections, vec![1, 2]);
    }
}
