use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::{SolveRequest, SolveResponse};
use crate::error::{Result, TimetableError};
use crate::evolution::{self, EvolutionConfig};
use crate::schedule::ExamProblem;
use crate::timegrid::{build_time_grid, parse_date, parse_time, parse_weekday};
use crate::timetable::to_timetable;

/// Parses the request, builds the grid and runs the search.
pub fn solve(config: &AppConfig, input: &SolveRequest) -> Result<SolveResponse> {
    let start_date = parse_date(&input.start_date)?;
    let end_date = parse_date(&input.end_date)?;
    let start_time = parse_time(&input.start_time)?;
    let end_time = parse_time(&input.end_time)?;
    let excluded_weekday = match &input.excluded_weekday {
        Some(day) => parse_weekday(day)?,
        None => config.grid.excluded_weekday()?,
    };
    let slot_minutes = input.slot_minutes.unwrap_or(config.grid.slot_minutes);
    if slot_minutes == 0 {
        return Err(TimetableError::InvalidConfig(
            "Slot duration must be at least one minute".to_string(),
        ));
    }

    let defaults = &config.evolution;
    let evolution_config = EvolutionConfig {
        population_size: input.population_size.unwrap_or(defaults.population_size),
        mutation_rate: input.mutation_rate.unwrap_or(defaults.mutation_rate),
        generations: input.generations.unwrap_or(defaults.generations),
        seed: input.seed.or(defaults.seed),
        time_limit_ms: input.time_limit_ms.or(defaults.time_limit_ms),
        ..defaults.clone()
    };
    evolution_config.validate()?;

    let grid = build_time_grid(
        start_date,
        end_date,
        start_time,
        end_time,
        slot_minutes,
        excluded_weekday,
    );
    if grid.is_empty() {
        warn!(
            "Empty time grid ({} dates, {} timeslots); exams cannot be fully placed",
            grid.dates.len(),
            grid.timeslots.len()
        );
    }
    let timeslot_labels = grid.timeslot_labels();

    let problem = if input.enrollments.is_empty() {
        ExamProblem::new(
            input.courses.clone(),
            input.sections.clone(),
            input.rooms.clone(),
            grid.date_keys(),
            timeslot_labels.clone(),
        )
    } else {
        ExamProblem::with_enrollments(
            input
                .enrollments
                .iter()
                .map(|e| (e.course.clone(), e.sections.clone()))
                .collect(),
            input.rooms.clone(),
            grid.date_keys(),
            timeslot_labels.clone(),
        )
    };

    let evolution = evolution::solve(&problem, evolution_config);
    let timetable = to_timetable(&evolution.best, &grid.dates, &timeslot_labels);

    Ok(SolveResponse {
        exams: timetable.exam_rows(),
        timetable,
        fitness: evolution.best.fitness(),
        best_generation: evolution.best_generation,
        generations_run: evolution.generations_run,
        stop_reason: evolution.stop_reason,
    })
}

async fn solve_handler(
    State(config): State<Arc<AppConfig>>,
    Json(input): Json<SolveRequest>,
) -> std::result::Result<Json<SolveResponse>, (StatusCode, String)> {
    // the search is CPU-bound and runs to completion
    let result = tokio::task::spawn_blocking(move || solve(&config, &input))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Solver task failed: {}", e),
            )
        })?;

    match result {
        Ok(output) => Ok(Json(output)),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router(config: AppConfig) -> Router {
    Router::new()
        .route("/v1/exams/solve", post(solve_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(config))
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(config)).await?;
    Ok(())
}
