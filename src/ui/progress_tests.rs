// Tests for the progress grid renderer
//
// Tests cover: event folding into cells, shared cells, status line formatting
// with unknown figures, in-place redraw, human_bytes and duration formatting.

use super::progress::*;
use crate::trim_job::{ChunkPlan, JobOutcome, ProgressReport, TrimEvent, UnitState};
use std::time::Duration;

fn unit_event(plan: &ChunkPlan, unit: usize, state: UnitState) -> TrimEvent {
    TrimEvent::UnitState {
        unit,
        cells: plan.map(unit),
        state,
    }
}

// ==================== GRID STATE TESTS ====================

#[test]
fn test_new_grid_is_pending() {
    let grid = GridRenderer::new(20, 30).with_color(false);
    assert_eq!(grid.cell(0), Some(CellState::Pending));
    assert_eq!(grid.cell(599), Some(CellState::Pending));
    assert_eq!(grid.cell(600), None);
    assert_eq!(grid.grid_lines().len(), 20);
    assert_eq!(grid.grid_lines()[0], "·".repeat(30));
}

#[test]
fn test_unit_events_paint_their_cells() {
    let plan = ChunkPlan::new(4, 10).unwrap();
    let mut grid = GridRenderer::new(2, 5).with_color(false);

    grid.apply(&unit_event(&plan, 0, UnitState::Processing));
    grid.apply(&unit_event(&plan, 0, UnitState::Processed));
    grid.apply(&unit_event(&plan, 1, UnitState::Processing));
    grid.apply(&unit_event(&plan, 1, UnitState::Blocked));
    grid.apply(&unit_event(&plan, 2, UnitState::Processing));

    assert_eq!(grid.grid_lines(), vec!["██XXX", "▒▒···"]);
}

#[test]
fn test_shared_cell_shows_latest_unit() {
    let plan = ChunkPlan::new(100, 30).unwrap();
    let mut grid = GridRenderer::new(1, 30).with_color(false);

    grid.apply(&unit_event(&plan, 2, UnitState::Blocked));
    assert_eq!(grid.cell(0), Some(CellState::Blocked));
    grid.apply(&unit_event(&plan, 3, UnitState::Processed));
    assert_eq!(grid.cell(0), Some(CellState::Processed));
}

#[test]
fn test_out_of_grid_cells_are_ignored() {
    let mut grid = GridRenderer::new(1, 4).with_color(false);
    grid.apply(&TrimEvent::UnitState {
        unit: 0,
        cells: 2..10,
        state: UnitState::Processed,
    });
    assert_eq!(grid.grid_lines(), vec!["··██"]);
}

#[test]
fn test_finished_event_is_kept() {
    let mut grid = GridRenderer::new(1, 1);
    assert!(grid.outcome().is_none());
    grid.apply(&TrimEvent::Finished(JobOutcome::Cancelled));
    assert_eq!(grid.outcome(), Some(&JobOutcome::Cancelled));
}

// ==================== STATUS LINE TESTS ====================

#[test]
fn test_status_line_before_progress() {
    let grid = GridRenderer::new(1, 10).with_color(false);
    assert_eq!(
        grid.status_line(),
        "[░░░░░░░░░░] 0.0%  0/0 units  @ --  ETA --"
    );
}

#[test]
fn test_status_line_with_unknown_rate() {
    let mut grid = GridRenderer::new(1, 10).with_color(false);
    grid.apply(&TrimEvent::Progress(ProgressReport {
        completed: 1,
        total: 4,
        throughput_bps: None,
        eta: None,
    }));
    assert!(grid.status_line().ends_with("25.0%  1/4 units  @ --  ETA --"));
}

#[test]
fn test_status_line_with_rate() {
    let mut grid = GridRenderer::new(1, 10).with_color(false);
    grid.apply(&TrimEvent::Progress(ProgressReport {
        completed: 50,
        total: 100,
        throughput_bps: Some(3.5 * 1024.0 * 1024.0 * 1024.0),
        eta: Some(Duration::from_secs(125)),
    }));
    assert_eq!(
        grid.status_line(),
        "[█████░░░░░] 50.0%  50/100 units  @ 3.50GB/s  ETA 2:05"
    );
}

// ==================== RENDER TESTS ====================

#[test]
fn test_render_redraws_in_place() {
    let mut grid = GridRenderer::new(2, 3).with_color(false);
    let mut out = Vec::new();

    grid.render(&mut out).unwrap();
    let first = String::from_utf8(out.clone()).unwrap();
    assert!(!first.contains("\x1b[3A"));
    assert_eq!(first.lines().count(), 3);

    out.clear();
    grid.render(&mut out).unwrap();
    let second = String::from_utf8(out).unwrap();
    assert!(second.starts_with("\x1b[3A"));
}

// ==================== HUMAN BYTES CONVERSION TESTS ====================

#[test]
fn test_human_bytes_zero() {
    assert_eq!(human_bytes(0.0), "0B");
}

#[test]
fn test_human_bytes_negative() {
    assert_eq!(human_bytes(-100.0), "0B", "Negative values should return 0B");
}

#[test]
fn test_human_bytes_nan() {
    assert_eq!(human_bytes(f64::NAN), "0B");
}

#[test]
fn test_human_bytes_bytes() {
    assert_eq!(human_bytes(512.0), "512.00B");
    assert_eq!(human_bytes(1023.0), "1023.00B");
}

#[test]
fn test_human_bytes_kilobytes() {
    assert_eq!(human_bytes(1024.0), "1.00KB");
    assert_eq!(human_bytes(1536.0), "1.50KB");
}

#[test]
fn test_human_bytes_megabytes() {
    assert_eq!(human_bytes(2.5 * 1024.0 * 1024.0), "2.50MB");
}

#[test]
fn test_human_bytes_real_world_nvme_trim_rate() {
    // Discards run far faster than writes; tens of GB/s is normal
    assert_eq!(human_bytes(40.0 * 1024.0 * 1024.0 * 1024.0), "40.00GB");
}

#[test]
fn test_human_bytes_terabytes_cap() {
    assert_eq!(human_bytes(2.25 * 1024.0 * 1024.0 * 1024.0 * 1024.0), "2.25TB");
    assert_eq!(
        human_bytes(2048.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        "2048.00TB"
    );
}

// ==================== DURATION FORMATTING TESTS ====================

#[test]
fn test_format_duration_zero() {
    assert_eq!(format_duration(0), "0:00");
}

#[test]
fn test_format_duration_minutes_seconds() {
    assert_eq!(format_duration(45), "0:45");
    assert_eq!(format_duration(125), "2:05");
    assert_eq!(format_duration(59 * 60 + 59), "59:59");
}

#[test]
fn test_format_duration_hours() {
    assert_eq!(format_duration(3600), "1:00:00");
    assert_eq!(format_duration(3661), "1:01:01");
    assert_eq!(format_duration(24 * 3600), "24:00:00");
}
