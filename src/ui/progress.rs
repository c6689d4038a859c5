use crate::trim_job::{JobOutcome, ProgressReport, TrimEvent, UnitState};
use colored::Colorize;
use std::io::{self, Write};

/// What one grid cell currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Pending,
    Processing,
    Processed,
    Blocked,
}

impl CellState {
    fn glyph(self) -> &'static str {
        match self {
            CellState::Pending => "·",
            CellState::Processing => "▒",
            CellState::Processed => "█",
            CellState::Blocked => "X",
        }
    }

    fn painted(self) -> String {
        let glyph = self.glyph();
        match self {
            CellState::Pending => glyph.bright_black().to_string(),
            CellState::Processing => glyph.yellow().bold().to_string(),
            CellState::Processed => glyph.green().to_string(),
            CellState::Blocked => glyph.red().bold().to_string(),
        }
    }
}

impl From<UnitState> for CellState {
    fn from(state: UnitState) -> Self {
        match state {
            UnitState::Processing => CellState::Processing,
            UnitState::Processed => CellState::Processed,
            UnitState::Blocked => CellState::Blocked,
        }
    }
}

/// Text rendition of the progress grid: `rows` x `columns` cells plus a
/// status line, redrawn in place.
pub struct GridRenderer {
    rows: usize,
    columns: usize,
    cells: Vec<CellState>,
    report: Option<ProgressReport>,
    outcome: Option<JobOutcome>,
    color: bool,
    first_render: bool,
}

impl GridRenderer {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            cells: vec![CellState::Pending; rows.saturating_mul(columns)],
            report: None,
            outcome: None,
            color: true,
            first_render: true,
        }
    }

    /// Plain glyphs only, no ANSI styling
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn cell(&self, index: usize) -> Option<CellState> {
        self.cells.get(index).copied()
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.as_ref()
    }

    /// Fold one event into the grid state
    pub fn apply(&mut self, event: &TrimEvent) {
        match event {
            TrimEvent::UnitState { cells, state, .. } => {
                let end = cells.end.min(self.cells.len());
                let start = cells.start.min(end);
                for cell in &mut self.cells[start..end] {
                    *cell = CellState::from(*state);
                }
            }
            TrimEvent::Progress(report) => self.report = Some(report.clone()),
            TrimEvent::Finished(outcome) => self.outcome = Some(outcome.clone()),
        }
    }

    pub fn grid_lines(&self) -> Vec<String> {
        self.cells
            .chunks(self.columns.max(1))
            .take(self.rows)
            .map(|row| {
                row.iter()
                    .map(|c| {
                        if self.color {
                            c.painted()
                        } else {
                            c.glyph().to_string()
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// "[bar] pct  done/total units  @ speed/s  ETA m:ss", with "--" for
    /// figures that are not known yet
    pub fn status_line(&self) -> String {
        let (completed, total, pct) = match &self.report {
            Some(r) => (r.completed, r.total, r.percent()),
            None => (0, 0, 0.0),
        };

        let width = self.columns.max(1);
        let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
        let bar = format!(
            "{}{}",
            "█".repeat(filled),
            "░".repeat(width.saturating_sub(filled))
        );

        let speed = self
            .report
            .as_ref()
            .and_then(|r| r.throughput_bps)
            .map(|bps| format!("{}/s", human_bytes(bps)))
            .unwrap_or_else(|| "--".to_string());
        let eta = self
            .report
            .as_ref()
            .and_then(|r| r.eta)
            .map(|eta| format_duration(eta.as_secs()))
            .unwrap_or_else(|| "--".to_string());

        format!(
            "[{}] {:.1}%  {}/{} units  @ {}  ETA {}",
            bar, pct, completed, total, speed, eta
        )
    }

    /// Draw the grid and status line, overwriting the previous frame
    pub fn render<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let lines = self.grid_lines();

        if self.first_render {
            self.first_render = false;
        } else {
            // Up over the grid and the status line
            write!(out, "\x1b[{}A", lines.len() + 1)?;
        }

        for line in &lines {
            writeln!(out, "\x1b[2K\r{}", line)?;
        }
        writeln!(out, "\x1b[2K\r{}", self.status_line())?;
        out.flush()
    }
}

/// Convert bytes/sec to readable string
pub fn human_bytes(bps: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if bps <= 0.0 || bps.is_nan() {
        return "0B".to_string();
    }
    let mut val = bps;
    let mut i = 0usize;
    while val >= 1024.0 && i + 1 < units.len() {
        val /= 1024.0;
        i += 1;
    }
    format!("{:.2}{}", val, units[i])
}

/// Format seconds to H:MM:SS or M:SS
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
