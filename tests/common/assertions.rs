#![allow(dead_code)]
/// Assertions over a job's event stream
use anyhow::{ensure, Result};
use lbatrim::{JobOutcome, TrimEvent, UnitState};

/// Drain a receiver from synchronous test code
pub fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<TrimEvent>) -> Vec<TrimEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.blocking_recv() {
        events.push(event);
    }
    events
}

/// Resolved (Processed or Blocked) unit events, in order
pub fn resolved_units(events: &[TrimEvent]) -> Vec<(usize, UnitState)> {
    events
        .iter()
        .filter_map(|event| match event {
            TrimEvent::UnitState { unit, state, .. } if *state != UnitState::Processing => {
                Some((*unit, *state))
            }
            _ => None,
        })
        .collect()
}

/// Exactly one Finished event, and it is the last one
pub fn assert_single_terminal(events: &[TrimEvent]) -> Result<JobOutcome> {
    let terminal = events.iter().filter(|e| e.is_terminal()).count();
    ensure!(terminal == 1, "expected one terminal event, found {}", terminal);

    match events.last() {
        Some(TrimEvent::Finished(outcome)) => Ok(outcome.clone()),
        other => anyhow::bail!("terminal event is not last: {:?}", other),
    }
}

/// Unit numbers never go backwards and every Processing is resolved before
/// the next unit starts
pub fn assert_units_ordered(events: &[TrimEvent]) -> Result<()> {
    let mut open: Option<usize> = None;
    let mut last_resolved: Option<usize> = None;

    for event in events {
        if let TrimEvent::UnitState { unit, state, .. } = event {
            match state {
                UnitState::Processing => {
                    ensure!(open.is_none(), "unit {} started while {:?} open", unit, open);
                    if let Some(prev) = last_resolved {
                        ensure!(*unit > prev, "unit {} after {}", unit, prev);
                    }
                    open = Some(*unit);
                }
                UnitState::Processed | UnitState::Blocked => {
                    ensure!(open == Some(*unit), "unit {} resolved but {:?} open", unit, open);
                    open = None;
                    last_resolved = Some(*unit);
                }
            }
        }
    }
    Ok(())
}
