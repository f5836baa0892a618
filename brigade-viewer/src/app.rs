//! Viewer event loop: merges live messages and store polls into the marker
//! set and drives the renderer one frame at a time.

use brigade_common::{LiveMessage, PositionRecord};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::live::ConnectionState;
use crate::markers::{MarkerSet, Reconciled};
use crate::render::MapRenderer;

#[derive(Debug)]
pub enum ViewerEvent {
    Live(LiveMessage),
    Poll(Vec<PositionRecord>),
    Connection(ConnectionState),
}

pub struct ViewerApp<R: MapRenderer> {
    markers: MarkerSet,
    renderer: R,
    connection: ConnectionState,
}

impl<R: MapRenderer> ViewerApp<R> {
    pub fn new(renderer: R, animation_steps: u32) -> Self {
        Self {
            markers: MarkerSet::new(animation_steps),
            renderer,
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Live(message @ LiveMessage::Snapshot(_)) => {
                let records = message.into_records();
                let outcome = self.markers.apply_snapshot(&records);
                tracing::info!(
                    "Snapshot applied: {} units ({} new, {} removed)",
                    records.len(),
                    outcome.created.len(),
                    outcome.removed.len()
                );
                for unit_id in &outcome.removed {
                    self.renderer.remove(unit_id);
                }
                for unit_id in &outcome.created {
                    self.place(unit_id);
                }
            }
            ViewerEvent::Live(message) => self.apply_records(message.into_records()),
            ViewerEvent::Poll(records) => self.apply_records(records),
            ViewerEvent::Connection(state) => {
                if state != self.connection {
                    tracing::info!("Live channel {:?}", state);
                }
                self.connection = state;
            }
        }
    }

    fn apply_records(&mut self, records: Vec<PositionRecord>) {
        for record in &records {
            match self.markers.apply(record) {
                Reconciled::Created => self.place(&record.unit_id),
                Reconciled::Stale => {
                    tracing::trace!("Dropped stale record for {}", record.unit_id)
                }
                Reconciled::Moved | Reconciled::Unchanged => {}
            }
        }
    }

    fn place(&mut self, unit_id: &str) {
        if let Some(marker) = self.markers.get(unit_id) {
            self.renderer.place(unit_id, marker.rendered, &marker.meta);
        }
    }

    /// Advance animations by one frame and push moved markers to the renderer.
    pub fn frame(&mut self) -> usize {
        let moved = self.markers.step();
        for (unit_id, position) in &moved {
            self.renderer.move_marker(unit_id, *position);
        }
        moved.len()
    }

    /// Run until every event sender is dropped.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ViewerEvent>, frame_interval: Duration) {
        let mut ticker = tokio::time::interval(frame_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.frame();
                }
            }
        }
        tracing::info!("Viewer event loop stopped");
    }
}
