// src/pipeline/event_bus.rs
//
// Decoupled event system. The orchestrator publishes notable outcomes
// instead of the frame loop reaching into component state.

use crate::types::{ObstacleClass, Severity, Zone};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    ObstacleConfirmed {
        track_id: u64,
        class: ObstacleClass,
        is_static: bool,
    },

    IncidentRaised {
        incident_id: String,
        severity: Severity,
        class: ObstacleClass,
        zone: Zone,
        ttc_seconds: Option<f64>,
    },

    DuplicateSuppressed {
        track_id: u64,
        class: ObstacleClass,
    },
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let mut bus = EventBus::new(8);
        bus.publish(PipelineEvent::ObstacleConfirmed {
            track_id: 1,
            class: ObstacleClass::Human,
            is_static: false,
        });
        assert_eq!(bus.pending_count(), 1);
        assert_eq!(bus.drain().len(), 1);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut bus = EventBus::new(2);
        for id in 0..3 {
            bus.publish(PipelineEvent::DuplicateSuppressed {
                track_id: id,
                class: ObstacleClass::Debris,
            });
        }
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        match &events[0] {
            PipelineEvent::DuplicateSuppressed { track_id, .. } => assert_eq!(*track_id, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
