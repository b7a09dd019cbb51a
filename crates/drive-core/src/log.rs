use contracts::TriggerEvent;

/// Append-only history of trigger fires, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerLog {
    events: Vec<TriggerEvent>,
}

impl TriggerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TriggerEvent>) -> Self {
        Self { events }
    }

    pub fn append(&mut self, event: TriggerEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    /// Last `n` events, still oldest first.
    pub fn tail(&self, n: usize) -> &[TriggerEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    pub fn last_for(&self, drive_name: &str) -> Option<&TriggerEvent> {
        self.events
            .iter()
            .rev()
            .find(|event| event.drive_name == drive_name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<TriggerEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contracts::{Band, Drive};

    fn event(name: &str, hour: u32) -> TriggerEvent {
        let drive = Drive {
            name: name.to_string(),
            description: String::new(),
            pressure: 21.0,
            threshold: 20.0,
            gain_rate: 1.0,
            decay_rate: 0.5,
            last_tick_at: None,
            last_triggered_at: None,
        };
        TriggerEvent::new(
            &drive,
            Band::Triggered,
            Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn append_preserves_arrival_order() {
        let mut log = TriggerLog::new();
        log.append(event("alpha", 9));
        log.append(event("beta", 10));
        log.append(event("alpha", 11));

        let names: Vec<&str> = log.events().iter().map(|e| e.drive_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "alpha"]);
    }

    #[test]
    fn tail_returns_most_recent_in_order() {
        let mut log = TriggerLog::new();
        for hour in 8..12 {
            log.append(event("alpha", hour));
        }

        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].fired_at.to_rfc3339(), "2026-03-01T10:00:00+00:00");
        assert_eq!(tail[1].fired_at.to_rfc3339(), "2026-03-01T11:00:00+00:00");

        assert_eq!(log.tail(100).len(), 4);
    }

    #[test]
    fn last_for_finds_latest_event_per_drive() {
        let mut log = TriggerLog::new();
        log.append(event("alpha", 9));
        log.append(event("beta", 10));
        log.append(event("alpha", 11));

        let latest = log.last_for("alpha").unwrap();
        assert_eq!(latest.fired_at.to_rfc3339(), "2026-03-01T11:00:00+00:00");
        assert!(log.last_for("gamma").is_none());
    }
}
