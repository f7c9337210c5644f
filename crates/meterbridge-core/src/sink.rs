use meterbridge_api::Reading;

use crate::model::{EntityKey, SourceState};

/// Receiver of published readings (the host platform's sensor layer).
///
/// Called once per [`EntityKey`] for every reading the arbitrator
/// publishes, from the arbitrator's poll task. Implementations should
/// return quickly; slow work belongs on a channel.
pub trait ReadingSink: Send + Sync {
    fn update(&self, key: EntityKey, reading: &Reading, source: SourceState);
}

/// Push `reading` to `sink` under every entity key.
pub fn deliver(sink: &dyn ReadingSink, reading: &Reading, source: SourceState) {
    for key in EntityKey::ALL {
        sink.update(key, reading, source);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(EntityKey, SourceState)>>);

    impl ReadingSink for Recorder {
        fn update(&self, key: EntityKey, _reading: &Reading, source: SourceState) {
            self.0.lock().unwrap().push((key, source));
        }
    }

    #[test]
    fn deliver_hits_every_key_once() {
        let sink = Recorder::default();
        let reading = Reading::new(None, 1.0, None, Utc::now()).unwrap();
        deliver(&sink, &reading, SourceState::Web);

        let calls = sink.0.into_inner().unwrap();
        let keys: Vec<_> = calls.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, EntityKey::ALL.to_vec());
        assert!(calls.iter().all(|(_, s)| *s == SourceState::Web));
    }
}
