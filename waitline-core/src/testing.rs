//! Recording host used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::entrant::EntrantId;
use crate::host::{BackendTarget, ConnectCallback, ConnectResult, Host, Notice};

/// Host that records notices and holds connect callbacks until completed
pub(crate) struct RecordingHost {
    capacity: AtomicUsize,
    occupancy: AtomicUsize,
    connect_calls: AtomicUsize,
    notices: Mutex<Vec<(String, Notice)>>,
    pending: Mutex<Vec<(EntrantId, ConnectCallback)>>,
    capabilities: Mutex<HashMap<String, Vec<String>>>,
}

impl RecordingHost {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity),
            occupancy: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            notices: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            capabilities: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_occupancy(&self, live: usize) {
        self.occupancy.store(live, Ordering::SeqCst);
    }

    pub(crate) fn grant(&self, entrant: &str, flag: &str) {
        self.capabilities
            .lock()
            .unwrap()
            .entry(entrant.to_lowercase())
            .or_default()
            .push(flag.to_string());
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn notices_for(&self, entrant: &str) -> Vec<Notice> {
        let key = entrant.to_lowercase();
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(who, _)| *who == key)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    /// Complete the oldest outstanding connect attempt
    pub(crate) fn complete_next(&self, result: ConnectResult) -> EntrantId {
        let (id, done) = self.pending.lock().unwrap().remove(0);
        done(result);
        id
    }
}

impl Host for RecordingHost {
    fn capacity_of(&self, _target: &BackendTarget) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    fn live_occupancy(&self, _target: &BackendTarget) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }

    fn notify(&self, entrant: &EntrantId, notice: Notice) {
        self.notices
            .lock()
            .unwrap()
            .push((entrant.key().to_string(), notice));
    }

    fn has_capability(&self, entrant: &EntrantId, flag: &str) -> bool {
        self.capabilities
            .lock()
            .unwrap()
            .get(entrant.key())
            .is_some_and(|flags| flags.iter().any(|f| f == flag))
    }

    fn connect(&self, entrant: &EntrantId, _target: &BackendTarget, done: ConnectCallback) {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().push((entrant.clone(), done));
    }
}
