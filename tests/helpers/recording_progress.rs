// ==========================================
// 记录型进度接收方 - 用于集成测试
// ==========================================

use marketplace_ledger_import::importer::{ProgressReporter, ProgressUpdate};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.updates().iter().map(|u| u.percent).collect()
    }

    pub fn hundred_count(&self) -> usize {
        self.percents().iter().filter(|p| **p == 100).count()
    }

    pub fn is_monotonic(&self) -> bool {
        self.percents().windows(2).all(|w| w[0] <= w[1])
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
