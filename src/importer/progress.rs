// ==========================================
// 账单导入管道 - 进度上报
// ==========================================
// 职责: 进度百分比计算与推送
// 口径: 转换阶段 0–50%，写入阶段 50–99%，结束时恰好一次 100%
// ==========================================

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Transform,
    Commit,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub percent: u8,
    pub processed: usize,
    pub total: usize,
}

/// 进度接收方（UI 通道 / 日志 / 丢弃）
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// 丢弃所有进度
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// 推送到 tokio 通道；接收端关闭后静默丢弃
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<ProgressUpdate>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        let _ = self.tx.send(update);
    }
}

/// 写入 debug 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, update: ProgressUpdate) {
        debug!(
            phase = ?update.phase,
            percent = update.percent,
            processed = update.processed,
            total = update.total,
            "导入进度"
        );
    }
}

// ==========================================
// ProgressTracker - 单次运行的进度状态
// ==========================================
// 保证百分比单调不减，100 只发出一次
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    last_percent: Option<u8>,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            last_percent: None,
            finished: false,
        }
    }

    /// 转换阶段：processed/total 映射到 0–50
    pub fn transform(&mut self, processed: usize, total: usize) {
        let percent = scaled(processed, total, 0, 50);
        self.emit(ProgressPhase::Transform, percent, processed, total);
    }

    /// 写入阶段：committed/total 映射到 50–99
    pub fn commit(&mut self, committed: usize, total: usize) {
        let percent = scaled(committed, total, 50, 99);
        self.emit(ProgressPhase::Commit, percent, committed, total);
    }

    /// 结束：发出 100%（重复调用无效果）
    pub fn finish(&mut self, processed: usize, total: usize) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.last_percent = Some(100);
        self.reporter.report(ProgressUpdate {
            phase: ProgressPhase::Finished,
            percent: 100,
            processed,
            total,
        });
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn emit(&mut self, phase: ProgressPhase, percent: u8, processed: usize, total: usize) {
        if self.finished {
            return;
        }
        let percent = match self.last_percent {
            Some(last) => percent.max(last),
            None => percent,
        };
        self.last_percent = Some(percent);
        self.reporter.report(ProgressUpdate {
            phase,
            percent,
            processed,
            total,
        });
    }
}

fn scaled(done: usize, total: usize, from: u8, to: u8) -> u8 {
    if total == 0 {
        return to;
    }
    let ratio = (done.min(total) as f64) / (total as f64);
    let span = (to - from) as f64;
    from + (ratio * span).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressUpdate>>);

    impl ProgressReporter for Recorder {
        fn report(&self, update: ProgressUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    #[test]
    fn test_phases_scale_and_finish_once() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(&recorder);

        tracker.transform(50, 100);
        tracker.transform(100, 100);
        tracker.commit(1, 2);
        tracker.commit(2, 2);
        tracker.finish(100, 100);
        tracker.finish(100, 100);

        let percents: Vec<u8> = recorder.0.lock().unwrap().iter().map(|u| u.percent).collect();
        assert_eq!(percents, vec![25, 50, 74, 99, 100]);
        assert_eq!(percents.iter().filter(|p| **p == 100).count(), 1);
    }

    #[test]
    fn test_percent_is_monotonic() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(&recorder);

        tracker.commit(1, 2);
        tracker.transform(10, 100);

        let updates = recorder.0.lock().unwrap();
        assert_eq!(updates[1].percent, updates[0].percent);
    }

    #[test]
    fn test_zero_total_finishes() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(&recorder);
        tracker.finish(0, 0);
        tracker.commit(0, 0);

        let updates = recorder.0.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].phase, ProgressPhase::Finished);
        assert_eq!(updates[0].percent, 100);
    }

    #[tokio::test]
    async fn test_channel_progress() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ChannelProgress::new(tx);
        let mut tracker = ProgressTracker::new(&reporter);
        tracker.finish(3, 3);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.percent, 100);
        assert_eq!(update.processed, 3);
    }
}
