//! Progress reporting for extraction calls.
//!
//! Observers implement `ProgressSink`. The pipeline never talks to a sink
//! directly: every value goes through a `ProgressTracker`, which clamps,
//! rounds, and drops anything that would not move the bar forward.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

/// What the pipeline was doing when a progress value was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressStage {
    PlainText,
    /// 1-based page of `total`.
    TextLayer { page: usize, total: usize },
    Recognizing { page: usize, total: usize },
    ImageOcr,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    /// 0..=100, never lower than the previous event of the same call.
    pub percent: u8,
}

/// Receives progress events from an extraction call.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Forwards events into a tokio channel, so a UI task can consume them as
/// a stream while extraction runs on a blocking thread.
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        // Receiver gone means nobody is watching; extraction carries on.
        let _ = self.tx.send(*event);
    }
}

/// Fan-out to several observers, in registration order.
#[derive(Default, Clone)]
pub struct ProgressObservers {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for ProgressObservers {
    fn on_progress(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            sink.on_progress(event);
        }
    }
}

/// Collects every event it receives.
#[derive(Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(*event);
        }
    }
}

/// Per-call guard that turns raw fractions into monotonic percentages.
pub struct ProgressTracker<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink, last: None }
    }

    /// Report completion as a fraction of the whole call, in [0, 1].
    pub fn report_fraction(&mut self, stage: ProgressStage, fraction: f64) {
        self.report_percent(stage, fraction * 100.0);
    }

    /// Report an unrounded percentage. Values are clamped to [0, 100] and
    /// dropped unless they exceed the last emitted value.
    pub fn report_percent(&mut self, stage: ProgressStage, percent: f64) {
        let percent = if percent.is_finite() {
            percent.round().clamp(0.0, 100.0) as u8
        } else {
            return;
        };

        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);

        if let Some(sink) = self.sink {
            sink.on_progress(&ProgressEvent { stage, percent });
        }
    }

    /// Emit 100 unless it has already been emitted.
    pub fn complete(&mut self) {
        self.report_percent(ProgressStage::Complete, 100.0);
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_rounds_and_clamps() {
        let sink = RecordingProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::ImageOcr, 12.4);
        tracker.report_percent(ProgressStage::ImageOcr, 49.5);
        tracker.report_percent(ProgressStage::ImageOcr, 250.0);
        assert_eq!(sink.percents(), vec![12, 50, 100]);
    }

    #[test]
    fn tracker_drops_regressions_and_repeats() {
        let sink = RecordingProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::ImageOcr, 30.0);
        tracker.report_percent(ProgressStage::ImageOcr, 20.0);
        tracker.report_percent(ProgressStage::ImageOcr, 30.0);
        tracker.report_percent(ProgressStage::ImageOcr, 31.0);
        assert_eq!(sink.percents(), vec![30, 31]);
    }

    #[test]
    fn tracker_emits_first_zero() {
        let sink = RecordingProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::ImageOcr, 0.0);
        assert_eq!(sink.percents(), vec![0]);
    }

    #[test]
    fn tracker_ignores_nan() {
        let sink = RecordingProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::ImageOcr, f64::NAN);
        assert!(sink.events().is_empty());
        assert!(tracker.last_percent().is_none());
    }

    #[test]
    fn complete_emits_hundred_once() {
        let sink = RecordingProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_fraction(ProgressStage::PlainText, 1.0);
        tracker.complete();
        tracker.complete();
        assert_eq!(sink.percents(), vec![100]);
    }

    #[test]
    fn tracker_without_sink_still_tracks() {
        let mut tracker = ProgressTracker::new(None);
        tracker.report_fraction(ProgressStage::ImageOcr, 0.5);
        assert_eq!(tracker.last_percent(), Some(50));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &ProgressEvent| seen.lock().unwrap().push(event.percent);
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::ImageOcr, 42.0);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[test]
    fn observers_fan_out_in_order() {
        let first = Arc::new(RecordingProgressSink::new());
        let second = Arc::new(RecordingProgressSink::new());
        let observers = ProgressObservers::new()
            .with(first.clone())
            .with(second.clone());
        assert_eq!(observers.len(), 2);

        let mut tracker = ProgressTracker::new(Some(&observers));
        tracker.report_percent(ProgressStage::ImageOcr, 10.0);
        tracker.complete();

        assert_eq!(first.percents(), vec![10, 100]);
        assert_eq!(second.percents(), vec![10, 100]);
    }

    #[test]
    fn channel_sink_delivers_events() {
        let (sink, mut rx) = ChannelProgressSink::new();
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report_percent(ProgressStage::TextLayer { page: 1, total: 2 }, 50.0);
        tracker.complete();
        drop(tracker);
        drop(sink);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.percent, 50);
        assert_eq!(first.stage, ProgressStage::TextLayer { page: 1, total: 2 });
        assert_eq!(rx.try_recv().unwrap().stage, ProgressStage::Complete);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelProgressSink::new();
        drop(rx);
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.complete();
        assert_eq!(tracker.last_percent(), Some(100));
    }

    #[test]
    fn event_serializes_with_stage_tag() {
        let event = ProgressEvent {
            stage: ProgressStage::Recognizing { page: 2, total: 3 },
            percent: 55,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["percent"], 55);
        assert_eq!(json["stage"]["kind"], "recognizing");
        assert_eq!(json["stage"]["page"], 2);
        assert_eq!(json["stage"]["total"], 3);
    }
}
