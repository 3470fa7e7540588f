//! Progress notifications for batch runs.
//!
//! Observers are handed to the [`WorkerPool`](crate::WorkerPool) and called once
//! per finished job. They may be invoked from several worker threads at once.

use std::io::Write;
use std::sync::Mutex;

/// Receives `(completed, total)` after every finished job.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total);
    }
}

/// Ignores all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Logs every notification at info level.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        log::info!("{}: {completed}/{total}", self.label);
    }
}

/// Renders the classic GDAL terminal meter: `0...10...20...30 ... 100 - done.`
///
/// A number is printed at each multiple of ten percent and a dot at the 2, 5 and 8
/// percent steps between them. Nothing is printed twice when notifications skip
/// ahead or arrive out of order.
pub struct GdalStyleProgress<W: Write + Send> {
    state: Mutex<MeterState<W>>,
}

struct MeterState<W> {
    out: W,
    /// Highest percentage already rendered, or `None` before the first call.
    rendered: Option<u32>,
}

impl<W: Write + Send> GdalStyleProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(MeterState {
                out,
                rendered: None,
            }),
        }
    }

    /// Returns the writer, e.g. to inspect a buffer.
    pub fn into_inner(self) -> W {
        // A poisoned meter only means a previous write panicked mid-line.
        self.state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .out
    }
}

impl GdalStyleProgress<std::io::Stderr> {
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

fn marker(percent: u32) -> Option<String> {
    if percent % 10 == 0 {
        Some(percent.to_string())
    } else if matches!(percent % 10, 2 | 5 | 8) {
        Some(".".to_string())
    } else {
        None
    }
}

impl<W: Write + Send> ProgressObserver for GdalStyleProgress<W> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_progress(&self, completed: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            ((completed.min(total) * 100) / total) as u32
        };

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let start = state.rendered.map_or(0, |p| p + 1);
        if start > percent {
            return;
        }
        let mut line = String::new();
        for step in start..=percent {
            if let Some(mark) = marker(step) {
                line.push_str(&mark);
            }
        }
        if percent == 100 {
            line.push_str(" - done.\n");
        }
        state.rendered = Some(percent);
        // Progress output is best effort.
        let _ = state.out.write_all(line.as_bytes());
        let _ = state.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn render(steps: &[(usize, usize)]) -> String {
        let meter = GdalStyleProgress::new(Vec::new());
        for &(completed, total) in steps {
            meter.on_progress(completed, total);
        }
        String::from_utf8(meter.into_inner()).unwrap()
    }

    #[test]
    fn test_full_meter() {
        let steps: Vec<_> = (1..=10).map(|i| (i, 10)).collect();
        assert_eq!(
            render(&steps),
            "0...10...20...30...40...50...60...70...80...90...100 - done.\n"
        );
    }

    #[test]
    fn test_meter_skips_ahead_without_repeating() {
        assert_eq!(render(&[(1, 4), (1, 4), (2, 4)]), "0...10...20...30...40...50");
        assert_eq!(render(&[(3, 4), (1, 4)]), "0...10...20...30...40...50...60...70..");
    }

    #[test]
    fn test_empty_batch_is_done() {
        assert_eq!(
            render(&[(0, 0)]),
            "0...10...20...30...40...50...60...70...80...90...100 - done.\n"
        );
    }

    #[test]
    fn test_closure_observer() {
        let calls = AtomicUsize::new(0);
        let observer = |completed: usize, _total: usize| {
            calls.fetch_max(completed, Ordering::SeqCst);
        };
        observer.on_progress(3, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
