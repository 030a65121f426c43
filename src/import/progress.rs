//! Byte-level progress observation
//!
//! [`CountingReader`] decorates the input source and counts the bytes pulled
//! through it. The count is exposed as a [`ByteCounter`] that observers read
//! on their own schedule; nothing here feeds back into the pipeline.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, read-only view of the bytes consumed from a stream
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    /// Bytes consumed so far
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Reader decorator counting consumed bytes
pub struct CountingReader<R> {
    inner: R,
    consumed: ByteCounter,
}

impl<R: Read> CountingReader<R> {
    /// Wrap a source
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: ByteCounter::default(),
        }
    }

    /// Handle for observers
    pub fn counter(&self) -> ByteCounter {
        self.consumed.clone()
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.0.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[cfg(feature = "progress")]
pub use reporter::ProgressReporter;

#[cfg(feature = "progress")]
mod reporter {
    use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;
    use std::time::Duration;

    use super::ByteCounter;

    const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

    /// Progress bar redrawn on a timer from a [`ByteCounter`]
    ///
    /// Shows a bar when the total input size is known and a spinner otherwise.
    pub struct ProgressReporter {
        bar: ProgressBar,
        counter: ByteCounter,
        stop: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl ProgressReporter {
        /// Start observing `counter`
        pub fn start(counter: ByteCounter, total: Option<u64>, visible: bool) -> Self {
            let bar = match total {
                Some(total) => {
                    let bar = ProgressBar::new(total);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} [{elapsed_precise}] {bytes} read ({bytes_per_sec})")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    bar
                }
            };
            if !visible {
                bar.set_draw_target(ProgressDrawTarget::hidden());
            }

            let stop = Arc::new(AtomicBool::new(false));
            let handle = {
                let bar = bar.clone();
                let counter = counter.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        bar.set_position(counter.get());
                        bar.tick();
                        std::thread::sleep(REDRAW_INTERVAL);
                    }
                })
            };

            Self {
                bar,
                counter,
                stop,
                handle: Some(handle),
            }
        }

        /// Last observed position
        pub fn position(&self) -> u64 {
            self.bar.position()
        }

        pub(super) fn stop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            self.bar.set_position(self.counter.get());
        }

        /// Stop redrawing and leave the bar complete
        pub fn finish(mut self) {
            self.stop();
            self.bar.finish();
        }

        /// Stop redrawing and leave the bar where it stopped
        pub fn abandon(mut self) {
            self.stop();
            self.bar.abandon();
        }
    }

    impl Drop for ProgressReporter {
        fn drop(&mut self) {
            if self.handle.is_some() {
                self.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Cursor};

    #[test]
    fn test_counts_bytes_through_buffer() {
        let reader = CountingReader::new(Cursor::new(b"{\"a\":1}\n{\"b\":2}\n".to_vec()));
        let counter = reader.counter();
        let mut buffered = BufReader::new(reader);

        let mut line = String::new();
        while buffered.read_line(&mut line).unwrap() > 0 {}

        assert_eq!(counter.get(), 16);
    }

    #[test]
    fn test_counter_starts_at_zero() {
        let reader = CountingReader::new(Cursor::new(vec![1u8; 10]));
        assert_eq!(reader.counter().get(), 0);
    }

    #[cfg(feature = "progress")]
    #[test]
    fn test_reporter_tracks_counter() {
        let mut reader = CountingReader::new(Cursor::new(vec![0u8; 4096]));
        let reporter = ProgressReporter::start(reader.counter(), Some(4096), false);

        let mut sink = Vec::new();
        std::io::copy(&mut reader, &mut sink).unwrap();

        let counter = reader.counter();
        assert_eq!(counter.get(), 4096);
        reporter.finish();
    }

    #[cfg(feature = "progress")]
    #[test]
    fn test_reporter_position_after_stop() {
        let mut reader = CountingReader::new(Cursor::new(vec![0u8; 100]));
        let mut reporter = ProgressReporter::start(reader.counter(), None, false);

        let mut sink = Vec::new();
        std::io::copy(&mut reader, &mut sink).unwrap();
        reporter.stop();

        assert_eq!(reporter.position(), 100);
    }
}
