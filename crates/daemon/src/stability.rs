use std::path::Path;
use std::time::Duration;
use log::{debug, info};

/// Counts consecutive size samples that are identical and non-zero.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    required: u32,
    previous: u64,
    stable_count: u32,
}

impl StabilityTracker {
    pub fn new(required: u32) -> Self {
        Self { required, previous: 0, stable_count: 0 }
    }

    /// Record one size sample (`None` when the file could not be read).
    /// Returns true once enough consecutive stable samples have been seen.
    pub fn observe(&mut self, size: Option<u64>) -> bool {
        match size {
            Some(size) if size == self.previous && size > 0 => {
                self.stable_count += 1;
            }
            Some(size) => {
                self.stable_count = 0;
                self.previous = size;
            }
            None => {
                self.stable_count = 0;
            }
        }
        self.is_stable()
    }

    pub fn is_stable(&self) -> bool {
        self.stable_count >= self.required
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }
}

/// Block until the file's size has stayed the same (and non-zero) for
/// `required` consecutive samples taken `interval` apart.
///
/// Never fails and never times out: an unreadable file just resets the count.
/// Returns the final observed size.
pub async fn wait_until_stable(path: &Path, interval: Duration, required: u32) -> u64 {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    info!("Waiting for file to stabilize: {}", name);

    let mut tracker = StabilityTracker::new(required);
    loop {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                debug!("Could not stat {} while waiting: {}", path.display(), e);
                None
            }
        };

        if tracker.observe(size) {
            info!("File stabilized: {} ({} bytes)", name, tracker.previous);
            return tracker.previous;
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_constant_size_needs_required_plus_first_sample() {
        let mut tracker = StabilityTracker::new(3);
        // First sample only establishes the baseline
        assert!(!tracker.observe(Some(100)));
        assert!(!tracker.observe(Some(100)));
        assert!(!tracker.observe(Some(100)));
        assert!(tracker.observe(Some(100)));
    }

    #[test]
    fn test_change_resets_count() {
        let mut tracker = StabilityTracker::new(2);
        tracker.observe(Some(10));
        tracker.observe(Some(10));
        assert_eq!(tracker.stable_count(), 1);
        assert!(!tracker.observe(Some(20)));
        assert_eq!(tracker.stable_count(), 0);
        assert!(!tracker.observe(Some(20)));
        assert!(tracker.observe(Some(20)));
    }

    #[test]
    fn test_read_failure_resets_count() {
        let mut tracker = StabilityTracker::new(2);
        tracker.observe(Some(10));
        tracker.observe(Some(10));
        assert!(!tracker.observe(None));
        assert_eq!(tracker.stable_count(), 0);
        // Same size as before the failure counts again immediately
        assert!(!tracker.observe(Some(10)));
        assert!(tracker.observe(Some(10)));
    }

    #[test]
    fn test_zero_size_never_stable() {
        let mut tracker = StabilityTracker::new(1);
        for _ in 0..10 {
            assert!(!tracker.observe(Some(0)));
        }
    }

    proptest! {
        /// After a size change on sample k, at least `required` further constant samples are needed.
        #[test]
        fn prop_change_requires_full_window(required in 1u32..6, before in 0usize..6, a in 1u64..1000, b in 1u64..1000) {
            prop_assume!(a != b);
            let mut tracker = StabilityTracker::new(required);
            for _ in 0..before {
                if tracker.observe(Some(a)) {
                    return Ok(());
                }
            }
            tracker.observe(Some(b));
            for _ in 0..required - 1 {
                prop_assert!(!tracker.observe(Some(b)));
            }
            prop_assert!(tracker.observe(Some(b)));
        }
    }

    #[tokio::test]
    async fn test_wait_returns_for_quiescent_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mkv");
        std::fs::write(&path, b"0123456789").unwrap();

        let size = tokio::time::timeout(
            Duration::from_secs(5),
            wait_until_stable(&path, Duration::from_millis(10), 3),
        )
        .await
        .expect("stable file should not block");
        assert_eq!(size, 10);
    }

    #[tokio::test]
    async fn test_wait_tolerates_late_arrival() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.mkv");
        let writer_path = path.clone();

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(&writer_path, b"abc").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            tokio::fs::write(&writer_path, b"abcdef").await.unwrap();
        });

        let size = tokio::time::timeout(
            Duration::from_secs(5),
            wait_until_stable(&path, Duration::from_millis(50), 3),
        )
        .await
        .expect("file should eventually stabilize");
        writer.await.unwrap();
        assert_eq!(size, 6);
    }
}
