//! Word-highlight cursor driven by the audio clock.
//!
//! The synthesis script writes a timing table next to each clip; the
//! [`CursorTracker`] samples an [`AudioClock`] and resolves the position
//! against that table, publishing the word index only when it changes.

mod clock;
mod timing;
mod tracker;

pub use clock::{AudioClock, WallClock};
pub use timing::{TimedWord, index_for_time, is_well_formed, load_timings, parse_timings};
pub use tracker::{CursorTracker, DEFAULT_POLL_INTERVAL};

#[cfg(test)]
mod tests {
    use super::clock::MockAudioClock;
    use super::*;
    use crate::error::RunnerError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    fn adjacent() -> Vec<TimedWord> {
        vec![
            TimedWord::new("Hello", 0.0, 0.5),
            TimedWord::new("world", 0.5, 1.0),
        ]
    }

    fn with_gap() -> Vec<TimedWord> {
        vec![
            TimedWord::new("Hello", 0.0, 0.4),
            TimedWord::new("world", 0.6, 1.0),
        ]
    }

    // ===========================================
    // index_for_time
    // ===========================================

    #[test]
    fn test_index_start_is_inclusive() {
        let table = adjacent();
        assert_eq!(index_for_time(0.5, &table), Some(1));
        assert_eq!(index_for_time(0.4999, &table), Some(0));
        assert_eq!(index_for_time(0.0, &table), Some(0));
    }

    #[test]
    fn test_index_end_is_exclusive() {
        let table = adjacent();
        assert_eq!(index_for_time(1.0, &table), None);
        assert_eq!(index_for_time(0.9999, &table), Some(1));
    }

    #[test]
    fn test_index_in_gap_is_none() {
        assert_eq!(index_for_time(0.5, &with_gap()), None);
    }

    #[test]
    fn test_index_before_first_word_is_none() {
        let table = vec![TimedWord::new("late", 0.3, 0.8)];
        assert_eq!(index_for_time(0.1, &table), None);
        assert_eq!(index_for_time(-1.0, &table), None);
    }

    #[test]
    fn test_index_empty_table_is_none() {
        for time in [0.0, 0.5, 10.0, -3.0] {
            assert_eq!(index_for_time(time, &[]), None);
        }
    }

    #[test]
    fn test_index_resolves_within_interval_and_is_idempotent() {
        let table = vec![
            TimedWord::new("a", 0.00, 0.20),
            TimedWord::new("b", 0.25, 0.50),
            TimedWord::new("c", 0.50, 0.90),
            TimedWord::new("d", 1.10, 1.40),
        ];
        assert!(is_well_formed(&table));

        for step in 0..=160 {
            let time = step as f64 * 0.01;
            let first = index_for_time(time, &table);
            assert_eq!(first, index_for_time(time, &table));

            let matches: Vec<usize> = table
                .iter()
                .enumerate()
                .filter(|(_, w)| w.contains(time))
                .map(|(i, _)| i)
                .collect();
            assert!(matches.len() <= 1, "several words contain {time}");
            assert_eq!(first, matches.first().copied());
            if let Some(i) = first {
                assert!(table[i].start <= time && time < table[i].end);
            }
        }
    }

    #[test]
    fn test_index_overlapping_table_uses_first_listed_match() {
        let table = vec![
            TimedWord::new("late", 0.5, 1.0),
            TimedWord::new("early", 0.0, 0.8),
        ];
        assert!(!is_well_formed(&table));
        assert_eq!(index_for_time(0.6, &table), Some(0));
        assert_eq!(index_for_time(0.2, &table), Some(1));
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed(&[]));
        assert!(is_well_formed(&adjacent()));
        assert!(is_well_formed(&with_gap()));
        assert!(!is_well_formed(&[TimedWord::new("backwards", 0.5, 0.2)]));
    }

    // ===========================================
    // Timing file parsing
    // ===========================================

    #[test]
    fn test_timings_json_round_trip() {
        let words = vec![
            TimedWord::new("Hello", 0.0, 0.3125),
            TimedWord::new("there", 0.3125, 0.75),
        ];
        let json = serde_json::to_string(&words).unwrap();
        assert_eq!(parse_timings(&json).unwrap(), words);
    }

    #[test]
    fn test_load_timings_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("speech.json");
        std::fs::write(
            &path,
            r#"[{"word": "Hi", "start": 0.1, "end": 0.4}, {"word": "you", "start": 0.4, "end": 0.9}]"#,
        )
        .unwrap();

        let words = load_timings(&path).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].word, "you");
        assert_eq!(words[1].start, 0.4);
    }

    #[test]
    fn test_load_timings_missing_field_is_error() {
        let result = parse_timings(r#"[{"word": "Hi", "start": 0.1}]"#);
        assert!(matches!(result.unwrap_err(), RunnerError::TimingDecode(_)));
    }

    #[test]
    fn test_load_timings_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_timings(&temp_dir.path().join("absent.json"));
        assert!(matches!(
            result.unwrap_err(),
            RunnerError::MissingOutputArtifact(_)
        ));
    }

    // ===========================================
    // CursorTracker
    // ===========================================

    #[derive(Default)]
    struct ManualClock {
        time: Mutex<f64>,
    }

    impl ManualClock {
        fn set(&self, time: f64) {
            *self.time.lock().unwrap() = time;
        }
    }

    impl AudioClock for ManualClock {
        fn current_time(&self) -> f64 {
            *self.time.lock().unwrap()
        }
    }

    const TICK: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn test_tracker_publishes_only_on_change() {
        let clock = Arc::new(ManualClock::default());
        let tracker = CursorTracker::new(TICK);
        let mut rx = tracker.subscribe();

        clock.set(0.1);
        tracker.start(with_gap(), clock.clone());
        tokio::time::sleep(TICK + TICK / 5).await;
        assert_eq!(*rx.borrow_and_update(), Some(0));

        // Same position for many ticks: nothing new is published.
        tokio::time::sleep(TICK * 6).await;
        assert!(!rx.has_changed().unwrap());

        clock.set(0.5);
        tokio::time::sleep(TICK).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);

        clock.set(0.7);
        tokio::time::sleep(TICK).await;
        assert_eq!(*rx.borrow_and_update(), Some(1));
        assert_eq!(tracker.current_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_stop_clears_state() {
        let clock = Arc::new(ManualClock::default());
        let tracker = CursorTracker::new(TICK);

        clock.set(0.7);
        tracker.start(adjacent(), clock.clone());
        tokio::time::sleep(TICK).await;
        assert_eq!(tracker.current_index(), Some(1));
        assert!(tracker.is_running());

        tracker.stop();
        assert_eq!(tracker.current_index(), None);
        assert!(tracker.table().is_empty());
        assert!(!tracker.is_running());

        let mut rx = tracker.subscribe();
        clock.set(0.1);
        tokio::time::sleep(TICK * 4).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_restart_replaces_table() {
        let clock = Arc::new(ManualClock::default());
        let tracker = CursorTracker::new(TICK);

        clock.set(0.2);
        tracker.start(adjacent(), clock.clone());
        tokio::time::sleep(TICK).await;
        assert_eq!(tracker.current_index(), Some(0));

        let replacement = vec![
            TimedWord::new("one", 0.0, 0.1),
            TimedWord::new("two", 0.1, 0.3),
        ];
        tracker.start(replacement.clone(), clock.clone());
        assert_eq!(&*tracker.table(), replacement.as_slice());

        tokio::time::sleep(TICK).await;
        assert_eq!(tracker.current_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_zero_interval_falls_back_to_default() {
        let clock = Arc::new(ManualClock::default());
        let tracker = CursorTracker::new(Duration::ZERO);
        assert_eq!(tracker.interval(), DEFAULT_POLL_INTERVAL);

        let mut rx = tracker.subscribe();
        clock.set(0.7);
        tracker.start(adjacent(), clock.clone());
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(1));
        assert!(tracker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_samples_mock_clock() {
        let mut clock = MockAudioClock::new();
        clock.expect_current_time().returning(|| 0.75);
        let tracker = CursorTracker::new(TICK);

        tracker.start(adjacent(), Arc::new(clock));
        tokio::time::sleep(TICK).await;
        assert_eq!(tracker.current_index(), Some(1));
        tracker.stop();
    }
}
