//! Progress counters for running file operations.
//!
//! The file-operation worker reports [ProgressDelta]s. [Progress::apply] folds them into
//! the counters and decides whether the delta is worth a redraw: byte and count deltas
//! arrive at high rates, so only every [COPY_REDRAW_EVERY]th copy chunk and every
//! [COUNT_REDRAW_EVERY]th move or delete count triggers one. Total deltas always redraw.

use crate::core::worker::ProgressDelta;

/// One copy delta is one chunk of up to 4 KiB, so this redraws roughly every 4 MiB.
pub const COPY_REDRAW_EVERY: u32 = 1024;
pub const COUNT_REDRAW_EVERY: u32 = 1000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Progress {
    copy_bytes: i64,
    copy_total: i64,
    move_count: i64,
    move_total: i64,
    delete_count: i64,
    delete_total: i64,

    copy_update: u32,
    move_update: u32,
    delete_update: u32,
}

fn tick(counter: &mut u32, every: u32) -> bool {
    *counter += 1;
    if *counter >= every {
        *counter = 0;
        return true;
    }
    false
}

fn retotal(total: &mut i64, done: &mut i64, update: &mut u32, delta: i64) {
    *total += delta;
    // retracted work leaves the done counter too
    if delta < 0 {
        *done += delta;
    }
    if *total == 0 {
        *update = 0;
    }
}

impl Progress {
    /// Applies one delta. Returns whether the screen should be redrawn.
    pub fn apply(&mut self, delta: ProgressDelta) -> bool {
        match delta {
            ProgressDelta::CopyBytes(n) => {
                self.copy_bytes += n;
                tick(&mut self.copy_update, COPY_REDRAW_EVERY)
            }
            ProgressDelta::CopyTotal(n) => {
                retotal(
                    &mut self.copy_total,
                    &mut self.copy_bytes,
                    &mut self.copy_update,
                    n,
                );
                true
            }
            ProgressDelta::MoveCount(n) => {
                self.move_count += n;
                tick(&mut self.move_update, COUNT_REDRAW_EVERY)
            }
            ProgressDelta::MoveTotal(n) => {
                retotal(
                    &mut self.move_total,
                    &mut self.move_count,
                    &mut self.move_update,
                    n,
                );
                true
            }
            ProgressDelta::DeleteCount(n) => {
                self.delete_count += n;
                tick(&mut self.delete_update, COUNT_REDRAW_EVERY)
            }
            ProgressDelta::DeleteTotal(n) => {
                retotal(
                    &mut self.delete_total,
                    &mut self.delete_count,
                    &mut self.delete_update,
                    n,
                );
                true
            }
        }
    }

    /// Name of the first operation still in flight, if any. Quitting is refused while
    /// this is `Some`.
    pub fn quit_blocker(&self) -> Option<&'static str> {
        if self.copy_total != 0 {
            Some("copy")
        } else if self.move_total != 0 {
            Some("move")
        } else if self.delete_total != 0 {
            Some("delete")
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn can_quit(&self) -> bool {
        self.quit_blocker().is_none()
    }

    #[inline]
    pub fn copy_bytes(&self) -> i64 {
        self.copy_bytes
    }

    #[inline]
    pub fn copy_total(&self) -> i64 {
        self.copy_total
    }

    #[inline]
    pub fn move_count(&self) -> i64 {
        self.move_count
    }

    #[inline]
    pub fn move_total(&self) -> i64 {
        self.move_total
    }

    #[inline]
    pub fn delete_count(&self) -> i64 {
        self.delete_count
    }

    #[inline]
    pub fn delete_total(&self) -> i64 {
        self.delete_total
    }

    /// Throttle counters as (copy, move, delete).
    #[cfg(test)]
    pub fn throttle(&self) -> (u32, u32, u32) {
        (self.copy_update, self.move_update, self.delete_update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, rng};

    #[test]
    fn copy_bytes_redraw_every_1024th() {
        let mut p = Progress::default();
        assert!(p.apply(ProgressDelta::CopyTotal(1 << 30)));
        let redraws = (1..=3000)
            .filter(|_| p.apply(ProgressDelta::CopyBytes(4096)))
            .count();
        assert_eq!(redraws, 2);

        let mut p = Progress::default();
        let hits: Vec<usize> = (1..=2048)
            .filter(|_| p.apply(ProgressDelta::CopyBytes(1)))
            .collect();
        assert_eq!(hits, [1024, 2048]);
    }

    #[test]
    fn count_redraw_every_1000th() {
        let mut p = Progress::default();
        let moves: Vec<usize> = (1..=2500)
            .filter(|_| p.apply(ProgressDelta::MoveCount(1)))
            .collect();
        assert_eq!(moves, [1000, 2000]);

        let deletes: Vec<usize> = (1..=1000)
            .filter(|_| p.apply(ProgressDelta::DeleteCount(1)))
            .collect();
        assert_eq!(deletes, [1000]);
    }

    #[test]
    fn total_reaching_zero_resets_throttle() {
        let mut p = Progress::default();
        p.apply(ProgressDelta::MoveTotal(10));
        for _ in 0..10 {
            p.apply(ProgressDelta::MoveCount(1));
        }
        assert_eq!(p.throttle().1, 10);
        assert!(p.apply(ProgressDelta::MoveTotal(-10)));
        assert_eq!(p.throttle(), (0, 0, 0));
        assert_eq!(p.move_count(), 0, "negative total is mirrored");
    }

    #[test]
    fn negative_copy_total_adjusts_bytes() {
        let mut p = Progress::default();
        p.apply(ProgressDelta::CopyTotal(100));
        p.apply(ProgressDelta::CopyBytes(60));
        p.apply(ProgressDelta::CopyTotal(-40));
        assert_eq!(p.copy_total(), 60);
        assert_eq!(p.copy_bytes(), 20);
    }

    #[test]
    fn quit_gate_follows_totals() {
        let mut p = Progress::default();
        assert!(p.can_quit());

        p.apply(ProgressDelta::DeleteTotal(2));
        assert_eq!(p.quit_blocker(), Some("delete"));
        p.apply(ProgressDelta::CopyTotal(5));
        assert_eq!(p.quit_blocker(), Some("copy"));

        p.apply(ProgressDelta::CopyTotal(-5));
        p.apply(ProgressDelta::DeleteTotal(-2));
        assert!(p.can_quit());
    }

    #[test]
    fn random_sequences_sum_up() {
        let mut rng = rng();
        for _ in 0..50 {
            let mut p = Progress::default();
            let (mut bytes, mut total, mut moves, mut mtotal) = (0i64, 0i64, 0i64, 0i64);
            for _ in 0..rng.random_range(1..500) {
                let n = rng.random_range(-50..200);
                match rng.random_range(0..4) {
                    0 => {
                        p.apply(ProgressDelta::CopyBytes(n));
                        bytes += n;
                    }
                    1 => {
                        p.apply(ProgressDelta::CopyTotal(n));
                        total += n;
                        if n < 0 {
                            bytes += n;
                        }
                    }
                    2 => {
                        p.apply(ProgressDelta::MoveCount(n));
                        moves += n;
                    }
                    _ => {
                        p.apply(ProgressDelta::MoveTotal(n));
                        mtotal += n;
                        if n < 0 {
                            moves += n;
                        }
                    }
                }
            }
            assert_eq!(p.copy_bytes(), bytes);
            assert_eq!(p.copy_total(), total);
            assert_eq!(p.move_count(), moves);
            assert_eq!(p.move_total(), mtotal);
            assert_eq!(p.can_quit(), total == 0 && mtotal == 0);
        }
    }
}
