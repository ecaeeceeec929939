//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

/// Rolling series of one metric, plus the peak seen so far (used to scale
/// sparklines that have no natural 0..100 ceiling).
pub struct Series {
    pub points: VecDeque<u64>,
    pub peak: u64,
    cap: usize,
}

impl Series {
    pub fn new(cap: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(cap),
            peak: 0,
            cap,
        }
    }

    pub fn push(&mut self, v: u64) {
        self.peak = self.peak.max(v);
        push_capped(&mut self.points, v, self.cap);
    }

    pub fn last(&self) -> Option<u64> {
        self.points.back().copied()
    }

    /// Most recent points that fit a panel of the given width.
    pub fn window(&self, width: usize) -> Vec<u64> {
        let start = self.points.len().saturating_sub(width);
        self.points.iter().skip(start).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_capped_drops_oldest() {
        let mut dq = VecDeque::new();
        for i in 0..5 {
            push_capped(&mut dq, i, 3);
        }
        assert_eq!(dq, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn series_tracks_peak_across_evictions() {
        let mut s = Series::new(2);
        s.push(10);
        s.push(3);
        s.push(1);
        assert_eq!(s.peak, 10);
        assert_eq!(s.last(), Some(1));
        assert_eq!(s.window(8), vec![3, 1]);
    }
}
