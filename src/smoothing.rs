// Fixed-window moving average, one instance per rate direction.

#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    values: Vec<f64>,
    index: usize,
    count: usize,
}

impl SmoothingFilter {
    /// `window` is clamped to at least 1.
    pub fn new(window: usize) -> Self {
        Self {
            values: vec![0.0; window.max(1)],
            index: 0,
            count: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.values.len()
    }

    /// Number of observations currently averaged.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Overwrites the oldest slot and returns the mean of the valid slots.
    pub fn add(&mut self, value: f64) -> f64 {
        let window = self.values.len();
        self.values[self.index] = value;
        self.index = (self.index + 1) % window;
        if self.count < window {
            self.count += 1;
        }
        self.average()
    }

    /// Mean over `min(seen, window)` values; 0 when empty.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        // After a reset slots fill from 0, so the valid ones are always the prefix.
        let sum: f64 = self.values[..self.count].iter().sum();
        sum / self.count as f64
    }

    /// Forget history without reallocating.
    pub fn reset(&mut self) {
        self.count = 0;
        self.index = 0;
    }
}
