/// Edge signal raised when an object first comes within the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityChanged {
    pub close: bool,
    pub depth: f64,
}

/// Tracks whether the nearest object is inside the proximity threshold.
///
/// Only a far-to-close transition produces a signal. While depth stays below the threshold
/// nothing further fires, and moving away is silent.
#[derive(Debug, Clone)]
pub struct ProximityState {
    threshold: f64,
    is_object_close: bool,
}

impl ProximityState {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            is_object_close: false,
        }
    }

    pub fn update(&mut self, depth: f64) -> Option<ProximityChanged> {
        if !depth.is_finite() {
            return None;
        }

        let close = depth < self.threshold;
        let edge = close && !self.is_object_close;
        self.is_object_close = close;

        edge.then_some(ProximityChanged { close: true, depth })
    }

    pub fn is_object_close(&self) -> bool {
        self.is_object_close
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.is_object_close = false;
    }
}
