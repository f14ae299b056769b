use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frames-per-second estimate refreshed once per second
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Option<Instant>,
    count: u32,
    fps: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            window_start: None,
            count: 0,
            fps: 0.0,
        }
    }

    /// Count one displayed frame and return the current estimate
    pub fn tick(&mut self, now: Instant) -> f64 {
        let start = *self.window_start.get_or_insert(now);
        self.count += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= WINDOW {
            self.fps = self.count as f64 / elapsed.as_secs_f64();
            self.count = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_updates_once_per_window() {
        let start = Instant::now();
        let mut meter = FpsMeter::new();

        for i in 0..10 {
            let fps = meter.tick(start + Duration::from_millis(i * 100));
            assert_eq!(fps, 0.0);
        }
        let fps = meter.tick(start + Duration::from_millis(1000));
        assert!((fps - 11.0).abs() < 1e-9);

        // held until the next window closes
        assert_eq!(meter.tick(start + Duration::from_millis(1500)), fps);
        let next = meter.tick(start + Duration::from_millis(2000));
        assert!((next - 2.0).abs() < 1e-9);
    }
}
