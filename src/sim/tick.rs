use std::time::Instant;

/// Frame samples kept for the FPS average.
const FPS_WINDOW: usize = 60;

/// Millisecond tick source and FPS tracking for the frame loop.
pub struct FrameClock {
    start: Instant,
    last_frame: Option<Instant>,
    fps_samples: Vec<f64>,
    report_timer: f64,
    pub frames: u64,
    pub fps: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_frame: None,
            fps_samples: Vec::with_capacity(FPS_WINDOW),
            report_timer: 0.0,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Milliseconds since the clock started. Wraps after about 49 days,
    /// which the integrator's tick difference tolerates.
    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Call at the start of each frame. Returns the frame dt in seconds if
    /// there was a previous frame, or None on the very first frame.
    pub fn begin_frame(&mut self) -> Option<f64> {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f64());
        self.last_frame = Some(now);
        if let Some(dt) = dt {
            self.record(dt);
        }
        self.frames += 1;
        dt
    }

    fn record(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.fps_samples.push(dt);
        if self.fps_samples.len() > FPS_WINDOW {
            self.fps_samples.remove(0);
        }
        let avg: f64 = self.fps_samples.iter().sum::<f64>() / self.fps_samples.len() as f64;
        self.fps = 1.0 / avg;

        self.report_timer += dt;
        if self.report_timer >= 1.0 {
            log::debug!("{:.1} fps", self.fps);
            self.report_timer = 0.0;
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
