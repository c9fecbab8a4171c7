//! Pump PID working set.
//!
//! Gains are not stored here: they are re-read from config every tick and
//! depend on the dimmer method and the active control variable, so the
//! caller passes them in.  Only the integral and previous error persist.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Pump output range, in percent.
pub const OUTPUT_MAX: f32 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PumpPid {
    integral: f32,
    prev_error: f32,
}

impl PumpPid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }

    /// One PID step.  `dt` is in seconds and must be positive.
    ///
    /// The integral is bounded to `±i_max / ki` so the integral term alone
    /// never exceeds `i_max` percent of output.
    pub fn compute(&mut self, target: f32, input: f32, gains: &PidGains, i_max: f32, dt: f32) -> f32 {
        let error = target - input;

        if gains.ki > 0.0 {
            let bound = (i_max / gains.ki).abs();
            self.integral = (self.integral + error * dt).clamp(-bound, bound);
        } else {
            self.integral = 0.0;
        }

        let derivative = if dt > 0.0 { (error - self.prev_error) / dt } else { 0.0 };
        self.prev_error = error;

        (gains.kp * error + gains.ki * self.integral + gains.kd * derivative).clamp(0.0, OUTPUT_MAX)
    }

    /// Carry the integral contribution across a gain change:
    /// `ki_from * I_old == ki_to * I_new`.
    pub fn rescale(&mut self, ki_from: f32, ki_to: f32) {
        if ki_to > 0.0 {
            self.integral *= ki_from / ki_to;
        } else {
            self.integral = 0.0;
        }
        self.prev_error = 0.0;
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: PidGains = PidGains::new(2.0, 10.0, 0.0);

    #[test]
    fn proportional_only_first_step() {
        let mut pid = PumpPid::new();
        let out = pid.compute(9.0, 6.0, &PidGains::new(5.0, 0.0, 0.0), 100.0, 0.1);
        assert_eq!(out, 15.0);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn integral_is_bounded() {
        let mut pid = PumpPid::new();
        for _ in 0..1_000 {
            pid.compute(9.0, 0.0, &G, 50.0, 0.1);
        }
        assert_eq!(pid.integral(), 5.0);
        for _ in 0..1_000 {
            pid.compute(0.0, 9.0, &G, 50.0, 0.1);
        }
        assert_eq!(pid.integral(), -5.0);
    }

    #[test]
    fn output_clamped() {
        let mut pid = PumpPid::new();
        assert_eq!(pid.compute(100.0, 0.0, &G, 100.0, 0.1), 100.0);
        pid.reset();
        assert_eq!(pid.compute(0.0, 100.0, &G, 100.0, 0.1), 0.0);
    }

    #[test]
    fn derivative_uses_previous_error() {
        let mut pid = PumpPid::new();
        let g = PidGains::new(0.0, 0.0, 1.0);
        pid.compute(5.0, 4.0, &g, 100.0, 0.1);
        let out = pid.compute(5.0, 3.0, &g, 100.0, 0.1);
        assert!((out - 10.0).abs() < 1e-4);
    }

    #[test]
    fn rescale_preserves_integral_term() {
        let mut pid = PumpPid::new();
        for _ in 0..10 {
            pid.compute(9.0, 8.0, &G, 100.0, 0.1);
        }
        let before = G.ki * pid.integral();
        pid.rescale(G.ki, 30.0);
        assert!((30.0 * pid.integral() - before).abs() < 1e-4);
        assert_eq!(pid.prev_error(), 0.0);

        pid.rescale(30.0, 0.0);
        assert_eq!(pid.integral(), 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn integral_never_exceeds_bound(
            errors in proptest::collection::vec(-20.0f32..20.0, 1..200),
            ki in 0.5f32..40.0,
            i_max in 1.0f32..100.0,
            dt in 0.05f32..0.1,
        ) {
            let gains = PidGains::new(1.0, ki, 0.5);
            let mut pid = PumpPid::new();
            for e in errors {
                let out = pid.compute(e, 0.0, &gains, i_max, dt);
                prop_assert!(pid.integral().abs() <= i_max / ki + 1e-4);
                prop_assert!((0.0..=OUTPUT_MAX).contains(&out));
            }
        }
    }
}
