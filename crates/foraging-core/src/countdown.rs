/// Episode timer that fires once when it runs out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Countdown {
    duration: f32,
    remaining: f32,
}

impl Countdown {
    /// A zero duration never fires.
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            remaining: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    /// Advance by `dt`. Returns true on the tick that crosses zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.remaining <= 0.0 {
            return false;
        }
        self.remaining -= dt;
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    pub fn is_running(&self) -> bool {
        self.remaining > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_expiry() {
        let mut c = Countdown::new(1.0);
        c.reset();
        let fired: Vec<bool> = (0..6).map(|_| c.tick(0.25)).collect();
        assert_eq!(fired, vec![false, false, false, true, false, false]);
        assert!(!c.is_running());
        c.reset();
        assert_eq!(c.remaining(), 1.0);
    }

    #[test]
    fn idle_until_reset_and_zero_never_fires() {
        let mut c = Countdown::new(1.0);
        assert!(!c.tick(5.0));
        let mut z = Countdown::new(0.0);
        z.reset();
        assert!(!z.tick(0.1));
    }
}
