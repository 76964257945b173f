use eframe::egui::Vec2;

use crate::util::ease_in_out_cubic;

pub const DISPERSAL_DURATION_SECS: f32 = 1.2;

pub struct DispersalAnimation {
    pre: Vec<Vec2>,
    post: Vec<Vec2>,
    started_at: f64,
    duration: f32,
}

impl DispersalAnimation {
    pub fn new(pre: Vec<Vec2>, post: Vec<Vec2>, started_at: f64) -> Self {
        debug_assert_eq!(pre.len(), post.len());
        Self {
            pre,
            post,
            started_at,
            duration: DISPERSAL_DURATION_SECS,
        }
    }

    pub fn post(&self) -> &[Vec2] {
        &self.post
    }

    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (((now - self.started_at) as f32) / self.duration).clamp(0.0, 1.0)
    }

    pub fn sample(&self, now: f64, out: &mut [Vec2]) -> bool {
        let t = self.progress(now);
        let count = self.pre.len().min(out.len());

        if t >= 1.0 {
            out[..count].copy_from_slice(&self.post[..count]);
            return true;
        }

        let eased = ease_in_out_cubic(t);
        for index in 0..count {
            out[index] = self.pre[index] + (self.post[index] - self.pre[index]) * eased;
        }
        false
    }

    pub fn sampled_positions(&self, now: f64) -> Vec<Vec2> {
        let mut out = vec![Vec2::ZERO; self.pre.len()];
        self.sample(now, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    fn animation() -> DispersalAnimation {
        DispersalAnimation::new(
            vec![vec2(0.0, 0.0), vec2(10.0, -10.0)],
            vec![vec2(100.0, 50.0), vec2(-30.0, 7.5)],
            5.0,
        )
    }

    #[test]
    fn starts_exactly_at_pre() {
        let anim = animation();
        let mut out = vec![Vec2::ZERO; 2];
        let finished = anim.sample(5.0, &mut out);
        assert!(!finished);
        assert_eq!(out, anim.pre);
    }

    #[test]
    fn completion_snaps_exactly_to_post() {
        let anim = animation();
        let mut out = vec![Vec2::ZERO; 2];

        let finished = anim.sample(5.0 + DISPERSAL_DURATION_SECS as f64, &mut out);
        assert!(finished);
        assert_eq!(out, anim.post());

        let finished = anim.sample(5.0 + 60.0, &mut out);
        assert!(finished);
        assert_eq!(out, anim.post());
    }

    #[test]
    fn midpoint_is_halfway_for_symmetric_ease() {
        let anim = animation();
        let mut out = vec![Vec2::ZERO; 2];
        anim.sample(5.0 + (DISPERSAL_DURATION_SECS as f64) / 2.0, &mut out);

        let expected = vec2(50.0, 25.0);
        assert!((out[0] - expected).length() < 1e-3);
    }

    #[test]
    fn eased_motion_is_slow_near_the_ends() {
        let anim = animation();
        let mut early = vec![Vec2::ZERO; 2];
        let mut linear_early = vec![Vec2::ZERO; 2];

        anim.sample(5.0 + 0.1 * DISPERSAL_DURATION_SECS as f64, &mut early);
        let linear_t = 0.1;
        for (index, slot) in linear_early.iter_mut().enumerate() {
            *slot = anim.pre[index] + (anim.post[index] - anim.pre[index]) * linear_t;
        }

        assert!((early[0] - anim.pre[0]).length() < (linear_early[0] - anim.pre[0]).length());
    }

    #[test]
    fn interrupt_recapture_matches_last_sample() {
        let anim = animation();
        let interrupt_at = 5.0 + 0.37;

        let mut rendered = vec![Vec2::ZERO; 2];
        anim.sample(interrupt_at, &mut rendered);

        let recaptured = anim.sampled_positions(interrupt_at);
        assert_eq!(rendered, recaptured);
    }

    #[test]
    fn progress_clamps_before_start() {
        let anim = animation();
        assert_eq!(anim.progress(0.0), 0.0);
    }
}
