//! Running/jumping separation of the speed series and step counting.

use super::jump::JumpSummary;

/// Speed series split around the airborne interval plus the surviving steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Speed with the airborne frames zeroed.
    pub run_speed: Vec<f64>,
    /// Speed during the airborne frames, zero elsewhere.
    pub jump_speed: Vec<f64>,
    /// Step events at or before takeoff.
    pub step_events: Vec<usize>,
    /// Cumulative step count per frame.
    pub step_count: Vec<usize>,
}

impl Segmentation {
    pub fn step_count_total(&self) -> usize {
        self.step_count.last().copied().unwrap_or(0)
    }
}

/// Split `speed` into running and jumping parts and drop steps taken after takeoff.
pub fn separate_run_and_jump(speed: &[f64], step_events: &[usize], jump: &JumpSummary) -> Segmentation {
    let n = speed.len();
    let mut run_speed = speed.to_vec();
    let mut jump_speed = vec![0.0; n];

    let steps: Vec<usize> = match jump.airborne() {
        Some((takeoff, landing)) => {
            let end = (landing + 1).min(n);
            for i in takeoff.min(end)..end {
                jump_speed[i] = speed[i];
                run_speed[i] = 0.0;
            }
            step_events.iter().copied().filter(|&ev| ev <= takeoff).collect()
        }
        None => step_events.to_vec(),
    };

    let mut marks = vec![0usize; n];
    for &ev in &steps {
        if ev < n {
            marks[ev] += 1;
        }
    }
    let mut total = 0;
    let step_count = marks
        .into_iter()
        .map(|m| {
            total += m;
            total
        })
        .collect();

    Segmentation {
        run_speed,
        jump_speed,
        step_events: steps,
        step_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(takeoff: usize, landing: usize) -> JumpSummary {
        JumpSummary {
            has_jump: true,
            jump_takeoff_frame: Some(takeoff),
            jump_landing_frame: Some(landing),
            ..JumpSummary::default()
        }
    }

    #[test]
    fn test_without_jump_everything_is_running() {
        let speed = vec![1.0; 6];
        let seg = separate_run_and_jump(&speed, &[1, 4], &JumpSummary::default());
        assert_eq!(seg.run_speed, speed);
        assert_eq!(seg.jump_speed, vec![0.0; 6]);
        assert_eq!(seg.step_count, vec![0, 1, 1, 1, 2, 2]);
        assert_eq!(seg.step_count_total(), 2);
    }

    #[test]
    fn test_airborne_interval_moves_to_jump_series() {
        let speed: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let seg = separate_run_and_jump(&speed, &[1, 3, 4, 6], &jump(3, 5));

        assert_eq!(seg.run_speed, vec![0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 6.0, 7.0]);
        assert_eq!(seg.jump_speed, vec![0.0, 0.0, 0.0, 3.0, 4.0, 5.0, 0.0, 0.0]);
        // A step on the takeoff frame still counts
        assert_eq!(seg.step_events, vec![1, 3]);
        assert_eq!(seg.step_count_total(), 2);
    }

    #[test]
    fn test_empty_series() {
        let seg = separate_run_and_jump(&[], &[], &JumpSummary::default());
        assert!(seg.step_count.is_empty());
        assert_eq!(seg.step_count_total(), 0);
    }
}
