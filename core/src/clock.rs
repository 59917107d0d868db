//! Simulation clock: owns tick state, simulated time, speed control, and pause.

use crate::types::{RunId, SimMillis, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub run_id:       RunId,
    pub current_tick: Tick,
    /// Simulated milliseconds elapsed since the run started.
    pub elapsed_ms:   SimMillis,
    pub tick_ms:      SimMillis,
    pub speed:        SimSpeed,
    pub paused:       bool,
}

impl SimClock {
    pub fn new(run_id: RunId, tick_ms: SimMillis) -> Self {
        Self {
            run_id,
            current_tick: 0,
            elapsed_ms: 0,
            tick_ms,
            speed: SimSpeed::Normal,
            paused: true,
        }
    }

    /// Advance one tick. Returns the new tick number.
    /// Panics if called while paused; callers must check.
    pub fn advance(&mut self) -> Tick {
        assert!(!self.paused, "advance() called on paused clock");
        self.current_tick += 1;
        self.elapsed_ms += self.tick_ms;
        self.current_tick
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: SimSpeed) {
        self.speed = speed;
    }

    /// Ticks to run per rendered frame.
    pub fn ticks_per_frame(&self) -> u64 {
        match self.speed {
            SimSpeed::Normal  => 1,
            SimSpeed::Fast    => 2,
            SimSpeed::Fastest => 4,
        }
    }

    /// Number of whole ticks needed to cover `duration_ms`.
    pub fn ticks_for(&self, duration_ms: SimMillis) -> u64 {
        duration_ms.div_ceil(self.tick_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimSpeed {
    Normal,   // 1 tick/frame
    Fast,     // 2 ticks/frame
    Fastest,  // 4 ticks/frame
}
