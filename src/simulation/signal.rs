//! Traffic signals and the controller that cycles them
//!
//! Each signal is a three-state machine. The only transitions are
//! red -> green -> yellow -> red, at most one per tick.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::config::SignalTimings;
use super::topology::Topology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalState {
    Red,
    Green,
    Yellow,
}

impl SignalState {
    pub const ALL: [SignalState; 3] = [SignalState::Red, SignalState::Green, SignalState::Yellow];

    /// Transition table: the state that follows this one and its duration
    pub fn next(self, timings: &SignalTimings) -> (SignalState, u32) {
        match self {
            SignalState::Red => (SignalState::Green, timings.green),
            SignalState::Green => (SignalState::Yellow, timings.yellow),
            SignalState::Yellow => (SignalState::Red, timings.red),
        }
    }

    pub fn allows_entry(self) -> bool {
        self == SignalState::Green
    }
}

/// A traffic light attached to an intersection
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    state: SignalState,
    duration: u32,
    elapsed: u32,
    /// Fixed signals hold their state and never transition
    cycling: bool,
}

impl Signal {
    pub fn new(state: SignalState, duration: u32) -> Self {
        assert!(duration > 0, "signal duration must be at least one tick");
        Self {
            state,
            duration,
            elapsed: 0,
            cycling: true,
        }
    }

    /// A signal pinned to one state for the whole run
    pub fn fixed(state: SignalState) -> Self {
        Self {
            state,
            duration: u32::MAX,
            elapsed: 0,
            cycling: false,
        }
    }

    /// Random initial state with a short random first phase, so that signals
    /// across the grid are not synchronized
    pub fn randomized<R: Rng>(rng: &mut R, warmup_min: u32, warmup_max: u32) -> Self {
        let state = SignalState::ALL
            .choose(rng)
            .copied()
            .unwrap_or(SignalState::Red);
        let duration = rng.random_range(warmup_min..=warmup_max);
        Self::new(state, duration)
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn is_cycling(&self) -> bool {
        self.cycling
    }

    /// Advance by one tick. Returns the new state if a transition happened.
    pub fn tick(&mut self, timings: &SignalTimings) -> Option<SignalState> {
        if !self.cycling {
            return None;
        }

        self.elapsed += 1;
        if self.elapsed < self.duration {
            return None;
        }

        let (state, duration) = self.state.next(timings);
        debug_assert!(duration > 0);
        self.state = state;
        self.duration = duration;
        self.elapsed = 0;
        Some(state)
    }
}

/// Tick every signal in the topology once. Returns the number of transitions.
pub fn update_signals(topology: &mut Topology, timings: &SignalTimings) -> usize {
    topology
        .intersections_mut()
        .filter_map(|intersection| intersection.signal.as_mut())
        .filter_map(|signal| signal.tick(timings))
        .count()
}
