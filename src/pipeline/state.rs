//! Stage indices and the run state machine.
//!
//! ```text
//! Pending ──start(entry)──▶ Running(entry)
//!         ──advance──▶ Running(entry + 1) ... Running(Render)
//!                                             ──finish──▶ Completed
//! Running(any) ──abort──▶ Aborted(stage)
//! ```
//!
//! Transitions only ever move forward; there is no retry within a stage.

use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The five ordered pipeline stages, numbered 1..=5 on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Acquire = 1,
    Separate = 2,
    Transcribe = 3,
    AlignSynthesize = 4,
    Render = 5,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Acquire,
        Stage::Separate,
        Stage::Transcribe,
        Stage::AlignSynthesize,
        Stage::Render,
    ];

    /// Stage for a 1-based index, `None` outside 1..=5.
    ///
    /// ```
    /// use karaoke_pipeline::pipeline::Stage;
    ///
    /// assert_eq!(Stage::from_index(3), Some(Stage::Transcribe));
    /// assert_eq!(Stage::from_index(0), None);
    /// assert_eq!(Stage::from_index(6), None);
    /// ```
    pub fn from_index(index: u8) -> Option<Stage> {
        Stage::ALL.get(usize::from(index).checked_sub(1)?).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// The stage after this one, `None` after Render.
    pub fn next(self) -> Option<Stage> {
        Stage::from_index(self.index() + 1)
    }

    /// This stage and every later one, in order.
    pub fn through_render(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().filter(move |s| *s >= self)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Separate => "separate",
            Stage::Transcribe => "transcribe",
            Stage::AlignSynthesize => "align",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.label())
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No stage has started yet.
    #[default]
    Pending,

    /// The given stage is executing.
    Running(Stage),

    /// Render finished and the final video is on disk.
    Completed,

    /// The given stage failed; later stages never ran.
    Aborted(Stage),
}

impl PipelineState {
    /// Enter `stage`.  Only forward moves from `Pending` or an earlier
    /// running stage are accepted; anything else leaves the state unchanged
    /// and returns `false`.
    pub fn enter(&mut self, stage: Stage) -> bool {
        let allowed = match *self {
            PipelineState::Pending => true,
            PipelineState::Running(current) => stage > current,
            PipelineState::Completed | PipelineState::Aborted(_) => false,
        };
        if allowed {
            *self = PipelineState::Running(stage);
        }
        allowed
    }

    /// Mark the running stage as failed.
    pub fn abort(&mut self) {
        if let PipelineState::Running(stage) = *self {
            *self = PipelineState::Aborted(stage);
        }
    }

    /// Finish the run; only valid once Render has been entered.
    pub fn complete(&mut self) -> bool {
        if *self == PipelineState::Running(Stage::Render) {
            *self = PipelineState::Completed;
            true
        } else {
            false
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Aborted(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
