//! The ordered processing stages a job passes through.

use std::time::Duration;

use crate::error::ConfigError;

/// One named unit of simulated work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    /// How long the driver holds once the stage is entered.
    pub duration: Duration,
    /// Cumulative progress reached when the stage is entered.
    pub progress: u8,
    /// Only runs when the job carries a reference track.
    pub requires_reference: bool,
}

impl Stage {
    const fn new(name: &'static str, millis: u64, progress: u8, requires_reference: bool) -> Self {
        Self {
            name,
            duration: Duration::from_millis(millis),
            progress,
            requires_reference,
        }
    }

    pub fn applies_to(&self, has_reference: bool) -> bool {
        !self.requires_reference || has_reference
    }
}

pub const PARSING_PROMPT: &str = "Parsing Prompt";
pub const ANALYZING_STYLE: &str = "Analyzing Style";
pub const GENERATING_SOUND: &str = "Generating Sound";
pub const MIXING_MASTERING: &str = "Mixing & Mastering";
pub const FINALIZING: &str = "Finalizing";

const DEFAULT_STAGES: [Stage; 5] = [
    Stage::new(PARSING_PROMPT, 3_000, 20, false),
    Stage::new(ANALYZING_STYLE, 4_000, 40, true),
    Stage::new(GENERATING_SOUND, 10_000, 80, false),
    Stage::new(MIXING_MASTERING, 5_000, 95, false),
    Stage::new(FINALIZING, 2_000, 100, false),
];

/// Ordered stage table shared by every driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl Default for StagePlan {
    fn default() -> Self {
        Self {
            stages: DEFAULT_STAGES.to_vec(),
        }
    }
}

impl StagePlan {
    /// Default table with every duration multiplied by `factor`.
    ///
    /// Fails when the factor is negative, not finite, or pushes a duration
    /// past what [`Duration`] can hold.
    pub fn scaled(factor: f64) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "stage_time_scale".to_string(),
            message,
        };
        if !factor.is_finite() || factor < 0.0 {
            return Err(invalid(format!("{factor} must be a finite, non-negative number")));
        }

        let mut plan = Self::default();
        for stage in &mut plan.stages {
            stage.duration = Duration::try_from_secs_f64(stage.duration.as_secs_f64() * factor)
                .map_err(|e| invalid(format!("{factor} scales {} out of range: {e}", stage.name)))?;
        }
        Ok(plan)
    }

    /// Default table with the same duration for every stage.
    pub fn uniform(duration: Duration) -> Self {
        let mut plan = Self::default();
        for stage in &mut plan.stages {
            stage.duration = duration;
        }
        plan
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stages that run for a job, in order. Skipped stages contribute neither
    /// a step label nor a progress checkpoint.
    pub fn applicable(&self, has_reference: bool) -> impl Iterator<Item = &Stage> {
        self.stages
            .iter()
            .filter(move |stage| stage.applies_to(has_reference))
    }

    /// Sum of the holds a job spends in its applicable stages.
    pub fn total_duration(&self, has_reference: bool) -> Duration {
        self.applicable(has_reference).map(|s| s.duration).sum()
    }
}
