//! Multi-step intake form state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{FeatureField, FeatureInput};

/// The five intake steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntakeStep {
    Demographics,
    VitalSigns,
    GlycemicLipid,
    Renal,
    MetabolicLiver,
}

impl IntakeStep {
    pub const ALL: [IntakeStep; 5] = [
        IntakeStep::Demographics,
        IntakeStep::VitalSigns,
        IntakeStep::GlycemicLipid,
        IntakeStep::Renal,
        IntakeStep::MetabolicLiver,
    ];

    /// 1-based position.
    pub fn number(&self) -> u8 {
        match self {
            IntakeStep::Demographics => 1,
            IntakeStep::VitalSigns => 2,
            IntakeStep::GlycemicLipid => 3,
            IntakeStep::Renal => 4,
            IntakeStep::MetabolicLiver => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            IntakeStep::Demographics => "Demographics",
            IntakeStep::VitalSigns => "Vital signs",
            IntakeStep::GlycemicLipid => "Glycemic & lipid",
            IntakeStep::Renal => "Renal",
            IntakeStep::MetabolicLiver => "Metabolic & liver",
        }
    }

    /// Fields collected on this step.
    pub fn fields(&self) -> &'static [FeatureField] {
        use FeatureField::*;
        match self {
            IntakeStep::Demographics => &[Age, Sex, Duration],
            IntakeStep::VitalSigns => &[Sbp, Dbp, Hbp],
            IntakeStep::GlycemicLipid => &[Hba1c, Ldl, Hdl, Cholesterol, Triglycerides],
            IntakeStep::Renal => &[Urea, Bun, Egfr, Ucr],
            IntakeStep::MetabolicLiver => &[Uric, Alt, Ast],
        }
    }

    pub fn next(&self) -> Option<IntakeStep> {
        Self::ALL.get(self.number() as usize).copied()
    }

    pub fn previous(&self) -> Option<IntakeStep> {
        (self.number() as usize)
            .checked_sub(2)
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Assessment can only be submitted from the last step (currently on step {0})")]
    NotOnLastStep(u8),
}

/// Form state: the current step plus every value entered so far.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeForm {
    step: IntakeStep,
    input: FeatureInput,
}

impl IntakeForm {
    pub fn new() -> Self {
        Self {
            step: IntakeStep::Demographics,
            input: FeatureInput::new(),
        }
    }

    pub fn step(&self) -> IntakeStep {
        self.step
    }

    /// Set a value for any field, regardless of the current step.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), IntakeError> {
        let field =
            FeatureField::from_name(name).ok_or_else(|| IntakeError::UnknownField(name.to_string()))?;
        self.input.set(field.name(), value);
        Ok(())
    }

    pub fn value(&self, field: FeatureField) -> Option<&str> {
        self.input.get(field.name())
    }

    /// Advance one step; stays on the last step.
    pub fn next(&mut self) -> IntakeStep {
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        self.step
    }

    /// Go back one step; stays on the first step.
    pub fn back(&mut self) -> IntakeStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// `(current, total)` step numbers.
    pub fn progress(&self) -> (u8, u8) {
        (self.step.number(), IntakeStep::ALL.len() as u8)
    }

    /// The collected input, available only on the last step.
    pub fn submit(&self) -> Result<FeatureInput, IntakeError> {
        if !self.step.is_last() {
            return Err(IntakeError::NotOnLastStep(self.step.number()));
        }
        Ok(self.input.clone())
    }

    /// Back to step one with an empty form.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for IntakeForm {
    fn default() -> Self {
        Self::new()
    }
}
