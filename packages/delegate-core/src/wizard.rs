//! The three-step activation wizard: Connect, Confirm, Done.
//!
//! Steps only move forward, except for an explicit [`Wizard::back`] from
//! Confirm and a [`Wizard::reset`] when the connected address changes. The
//! transaction lifecycle is tracked alongside the step; it is the guard that
//! keeps at most one delegate transaction in flight.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{address::TxHash, eligibility::Eligibility};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowMode {
    /// Connect, then a separate Confirm step that submits.
    #[default]
    ThreeStep,
    /// Activation from Connect submits immediately.
    Collapsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum WizardStep {
    Connect,
    Confirm,
    Done {
        #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
        tx_hash: Option<TxHash>,
    },
}

impl WizardStep {
    pub const fn number(&self) -> u8 {
        match self {
            Self::Connect => 1,
            Self::Confirm => 2,
            Self::Done { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TxLifecycle {
    Idle,
    /// Waiting for the wallet to sign.
    Pending,
    /// Broadcast, waiting for a receipt.
    Confirming {
        #[serde(rename = "txHash")]
        tx_hash: TxHash,
    },
    Success {
        #[serde(rename = "txHash")]
        tx_hash: TxHash,
    },
    Failed { message: String },
}

impl TxLifecycle {
    pub const fn in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirming { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("a delegate transaction is already in flight")]
    SubmissionInFlight,
    #[error("activation is not possible yet")]
    NotEligible,
    #[error("cannot {action} from step {step}")]
    InvalidTransition { action: &'static str, step: u8 },
    #[error("receipt for {0} does not match the pending transaction")]
    UnknownTransaction(TxHash),
}

/// What the caller must do after [`Wizard::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Now on Confirm; waiting for the user to submit.
    AwaitConfirm,
    /// Lifecycle is Pending; the caller must submit the transaction.
    Submit,
    /// Holder was already self-delegated; now on Done.
    AlreadyDelegated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wizard {
    step: WizardStep,
    lifecycle: TxLifecycle,
    flow: FlowMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Wizard {
    pub fn new(flow: FlowMode) -> Self {
        Self {
            step: WizardStep::Connect,
            lifecycle: TxLifecycle::Idle,
            flow,
            error: None,
        }
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn lifecycle(&self) -> &TxLifecycle {
        &self.lifecycle
    }

    pub fn flow(&self) -> FlowMode {
        self.flow
    }

    /// Last surfaced failure message, cleared on the next submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The activation action is offered only here.
    pub fn can_submit(&self) -> bool {
        self.step == WizardStep::Confirm && !self.lifecycle.in_flight()
    }

    /// React to a fresh eligibility derivation. Returns true if the step
    /// changed.
    ///
    /// A holder found to be already self-delegated while on Connect skips
    /// straight to Done without a transaction.
    pub fn observe(&mut self, eligibility: &Eligibility) -> bool {
        if self.step == WizardStep::Connect
            && eligibility.delegation_known
            && eligibility.is_self_delegated
        {
            self.step = WizardStep::Done { tx_hash: None };
            return true;
        }
        false
    }

    /// User clicked activate on the Connect step.
    pub fn activate(&mut self, eligibility: &Eligibility) -> Result<Activation, WizardError> {
        if self.step != WizardStep::Connect {
            return Err(self.invalid("activate"));
        }
        if eligibility.delegation_known && eligibility.is_self_delegated {
            self.step = WizardStep::Done { tx_hash: None };
            return Ok(Activation::AlreadyDelegated);
        }
        if !eligibility.can_activate {
            return Err(WizardError::NotEligible);
        }

        self.step = WizardStep::Confirm;
        match self.flow {
            FlowMode::ThreeStep => Ok(Activation::AwaitConfirm),
            FlowMode::Collapsed => {
                self.begin_submit(eligibility)?;
                Ok(Activation::Submit)
            }
        }
    }

    /// Start a submission. Rejected while another one is in flight, and
    /// whenever the latest eligibility does not allow activation (for
    /// example while reads are reloading).
    pub fn begin_submit(&mut self, eligibility: &Eligibility) -> Result<(), WizardError> {
        if self.lifecycle.in_flight() {
            return Err(WizardError::SubmissionInFlight);
        }
        if self.step != WizardStep::Confirm {
            return Err(self.invalid("submit"));
        }
        if !eligibility.can_activate {
            return Err(WizardError::NotEligible);
        }
        self.lifecycle = TxLifecycle::Pending;
        self.error = None;
        Ok(())
    }

    /// The wallet signed and broadcast the transaction.
    pub fn submitted(&mut self, tx_hash: TxHash) -> Result<(), WizardError> {
        if self.lifecycle != TxLifecycle::Pending {
            return Err(self.invalid("record submission"));
        }
        self.lifecycle = TxLifecycle::Confirming { tx_hash };
        Ok(())
    }

    /// A transaction signed elsewhere (e.g. by a browser wallet) was
    /// broadcast for this session.
    pub fn register_external(
        &mut self,
        tx_hash: TxHash,
        eligibility: &Eligibility,
    ) -> Result<(), WizardError> {
        self.begin_submit(eligibility)?;
        self.submitted(tx_hash)
    }

    /// The receipt reported success. Only this advances Confirm to Done.
    pub fn receipt_success(&mut self, tx_hash: TxHash) -> Result<(), WizardError> {
        match self.lifecycle {
            TxLifecycle::Confirming { tx_hash: pending } if pending == tx_hash => {
                self.lifecycle = TxLifecycle::Success { tx_hash };
                self.step = WizardStep::Done {
                    tx_hash: Some(tx_hash),
                };
                Ok(())
            }
            TxLifecycle::Confirming { .. } => Err(WizardError::UnknownTransaction(tx_hash)),
            _ => Err(self.invalid("confirm")),
        }
    }

    /// Rejection, revert or timeout. The step stays on Confirm so the user
    /// can retry.
    pub fn failed(&mut self, message: impl Into<String>) -> Result<(), WizardError> {
        if !self.lifecycle.in_flight() {
            return Err(self.invalid("fail"));
        }
        let message = message.into();
        self.error = Some(message.clone());
        self.lifecycle = TxLifecycle::Failed { message };
        Ok(())
    }

    /// The wallet declined to sign. Only valid while Pending: once a hash
    /// exists its receipt decides the outcome.
    pub fn rejected(&mut self, message: impl Into<String>) -> Result<(), WizardError> {
        if self.lifecycle != TxLifecycle::Pending {
            return Err(self.invalid("report a wallet rejection"));
        }
        self.failed(message)
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        if self.step != WizardStep::Confirm {
            return Err(self.invalid("go back"));
        }
        if self.lifecycle.in_flight() {
            return Err(WizardError::SubmissionInFlight);
        }
        self.step = WizardStep::Connect;
        self.lifecycle = TxLifecycle::Idle;
        self.error = None;
        Ok(())
    }

    /// Start over for a new (or no) address.
    pub fn reset(&mut self) {
        *self = Self::new(self.flow);
    }

    fn invalid(&self, action: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            action,
            step: self.step.number(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible() -> Eligibility {
        Eligibility {
            has_tokens: true,
            has_sufficient_gas: true,
            is_self_delegated: false,
            is_delegated: false,
            delegation_known: true,
            can_activate: true,
            blockers: Vec::new(),
        }
    }

    fn self_delegated() -> Eligibility {
        Eligibility {
            is_self_delegated: true,
            is_delegated: true,
            ..eligible()
        }
    }

    fn hash(byte: u8) -> TxHash {
        TxHash([byte; 32])
    }

    #[test]
    fn happy_path_three_steps() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        assert_eq!(wizard.activate(&eligible()), Ok(Activation::AwaitConfirm));
        assert_eq!(wizard.step(), &WizardStep::Confirm);
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Idle);

        wizard.begin_submit(&eligible()).unwrap();
        wizard.submitted(hash(1)).unwrap();
        assert_eq!(wizard.step(), &WizardStep::Confirm);

        wizard.receipt_success(hash(1)).unwrap();
        assert_eq!(
            wizard.step(),
            &WizardStep::Done {
                tx_hash: Some(hash(1))
            }
        );
    }

    #[test]
    fn self_delegated_skips_confirm() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        assert!(wizard.observe(&self_delegated()));
        assert_eq!(wizard.step(), &WizardStep::Done { tx_hash: None });
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Idle);

        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        assert_eq!(
            wizard.activate(&self_delegated()),
            Ok(Activation::AlreadyDelegated)
        );
        assert_eq!(wizard.step(), &WizardStep::Done { tx_hash: None });
    }

    #[test]
    fn observe_waits_for_delegation() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        let unknown = Eligibility {
            delegation_known: false,
            can_activate: false,
            ..self_delegated()
        };
        assert!(!wizard.observe(&unknown));
        assert!(!wizard.observe(&eligible()));
        assert_eq!(wizard.step(), &WizardStep::Connect);
    }

    #[test]
    fn observe_does_not_leave_confirm() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        assert!(!wizard.observe(&self_delegated()));
        assert_eq!(wizard.step(), &WizardStep::Confirm);
    }

    #[test]
    fn ineligible_activation_is_rejected() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        let blocked = Eligibility {
            can_activate: false,
            has_tokens: false,
            ..eligible()
        };
        assert_eq!(wizard.activate(&blocked), Err(WizardError::NotEligible));
        assert_eq!(wizard.step(), &WizardStep::Connect);
    }

    #[test]
    fn failure_never_advances_and_allows_retry() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        wizard.begin_submit(&eligible()).unwrap();
        wizard.submitted(hash(2)).unwrap();
        wizard.failed("execution reverted").unwrap();

        assert_eq!(wizard.step(), &WizardStep::Confirm);
        assert_eq!(wizard.error(), Some("execution reverted"));
        assert!(wizard.can_submit());

        wizard.begin_submit(&eligible()).unwrap();
        assert_eq!(wizard.error(), None);
        wizard.submitted(hash(3)).unwrap();
        wizard.receipt_success(hash(3)).unwrap();
        assert_eq!(wizard.step().number(), 3);
    }

    #[test]
    fn wallet_rejection_while_pending() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        wizard.begin_submit(&eligible()).unwrap();
        wizard.failed("User rejected the request.").unwrap();
        assert_eq!(
            wizard.lifecycle(),
            &TxLifecycle::Failed {
                message: "User rejected the request.".into()
            }
        );
        assert_eq!(wizard.step(), &WizardStep::Confirm);
    }

    #[test]
    fn rejection_only_before_broadcast() {
        let mut wizard = Wizard::new(FlowMode::Collapsed);
        assert!(wizard.rejected("User rejected the request.").is_err());

        wizard.activate(&eligible()).unwrap();
        wizard.rejected("User rejected the request.").unwrap();
        assert_eq!(wizard.step(), &WizardStep::Confirm);
        assert_eq!(wizard.error(), Some("User rejected the request."));
        assert!(wizard.can_submit());

        wizard.register_external(hash(9), &eligible()).unwrap();
        assert!(matches!(
            wizard.rejected("too late"),
            Err(WizardError::InvalidTransition { step: 2, .. })
        ));
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Confirming { tx_hash: hash(9) });
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        wizard.begin_submit(&eligible()).unwrap();
        assert_eq!(wizard.begin_submit(&eligible()), Err(WizardError::SubmissionInFlight));

        wizard.submitted(hash(4)).unwrap();
        assert_eq!(wizard.begin_submit(&eligible()), Err(WizardError::SubmissionInFlight));
        assert_eq!(
            wizard.register_external(hash(5), &eligible()),
            Err(WizardError::SubmissionInFlight)
        );
        assert!(!wizard.can_submit());
    }

    #[test]
    fn mismatched_receipt_is_ignored() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        wizard.register_external(hash(6), &eligible()).unwrap();
        assert_eq!(
            wizard.receipt_success(hash(7)),
            Err(WizardError::UnknownTransaction(hash(7)))
        );
        assert_eq!(wizard.step(), &WizardStep::Confirm);
    }

    #[test]
    fn submission_requires_current_eligibility() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();

        let reloading = Eligibility {
            has_tokens: false,
            has_sufficient_gas: false,
            delegation_known: false,
            can_activate: false,
            ..eligible()
        };
        assert_eq!(wizard.begin_submit(&reloading), Err(WizardError::NotEligible));
        assert_eq!(
            wizard.register_external(hash(8), &reloading),
            Err(WizardError::NotEligible)
        );
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Idle);
        assert_eq!(wizard.step(), &WizardStep::Confirm);

        wizard.begin_submit(&eligible()).unwrap();
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Pending);
    }

    #[test]
    fn collapsed_flow_submits_on_activate() {
        let mut wizard = Wizard::new(FlowMode::Collapsed);
        assert_eq!(wizard.activate(&eligible()), Ok(Activation::Submit));
        assert_eq!(wizard.lifecycle(), &TxLifecycle::Pending);
        assert_eq!(wizard.begin_submit(&eligible()), Err(WizardError::SubmissionInFlight));
    }

    #[test]
    fn done_is_terminal() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.observe(&self_delegated());
        assert!(matches!(
            wizard.activate(&eligible()),
            Err(WizardError::InvalidTransition { step: 3, .. })
        ));
        assert!(wizard.begin_submit(&eligible()).is_err());
        assert!(wizard.back().is_err());
        assert!(!wizard.can_submit());
    }

    #[test]
    fn back_only_when_idle() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        assert!(wizard.back().is_err());
        wizard.activate(&eligible()).unwrap();
        wizard.begin_submit(&eligible()).unwrap();
        assert_eq!(wizard.back(), Err(WizardError::SubmissionInFlight));
        wizard.failed("rejected").unwrap();
        wizard.back().unwrap();
        assert_eq!(wizard.step(), &WizardStep::Connect);
        assert_eq!(wizard.error(), None);
    }

    #[test]
    fn reset_keeps_flow() {
        let mut wizard = Wizard::new(FlowMode::Collapsed);
        wizard.activate(&eligible()).unwrap();
        wizard.reset();
        assert_eq!(wizard, Wizard::new(FlowMode::Collapsed));
    }

    #[test]
    fn serializes_step_and_lifecycle() {
        let mut wizard = Wizard::new(FlowMode::ThreeStep);
        wizard.activate(&eligible()).unwrap();
        wizard.register_external(hash(0xab), &eligible()).unwrap();
        let json = serde_json::to_value(&wizard).unwrap();
        assert_eq!(json["step"]["step"], "confirm");
        assert_eq!(json["lifecycle"]["state"], "confirming");
        assert_eq!(json["lifecycle"]["txHash"], format!("0x{}", "ab".repeat(32)));
        assert_eq!(json["flow"], "three-step");
    }
}
