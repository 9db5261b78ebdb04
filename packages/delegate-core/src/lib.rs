//! Core logic for the ENS self-delegation wizard.
//!
//! Everything here is pure: address and amount types, token contract
//! calldata, the eligibility derivation, the wizard state machine and the
//! governance proposal filters. Network access lives in the server crate.

pub mod abi;
pub mod address;
pub mod eligibility;
pub mod proposals;
pub mod units;
pub mod wizard;

pub use address::{Address, AddressError, TxHash};
pub use eligibility::{evaluate, Blocker, Eligibility, EligibilityInputs, Read, WalletState};
pub use proposals::{count_proposals, Proposal, ProposalFilter};
pub use units::{format_units, QuantityError, U256, GAS_THRESHOLD_WEI, TOKEN_DECIMALS};
pub use wizard::{Activation, FlowMode, TxLifecycle, Wizard, WizardError, WizardStep};

/// ENS governance token on Ethereum mainnet.
pub const ENS_TOKEN_ADDRESS: &str = "0xC18360217D8F7Ab5e7c516566761Ea12Ce7F9D72";

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}
