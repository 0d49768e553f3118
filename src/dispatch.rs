//! Action classification and dispatch
//!
//! Maps decoded action tags onto a closed enum of action kinds, with an
//! explicit forward-compatible `Unknown` variant, and routes each kind to
//! its handler. The lookup table is built once at startup; tag strings
//! appear in exactly one place.

use crate::handlers::{self, HandlerContext};
use anyhow::Result;
use std::collections::HashMap;

/// Every action this indexer understands, plus `Unknown` for
/// forward-compatible tags that fall back to the generic account refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    // account family, generic replace
    EditRecords,
    EditManager,
    RenewAccount,
    TransferAccount,
    StartAccountSale,
    CancelAccountSale,
    BuyAccount,
    AcceptOffer,
    LockAccountForCrossChain,
    UnlockAccountForCrossChain,
    ForceRecoverAccountStatus,
    // account family, special
    RecycleExpiredAccount,
    ConfirmProposal,
    BidExpiredAccountAuction,
    CreateApproval,
    DelayApproval,
    RevokeApproval,
    FulfillApproval,
    // sub-account family
    CreateSubAccount,
    EditSubAccount,
    RenewSubAccount,
    RecycleSubAccount,
    // reverse-record family
    DeclareReverseRecord,
    RedeclareReverseRecord,
    RetractReverseRecord,
    UpdateReverseRecordRoot,
    // did-cell family
    EditDidCell,
    TransferDidCell,
    RecycleDidCell,
    UpdateDidCellList,
    RecycleDidCellList,
    // contract lifecycle
    Deploy,
    /// Unmapped tag; handled by the generic account refresh
    Unknown,
}

const ACTION_TABLE: &[(&str, ActionKind)] = &[
    ("edit_records", ActionKind::EditRecords),
    ("edit_manager", ActionKind::EditManager),
    ("renew_account", ActionKind::RenewAccount),
    ("transfer_account", ActionKind::TransferAccount),
    ("start_account_sale", ActionKind::StartAccountSale),
    ("cancel_account_sale", ActionKind::CancelAccountSale),
    ("buy_account", ActionKind::BuyAccount),
    ("accept_offer", ActionKind::AcceptOffer),
    ("lock_account_for_cross_chain", ActionKind::LockAccountForCrossChain),
    ("unlock_account_for_cross_chain", ActionKind::UnlockAccountForCrossChain),
    ("force_recover_account_status", ActionKind::ForceRecoverAccountStatus),
    ("recycle_expired_account", ActionKind::RecycleExpiredAccount),
    ("confirm_proposal", ActionKind::ConfirmProposal),
    ("bid_expired_account_auction", ActionKind::BidExpiredAccountAuction),
    ("create_approval", ActionKind::CreateApproval),
    ("delay_approval", ActionKind::DelayApproval),
    ("revoke_approval", ActionKind::RevokeApproval),
    ("fulfill_approval", ActionKind::FulfillApproval),
    ("create_sub_account", ActionKind::CreateSubAccount),
    ("edit_sub_account", ActionKind::EditSubAccount),
    ("renew_sub_account", ActionKind::RenewSubAccount),
    ("recycle_sub_account", ActionKind::RecycleSubAccount),
    ("declare_reverse_record", ActionKind::DeclareReverseRecord),
    ("redeclare_reverse_record", ActionKind::RedeclareReverseRecord),
    ("retract_reverse_record", ActionKind::RetractReverseRecord),
    ("update_reverse_record_root", ActionKind::UpdateReverseRecordRoot),
    ("edit_did_cell", ActionKind::EditDidCell),
    ("transfer_did_cell", ActionKind::TransferDidCell),
    ("recycle_did_cell", ActionKind::RecycleDidCell),
    ("update_did_cell_list", ActionKind::UpdateDidCellList),
    ("recycle_did_cell_list", ActionKind::RecycleDidCellList),
    ("deploy_contract", ActionKind::Deploy),
];

/// Startup-built action table plus the routing switch.
pub struct Dispatcher {
    table: HashMap<&'static str, ActionKind>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: ACTION_TABLE.iter().copied().collect(),
        }
    }

    /// Classify a decoded action tag.
    pub fn classify(&self, tag: &str) -> ActionKind {
        self.table.get(tag).copied().unwrap_or(ActionKind::Unknown)
    }

    /// Route one classified transaction to its handler.
    pub fn dispatch(&self, kind: ActionKind, ctx: &mut HandlerContext) -> Result<()> {
        use ActionKind::*;
        match kind {
            EditRecords | EditManager | RenewAccount | TransferAccount | StartAccountSale
            | CancelAccountSale | BuyAccount | AcceptOffer | LockAccountForCrossChain
            | UnlockAccountForCrossChain | ForceRecoverAccountStatus => {
                handlers::account::update_account(ctx)
            }
            RecycleExpiredAccount => handlers::account::recycle_expired_account(ctx),
            ConfirmProposal => handlers::account::confirm_proposal(ctx),
            BidExpiredAccountAuction => handlers::account::bid_expired_account_auction(ctx),
            CreateApproval => handlers::account::create_approval(ctx),
            DelayApproval => handlers::account::delay_approval(ctx),
            RevokeApproval => handlers::account::revoke_approval(ctx),
            FulfillApproval => handlers::account::fulfill_approval(ctx),
            CreateSubAccount => handlers::sub_account::create_sub_accounts(ctx),
            EditSubAccount => handlers::sub_account::edit_sub_account(ctx),
            RenewSubAccount => handlers::sub_account::renew_sub_accounts(ctx),
            RecycleSubAccount => handlers::sub_account::recycle_sub_accounts(ctx),
            DeclareReverseRecord => handlers::reverse::declare_reverse_record(ctx),
            RedeclareReverseRecord => handlers::reverse::redeclare_reverse_record(ctx),
            RetractReverseRecord => handlers::reverse::retract_reverse_record(ctx),
            UpdateReverseRecordRoot => handlers::reverse::update_reverse_record_root(ctx),
            EditDidCell => handlers::did_cell::edit_did_cell(ctx),
            TransferDidCell => handlers::did_cell::transfer_did_cell(ctx),
            RecycleDidCell => handlers::did_cell::recycle_did_cell(ctx),
            UpdateDidCellList => handlers::did_cell::update_did_cell_list(ctx),
            RecycleDidCellList => handlers::did_cell::recycle_did_cell_list(ctx),
            Deploy => handlers::deploy(ctx),
            Unknown => handlers::account::refresh_account(ctx),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
