//! Event type and attribute key constants emitted by each chain module.

/// `x/assets` events.
pub mod assets {
    /// A client chain was registered.
    pub const NEW_CLIENT_CHAIN: &str = "client_chain_added";
    /// A client chain's metadata changed.
    pub const UPDATED_CLIENT_CHAIN: &str = "client_chain_updated";
    /// A token was registered.
    pub const NEW_TOKEN: &str = "token_added";
    /// A token's metadata changed.
    pub const UPDATED_TOKEN: &str = "token_updated";
    /// A token's staking total changed.
    pub const UPDATED_STAKING_TOTAL_AMOUNT: &str = "staking_total_amount_updated";
    /// A staker's balance for an asset changed.
    pub const UPDATED_STAKER_ASSET: &str = "staker_asset_updated";
    /// An operator's balance for an asset changed.
    pub const UPDATED_OPERATOR_ASSET: &str = "operator_asset_updated";

    /// Client chain name.
    pub const ATTR_NAME: &str = "name";
    /// Free-form metadata.
    pub const ATTR_META_INFO: &str = "meta_info";
    /// Client chain id.
    pub const ATTR_CHAIN_ID: &str = "chain_id";
    /// Exocore-side chain index.
    pub const ATTR_EXOCORE_CHAIN_INDEX: &str = "exocore_chain_index";
    /// Blocks until finality on the client chain.
    pub const ATTR_FINALIZATION_BLOCKS: &str = "finalization_blocks";
    /// `LayerZero` chain id.
    pub const ATTR_LZ_ID: &str = "layer_zero_chain_id";
    /// Signature scheme of the client chain.
    pub const ATTR_SIG_TYPE: &str = "signature_type";
    /// Address length on the client chain.
    pub const ATTR_ADDR_LENGTH: &str = "address_length";
    /// Asset id (`address_lzid`).
    pub const ATTR_ASSET_ID: &str = "asset_id";
    /// Token symbol.
    pub const ATTR_SYMBOL: &str = "symbol";
    /// Token contract address.
    pub const ATTR_ADDRESS: &str = "address";
    /// Token decimals.
    pub const ATTR_DECIMALS: &str = "decimals";
    /// Total amount (token staking total or operator total).
    pub const ATTR_TOTAL_AMOUNT: &str = "total_amount";
    /// Staker id (`address_lzid`).
    pub const ATTR_STAKER_ID: &str = "staker_id";
    /// Deposited amount.
    pub const ATTR_DEPOSIT_AMOUNT: &str = "deposit_amount";
    /// Withdrawable (free) amount.
    pub const ATTR_WITHDRAWABLE_AMOUNT: &str = "withdrawable_amount";
    /// Amount pending undelegation.
    pub const ATTR_PENDING_UNDELEGATION_AMOUNT: &str = "pending_undelegation_amount";
    /// Operator account address.
    pub const ATTR_OPERATOR_ADDRESS: &str = "operator_address";
    /// Total shares issued by an operator for an asset.
    pub const ATTR_TOTAL_SHARE: &str = "total_share";
    /// Shares held by the operator itself.
    pub const ATTR_OPERATOR_SHARE: &str = "operator_share";
}

/// `x/delegation` events.
pub mod delegation {
    /// Delegation amounts for a staker/asset/operator triple changed.
    pub const DELEGATION_STATE_UPDATED: &str = "delegation_state_updated";
    /// A staker was associated with an operator.
    pub const OPERATOR_ASSOCIATED: &str = "operator_associated";
    /// A staker was disassociated from its operator.
    pub const OPERATOR_DISASSOCIATED: &str = "operator_disassociated";
    /// A staker joined an operator/asset pair.
    pub const STAKER_APPENDED: &str = "staker_appended";
    /// A staker left an operator/asset pair.
    pub const STAKER_REMOVED: &str = "staker_removed";
    /// Every staker left an operator/asset pair.
    pub const ALL_STAKERS_REMOVED: &str = "all_stakers_removed";
    /// The native asset was delegated.
    pub const EXO_ASSET_DELEGATION: &str = "exo_asset_delegation";
    /// An undelegation record was created.
    pub const UNDELEGATION_STARTED: &str = "undelegation_started";
    /// An undelegation's hold count changed.
    pub const UNDELEGATION_HOLD_COUNT_CHANGED: &str = "undelegation_hold_count_changed";
    /// An undelegation completed.
    pub const UNDELEGATION_MATURED: &str = "undelegation_matured";

    /// Staker id.
    pub const ATTR_STAKER_ID: &str = "staker_id";
    /// Operator address.
    pub const ATTR_OPERATOR_ADDR: &str = "operator_addr";
    /// Asset id.
    pub const ATTR_ASSET_ID: &str = "asset_id";
    /// Amount waiting for undelegation.
    pub const ATTR_WAIT_UNDELEGATION_AMOUNT: &str = "wait_undelegation_amount";
    /// Shares that can still be undelegated.
    pub const ATTR_UNDELEGATABLE_SHARE: &str = "undelegatable_share";
    /// Amount.
    pub const ATTR_AMOUNT: &str = "amount";
    /// Undelegation record key.
    pub const ATTR_RECORD_ID: &str = "record_id";
    /// Epoch identifier at which the undelegation completes.
    pub const ATTR_COMPLETED_EPOCH_ID: &str = "completed_epoch_id";
    /// Epoch number at which the undelegation completes.
    pub const ATTR_COMPLETED_EPOCH_NUMBER: &str = "completed_epoch_number";
    /// Chain-wide undelegation sequence number.
    pub const ATTR_UNDELEGATION_ID: &str = "undelegation_id";
    /// Hash of the originating transaction.
    pub const ATTR_TX_HASH: &str = "tx_hash";
    /// Height of the originating transaction.
    pub const ATTR_BLOCK_NUMBER: &str = "block_number";
    /// Current hold count.
    pub const ATTR_HOLD_COUNT: &str = "hold_count";
}

/// `x/operator` events.
pub mod operator {
    /// An operator registered.
    pub const REGISTER_OPERATOR: &str = "register_operator";
    /// An operator opted into an AVS.
    pub const OPT_IN: &str = "opt_in";
    /// An operator's opt-in information changed.
    pub const OPT_INFO_UPDATED: &str = "opt_info_updated";
    /// A consensus key was set.
    pub const SET_CONS_KEY: &str = "set_cons_key";
    /// A previous consensus key was recorded during a rotation.
    pub const SET_PREV_CONS_KEY: &str = "set_prev_cons_key";
    /// Removal of a consensus key began.
    pub const INIT_REMOVE_CONS_KEY: &str = "init_remove_cons_key";
    /// Removal of a consensus key completed.
    pub const END_REMOVE_CONS_KEY: &str = "end_remove_cons_key";
    /// The previous consensus key was cleared.
    pub const REMOVE_PREV_CONS_KEY: &str = "remove_prev_cons_key";
    /// An operator's USD values for an AVS changed.
    pub const UPDATE_OPERATOR_USD_VALUE: &str = "update_operator_usd_value";
    /// An operator's USD values for an AVS were deleted.
    pub const DELETE_OPERATOR_USD_VALUE: &str = "delete_operator_usd_value";
    /// An AVS's USD value changed.
    pub const UPDATE_AVS_USD_VALUE: &str = "update_avs_usd_value";
    /// An AVS's USD value was deleted.
    pub const DELETE_AVS_USD_VALUE: &str = "delete_avs_usd_value";
    /// An undelegation record was slashed.
    pub const UNDELEGATION_SLASHED: &str = "undelegation_slashed";
    /// An operator's delegated asset was slashed.
    pub const OPERATOR_ASSET_SLASHED: &str = "operator_asset_slashed";

    /// Operator address.
    pub const ATTR_OPERATOR: &str = "operator";
    /// Operator metadata.
    pub const ATTR_META_INFO: &str = "meta_info";
    /// Commission rate.
    pub const ATTR_COMMISSION_RATE: &str = "commission_rate";
    /// Maximum commission rate.
    pub const ATTR_MAX_COMMISSION_RATE: &str = "max_commission_rate";
    /// Maximum daily commission change.
    pub const ATTR_MAX_CHANGE_RATE: &str = "max_change_rate";
    /// Time the commission last changed.
    pub const ATTR_COMMISSION_UPDATE_TIME: &str = "commission_update_time";
    /// AVS address.
    pub const ATTR_AVS_ADDR: &str = "avs_address";
    /// Slashing contract address.
    pub const ATTR_SLASH_CONTRACT: &str = "slash_contract";
    /// Opt-in height.
    pub const ATTR_OPT_IN_HEIGHT: &str = "opt_in_height";
    /// Opt-out height.
    pub const ATTR_OPT_OUT_HEIGHT: &str = "opt_out_height";
    /// Whether the operator is jailed.
    pub const ATTR_JAILED: &str = "jailed";
    /// Chain id.
    pub const ATTR_CHAIN_ID: &str = "chain_id";
    /// Consensus address.
    pub const ATTR_CONSENSUS_ADDRESS: &str = "consensus_address";
    /// Hex-encoded consensus public key.
    pub const ATTR_CONS_KEY_HEX: &str = "consensus_key_hex";
    /// Self USD value.
    pub const ATTR_SELF_USD_VALUE: &str = "self_usd_value";
    /// Total USD value.
    pub const ATTR_TOTAL_USD_VALUE: &str = "total_usd_value";
    /// Active USD value.
    pub const ATTR_ACTIVE_USD_VALUE: &str = "active_usd_value";
    /// Undelegation record key.
    pub const ATTR_RECORD_ID: &str = "record_id";
    /// Post-slash amount.
    pub const ATTR_AMOUNT: &str = "amount";
    /// Slashed amount.
    pub const ATTR_SLASH_AMOUNT: &str = "slash_amount";
    /// Asset id.
    pub const ATTR_ASSET_ID: &str = "asset_id";
}

/// `x/dogfood` events.
pub mod dogfood {
    /// The last total power changed.
    pub const LAST_TOTAL_POWER_UPDATED: &str = "last_total_power_updated";
    /// Opt-outs for an epoch finished.
    pub const OPT_OUTS_FINISHED: &str = "opt_outs_finished";
    /// Consensus addresses for an epoch were pruned.
    pub const CONS_ADDRS_PRUNED: &str = "cons_addrs_pruned";
    /// Undelegations for an epoch matured.
    pub const UNDELEGATIONS_MATURED: &str = "undelegations_matured";
    /// An operator began opting out.
    pub const OPT_OUT_BEGAN: &str = "opt_out_began";
    /// A consensus address was scheduled for pruning.
    pub const CONS_ADDR_PRUNING_SCHEDULED: &str = "cons_addr_pruning_scheduled";
    /// An undelegation's maturity was scheduled.
    pub const UNDELEGATION_MATURITY_SCHEDULED: &str = "undelegation_maturity_scheduled";
    /// The dogfood AVS was created.
    pub const DOGFOOD_AVS_CREATED: &str = "dogfood_avs_created";

    /// Epoch number.
    pub const ATTR_EPOCH: &str = "epoch";
    /// Operator address.
    pub const ATTR_OPERATOR: &str = "operator";
    /// Consensus address.
    pub const ATTR_CONS_ADDR: &str = "cons_addr";
    /// Undelegation record key.
    pub const ATTR_RECORD_ID: &str = "record_id";
    /// AVS address.
    pub const ATTR_AVS_ADDRESS: &str = "avs_address";
    /// Chain id without the revision suffix.
    pub const ATTR_CHAIN_ID_WITHOUT_REV: &str = "chain_id_without_rev";
}

/// `x/avs` events.
pub mod avs {
    /// An AVS was created.
    pub const AVS_CREATED: &str = "avs_created";
    /// A chain AVS was created.
    pub const CHAIN_AVS_CREATED: &str = "chain_avs_created";

    /// AVS address.
    pub const ATTR_AVS_ADDRESS: &str = "avs_address";
    /// Chain id.
    pub const ATTR_CHAIN_ID: &str = "chain_id";
}

/// `x/epochs` events.
pub mod epochs {
    /// An epoch ended.
    pub const EPOCH_END: &str = "epoch_end";

    /// Epoch identifier.
    pub const ATTR_EPOCH_IDENTIFIER: &str = "epoch_identifier";
}

/// `x/exomint` events.
pub mod exomint {
    /// Tokens were minted at an epoch boundary.
    pub const MINT: &str = "mint";

    /// Minted amount.
    pub const ATTR_AMOUNT: &str = "amount";
    /// Epoch identifier.
    pub const ATTR_EPOCH_IDENTIFIER: &str = "epoch_identifier";
    /// Epoch number.
    pub const ATTR_EPOCH_NUMBER: &str = "epoch_number";
    /// Minted denomination.
    pub const ATTR_DENOM: &str = "denom";
}
