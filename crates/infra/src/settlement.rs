use tracing::{debug, error, instrument};

use arcadia_core::{CustomerId, DomainError, EntryId};
use arcadia_ledger::{EntryMeta, EntryType, Mutation};
use arcadia_loyalty::{
    EarnRate, LoyaltyError, LoyaltyLedger, LoyaltyTier, LoyaltyTransaction, TransactionType,
};
use arcadia_settlement::{
    AdjustmentRequest, LoyaltyEffect, Requester, RestockRequest, SaleRequest, SettlementState,
    plan_adjustment, plan_restock, plan_sale,
};

use crate::engine::MutationEngine;
use crate::error::SettlementError;
use crate::store::{InventoryStore, RestockPatch};

/// The terminal record of a settlement.
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub entry_id: EntryId,
    pub new_stock: i64,
    pub state: SettlementState,
    pub loyalty: LoyaltyEffect,
    pub replayed: bool,
}

/// Composes a stock mutation with its loyalty side effects into an
/// all-or-nothing settlement.
///
/// On the happy path a sale moves Received → Validated → Mutated → Settled.
/// If the loyalty effect fails after the mutation committed, the mutation is
/// reversed with an equal-and-opposite `Adjustment` entry and the request
/// ends `Rejected` with the original failure. If that reversal itself cannot
/// be persisted the ledger is left inconsistent with the loyalty account and
/// `CompensationFailed` is surfaced.
pub struct SettlementCoordinator<S: InventoryStore, L: LoyaltyLedger> {
    engine: MutationEngine<S>,
    loyalty: L,
    earn_rate: EarnRate,
}

impl<S: InventoryStore, L: LoyaltyLedger> SettlementCoordinator<S, L> {
    pub fn new(engine: MutationEngine<S>, loyalty: L) -> Self {
        Self {
            engine,
            loyalty,
            earn_rate: EarnRate::default(),
        }
    }

    pub fn with_earn_rate(mut self, earn_rate: EarnRate) -> Self {
        self.earn_rate = earn_rate;
        self
    }

    pub fn engine(&self) -> &MutationEngine<S> {
        &self.engine
    }

    #[instrument(skip(self, requester, request), fields(item_id = %request.item_id, quantity = request.quantity), err)]
    pub fn sell(
        &self,
        requester: &Requester,
        request: &SaleRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let mut state = SettlementState::Received;

        let versioned = self.engine.store().get_item(request.item_id)?;

        let (tier, balance) = self.customer_context(request)?;
        let plan = plan_sale(
            requester,
            &versioned.item,
            request,
            tier,
            balance,
            self.earn_rate,
        )?;
        state = advance(state, SettlementState::Validated);

        let outcome = self.engine.apply(plan.mutation.clone())?;
        state = advance(state, SettlementState::Mutated);

        if outcome.replayed {
            // The original settlement already applied its loyalty effect.
            return Ok(SettlementReceipt {
                entry_id: outcome.entry_id,
                new_stock: outcome.new_stock,
                state: advance(state, SettlementState::Settled),
                loyalty: plan.loyalty,
                replayed: true,
            });
        }

        if let Err(cause) = self.apply_loyalty_effect(&plan.loyalty) {
            return Err(self.compensate(&plan.mutation, requester, state, cause));
        }

        Ok(SettlementReceipt {
            entry_id: outcome.entry_id,
            new_stock: outcome.new_stock,
            state: advance(state, SettlementState::Settled),
            loyalty: plan.loyalty,
            replayed: false,
        })
    }

    #[instrument(skip(self, requester, request), fields(item_id = %request.item_id, quantity = request.quantity), err)]
    pub fn restock(
        &self,
        requester: &Requester,
        request: &RestockRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let mut state = SettlementState::Received;

        let versioned = self.engine.store().get_item(request.item_id)?;
        let plan = plan_restock(requester, &versioned.item, request)?;
        state = advance(state, SettlementState::Validated);

        let patch = plan.patch.map(|p| RestockPatch {
            cost_price: p.cost_price,
            supplier: p.supplier,
        });
        let outcome = self.engine.apply_with_patch(plan.mutation, patch)?;
        state = advance(state, SettlementState::Mutated);

        Ok(SettlementReceipt {
            entry_id: outcome.entry_id,
            new_stock: outcome.new_stock,
            state: advance(state, SettlementState::Settled),
            loyalty: LoyaltyEffect::None,
            replayed: outcome.replayed,
        })
    }

    #[instrument(skip(self, requester, request), fields(item_id = %request.item_id, delta = request.delta), err)]
    pub fn adjust(
        &self,
        requester: &Requester,
        request: &AdjustmentRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let mut state = SettlementState::Received;

        let versioned = self.engine.store().get_item(request.item_id)?;
        let mutation = plan_adjustment(requester, &versioned.item, request)?;
        state = advance(state, SettlementState::Validated);

        let outcome = self.engine.apply(mutation)?;
        state = advance(state, SettlementState::Mutated);

        Ok(SettlementReceipt {
            entry_id: outcome.entry_id,
            new_stock: outcome.new_stock,
            state: advance(state, SettlementState::Settled),
            loyalty: LoyaltyEffect::None,
            replayed: outcome.replayed,
        })
    }

    /// Tier and (for redemption sales) balance of the request's customer.
    fn customer_context(
        &self,
        request: &SaleRequest,
    ) -> Result<(Option<LoyaltyTier>, Option<i64>), SettlementError> {
        let Some(customer_id) = request.customer_id else {
            return Ok((None, None));
        };

        let tier = self
            .loyalty
            .tier(customer_id)
            .map_err(map_loyalty_error)?;
        let balance = if request.payment_method == arcadia_ledger::PaymentMethod::LoyaltyPoints {
            Some(
                self.loyalty
                    .balance(customer_id)
                    .map_err(map_loyalty_error)?,
            )
        } else {
            None
        };
        Ok((Some(tier), balance))
    }

    fn apply_loyalty_effect(&self, effect: &LoyaltyEffect) -> Result<(), SettlementError> {
        let transaction = match effect {
            LoyaltyEffect::None => return Ok(()),
            LoyaltyEffect::Earn {
                customer_id,
                points,
            } => loyalty_transaction(*customer_id, TransactionType::Earn, *points),
            LoyaltyEffect::Redeem {
                customer_id,
                points,
            } => loyalty_transaction(*customer_id, TransactionType::Redeem, *points),
        };
        self.loyalty.append(transaction).map_err(map_loyalty_error)
    }

    /// Reverse a committed mutation with an equal-and-opposite adjustment
    /// entry, then surface the original cause.
    fn compensate(
        &self,
        mutation: &Mutation,
        requester: &Requester,
        state: SettlementState,
        cause: SettlementError,
    ) -> SettlementError {
        debug!(item_id = %mutation.item_id, %cause, "loyalty effect failed, reversing mutation");

        // The recorded outcome no longer stands once the commit is reversed;
        // a retry with the same key must re-execute, not replay it.
        if let Some(key) = &mutation.idempotency_key {
            self.engine.forget_key(key);
        }

        let reversal = Mutation {
            item_id: mutation.item_id,
            delta: -mutation.delta,
            entry_type: EntryType::Adjustment,
            meta: EntryMeta {
                notes: Some(format!("reversal: {cause}")),
                performed_by: Some(requester.actor_id),
                related_session_id: mutation.meta.related_session_id,
                related_customer_id: mutation.meta.related_customer_id,
                ..EntryMeta::default()
            },
            idempotency_key: None,
        };

        match self.engine.apply(reversal) {
            Ok(_) => {
                advance(state, SettlementState::Rejected);
                cause
            }
            Err(reversal_err) => {
                error!(
                    item_id = %mutation.item_id,
                    delta = mutation.delta,
                    %cause,
                    %reversal_err,
                    "compensation failed; ledger requires manual reconciliation"
                );
                advance(state, SettlementState::CompensationRequired);
                SettlementError::CompensationFailed(format!(
                    "mutation of {} on item {} could not be reversed ({reversal_err}); original failure: {cause}",
                    mutation.delta, mutation.item_id
                ))
            }
        }
    }
}

fn advance(from: SettlementState, to: SettlementState) -> SettlementState {
    debug_assert!(from.can_transition(to), "invalid transition {from} -> {to}");
    debug!(from = %from, to = %to, "settlement state");
    to
}

fn loyalty_transaction(
    customer_id: CustomerId,
    transaction_type: TransactionType,
    points: i64,
) -> LoyaltyTransaction {
    let description = match transaction_type {
        TransactionType::Earn => format!("earned {points} points on a paid sale"),
        TransactionType::Redeem => format!("redeemed {points} points against a sale"),
    };
    LoyaltyTransaction {
        customer_id,
        transaction_type,
        points,
        description,
    }
}

fn map_loyalty_error(err: LoyaltyError) -> SettlementError {
    match err {
        LoyaltyError::InsufficientPoints { balance, required } => {
            SettlementError::Domain(DomainError::not_eligible(format!(
                "insufficient loyalty points: {required} required, {balance} available"
            )))
        }
        LoyaltyError::UnknownCustomer => {
            SettlementError::Domain(DomainError::validation("unknown customer"))
        }
        LoyaltyError::Invalid(msg) => SettlementError::Domain(DomainError::validation(msg)),
        LoyaltyError::Unavailable(msg) => SettlementError::StoreUnavailable(msg),
    }
}
