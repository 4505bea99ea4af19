use arcadia_catalog::{InventoryItem, ItemPatch};
use arcadia_core::{CustomerId, DomainError, DomainResult};
use arcadia_ledger::{EntryMeta, EntryType, Mutation};
use arcadia_loyalty::{EarnRate, LoyaltyTier};

use crate::access::{Capability, Requester};
use crate::request::{AdjustmentRequest, RestockRequest, SaleRequest};

/// The loyalty side effect a settled sale carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoyaltyEffect {
    None,
    Earn { customer_id: CustomerId, points: i64 },
    Redeem { customer_id: CustomerId, points: i64 },
}

/// A validated sale, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePlan {
    pub mutation: Mutation,
    pub loyalty: LoyaltyEffect,
}

/// A validated restock, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestockPlan {
    pub mutation: Mutation,
    /// Catalog write-back for cost/supplier, when the request carries them.
    pub patch: Option<ItemPatch>,
}

/// Validate a sale request against the catalog snapshot and customer context,
/// producing the mutation and loyalty effect to execute.
///
/// `customer_tier` and `customer_balance` come from the loyalty service for
/// the request's customer (when any). The balance check here is advisory; the
/// loyalty ledger itself is the authority at append time.
pub fn plan_sale(
    requester: &Requester,
    item: &InventoryItem,
    request: &SaleRequest,
    customer_tier: Option<LoyaltyTier>,
    customer_balance: Option<i64>,
    earn_rate: EarnRate,
) -> DomainResult<SalePlan> {
    requester.require(Capability::SellItems)?;
    request.validate()?;

    if item.retired {
        return Err(DomainError::not_eligible("item is retired"));
    }
    if item.is_vip_only && customer_tier != Some(LoyaltyTier::Vip) {
        return Err(DomainError::not_eligible("item is restricted to VIP customers"));
    }

    let loyalty = plan_loyalty_effect(item, request, customer_balance, earn_rate)?;

    let mutation = Mutation {
        item_id: item.id,
        delta: -request.quantity,
        entry_type: EntryType::Sale,
        meta: EntryMeta {
            unit_price_at_entry: Some(item.unit_price),
            related_session_id: request.session_id,
            related_customer_id: request.customer_id,
            payment_method: Some(request.payment_method),
            notes: request.notes.clone(),
            performed_by: Some(requester.actor_id),
        },
        idempotency_key: request.idempotency_key.clone(),
    };

    Ok(SalePlan { mutation, loyalty })
}

fn plan_loyalty_effect(
    item: &InventoryItem,
    request: &SaleRequest,
    customer_balance: Option<i64>,
    earn_rate: EarnRate,
) -> DomainResult<LoyaltyEffect> {
    use arcadia_ledger::PaymentMethod;

    if request.payment_method == PaymentMethod::LoyaltyPoints {
        if !item.is_redeemable {
            return Err(DomainError::NotRedeemable);
        }
        // validate() guarantees the customer is present for points payments
        let customer_id = request.customer_id.ok_or(DomainError::validation(
            "loyalty-points payment requires a customer",
        ))?;
        let required = item.points_required.saturating_mul(request.quantity);
        if let Some(balance) = customer_balance {
            if balance < required {
                return Err(DomainError::not_eligible(format!(
                    "insufficient loyalty points: {required} required, {balance} available"
                )));
            }
        }
        return Ok(LoyaltyEffect::Redeem {
            customer_id,
            points: required,
        });
    }

    match request.customer_id {
        Some(customer_id) if request.payment_method.is_paid_tender() => {
            let total = item.unit_price.saturating_mul(request.quantity as u64);
            let points = earn_rate.points_for(total);
            if points > 0 {
                Ok(LoyaltyEffect::Earn {
                    customer_id,
                    points,
                })
            } else {
                Ok(LoyaltyEffect::None)
            }
        }
        _ => Ok(LoyaltyEffect::None),
    }
}

/// Validate a restock request and produce the mutation plus the catalog
/// write-back for cost/supplier changes.
pub fn plan_restock(
    requester: &Requester,
    item: &InventoryItem,
    request: &RestockRequest,
) -> DomainResult<RestockPlan> {
    requester.require(Capability::RestockItems)?;
    request.validate()?;

    let patch = if request.cost_price.is_some() || request.supplier.is_some() {
        Some(ItemPatch {
            cost_price: request.cost_price,
            supplier: request.supplier.clone(),
            ..ItemPatch::default()
        })
    } else {
        None
    };

    let mutation = Mutation {
        item_id: item.id,
        delta: request.quantity,
        entry_type: EntryType::Restock,
        meta: EntryMeta {
            notes: request.notes.clone(),
            performed_by: Some(requester.actor_id),
            ..EntryMeta::default()
        },
        idempotency_key: request.idempotency_key.clone(),
    };

    Ok(RestockPlan { mutation, patch })
}

/// Validate a manual adjustment and produce its mutation.
pub fn plan_adjustment(
    requester: &Requester,
    item: &InventoryItem,
    request: &AdjustmentRequest,
) -> DomainResult<Mutation> {
    requester.require(Capability::AdjustStock)?;
    request.validate()?;

    Ok(Mutation {
        item_id: item.id,
        delta: request.delta,
        entry_type: request.reason.entry_type(),
        meta: EntryMeta {
            notes: request.notes.clone(),
            performed_by: Some(requester.actor_id),
            ..EntryMeta::default()
        },
        idempotency_key: request.idempotency_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_catalog::ItemDraft;
    use arcadia_core::{ActorId, ItemId};
    use arcadia_ledger::PaymentMethod;
    use chrono::Utc;

    fn cashier() -> Requester {
        Requester::new(ActorId::new(), [Capability::SellItems])
    }

    fn item(unit_price: u64) -> InventoryItem {
        let draft = ItemDraft {
            name: "Soda".to_string(),
            category: "drinks".to_string(),
            unit_price,
            cost_price: None,
            low_stock_threshold: None,
            is_redeemable: false,
            points_required: 0,
            is_vip_only: false,
            is_promo_active: false,
            expiry_date: None,
            supplier: None,
        };
        InventoryItem::from_draft(ItemId::new(), draft, Utc::now()).unwrap()
    }

    fn sale(item: &InventoryItem, quantity: i64, payment_method: PaymentMethod) -> SaleRequest {
        SaleRequest {
            item_id: item.id,
            quantity,
            payment_method,
            customer_id: None,
            session_id: None,
            notes: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn cash_sale_snapshots_the_unit_price() {
        let item = item(15_000);
        let plan = plan_sale(
            &cashier(),
            &item,
            &sale(&item, 3, PaymentMethod::Cash),
            None,
            None,
            EarnRate::default(),
        )
        .unwrap();

        assert_eq!(plan.mutation.delta, -3);
        assert_eq!(plan.mutation.entry_type, EntryType::Sale);
        assert_eq!(plan.mutation.meta.unit_price_at_entry, Some(15_000));
        assert_eq!(plan.loyalty, LoyaltyEffect::None);
    }

    #[test]
    fn paid_sale_with_customer_earns_points() {
        let item = item(15_000);
        let customer = CustomerId::new();
        let mut request = sale(&item, 2, PaymentMethod::Mpesa);
        request.customer_id = Some(customer);

        let plan = plan_sale(&cashier(), &item, &request, None, None, EarnRate::default()).unwrap();
        // 2 * 15_000 cents at the default rate of one point per 10_000
        assert_eq!(
            plan.loyalty,
            LoyaltyEffect::Earn {
                customer_id: customer,
                points: 3,
            }
        );
    }

    #[test]
    fn points_sale_on_non_redeemable_item_is_rejected() {
        let item = item(10_000);
        let mut request = sale(&item, 1, PaymentMethod::LoyaltyPoints);
        request.customer_id = Some(CustomerId::new());

        let err = plan_sale(&cashier(), &item, &request, None, Some(500), EarnRate::default())
            .unwrap_err();
        assert_eq!(err, DomainError::NotRedeemable);
    }

    #[test]
    fn points_sale_checks_the_advisory_balance() {
        let mut item = item(10_000);
        item.is_redeemable = true;
        item.points_required = 40;
        let mut request = sale(&item, 2, PaymentMethod::LoyaltyPoints);
        request.customer_id = Some(CustomerId::new());

        let err = plan_sale(&cashier(), &item, &request, None, Some(79), EarnRate::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotEligible(_)));

        let plan = plan_sale(&cashier(), &item, &request, None, Some(80), EarnRate::default())
            .unwrap();
        assert!(matches!(plan.loyalty, LoyaltyEffect::Redeem { points: 80, .. }));
    }

    #[test]
    fn vip_item_requires_a_vip_customer() {
        let mut item = item(10_000);
        item.is_vip_only = true;
        let mut request = sale(&item, 1, PaymentMethod::Cash);
        request.customer_id = Some(CustomerId::new());

        let err = plan_sale(
            &cashier(),
            &item,
            &request,
            Some(LoyaltyTier::Standard),
            None,
            EarnRate::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotEligible(_)));

        assert!(
            plan_sale(
                &cashier(),
                &item,
                &request,
                Some(LoyaltyTier::Vip),
                None,
                EarnRate::default(),
            )
            .is_ok()
        );
    }

    #[test]
    fn retired_item_cannot_be_sold() {
        let mut item = item(10_000);
        item.retired = true;
        let err = plan_sale(
            &cashier(),
            &item,
            &sale(&item, 1, PaymentMethod::Cash),
            None,
            None,
            EarnRate::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotEligible(_)));
    }

    #[test]
    fn sale_requires_the_sell_capability() {
        let item = item(10_000);
        let manager = Requester::new(ActorId::new(), [Capability::ManageCatalog]);
        let err = plan_sale(
            &manager,
            &item,
            &sale(&item, 1, PaymentMethod::Cash),
            None,
            None,
            EarnRate::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotEligible(_)));
    }

    #[test]
    fn restock_carries_cost_and_supplier_write_back() {
        let item = item(10_000);
        let requester = Requester::new(ActorId::new(), [Capability::RestockItems]);
        let request = RestockRequest {
            item_id: item.id,
            quantity: 15,
            cost_price: Some(6_000),
            supplier: Some("Acme Distributors".to_string()),
            notes: None,
            idempotency_key: None,
        };

        let plan = plan_restock(&requester, &item, &request).unwrap();
        assert_eq!(plan.mutation.delta, 15);
        assert_eq!(plan.mutation.entry_type, EntryType::Restock);
        assert_eq!(plan.mutation.meta.unit_price_at_entry, None);
        let patch = plan.patch.unwrap();
        assert_eq!(patch.cost_price, Some(6_000));
        assert_eq!(patch.supplier.as_deref(), Some("Acme Distributors"));
    }

    #[test]
    fn adjustment_maps_reason_to_entry_type() {
        use crate::request::AdjustmentReason;

        let item = item(10_000);
        let requester = Requester::new(ActorId::new(), [Capability::AdjustStock]);
        let request = AdjustmentRequest {
            item_id: item.id,
            delta: -2,
            reason: AdjustmentReason::Expired,
            notes: Some("fridge failure".to_string()),
            idempotency_key: None,
        };

        let mutation = plan_adjustment(&requester, &item, &request).unwrap();
        assert_eq!(mutation.entry_type, EntryType::Expired);
        assert_eq!(mutation.delta, -2);
    }
}
