use chrono::Utc;
use comanda_catalog::{compute_delivery_fee, ensure_coverage, Cart, PricingConfig};
use comanda_core::{Actor, EventPublisher, Money};
use comanda_shared::{LifecycleEvent, OrderCreatedEvent, OrderPaidEvent, OrderStateChangedEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LifecycleError, LifecycleResult};
use crate::finance::{PaymentReconciler, PaymentRequest};
use crate::history::OrderHistoryEntry;
use crate::models::{Customer, LineItem, Order, OrderType, PaymentRecord};
use crate::repository::OrderRepository;
use crate::state_machine::{OrderState, OrderStateMachine, SideEffect, TransitionRejection};

/// Tunables for the lifecycle service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Largest accepted tip as a fraction of the product subtotal
    #[serde(default = "default_tip_ceiling_ratio")]
    pub tip_ceiling_ratio: f64,
}

fn default_tip_ceiling_ratio() -> f64 {
    1.0
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tip_ceiling_ratio: default_tip_ceiling_ratio(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if !self.tip_ceiling_ratio.is_finite() || self.tip_ceiling_ratio < 0.0 {
            return Err(LifecycleError::InvalidConfig(format!(
                "tip_ceiling_ratio must be a finite non-negative number, got {}",
                self.tip_ceiling_ratio
            )));
        }
        Ok(())
    }
}

/// Checkout data for a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub cart: Cart,
    pub customer: Customer,
    pub order_type: OrderType,
    /// Supplied by the routing collaborator, delivery orders only
    #[serde(default)]
    pub distance_km: Option<f64>,
}

/// Current state of an order and where `actor` may take it next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableTransitions {
    pub state: OrderState,
    pub targets: Vec<OrderState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub order: Order,
    pub change_owed: Money,
    pub final_total: Money,
}

/// Orchestrates order creation, state transitions and payment collection.
///
/// Mutating calls on one order are serialized behind a per-order lock and
/// committed with a version check, so two actors racing on the same order
/// cannot both win.
pub struct OrderLifecycleService {
    repo: Arc<dyn OrderRepository>,
    publisher: Arc<dyn EventPublisher>,
    reconciler: PaymentReconciler,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OrderLifecycleService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        publisher: Arc<dyn EventPublisher>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            publisher,
            reconciler: PaymentReconciler::new(config.tip_ceiling_ratio),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a checkout.
    ///
    /// `pricing` is the restaurant's configuration as of now; the fee it
    /// yields is stored on the order and never recomputed.
    pub async fn create_order(
        &self,
        new_order: NewOrder,
        pricing: &PricingConfig,
        actor: &Actor,
    ) -> LifecycleResult<Order> {
        let NewOrder {
            cart,
            customer,
            order_type,
            distance_km,
        } = new_order;

        if cart.is_empty() {
            return Err(LifecycleError::EmptyCart);
        }
        for line in &cart.lines {
            line.validate()?;
        }
        cart.subtotal()?;
        if customer.name.trim().is_empty() {
            return Err(LifecycleError::InvalidCustomer("name is required".to_string()));
        }

        let delivery = match order_type {
            OrderType::Delivery => {
                if !customer.has_address() {
                    return Err(LifecycleError::MissingAddress);
                }
                let distance_km = distance_km.ok_or(LifecycleError::MissingDistance)?;
                pricing.validate()?;
                ensure_coverage(pricing, distance_km)?;
                let fee = compute_delivery_fee(pricing, distance_km)?;
                Some((distance_km, fee))
            }
            OrderType::Establishment => None,
        };

        let now = Utc::now();
        let line_items = cart
            .lines
            .iter()
            .map(LineItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let order = Order::new(order_type, customer, line_items, delivery, now)?;
        let entry = OrderHistoryEntry::creation(order.id, actor, now);

        self.repo.insert_order(&order, &entry).await?;

        info!(
            order_id = %order.id,
            order_type = %order.order_type,
            subtotal = order.product_subtotal,
            delivery_fee = ?order.delivery_fee,
            actor = %actor,
            "Order created"
        );

        self.publish(LifecycleEvent::OrderCreated(OrderCreatedEvent {
            order_id: order.id,
            order_type: order.order_type.as_str().to_string(),
            product_subtotal: order.product_subtotal,
            delivery_fee: order.delivery_fee,
            distance_km: order.distance_km,
            actor_id: actor.id.clone(),
            timestamp: now.timestamp(),
        }))
        .await;

        Ok(order)
    }

    /// Move an order to `target` on behalf of `actor`.
    ///
    /// Delivering an unpaid order settles it in the same commit, using
    /// `payment`; without one the transition is refused.
    pub async fn advance_state(
        &self,
        order_id: Uuid,
        target: OrderState,
        actor: &Actor,
        note: Option<String>,
        payment: Option<PaymentRequest>,
    ) -> LifecycleResult<Order> {
        // Unknown ids never get a lock entry
        self.load(order_id).await?;

        let lock = self.order_lock(order_id).await;
        let result = self.advance_locked(&lock, order_id, target, actor, note, payment).await;
        self.release_lock(order_id, lock).await;
        result
    }

    async fn advance_locked(
        &self,
        lock: &Mutex<()>,
        order_id: Uuid,
        target: OrderState,
        actor: &Actor,
        note: Option<String>,
        payment: Option<PaymentRequest>,
    ) -> LifecycleResult<Order> {
        let _guard = lock.lock().await;
        let current = self.load(order_id).await?;

        let transition = OrderStateMachine::validate(&current, target, actor).map_err(|err| {
            warn!(order_id = %order_id, actor = %actor, error = %err, "Transition rejected");
            err
        })?;

        let now = Utc::now();
        let mut updated = current.clone();

        let mut settled = None;
        if transition.effect == SideEffect::SettlePayment && !current.is_paid() {
            let request = payment.ok_or(LifecycleError::InvalidTransition {
                from: transition.from,
                to: transition.to,
                reason: TransitionRejection::PaymentMissing,
            })?;
            let record = self.reconcile(&current, &request)?;
            updated.payment = Some(record.clone());
            settled = Some(record);
        }

        OrderStateMachine::apply(&mut updated, &transition, actor, now);
        updated.version = current.version + 1;

        let entry = OrderHistoryEntry::transition(order_id, transition.from, transition.to, actor, note, now);
        self.commit(&updated, current.version, Some(&entry)).await?;

        info!(
            order_id = %order_id,
            from = %transition.from,
            to = %transition.to,
            actor = %actor,
            "Order state changed"
        );

        self.publish(LifecycleEvent::OrderStateChanged(OrderStateChangedEvent {
            order_id,
            from_state: transition.from.as_str().to_string(),
            to_state: transition.to.as_str().to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role.as_str().to_string(),
            assigned_rider_id: updated.assigned_rider_id.clone(),
            timestamp: now.timestamp(),
        }))
        .await;
        if let Some(record) = settled {
            self.publish_paid(&updated, &record).await;
        }

        Ok(updated)
    }

    /// One-time payment collection
    pub async fn collect_payment(
        &self,
        order_id: Uuid,
        request: PaymentRequest,
    ) -> LifecycleResult<PaymentReceipt> {
        self.load(order_id).await?;

        let lock = self.order_lock(order_id).await;
        let result = self.collect_locked(&lock, order_id, request).await;
        self.release_lock(order_id, lock).await;
        result
    }

    async fn collect_locked(
        &self,
        lock: &Mutex<()>,
        order_id: Uuid,
        request: PaymentRequest,
    ) -> LifecycleResult<PaymentReceipt> {
        let _guard = lock.lock().await;
        let current = self.load(order_id).await?;
        if current.state == OrderState::Cancelled {
            return Err(LifecycleError::OrderCancelled(order_id));
        }

        let record = self.reconcile(&current, &request)?;

        let mut updated = current.clone();
        updated.payment = Some(record.clone());
        updated.updated_at = record.paid_at;
        updated.version = current.version + 1;

        self.commit(&updated, current.version, None).await?;

        info!(
            order_id = %order_id,
            method = %record.method,
            final_total = record.final_total,
            change_owed = record.change_owed,
            "Payment collected"
        );
        self.publish_paid(&updated, &record).await;

        Ok(PaymentReceipt {
            change_owed: record.change_owed,
            final_total: record.final_total,
            order: updated,
        })
    }

    pub async fn get_order(&self, order_id: Uuid) -> LifecycleResult<Order> {
        self.load(order_id).await
    }

    pub async fn history(&self, order_id: Uuid) -> LifecycleResult<Vec<OrderHistoryEntry>> {
        Ok(self.repo.history(order_id).await?)
    }

    /// The order's state and the states `actor` may move it to next, read from one snapshot
    pub async fn available_transitions(&self, order_id: Uuid, actor: &Actor) -> LifecycleResult<AvailableTransitions> {
        let order = self.load(order_id).await?;
        Ok(AvailableTransitions {
            targets: OrderStateMachine::available_targets(&order, actor),
            state: order.state,
        })
    }

    async fn load(&self, order_id: Uuid) -> LifecycleResult<Order> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or(LifecycleError::NotFound(order_id))
    }

    async fn commit(
        &self,
        order: &Order,
        expected_version: u64,
        entry: Option<&OrderHistoryEntry>,
    ) -> LifecycleResult<()> {
        self.repo
            .update_order(order, expected_version, entry)
            .await
            .map_err(|err| {
                warn!(order_id = %order.id, error = %err, "Order commit failed");
                LifecycleError::from(err)
            })
    }

    /// Resolve the tip against the product subtotal and run the reconciler
    fn reconcile(&self, order: &Order, request: &PaymentRequest) -> LifecycleResult<PaymentRecord> {
        let tip = request
            .tip
            .map(|tip| tip.resolve(order.product_subtotal))
            .transpose()
            .map_err(|err| LifecycleError::InvalidTip(err.to_string()))?;

        Ok(self
            .reconciler
            .collect_payment(order, request.method, request.tendered, tip, Utc::now())?)
    }

    async fn order_lock(&self, order_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(order_id).or_default().clone()
    }

    /// Drop the map entry once no other caller holds or waits on it
    async fn release_lock(&self, order_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(&order_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&order_id);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn publish_paid(&self, order: &Order, record: &PaymentRecord) {
        self.publish(LifecycleEvent::OrderPaid(OrderPaidEvent {
            order_id: order.id,
            payment_method: record.method.as_str().to_string(),
            product_subtotal: order.product_subtotal,
            delivery_fee: order.delivery_fee.unwrap_or(0),
            tip: record.tip,
            final_total: record.final_total,
            change_owed: record.change_owed,
            timestamp: record.paid_at.timestamp(),
        }))
        .await;
    }

    async fn publish(&self, event: LifecycleEvent) {
        let order_id = event.order_id();
        if let Err(e) = self.publisher.publish(event).await {
            warn!(order_id = %order_id, error = %e, "Failed to publish lifecycle event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::replay;
    use crate::repository::InMemoryOrderRepository;
    use comanda_catalog::{CartLine, Product};
    use comanda_core::{PaymentMethod, TipInput, TracingPublisher};

    fn pricing() -> PricingConfig {
        PricingConfig {
            base_fee: 3000,
            base_distance_km: 1.0,
            fee_per_extra_km: 1500,
            max_delivery_distance_km: 8.0,
            estimated_prep_minutes: 30,
        }
    }

    fn service() -> (OrderLifecycleService, Arc<InMemoryOrderRepository>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderLifecycleService::new(repo.clone(), Arc::new(TracingPublisher), LifecycleConfig::default());
        (service, repo)
    }

    fn cart(price: Money) -> Cart {
        let product = Product::new("Bandeja paisa", price);
        Cart::new().with_line(CartLine::from_product(&product, 1, &[], None).unwrap())
    }

    fn delivery(subtotal: Money, distance_km: f64) -> NewOrder {
        NewOrder {
            cart: cart(subtotal),
            customer: Customer::new("Luis").with_address("Cra 7 # 12-30").with_phone("3001234567"),
            order_type: OrderType::Delivery,
            distance_km: Some(distance_km),
        }
    }

    fn establishment(subtotal: Money) -> NewOrder {
        NewOrder {
            cart: cart(subtotal),
            customer: Customer::new("Ana"),
            order_type: OrderType::Establishment,
            distance_km: None,
        }
    }

    #[tokio::test]
    async fn test_create_delivery_order_freezes_fee() {
        let (service, repo) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();

        assert_eq!(order.state, OrderState::Created);
        assert_eq!(order.delivery_fee, Some(6000));
        assert_eq!(order.product_subtotal, 15000);

        let history = service.history(order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_state, None);
        assert_eq!(history[0].to_state, OrderState::Created);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_fee_survives_pricing_change() {
        let (service, _) = service();
        let mut config = pricing();
        let order = service
            .create_order(delivery(15000, 3.0), &config, &Actor::customer("web"))
            .await
            .unwrap();

        config.base_fee = 9000;
        config.fee_per_extra_km = 4000;
        let cashier = Actor::cashier("c-1");
        let rider = Actor::rider("r-1");
        service.advance_state(order.id, OrderState::Ready, &cashier, None, None).await.unwrap();
        service.advance_state(order.id, OrderState::Dispatched, &rider, None, None).await.unwrap();

        let reloaded = service.get_order(order.id).await.unwrap();
        assert_eq!(reloaded.delivery_fee, Some(6000));

        let later = service
            .create_order(delivery(15000, 3.0), &config, &Actor::customer("web"))
            .await
            .unwrap();
        assert_eq!(later.delivery_fee, Some(9000 + 2 * 4000));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, repo) = service();
        let actor = Actor::customer("web");

        let mut empty = establishment(1000);
        empty.cart = Cart::new();
        assert_eq!(service.create_order(empty, &pricing(), &actor).await, Err(LifecycleError::EmptyCart));

        let mut no_address = delivery(1000, 2.0);
        no_address.customer.address = None;
        assert_eq!(
            service.create_order(no_address, &pricing(), &actor).await,
            Err(LifecycleError::MissingAddress)
        );

        let mut no_distance = delivery(1000, 2.0);
        no_distance.distance_km = None;
        assert_eq!(
            service.create_order(no_distance, &pricing(), &actor).await,
            Err(LifecycleError::MissingDistance)
        );

        let too_far = service.create_order(delivery(1000, 8.5), &pricing(), &actor).await;
        assert!(matches!(too_far, Err(LifecycleError::OutOfCoverage { .. })));

        let mut nameless = establishment(1000);
        nameless.customer.name = " ".to_string();
        assert!(matches!(
            service.create_order(nameless, &pricing(), &actor).await,
            Err(LifecycleError::InvalidCustomer(_))
        ));

        let backwards = service.create_order(delivery(1000, -1.0), &pricing(), &actor).await;
        assert_eq!(backwards, Err(LifecycleError::InvalidDistance(-1.0)));

        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected_before_write() {
        let (service, repo) = service();
        let actor = Actor::cashier("c-1");

        let product = Product::new("Langosta", Money::MAX / 2);
        let mut huge_line = establishment(1000);
        huge_line.cart = Cart::new().with_line(CartLine::from_product(&product, 3, &[], None).unwrap());
        assert!(matches!(
            service.create_order(huge_line, &pricing(), &actor).await,
            Err(LifecycleError::InvalidLineItem(_))
        ));

        let line = CartLine::from_product(&product, 1, &[], None).unwrap();
        let mut huge_cart = establishment(1000);
        huge_cart.cart = Cart::new().with_line(line.clone()).with_line(line.clone()).with_line(line);
        assert!(matches!(
            service.create_order(huge_cart, &pricing(), &actor).await,
            Err(LifecycleError::InvalidLineItem(_))
        ));

        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_establishment_ignores_distance() {
        let (service, _) = service();
        let mut new_order = establishment(20000);
        new_order.distance_km = Some(50.0);

        let order = service.create_order(new_order, &pricing(), &Actor::cashier("c-1")).await.unwrap();
        assert_eq!(order.delivery_fee, None);
        assert_eq!(order.distance_km, None);
    }

    #[tokio::test]
    async fn test_full_delivery_flow_with_cash_at_door() {
        let (service, _) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();
        let rider = Actor::rider("r-1");

        service.advance_state(order.id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap();
        let dispatched = service.advance_state(order.id, OrderState::Dispatched, &rider, None, None).await.unwrap();
        assert_eq!(dispatched.assigned_rider_id.as_deref(), Some("r-1"));

        service.advance_state(order.id, OrderState::Arrived, &rider, None, None).await.unwrap();

        let missing = service.advance_state(order.id, OrderState::Delivered, &rider, None, None).await;
        assert!(matches!(
            missing,
            Err(LifecycleError::InvalidTransition {
                reason: TransitionRejection::PaymentMissing,
                ..
            })
        ));

        let delivered = service
            .advance_state(
                order.id,
                OrderState::Delivered,
                &rider,
                Some("cliente pagó en efectivo".to_string()),
                Some(PaymentRequest::cash(25000)),
            )
            .await
            .unwrap();

        assert_eq!(delivered.state, OrderState::Delivered);
        let payment = delivered.payment.as_ref().unwrap();
        assert_eq!(payment.final_total, 21000);
        assert_eq!(payment.change_owed, 4000);
        assert!(delivered.invariant_violations().is_empty());

        let history = service.history(order.id).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(replay(&history).unwrap(), delivered.state);
    }

    #[tokio::test]
    async fn test_prepaid_order_delivers_without_payment() {
        let (service, _) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();

        let receipt = service.collect_payment(order.id, PaymentRequest::card()).await.unwrap();
        assert_eq!(receipt.final_total, 21000);
        assert_eq!(receipt.change_owed, 0);
        assert_eq!(receipt.order.payment_method(), Some(PaymentMethod::Card));

        let rider = Actor::rider("r-1");
        service.advance_state(order.id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap();
        service.advance_state(order.id, OrderState::Dispatched, &rider, None, None).await.unwrap();
        service.advance_state(order.id, OrderState::Arrived, &rider, None, None).await.unwrap();

        // a payment handed over for an already paid order is not charged again
        let delivered = service
            .advance_state(order.id, OrderState::Delivered, &rider, None, Some(PaymentRequest::cash(50000)))
            .await
            .unwrap();
        assert_eq!(delivered.payment, receipt.order.payment);
    }

    #[tokio::test]
    async fn test_establishment_checkout_with_tip() {
        let (service, _) = service();
        let cashier = Actor::cashier("c-1");
        let order = service.create_order(establishment(20000), &pricing(), &cashier).await.unwrap();

        service.advance_state(order.id, OrderState::Ready, &cashier, None, None).await.unwrap();
        let delivered = service
            .advance_state(
                order.id,
                OrderState::Delivered,
                &cashier,
                None,
                Some(PaymentRequest::cash(25000).with_tip(TipInput::Percent(10.0))),
            )
            .await
            .unwrap();

        assert_eq!(delivered.tip(), Some(2000));
        let payment = delivered.payment.unwrap();
        assert_eq!(payment.final_total, 22000);
        assert_eq!(payment.change_owed, 3000);
    }

    #[tokio::test]
    async fn test_collect_payment_twice() {
        let (service, _) = service();
        let order = service.create_order(establishment(20000), &pricing(), &Actor::cashier("c-1")).await.unwrap();

        let first = service.collect_payment(order.id, PaymentRequest::cash(25000)).await.unwrap();
        assert_eq!(first.change_owed, 5000);

        let second = service.collect_payment(order.id, PaymentRequest::cash(25000)).await;
        assert_eq!(second.unwrap_err(), LifecycleError::AlreadyPaid(order.id));
    }

    #[tokio::test]
    async fn test_failed_payment_changes_nothing() {
        let (service, _) = service();
        let order = service.create_order(establishment(20000), &pricing(), &Actor::cashier("c-1")).await.unwrap();

        let err = service.collect_payment(order.id, PaymentRequest::cash(19999)).await.unwrap_err();
        assert_eq!(err, LifecycleError::InsufficientPayment { tendered: 19999, total: 20000 });

        let err = service
            .collect_payment(order.id, PaymentRequest::card().with_tip(TipInput::Amount(20001)))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTip(_)));

        assert_eq!(service.get_order(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_order_untouched() {
        let (service, _) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();

        let err = service
            .advance_state(order.id, OrderState::Delivered, &Actor::cashier("c-1"), None, Some(PaymentRequest::card()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: OrderState::Created,
                to: OrderState::Delivered,
                ..
            }
        ));

        assert_eq!(service.get_order(order.id).await.unwrap(), order);
        assert_eq!(service.history(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_rider_cannot_mark_arrived() {
        let (service, _) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();
        service.advance_state(order.id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap();
        service.advance_state(order.id, OrderState::Dispatched, &Actor::rider("r-1"), None, None).await.unwrap();

        let err = service
            .advance_state(order.id, OrderState::Arrived, &Actor::rider("r-2"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                reason: TransitionRejection::NotAssignedRider { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_order_rejects_payment() {
        let (service, _) = service();
        let order = service.create_order(establishment(20000), &pricing(), &Actor::cashier("c-1")).await.unwrap();
        service
            .advance_state(order.id, OrderState::Cancelled, &Actor::owner("o-1"), Some("cliente se fue".to_string()), None)
            .await
            .unwrap();

        let err = service.collect_payment(order.id, PaymentRequest::card()).await.unwrap_err();
        assert_eq!(err, LifecycleError::OrderCancelled(order.id));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let (service, _) = service();
        let id = Uuid::new_v4();
        assert_eq!(service.get_order(id).await.unwrap_err(), LifecycleError::NotFound(id));
        assert_eq!(
            service.advance_state(id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap_err(),
            LifecycleError::NotFound(id)
        );
        assert_eq!(
            service.collect_payment(id, PaymentRequest::card()).await.unwrap_err(),
            LifecycleError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_has_single_winner() {
        let (service, _) = service();
        let service = Arc::new(service);
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();
        service.advance_state(order.id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let order_id = order.id;
            handles.push(tokio::spawn(async move {
                let rider = Actor::rider(format!("r-{}", i));
                service.advance_state(order_id, OrderState::Dispatched, &rider, None, None).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(service.history(order.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_every_transition_appends_one_entry() {
        let (service, _) = service();
        let cashier = Actor::cashier("c-1");
        let order = service.create_order(establishment(20000), &pricing(), &cashier).await.unwrap();

        let steps = [OrderState::Ready, OrderState::Delivered];
        for (i, target) in steps.into_iter().enumerate() {
            let payment = (target == OrderState::Delivered).then(PaymentRequest::transfer);
            let updated = service.advance_state(order.id, target, &cashier, None, payment).await.unwrap();

            let history = service.history(order.id).await.unwrap();
            assert_eq!(history.len(), i + 2);
            assert_eq!(replay(&history).unwrap(), updated.state);
            assert_eq!(updated.version, i as u64 + 2);
        }
    }

    #[tokio::test]
    async fn test_available_transitions_follow_role_and_assignment() {
        let (service, _) = service();
        let order = service
            .create_order(delivery(15000, 3.0), &pricing(), &Actor::customer("web"))
            .await
            .unwrap();

        assert_eq!(
            service.available_transitions(order.id, &Actor::cashier("c-1")).await.unwrap(),
            AvailableTransitions {
                state: OrderState::Created,
                targets: vec![OrderState::Ready, OrderState::Cancelled],
            }
        );
        assert!(service.available_transitions(order.id, &Actor::rider("r-1")).await.unwrap().targets.is_empty());

        service.advance_state(order.id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.unwrap();
        service.advance_state(order.id, OrderState::Dispatched, &Actor::rider("r-1"), None, None).await.unwrap();

        let rider_view = service.available_transitions(order.id, &Actor::rider("r-1")).await.unwrap();
        assert_eq!(rider_view.state, OrderState::Dispatched);
        assert_eq!(rider_view.targets, vec![OrderState::Arrived]);
        assert!(service.available_transitions(order.id, &Actor::rider("r-2")).await.unwrap().targets.is_empty());
    }

    #[tokio::test]
    async fn test_lock_map_does_not_grow() {
        let (service, _) = service();
        let service = Arc::new(service);

        for _ in 0..100 {
            let id = Uuid::new_v4();
            assert!(service.collect_payment(id, PaymentRequest::card()).await.is_err());
            assert!(service.advance_state(id, OrderState::Ready, &Actor::kitchen("k-1"), None, None).await.is_err());
        }
        assert_eq!(service.lock_count().await, 0);

        let cashier = Actor::cashier("c-1");
        let order = service.create_order(establishment(20000), &pricing(), &cashier).await.unwrap();
        service.advance_state(order.id, OrderState::Ready, &cashier, None, None).await.unwrap();
        service
            .advance_state(order.id, OrderState::Delivered, &cashier, None, Some(PaymentRequest::card()))
            .await
            .unwrap();
        assert!(service.collect_payment(order.id, PaymentRequest::card()).await.is_err());
        assert!(service.advance_state(order.id, OrderState::Cancelled, &cashier, None, None).await.is_err());
        assert_eq!(service.lock_count().await, 0);

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let order_id = order.id;
            handles.push(tokio::spawn(async move {
                let rider = Actor::rider(format!("r-{}", i));
                service.advance_state(order_id, OrderState::Dispatched, &rider, None, None).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(service.lock_count().await, 0);
    }

    #[test]
    fn test_lifecycle_config_validation() {
        assert!(LifecycleConfig::default().validate().is_ok());
        assert!(LifecycleConfig { tip_ceiling_ratio: 0.0 }.validate().is_ok());
        for ratio in [-0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                LifecycleConfig { tip_ceiling_ratio: ratio }.validate(),
                Err(LifecycleError::InvalidConfig(_))
            ));
        }
    }
}
