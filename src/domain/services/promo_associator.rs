//! Keeps each product in at most one active promo.
//!
//! Runs on every product create/update. The product is first detached from
//! every active promo listing it, then attached to the selected promo (if
//! any). Detach always runs first, so re-selecting the promo a product already
//! belongs to leaves that promo untouched.
//!
//! A selected promo id that does not resolve is skipped: the product is saved
//! without a promo rather than failing the whole save.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::PromoCode;
use crate::domain::events::{DomainEvent, PromoEvent};
use crate::domain::repositories::PromoRepository;
use crate::Result;

/// What `assign_product` changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignment {
    /// Promos whose `product_ids` differ from before, in input order.
    pub modified: Vec<Uuid>,
    /// The promo now holding the product, if the selection resolved.
    pub attached_to: Option<Uuid>,
    pub events: Vec<DomainEvent>,
}

/// Detaches `product_id` from every active promo in `promos`, then attaches it
/// to `new_promo_id` when that id is present in `promos`.
pub fn assign_product(product_id: Uuid, new_promo_id: Option<Uuid>, promos: &mut [PromoCode]) -> Assignment {
    let before: Vec<Vec<Uuid>> = promos.iter().map(|p| p.product_ids.clone()).collect();

    // Position held in the target promo, so re-selecting it is a no-op.
    let mut restore_at = None;
    for promo in promos.iter_mut().filter(|p| p.is_active) {
        if let Some(position) = promo.detach_product(product_id) {
            if Some(promo.id) == new_promo_id {
                restore_at = Some(position);
            }
        }
    }

    let mut attached_to = None;
    if let Some(target) = new_promo_id {
        match promos.iter_mut().find(|p| p.id == target) {
            Some(promo) => {
                promo.attach_product(product_id, restore_at);
                attached_to = Some(target);
            }
            None => warn!(%product_id, promo_id = %target, "selected promo not found, product left unassigned"),
        }
    }

    let mut assignment = Assignment { attached_to, ..Default::default() };
    for (promo, previous) in promos.iter().zip(before) {
        if promo.product_ids == previous {
            continue;
        }
        assignment.modified.push(promo.id);
        let had = previous.contains(&product_id);
        let has = promo.contains_product(product_id);
        if had && !has {
            assignment.events.push(DomainEvent::Promo(PromoEvent::ProductDetached { promo_id: promo.id, product_id }));
        } else if !had && has {
            assignment.events.push(DomainEvent::Promo(PromoEvent::ProductAttached { promo_id: promo.id, product_id }));
        }
    }
    assignment
}

/// Result of a persisted assignment.
#[derive(Clone, Debug, Default)]
pub struct AssignmentOutcome {
    pub updated: Vec<PromoCode>,
    pub attached_to: Option<Uuid>,
    pub events: Vec<DomainEvent>,
}

/// Runs [`assign_product`] against the promo store and saves every promo it
/// modified. Each save is independent: a failure is returned to the caller
/// but promos saved before it stay saved.
#[derive(Clone)]
pub struct PromoAssociator {
    promos: Arc<dyn PromoRepository>,
}

impl PromoAssociator {
    pub fn new(promos: Arc<dyn PromoRepository>) -> Self { Self { promos } }

    pub async fn assign(&self, product_id: Uuid, new_promo_id: Option<Uuid>) -> Result<AssignmentOutcome> {
        let mut promos = self.promos.list_promos().await?;
        let assignment = assign_product(product_id, new_promo_id, &mut promos);

        let mut updated = Vec::with_capacity(assignment.modified.len());
        for promo in promos.into_iter().filter(|p| assignment.modified.contains(&p.id)) {
            self.promos.update_promo(&promo).await?;
            updated.push(promo);
        }

        if !updated.is_empty() {
            info!(%product_id, promos = updated.len(), attached_to = ?assignment.attached_to, "promo association updated");
        }
        Ok(AssignmentOutcome { updated, attached_to: assignment.attached_to, events: assignment.events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Discount;
    use crate::infrastructure::memory::InMemoryStore;
    use crate::EcommerceError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn promo(code: &str) -> PromoCode { PromoCode::create(code, Discount::Percentage(dec!(10))).unwrap() }

    fn occurrences(promo: &PromoCode, product_id: Uuid) -> usize {
        promo.product_ids.iter().filter(|id| **id == product_id).count()
    }

    #[test]
    fn test_reassign_moves_product() {
        let p = Uuid::new_v4();
        let mut promos = vec![promo("A"), promo("B")];
        let (a, b) = (promos[0].id, promos[1].id);

        assign_product(p, Some(a), &mut promos);
        assert!(promos[0].contains_product(p));

        let result = assign_product(p, Some(b), &mut promos);
        assert!(!promos[0].contains_product(p));
        assert!(promos[1].contains_product(p));
        assert_eq!(result.modified, vec![a, b]);
        assert_eq!(result.events, vec![
            DomainEvent::Promo(PromoEvent::ProductDetached { promo_id: a, product_id: p }),
            DomainEvent::Promo(PromoEvent::ProductAttached { promo_id: b, product_id: p }),
        ]);
    }

    #[test]
    fn test_assign_twice_is_idempotent() {
        let (p, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut promos = vec![promo("A")];
        let a = promos[0].id;
        assign_product(p, Some(a), &mut promos);
        assign_product(other, Some(a), &mut promos);

        let result = assign_product(p, Some(a), &mut promos);
        assert_eq!(occurrences(&promos[0], p), 1);
        assert_eq!(promos[0].product_ids, vec![p, other]);
        assert!(result.modified.is_empty());
        assert_eq!(result.attached_to, Some(a));
    }

    #[test]
    fn test_unknown_promo_still_detaches() {
        let p = Uuid::new_v4();
        let mut promos = vec![promo("A"), promo("B")];
        promos[0].attach_product(p, None);
        promos[1].attach_product(p, None);

        let result = assign_product(p, Some(Uuid::new_v4()), &mut promos);
        assert!(promos.iter().all(|promo| !promo.contains_product(p)));
        assert_eq!(result.attached_to, None);
        assert_eq!(result.modified.len(), 2);
    }

    #[test]
    fn test_none_clears_assignment() {
        let p = Uuid::new_v4();
        let mut promos = vec![promo("A")];
        promos[0].attach_product(p, None);
        assign_product(p, None, &mut promos);
        assert!(promos[0].product_ids.is_empty());
    }

    #[test]
    fn test_inactive_promos_are_not_detached() {
        let p = Uuid::new_v4();
        let mut promos = vec![promo("OLD"), promo("NEW")];
        promos[0].is_active = false;
        promos[0].attach_product(p, None);
        let new = promos[1].id;

        let result = assign_product(p, Some(new), &mut promos);
        assert!(promos[0].contains_product(p));
        assert!(promos[1].contains_product(p));
        assert_eq!(result.modified, vec![new]);
    }

    #[test]
    fn test_attach_to_inactive_target() {
        let p = Uuid::new_v4();
        let mut promos = vec![promo("A")];
        promos[0].is_active = false;
        let a = promos[0].id;
        assign_product(p, Some(a), &mut promos);
        assert!(promos[0].contains_product(p));
    }

    #[tokio::test]
    async fn test_assign_persists_modified_promos() {
        let store = Arc::new(InMemoryStore::new());
        let (a, b) = (promo("A"), promo("B"));
        store.insert_promo(&a).await.unwrap();
        store.insert_promo(&b).await.unwrap();
        let associator = PromoAssociator::new(store.clone());
        let p = Uuid::new_v4();

        associator.assign(p, Some(a.id)).await.unwrap();
        let outcome = associator.assign(p, Some(b.id)).await.unwrap();
        assert_eq!(outcome.updated.len(), 2);

        assert!(!store.get_promo(a.id).await.unwrap().unwrap().contains_product(p));
        assert!(store.get_promo(b.id).await.unwrap().unwrap().contains_product(p));
    }

    /// Fails updates for one promo id, delegating everything else.
    struct FailingUpdates { inner: InMemoryStore, fail_for: Uuid }

    #[async_trait]
    impl PromoRepository for FailingUpdates {
        async fn list_promos(&self) -> Result<Vec<PromoCode>> { self.inner.list_promos().await }
        async fn get_promo(&self, id: Uuid) -> Result<Option<PromoCode>> { self.inner.get_promo(id).await }
        async fn find_promo_by_code(&self, code: &str) -> Result<Option<PromoCode>> { self.inner.find_promo_by_code(code).await }
        async fn insert_promo(&self, promo: &PromoCode) -> Result<()> { self.inner.insert_promo(promo).await }
        async fn update_promo(&self, promo: &PromoCode) -> Result<()> {
            if promo.id == self.fail_for { return Err(EcommerceError::StorageError("write failed".into())); }
            self.inner.update_promo(promo).await
        }
        async fn delete_promo(&self, id: Uuid) -> Result<bool> { self.inner.delete_promo(id).await }
        async fn record_promo_use(&self, id: Uuid) -> Result<()> { self.inner.record_promo_use(id).await }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_earlier_detachments() {
        let p = Uuid::new_v4();
        let mut a = promo("A");
        let mut b = promo("B");
        a.attach_product(p, None);
        b.attach_product(p, None);
        let inner = InMemoryStore::new();
        inner.insert_promo(&a).await.unwrap();
        inner.insert_promo(&b).await.unwrap();
        let repo = Arc::new(FailingUpdates { inner, fail_for: b.id });

        let err = PromoAssociator::new(repo.clone()).assign(p, None).await.unwrap_err();
        assert!(matches!(err, EcommerceError::StorageError(_)));
        assert!(!repo.get_promo(a.id).await.unwrap().unwrap().contains_product(p));
        assert!(repo.get_promo(b.id).await.unwrap().unwrap().contains_product(p));
    }
}
