//! # Catalog Rules
//!
//! Access and supply rules for artifacts.
//!
//! ## Access Matrix
//! ```text
//! ┌──────────────┬─────────────────────────┬─────────────────────────┐
//! │ visibility   │ view                    │ edit                    │
//! ├──────────────┼─────────────────────────┼─────────────────────────┤
//! │ PUBLIC       │ anyone                  │ owner, collaborators    │
//! │ UNLISTED     │ anyone                  │ owner, collaborators    │
//! │ PRIVATE      │ owner, collaborators    │ owner, collaborators    │
//! │ FRIENDS      │ owner, collaborators    │ owner, collaborators    │
//! └──────────────┴─────────────────────────┴─────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Artifact, SupplyClass, Visibility};
use crate::validation::validate_quantity;

/// Whether `user_id` is the owner or a listed collaborator.
pub fn is_member(artifact: &Artifact, user_id: &str) -> bool {
    artifact.owner_id == user_id || artifact.collaborators.iter().any(|c| c == user_id)
}

/// Whether the (possibly anonymous) viewer may see the artifact.
pub fn can_view(artifact: &Artifact, viewer: Option<&str>) -> bool {
    match artifact.visibility {
        Visibility::Public | Visibility::Unlisted => true,
        Visibility::Private | Visibility::Friends => {
            viewer.map(|v| is_member(artifact, v)).unwrap_or(false)
        }
    }
}

/// Whether the user may patch or delete the artifact.
#[inline]
pub fn can_edit(artifact: &Artifact, user_id: &str) -> bool {
    is_member(artifact, user_id)
}

/// Drops the supply limit for COMMON artifacts, whatever the input said.
#[inline]
pub fn normalize_supply_limit(class: SupplyClass, limit: Option<i64>) -> Option<i64> {
    if class.is_constrained() {
        limit
    } else {
        None
    }
}

/// Units still available, or `None` when the artifact is unconstrained.
pub fn remaining_supply(artifact: &Artifact) -> Option<i64> {
    if !artifact.supply_class.is_constrained() {
        return None;
    }
    artifact
        .supply_limit
        .map(|limit| (limit - artifact.supply_sold).max(0))
}

/// Checks one cart line against the artifact and returns its frozen unit price.
///
/// ## Checks (in order)
/// 1. price set and non-zero → else `NotForSale`
/// 2. quantity ≥ 1 → else Validation
/// 3. remaining supply ≥ quantity → else `SoldOut`
pub fn check_purchasable(artifact: &Artifact, quantity: i64) -> CoreResult<Money> {
    let price = match artifact.price() {
        Some(p) if p.is_positive() => p,
        _ => {
            return Err(CoreError::NotForSale {
                artifact_id: artifact.id.clone(),
            })
        }
    };

    validate_quantity(quantity)?;

    if let Some(remaining) = remaining_supply(artifact) {
        if remaining < quantity {
            return Err(CoreError::SoldOut {
                artifact_id: artifact.id.clone(),
                remaining,
                requested: quantity,
            });
        }
    }

    Ok(price)
}

/// Checks that `quantity` more units fit under `limit` and returns the new
/// sold count. Settlement runs this against the committed counter.
pub fn check_sale(artifact_id: &str, sold: i64, limit: Option<i64>, quantity: i64) -> CoreResult<i64> {
    let wanted = sold.saturating_add(quantity);
    match limit {
        Some(limit) if wanted > limit => Err(CoreError::SoldOut {
            artifact_id: artifact_id.to_string(),
            remaining: (limit - sold).max(0),
            requested: quantity,
        }),
        _ => Ok(wanted),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArtifactKind, PodProvider};
    use chrono::Utc;

    fn artifact(visibility: Visibility) -> Artifact {
        Artifact {
            id: "art-1".to_string(),
            owner_id: "owner".to_string(),
            collaborators: vec!["collab".to_string()],
            title: "Aurora".to_string(),
            kind: ArtifactKind::Image,
            description: None,
            media_urls: vec![],
            source_repo_url: None,
            supply_class: SupplyClass::Limited,
            supply_limit: Some(10),
            supply_sold: 0,
            pod_provider: PodProvider::None,
            price_cents: Some(500),
            currency: "USD".to_string(),
            visibility,
            reviews_enabled: true,
            license: None,
            qr_slug: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_view_rules() {
        for vis in [Visibility::Public, Visibility::Unlisted] {
            let a = artifact(vis);
            assert!(can_view(&a, None));
            assert!(can_view(&a, Some("stranger")));
        }
        for vis in [Visibility::Private, Visibility::Friends] {
            let a = artifact(vis);
            assert!(!can_view(&a, None));
            assert!(!can_view(&a, Some("stranger")));
            assert!(can_view(&a, Some("owner")));
            assert!(can_view(&a, Some("collab")));
        }
    }

    #[test]
    fn test_edit_rules() {
        let a = artifact(Visibility::Public);
        assert!(can_edit(&a, "owner"));
        assert!(can_edit(&a, "collab"));
        assert!(!can_edit(&a, "stranger"));
    }

    #[test]
    fn test_common_never_keeps_a_limit() {
        assert_eq!(normalize_supply_limit(SupplyClass::Common, Some(5)), None);
        assert_eq!(normalize_supply_limit(SupplyClass::Rare, Some(5)), Some(5));
    }

    #[test]
    fn test_check_purchasable() {
        let mut a = artifact(Visibility::Public);
        a.supply_sold = 9;

        assert_eq!(check_purchasable(&a, 1).unwrap().cents(), 500);
        assert!(matches!(
            check_purchasable(&a, 2),
            Err(CoreError::SoldOut { remaining: 1, requested: 2, .. })
        ));
        assert!(matches!(check_purchasable(&a, 0), Err(CoreError::Validation(_))));

        a.price_cents = None;
        assert!(matches!(check_purchasable(&a, 1), Err(CoreError::NotForSale { .. })));
        a.price_cents = Some(0);
        assert!(matches!(check_purchasable(&a, 1), Err(CoreError::NotForSale { .. })));
    }

    #[test]
    fn test_common_has_no_remaining_supply() {
        let mut a = artifact(Visibility::Public);
        a.supply_class = SupplyClass::Common;
        a.supply_limit = None;
        a.supply_sold = 1_000_000;
        assert_eq!(remaining_supply(&a), None);
        assert!(check_purchasable(&a, 50).is_ok());
    }

    #[test]
    fn test_check_sale_refuses_past_limit() {
        assert_eq!(check_sale("a", 7, Some(10), 3).unwrap(), 10);
        assert_eq!(check_sale("a", 7, None, 3).unwrap(), 10);
        assert!(matches!(
            check_sale("a", 8, Some(10), 3),
            Err(CoreError::SoldOut { remaining: 2, requested: 3, .. })
        ));
        assert!(matches!(
            check_sale("a", 10, Some(10), i64::MAX),
            Err(CoreError::SoldOut { remaining: 0, .. })
        ));
    }
}
