//! # Collaboration Agreements
//!
//! Revenue-split agreements between an artifact's owner and collaborators.
//! Only the owner creates or changes an agreement; the owner and listed
//! collaborators may read it. At most one agreement per artifact is ACTIVE,
//! and that one governs settlement.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use guild_core::catalog::is_member;
use guild_core::payout::{compute_payouts, PayoutBreakdown};
use guild_core::validation::{validate_percent, validate_splits};
use guild_core::{
    AgreementStatus, Artifact, CollabAgreement, CollabSplit, Money, Rate, ValidationError,
    PREVIEW_FEE_BPS, PREVIEW_REFERENCE_CENTS,
};

use super::{new_id, nullable, require};
use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;
use crate::Commerce;

/// One split as supplied by a caller: a percentage with up to two decimals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitInput {
    pub user_id: String,
    pub percent: f64,
}

impl SplitInput {
    pub fn new(user_id: impl Into<String>, percent: f64) -> Self {
        SplitInput {
            user_id: user_id.into(),
            percent,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgreement {
    pub artifact_id: Option<String>,
    pub splits: Option<Vec<SplitInput>>,
    pub terms_url: Option<String>,
    pub status: Option<AgreementStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementPatch {
    pub splits: Option<Vec<SplitInput>>,
    #[serde(default, deserialize_with = "nullable")]
    pub terms_url: Option<Option<String>>,
    pub status: Option<AgreementStatus>,
}

/// A stored agreement plus an illustrative split of the reference amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementCreated {
    pub agreement: CollabAgreement,
    /// Never persisted.
    pub preview: PayoutBreakdown,
}

pub struct CollabService<'a> {
    ctx: &'a Commerce,
}

impl<'a> CollabService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        CollabService { ctx }
    }

    /// Creates an agreement on an artifact the caller owns.
    ///
    /// ## Preview
    /// ```text
    /// 10,000 cents at 10% fee, splits 70/30
    ///   fee          = 1,000
    ///   distributable = 9,000 → 6,300 / 2,700
    /// ```
    pub async fn create(&self, caller: Option<&Principal>, input: NewAgreement) -> ApiResult<AgreementCreated> {
        let principal = require(caller)?;

        let artifact_id = input
            .artifact_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ValidationError::required("artifactId"))?;
        let split_inputs = input
            .splits
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ValidationError::required("splits"))?;

        let artifact = self.load_artifact(&artifact_id).await?;
        if artifact.owner_id != principal.user_id {
            return Err(ApiError::permission("Only the owner can create collab agreements"));
        }

        let splits = to_splits(&split_inputs)?;

        let now = Utc::now();
        let agreement = CollabAgreement {
            id: new_id(),
            artifact_id,
            splits,
            terms_url: input.terms_url,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.ctx.db().collabs().insert(&agreement).await?;

        info!(
            agreement_id = %agreement.id,
            artifact_id = %agreement.artifact_id,
            status = ?agreement.status,
            splits = agreement.splits.len(),
            "Collab agreement created"
        );

        let preview = compute_payouts(
            Money::from_cents(PREVIEW_REFERENCE_CENTS),
            Rate::from_bps(PREVIEW_FEE_BPS),
            &agreement.splits,
        );

        Ok(AgreementCreated { agreement, preview })
    }

    /// Reads an agreement. Owner or collaborators of the artifact only.
    pub async fn get(&self, caller: Option<&Principal>, agreement_id: &str) -> ApiResult<CollabAgreement> {
        let principal = require(caller)?;
        let agreement = self.load(agreement_id).await?;

        let artifact = self.ctx.db().artifacts().get_by_id(&agreement.artifact_id).await?;
        match artifact {
            Some(a) if is_member(&a, &principal.user_id) => Ok(agreement),
            _ => Err(ApiError::permission("Forbidden")),
        }
    }

    /// Updates splits, terms URL and status independently.
    pub async fn patch(
        &self,
        caller: Option<&Principal>,
        agreement_id: &str,
        patch: AgreementPatch,
    ) -> ApiResult<CollabAgreement> {
        let principal = require(caller)?;
        let mut agreement = self.load(agreement_id).await?;

        let artifact = self.ctx.db().artifacts().get_by_id(&agreement.artifact_id).await?;
        match artifact {
            Some(a) if a.owner_id == principal.user_id => {}
            _ => return Err(ApiError::permission("Only the owner can update collab agreements")),
        }

        let replace_splits = match patch.splits {
            Some(inputs) => {
                if inputs.is_empty() {
                    return Err(ValidationError::required("splits").into());
                }
                agreement.splits = to_splits(&inputs)?;
                true
            }
            None => false,
        };
        if let Some(terms_url) = patch.terms_url {
            agreement.terms_url = terms_url;
        }
        if let Some(status) = patch.status {
            agreement.status = status;
        }

        agreement.updated_at = Utc::now();
        self.ctx.db().collabs().update(&agreement, replace_splits).await?;

        info!(
            agreement_id = %agreement.id,
            status = ?agreement.status,
            replace_splits,
            "Collab agreement updated"
        );

        Ok(agreement)
    }

    async fn load(&self, agreement_id: &str) -> ApiResult<CollabAgreement> {
        self.ctx
            .db()
            .collabs()
            .get_by_id(agreement_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Collab", agreement_id))
    }

    async fn load_artifact(&self, artifact_id: &str) -> ApiResult<Artifact> {
        self.ctx
            .db()
            .artifacts()
            .get_by_id(artifact_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Artifact", artifact_id))
    }
}

fn to_splits(inputs: &[SplitInput]) -> ApiResult<Vec<CollabSplit>> {
    let mut splits = Vec::with_capacity(inputs.len());
    for input in inputs {
        let percent = validate_percent("splits.percent", input.percent)?;
        splits.push(CollabSplit::new(input.user_id.clone(), percent));
    }

    validate_splits(&splits)?;
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use guild_core::SupplyClass;

    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{adult, harness, listed};

    fn agreement(artifact_id: &str, splits: Vec<SplitInput>) -> NewAgreement {
        NewAgreement {
            artifact_id: Some(artifact_id.to_string()),
            splits: Some(splits),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_returns_preview() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1000).await;

        let created = h
            .commerce
            .collabs()
            .create(
                Some(&adult("owner")),
                agreement(&art.id, vec![SplitInput::new("owner", 70.0), SplitInput::new("collab", 30.0)]),
            )
            .await
            .unwrap();

        assert_eq!(created.agreement.status, AgreementStatus::Draft);
        assert_eq!(created.preview.fee_cents, 1000);
        let amounts: Vec<i64> = created.preview.allocations.iter().map(|a| a.amount_cents).collect();
        assert_eq!(amounts, vec![6300, 2700]);

        // The preview is never persisted
        assert!(h.commerce.db().orders().list_for_buyer("owner").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1000).await;
        let collabs = h.commerce.collabs();
        let owner = adult("owner");

        let err = collabs
            .create(Some(&adult("collab")), agreement(&art.id, vec![SplitInput::new("collab", 100.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Permission);

        let err = collabs
            .create(Some(&owner), agreement(&art.id, vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = collabs
            .create(
                Some(&owner),
                agreement(&art.id, vec![SplitInput::new("owner", 60.0), SplitInput::new("collab", 30.0)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = collabs
            .create(Some(&owner), agreement("missing", vec![SplitInput::new("owner", 100.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_fractional_splits_round_to_whole() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1000).await;

        let created = h
            .commerce
            .collabs()
            .create(
                Some(&adult("owner")),
                agreement(
                    &art.id,
                    vec![
                        SplitInput::new("a", 33.33),
                        SplitInput::new("b", 33.33),
                        SplitInput::new("c", 33.34),
                    ],
                ),
            )
            .await
            .unwrap();

        let bps: Vec<u32> = created.agreement.splits.iter().map(|s| s.percent_bps).collect();
        assert_eq!(bps, vec![3333, 3333, 3334]);
        let preview = &created.preview;
        assert_eq!(preview.allocated() + preview.fee(), Money::from_cents(PREVIEW_REFERENCE_CENTS));
    }

    #[tokio::test]
    async fn test_read_and_update_access() {
        let h = harness().await;
        let owner = adult("owner");
        let mut art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1000).await;
        art = h
            .commerce
            .catalog()
            .patch(
                Some(&owner),
                &art.id,
                crate::services::ArtifactPatch {
                    collaborators: Some(vec!["collab".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let collabs = h.commerce.collabs();

        let created = collabs
            .create(
                Some(&owner),
                agreement(&art.id, vec![SplitInput::new("owner", 50.0), SplitInput::new("collab", 50.0)]),
            )
            .await
            .unwrap();
        let id = created.agreement.id;

        assert!(collabs.get(Some(&adult("collab")), &id).await.is_ok());
        let err = collabs.get(Some(&adult("stranger")), &id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Permission);

        let err = collabs
            .patch(Some(&adult("collab")), &id, AgreementPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Permission);

        let patch: AgreementPatch = serde_json::from_str(
            r#"{"status":"ACTIVE","termsUrl":"https://example.com/terms","splits":[{"userId":"owner","percent":80},{"userId":"collab","percent":20}]}"#,
        )
        .unwrap();
        let updated = collabs.patch(Some(&owner), &id, patch).await.unwrap();
        assert_eq!(updated.status, AgreementStatus::Active);
        assert_eq!(updated.terms_url.as_deref(), Some("https://example.com/terms"));

        let stored = collabs.get(Some(&owner), &id).await.unwrap();
        let bps: Vec<u32> = stored.splits.iter().map(|s| s.percent_bps).collect();
        assert_eq!(bps, vec![8000, 2000]);

        let bad = AgreementPatch {
            splits: Some(vec![SplitInput::new("owner", 80.0)]),
            ..Default::default()
        };
        let err = collabs.patch(Some(&owner), &id, bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_second_active_agreement_conflicts() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1000).await;
        let owner = adult("owner");
        let active = || NewAgreement {
            status: Some(AgreementStatus::Active),
            ..agreement(&art.id, vec![SplitInput::new("owner", 100.0)])
        };

        h.commerce.collabs().create(Some(&owner), active()).await.unwrap();
        let err = h.commerce.collabs().create(Some(&owner), active()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }
}
