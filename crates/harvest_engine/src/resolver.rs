//! Item resolution: link -> item id -> metadata lookup -> chosen asset.

use std::time::Duration;

use harvest_core::{
    derive_item_id, select_best_available, select_tiered, AssetVariant, Delivery, Resolution,
    SkipReason, VariantRule,
};
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::fetch::{build_client, map_reqwest_error, FetchSettings};
use crate::page::PageController;
use crate::{FailureKind, FetchError};

/// Source of item metadata. Sources that read the item page are handed the
/// browser; API sources ignore it.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// The hits for the item; empty when the item is unknown.
    async fn lookup(
        &self,
        item_id: &str,
        item_url: &str,
        page: &mut dyn PageController,
    ) -> Result<Vec<Value>, FetchError>;
}

#[async_trait::async_trait]
impl<S: MetadataSource + ?Sized> MetadataSource for Box<S> {
    async fn lookup(
        &self,
        item_id: &str,
        item_url: &str,
        page: &mut dyn PageController,
    ) -> Result<Vec<Value>, FetchError> {
        (**self).lookup(item_id, item_url, page).await
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    hits: Vec<Value>,
}

/// `GET <endpoint>?key=<api_key>&id=<item_id>`.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpMetadataSource {
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        settings: &FetchSettings,
    ) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        Ok(Self {
            client: build_client(settings)?,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait::async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn lookup(
        &self,
        item_id: &str,
        _item_url: &str,
        _page: &mut dyn PageController,
    ) -> Result<Vec<Value>, FetchError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("id", item_id);

        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: LookupResponse = serde_json::from_slice(&body)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(parsed.hits)
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Lookups attempted for transient failures before giving up.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAsset {
    pub url: String,
    pub tier: Option<String>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetSource {
    Direct(SelectedAsset),
    /// Produced by clicking through the item page.
    Interactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub item_id: String,
    /// First hit, recorded verbatim.
    pub metadata: Value,
    pub asset: AssetSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(ResolvedItem),
    Skip {
        item_id: Option<String>,
        reason: SkipReason,
    },
}

pub struct ItemResolver<M> {
    source: M,
    delivery: Delivery,
    settings: ResolverSettings,
}

impl<M: MetadataSource> ItemResolver<M> {
    pub fn new(source: M, delivery: Delivery, settings: ResolverSettings) -> Self {
        Self {
            source,
            delivery,
            settings,
        }
    }

    pub async fn resolve(
        &self,
        page: &mut dyn PageController,
        item_url: &str,
    ) -> ResolveOutcome {
        let Some(item_id) = derive_item_id(item_url) else {
            return ResolveOutcome::Skip {
                item_id: None,
                reason: SkipReason::NoItemId,
            };
        };
        harvest_debug!("Resolved item id {} from {}", item_id, item_url);

        let skip = |reason| ResolveOutcome::Skip {
            item_id: Some(item_id.clone()),
            reason,
        };

        let hits = match self.lookup_with_retry(&item_id, item_url, page).await {
            Ok(hits) => hits,
            Err(err) => {
                return skip(SkipReason::MetadataUnavailable {
                    detail: err.to_string(),
                })
            }
        };
        let Some(metadata) = hits.into_iter().next() else {
            return skip(SkipReason::EmptyResult);
        };
        harvest_info!("Metadata retrieved for item {}", item_id);

        let asset = match &self.delivery {
            Delivery::Direct(rule) => match select_asset(rule, &metadata) {
                Some(selected) => AssetSource::Direct(selected),
                None => return skip(SkipReason::NoQualifyingVariant),
            },
            Delivery::Interactive(_) => AssetSource::Interactive,
        };

        ResolveOutcome::Resolved(ResolvedItem {
            item_id,
            metadata,
            asset,
        })
    }

    async fn lookup_with_retry(
        &self,
        item_id: &str,
        item_url: &str,
        page: &mut dyn PageController,
    ) -> Result<Vec<Value>, FetchError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.lookup(item_id, item_url, page).await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    harvest_warn!(
                        "Metadata lookup for {} failed (attempt {}/{}): {}",
                        item_id,
                        attempt,
                        max_attempts,
                        err
                    );
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Apply a [`VariantRule`] to one metadata hit.
pub fn select_asset(rule: &VariantRule, hit: &Value) -> Option<SelectedAsset> {
    match rule {
        VariantRule::TieredFloor {
            field,
            preference,
            floor,
        } => {
            let variants = tier_variants(hit.get(field)?, preference);
            let chosen = select_tiered(&variants, preference, *floor)?;
            Some(SelectedAsset {
                url: chosen.url.clone(),
                tier: Some(chosen.tier.clone()),
                resolution: Some(chosen.resolution()),
            })
        }
        VariantRule::BestAvailable { primary, fallback } => {
            let url = select_best_available(
                hit.get(primary).and_then(Value::as_str),
                hit.get(fallback).and_then(Value::as_str),
            )?;
            Some(SelectedAsset {
                url: url.to_string(),
                tier: None,
                resolution: None,
            })
        }
        VariantRule::PageField { field } => {
            let url = select_best_available(hit.get(field).and_then(Value::as_str), None)?;
            Some(SelectedAsset {
                url: url.to_string(),
                tier: None,
                resolution: None,
            })
        }
    }
}

fn tier_variants(tiers: &Value, preference: &[String]) -> Vec<AssetVariant> {
    preference
        .iter()
        .filter_map(|tier| {
            let entry = tiers.get(tier)?;
            Some(AssetVariant {
                tier: tier.clone(),
                url: entry
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                width: dimension(entry, "width"),
                height: dimension(entry, "height"),
            })
        })
        .collect()
}

fn dimension(entry: &Value, key: &str) -> u32 {
    entry
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0)
}
