//! Address lookup providers, selected per region.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GeoError;

/// Norwegian address search (Kartverket / Geonorge).
pub const KARTVERKET_URL: &str = "https://ws.geonorge.no/adresser/v1/sok";

const MAX_SUGGESTIONS: usize = 10;

/// One address match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    /// Street address as written.
    pub address: String,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub municipality: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A backend that turns free text into address suggestions.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeoError>;
}

/// Provider that never finds anything.
#[derive(Debug, Clone, Default)]
pub struct NullAddressProvider;

#[async_trait]
impl AddressProvider for NullAddressProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn search(&self, _query: &str) -> Result<Vec<AddressSuggestion>, GeoError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct KartverketResponse {
    #[serde(default)]
    adresser: Vec<KartverketAddress>,
}

#[derive(Debug, Deserialize)]
struct KartverketAddress {
    adressetekst: String,
    postnummer: Option<String>,
    poststed: Option<String>,
    kommunenavn: Option<String>,
    representasjonspunkt: Option<KartverketPoint>,
}

#[derive(Debug, Deserialize)]
struct KartverketPoint {
    lat: f64,
    lon: f64,
}

impl From<KartverketAddress> for AddressSuggestion {
    fn from(a: KartverketAddress) -> Self {
        Self {
            address: a.adressetekst,
            postal_code: a.postnummer,
            city: a.poststed,
            municipality: a.kommunenavn,
            latitude: a.representasjonspunkt.as_ref().map(|p| p.lat),
            longitude: a.representasjonspunkt.as_ref().map(|p| p.lon),
        }
    }
}

/// Address search against the Norwegian mapping authority.
pub struct KartverketProvider {
    client: reqwest::Client,
    base_url: String,
}

impl KartverketProvider {
    pub fn new() -> Result<Self, GeoError> {
        Self::with_base_url(KARTVERKET_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .user_agent("Homni/1.0")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AddressProvider for KartverketProvider {
    fn name(&self) -> &str {
        "kartverket"
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeoError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!(query, "Searching Kartverket addresses");
        let hits = MAX_SUGGESTIONS.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("sok", query), ("treffPerSide", hits.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let body: KartverketResponse = response.json().await?;
        Ok(body.adresser.into_iter().map(AddressSuggestion::from).collect())
    }
}

/// Maps region codes (`"NO"`, `"SE"`, ...) to providers.
pub struct AddressProviderRegistry {
    providers: HashMap<String, Arc<dyn AddressProvider>>,
    default_region: String,
}

impl AddressProviderRegistry {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_region: default_region.into().to_uppercase(),
        }
    }

    /// Registry with Kartverket serving Norway.
    pub fn with_defaults(default_region: impl Into<String>) -> Result<Self, GeoError> {
        Ok(Self::new(default_region).register("NO", Arc::new(KartverketProvider::new()?)))
    }

    pub fn register(mut self, region: &str, provider: Arc<dyn AddressProvider>) -> Self {
        self.providers.insert(region.to_uppercase(), provider);
        self
    }

    /// Provider for a region, else the default region's, else a provider
    /// that finds nothing.
    pub fn resolve(&self, region: Option<&str>) -> Arc<dyn AddressProvider> {
        let requested = region.map(str::to_uppercase);
        requested
            .as_ref()
            .and_then(|r| self.providers.get(r))
            .or_else(|| self.providers.get(&self.default_region))
            .cloned()
            .unwrap_or_else(|| Arc::new(NullAddressProvider) as Arc<dyn AddressProvider>)
    }

    /// Search with the region's provider; lookup failures yield no suggestions.
    pub async fn search(&self, region: Option<&str>, query: &str) -> Vec<AddressSuggestion> {
        let provider = self.resolve(region);
        match provider.search(query).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Address lookup failed");
                Vec::new()
            }
        }
    }
}
