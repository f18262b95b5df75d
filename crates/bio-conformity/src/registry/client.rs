use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use super::query::RegistryQuery;
use crate::config::RegistryConfig;
use crate::error::{ExternalService, ExternalServiceUnavailable};

const PAGE_SIZE: &str = "10";

/// One page of the operator directory: `{ items, total }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryPage {
    #[serde(default)]
    pub items: Vec<RegistryOperator>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryOperator {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub raison_sociale: Option<String>,
    pub denominationcourante: Option<String>,
    pub siret: Option<String>,
    pub numero_bio: Option<String>,
    pub adresses_operateurs: Vec<RegistryAddress>,
    pub activites: Vec<RegistryActivity>,
    pub certificats: Vec<RegistryCertificate>,
}

impl RegistryOperator {
    pub fn display_name(&self) -> Option<&str> {
        self.denominationcourante
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.raison_sociale.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryAddress {
    pub lieu: Option<String>,
    pub code_postal: Option<String>,
    pub ville: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryActivity {
    pub nom: Option<String>,
    pub etat_certification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryCertificate {
    pub organisme: Option<String>,
    pub date_engagement: Option<String>,
    pub date_suspension: Option<String>,
    pub date_arret: Option<String>,
    pub url: Option<String>,
}

/// Directory ids arrive as numbers or strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

/// The external organic operator directory.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn search(&self, query: &RegistryQuery)
        -> Result<RegistryPage, ExternalServiceUnavailable>;
}

pub struct HttpRegistryClient {
    base_url: String,
    client: Client,
}

impl HttpRegistryClient {
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ExternalServiceUnavailable> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| unavailable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn params(query: &RegistryQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(siret) = &query.siret {
            params.push(("siret", siret.clone()));
        } else if let Some(siren) = &query.siren {
            params.push(("siren", siren.clone()));
        } else {
            params.push(("nom", query.name()));
            if let Some(postal_code) = &query.postal_code {
                params.push(("codePostal", postal_code.clone()));
            }
        }
        params.push(("nb", PAGE_SIZE.to_string()));
        params
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn search(
        &self,
        query: &RegistryQuery,
    ) -> Result<RegistryPage, ExternalServiceUnavailable> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::params(query))
            .send()
            .await
            .map_err(|err| unavailable(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}")));
        }

        let page: RegistryPage = response
            .json()
            .await
            .map_err(|err| unavailable(format!("unreadable directory response: {err}")))?;
        debug!(items = page.items.len(), total = page.total, "registry page received");
        Ok(page)
    }
}

fn unavailable(reason: impl Into<String>) -> ExternalServiceUnavailable {
    ExternalServiceUnavailable::new(ExternalService::Registry, reason)
}
