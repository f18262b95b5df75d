use serde::{Deserialize, Serialize};

/// Normalized form of a free-text supplier/operator lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryQuery {
    pub terms: Vec<String>,
    pub postal_code: Option<String>,
    pub siret: Option<String>,
    pub siren: Option<String>,
}

fn is_digits(token: &str, len: usize) -> bool {
    token.len() == len && token.chars().all(|c| c.is_ascii_digit())
}

impl RegistryQuery {
    /// Lowercase, collapse whitespace, lift the first postal code and company
    /// identifiers out as structured filters; everything else becomes a term.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let mut query = RegistryQuery::default();

        for token in lowered.split_whitespace() {
            if query.postal_code.is_none() && is_digits(token, 5) {
                query.postal_code = Some(token.to_string());
            } else if query.siret.is_none() && is_digits(token, 14) {
                query.siret = Some(token.to_string());
            } else if query.siren.is_none() && is_digits(token, 9) {
                query.siren = Some(token.to_string());
            } else {
                query.terms.push(token.to_string());
            }
        }

        query
    }

    /// Query for a known SIRET, ignoring any name.
    pub fn by_siret(siret: &str) -> Self {
        let digits: String = siret.chars().filter(|c| !c.is_whitespace()).collect();
        RegistryQuery {
            siret: Some(digits),
            ..RegistryQuery::default()
        }
    }

    pub fn name(&self) -> String {
        self.terms.join(" ")
    }

    pub fn has_structured_id(&self) -> bool {
        self.siret.is_some() || self.siren.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.postal_code.is_none() && !self.has_structured_id()
    }
}
