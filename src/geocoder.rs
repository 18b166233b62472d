use std::fmt;

use log::error;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::PipelineError;
use crate::http_client::RetryingHttpClient;

pub const MISSING_ADDRESS: &str = "Missing Address";
pub const NOT_FOUND: &str = "Address Not Found in NYC";
pub const REQUEST_ERROR: &str = "API Request Error";

/// What a single lookup produced: a real label or one of the sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeOutcome {
    Label(String),
    MissingAddress,
    NotFound,
    RequestFailed,
}

impl GeocodeOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            GeocodeOutcome::Label(label) => label,
            GeocodeOutcome::MissingAddress => MISSING_ADDRESS,
            GeocodeOutcome::NotFound => NOT_FOUND,
            GeocodeOutcome::RequestFailed => REQUEST_ERROR,
        }
    }
}

impl fmt::Display for GeocodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GeocodeOutcome> for String {
    fn from(outcome: GeocodeOutcome) -> Self {
        match outcome {
            GeocodeOutcome::Label(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

/// Resolves one address. Implementations never fail: every problem
/// becomes a sentinel outcome.
pub trait AddressLookup {
    fn lookup(&self, address: Option<&str>, record_id: &str) -> GeocodeOutcome;
}

impl<T: AddressLookup + ?Sized> AddressLookup for &T {
    fn lookup(&self, address: Option<&str>, record_id: &str) -> GeocodeOutcome {
        (**self).lookup(address, record_id)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    label: String,
}

/// NYC geosearch client.
pub struct Geocoder {
    client: RetryingHttpClient,
}

impl Geocoder {
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        Ok(Geocoder {
            client: RetryingHttpClient::new(settings)?,
        })
    }

    pub fn with_client(client: RetryingHttpClient) -> Self {
        Geocoder { client }
    }
}

impl AddressLookup for Geocoder {
    fn lookup(&self, address: Option<&str>, record_id: &str) -> GeocodeOutcome {
        let address = match address.map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ => return GeocodeOutcome::MissingAddress,
        };

        match self.client.get_json::<FeatureCollection>(&[("text", address)]) {
            Ok(collection) => match collection.features.into_iter().next() {
                Some(top) => GeocodeOutcome::Label(top.properties.label),
                None => GeocodeOutcome::NotFound,
            },
            Err(e) => {
                error!(
                    "Property ID '{}': Request failed for '{}'. Error: {}",
                    record_id, address, e
                );
                GeocodeOutcome::RequestFailed
            }
        }
    }
}
