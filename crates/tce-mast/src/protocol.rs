//! MAST portal API wire types.
//!
//! Requests are JSON documents posted as the `request` form field of
//! `/api/v0/invoke`. Responses carry a `status` and a `data` array of rows.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub(crate) const SERVICE_FILTERED: &str = "Mast.Caom.Filtered";
pub(crate) const SERVICE_PRODUCTS: &str = "Mast.Caom.Products";
pub(crate) const STATUS_COMPLETE: &str = "COMPLETE";

#[derive(Debug, Serialize)]
pub(crate) struct InvokeRequest<P: Serialize> {
    pub service: &'static str,
    pub params: P,
    pub format: &'static str,
    pub pagesize: u32,
    pub page: u32,
    #[serde(rename = "removenullcolumns")]
    pub remove_null_columns: bool,
}

impl<P: Serialize> InvokeRequest<P> {
    pub fn new(service: &'static str, params: P) -> Self {
        Self {
            service,
            params,
            format: "json",
            pagesize: 5000,
            page: 1,
            remove_null_columns: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FilteredParams {
    pub columns: &'static str,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Filter {
    #[serde(rename = "paramName")]
    pub param_name: &'static str,
    pub values: Vec<Value>,
}

impl Filter {
    pub fn new(param_name: &'static str, values: Vec<Value>) -> Self {
        Self { param_name, values }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductsParams {
    pub obsid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvokeResponse<R> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default = "Vec::new")]
    pub data: Vec<R>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObservationRow {
    #[serde(deserialize_with = "string_or_number")]
    pub obsid: String,
    pub obs_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub target_name: String,
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub provenance_name: Option<String>,
    #[serde(default)]
    pub t_exptime: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductRow {
    #[serde(default)]
    pub obs_id: Option<String>,
    #[serde(rename = "productFilename")]
    pub product_filename: String,
    #[serde(rename = "dataURI")]
    pub data_uri: String,
    #[serde(rename = "productSubGroupDescription", default)]
    pub subgroup: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
