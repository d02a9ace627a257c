//! Records exchanged with the host runtime and how they are decoded.

use provix_core::{errmsg, Diagnostics, Timeouts};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AdapterError, AdapterResult};

/// A resource or data-source record.
///
/// `Shared` is the view handed to hooks: the fields common to every
/// lifecycle operation. The full record may carry more, such as the
/// `timeouts` block or virtual attributes the remote API never sees.
pub trait Model: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    type Shared: Send + Sync;

    fn shared(&mut self) -> &mut Self::Shared;

    fn timeouts(&self) -> Option<&Timeouts>;
}

pub(crate) fn decode<M: DeserializeOwned>(value: &Value, what: &'static str) -> AdapterResult<M> {
    serde_json::from_value(value.clone()).map_err(|source| AdapterError::Decode { what, source })
}

pub(crate) fn encode<M: Serialize>(model: &M, what: &'static str) -> AdapterResult<Value> {
    serde_json::to_value(model).map_err(|source| AdapterError::Encode { what, source })
}

/// Decode `value`, recording a conversion error on failure.
pub(crate) fn decode_into<M: DeserializeOwned>(value: &Value, what: &'static str, diags: &mut Diagnostics) -> Option<M> {
    match decode(value, what) {
        Ok(m) => Some(m),
        Err(AdapterError::Decode { what, source }) => {
            diags.add_error(errmsg::SUMMARY_VALUE_CONVERSION, errmsg::detail_value_conversion(what, source));
            None
        }
        Err(e) => {
            diags.add_error(errmsg::SUMMARY_VALUE_CONVERSION, e.to_string());
            None
        }
    }
}

pub(crate) fn encode_into<M: Serialize>(model: &M, what: &'static str, diags: &mut Diagnostics) -> Option<Value> {
    match encode(model, what) {
        Ok(v) => Some(v),
        Err(e) => {
            diags.add_error(errmsg::SUMMARY_VALUE_CONVERSION, e.to_string());
            None
        }
    }
}

/// Read a boolean attribute from a raw record. Missing and `null` read as
/// `false`.
pub fn bool_attribute(record: &Value, attribute: &str) -> AdapterResult<bool> {
    match record.get(attribute) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(AdapterError::InvalidAttribute {
            attribute: attribute.to_string(),
            message: format!("expected a boolean, got {other}"),
        }),
    }
}
