// src/core/dispatch/encode.rs

//! Encoder gateway: turns user values into owned, audited wire buffers.

use crate::core::SpinelClientError;
use crate::core::commands::args::{ArgAudit, OwnedArgs};
use crate::core::types::{Codec, ReferenceBuilder, Value};
use std::sync::Arc;

/// Which of the codec's three encoders to apply.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EncodeAs {
    Value,
    MapKey,
    MapValue,
}

/// Encodes user values on their way into an argument list.
///
/// If a reference builder is configured and produces a persistent reference
/// for a value, the reference is encoded instead of the value itself. Any
/// codec failure is surfaced as an invalid-argument error, which the retry
/// driver never retries.
pub(crate) struct EncoderGateway {
    reference_builder: Option<Arc<dyn ReferenceBuilder>>,
    audit: Option<Arc<dyn ArgAudit>>,
}

impl EncoderGateway {
    pub(crate) fn new(
        reference_builder: Option<Arc<dyn ReferenceBuilder>>,
        audit: Option<Arc<dyn ArgAudit>>,
    ) -> Self {
        Self {
            reference_builder,
            audit,
        }
    }

    /// A fresh argument list wired to this gateway's audit.
    pub(crate) fn new_args(&self) -> OwnedArgs {
        OwnedArgs::new(self.audit.clone())
    }

    pub(crate) fn encode(
        &self,
        codec: &dyn Codec,
        value: &Value,
        mode: EncodeAs,
        out: &mut OwnedArgs,
    ) -> Result<(), SpinelClientError> {
        let reference = self
            .reference_builder
            .as_ref()
            .and_then(|builder| builder.to_reference(value));
        let effective = reference.as_ref().unwrap_or(value);

        let encoded = match mode {
            EncodeAs::Value => codec.encode_value(effective),
            EncodeAs::MapKey => codec.encode_map_key(effective),
            EncodeAs::MapValue => codec.encode_map_value(effective),
        }
        .map_err(invalid_argument)?;

        out.push_bulk(encoded);
        Ok(())
    }

    /// Encodes a parameter list in order, as plain values.
    pub(crate) fn encode_params(
        &self,
        codec: &dyn Codec,
        params: &[Value],
        out: &mut OwnedArgs,
    ) -> Result<(), SpinelClientError> {
        for param in params {
            self.encode(codec, param, EncodeAs::Value, out)?;
        }
        Ok(())
    }
}

fn invalid_argument(err: SpinelClientError) -> SpinelClientError {
    match err {
        e @ SpinelClientError::InvalidArgument(_) => e,
        other => SpinelClientError::InvalidArgument(other.to_string()),
    }
}
