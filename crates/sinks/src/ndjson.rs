//! Newline-delimited JSON encoding
//!
//! All built-in sinks serialize envelopes the same way: one JSON object per
//! line, trailing newline per line.

use buz_envelope::Envelope;

use crate::SinkError;

/// Encode a batch of envelopes as NDJSON bytes
pub fn encode_ndjson(envelopes: &[Envelope]) -> Result<Vec<u8>, SinkError> {
    // Rough pre-allocation; envelopes are typically a few hundred bytes
    let mut buf = Vec::with_capacity(envelopes.len() * 256);

    for envelope in envelopes {
        serde_json::to_writer(&mut buf, envelope)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        buf.push(b'\n');
    }

    Ok(buf)
}
