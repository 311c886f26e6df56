//! Rendering of the default registry in the prometheus text format.

use thiserror::Error;

use crate::{Encoder, PrometheusError, TextEncoder, gather};

#[derive(Debug, Error)]
pub enum GatherError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] PrometheusError),
    #[error("UTF-8 conversion error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
}

/// Returns every metric registered in prometheus' default registry as text.
///
/// Storage and epoch-state metrics all register there, so the `/metrics`
/// endpoint only has to call this.
pub fn gather_default_metrics() -> Result<String, GatherError> {
    let encoder = TextEncoder::new();
    let metric_families = gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_int_counter;

    #[test]
    fn test_registered_counter_is_rendered() {
        let counter =
            register_int_counter!("ethindex_gather_test_total", "Counter used by tests").unwrap();
        counter.inc_by(3);

        let text = gather_default_metrics().unwrap();
        assert!(text.contains("ethindex_gather_test_total 3"));
    }
}
