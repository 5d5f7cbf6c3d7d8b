use std::{collections::HashMap, env, time::Duration};

use anyhow::bail;
use log::info;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{metrics::SdkMeterProvider, Resource};

/// Builds the resource from the standard `OTEL_*` variables, including
/// `OTEL_RESOURCE_ATTRIBUTES` key-value pairs.
pub fn create_resource_from_env() -> Resource {
    let mut attributes = Vec::new();

    let service_name = env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "lodestone".to_string());
    attributes.push(KeyValue::new("service.name", service_name));

    for (var, key) in [
        ("OTEL_SERVICE_VERSION", "service.version"),
        ("OTEL_SERVICE_NAMESPACE", "service.namespace"),
        ("OTEL_SERVICE_INSTANCE_ID", "service.instance.id"),
        ("OTEL_DEPLOYMENT_ENVIRONMENT", "deployment.environment"),
    ] {
        if let Ok(value) = env::var(var) {
            attributes.push(KeyValue::new(key, value));
        }
    }

    if let Ok(resource_attributes) = env::var("OTEL_RESOURCE_ATTRIBUTES") {
        for (key, value) in parse_pairs(&resource_attributes) {
            // Explicit variables win over the free-form list.
            if !attributes.iter().any(|kv| kv.key.as_str() == key) {
                attributes.push(KeyValue::new(key, value));
            }
        }
    }

    Resource::builder().with_attributes(attributes).build()
}

/// Parses `key1=val1,key2=val2`, dropping malformed or empty entries.
fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}

fn parse_headers() -> HashMap<String, String> {
    dotenvy::var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_pairs(&raw).into_iter().collect())
        .unwrap_or_default()
}

fn build_metric_exporter() -> anyhow::Result<opentelemetry_otlp::MetricExporter> {
    let endpoint = dotenvy::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4318/v1/metrics".into());
    let protocol = dotenvy::var("OTEL_EXPORTER_OTLP_PROTOCOL")
        .unwrap_or_else(|_| "http/protobuf".into())
        .to_lowercase();

    info!("Sending metric to {}", endpoint);

    let timeout = dotenvy::var("OTEL_EXPORTER_OTLP_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(3));

    let protocol = match protocol.as_str() {
        "http/protobuf" => Protocol::HttpBinary,
        "http/json" => Protocol::HttpJson,
        other => bail!("Unsupported OTLP protocol: {other}"),
    };

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_protocol(protocol)
        .with_endpoint(endpoint)
        .with_timeout(timeout)
        .with_headers(parse_headers())
        .build()?;
    Ok(exporter)
}

pub fn init_meter() -> anyhow::Result<SdkMeterProvider> {
    let metric_exporter = build_metric_exporter()?;
    let resource = create_resource_from_env();

    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .with_resource(resource)
        .build();
    global::set_meter_provider(meter_provider.clone());
    Ok(meter_provider)
}

#[cfg(test)]
mod tests {
    use super::parse_pairs;

    #[test]
    fn pairs_skip_malformed_entries() {
        let pairs = parse_pairs("a=1, b = two ,broken,=x,c=");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string()),
            ]
        );
    }
}
