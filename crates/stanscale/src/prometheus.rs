//! Prometheus text exposition for scaler metric values.

use crate::metric::ExternalMetricValue;

/// Render metric values as a `stanscale_lag` gauge family, one sample per
/// metric name.
pub fn render_prometheus(values: &[ExternalMetricValue]) -> String {
    let mut out = String::new();

    out.push_str("# HELP stanscale_lag Messages behind the latest channel sequence for the target queue group.\n");
    out.push_str("# TYPE stanscale_lag gauge\n");
    for v in values {
        out.push_str(&format!(
            "stanscale_lag{{metric=\"{}\"}} {}\n",
            escape_label(&v.metric_name),
            v.value()
        ));
    }

    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty() {
        let output = render_prometheus(&[]);
        assert!(output.contains("# HELP stanscale_lag"));
        assert!(output.contains("# TYPE stanscale_lag gauge"));
    }

    #[test]
    fn render_values() {
        let values = vec![
            ExternalMetricValue::from_count("s0-stan-orders", 12),
            ExternalMetricValue::from_count("s1-stan-orders", 0),
        ];
        let output = render_prometheus(&values);

        assert!(output.contains("stanscale_lag{metric=\"s0-stan-orders\"} 12\n"));
        assert!(output.contains("stanscale_lag{metric=\"s1-stan-orders\"} 0\n"));
    }

    #[test]
    fn escapes_label_values() {
        assert_eq!(escape_label("a\"b\\c"), "a\\\"b\\\\c");
    }
}
