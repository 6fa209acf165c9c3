//! Alarm points raised when a process dumps its heap after running out of memory.
use crate::point::MetricPoint;

/// Name of the metric raised for every heap dump.
pub const OOM_DUMP_METRIC: &str = "biz_oom_dump";

/// Builds the alarm point for a heap dump uploaded to object storage.
///
/// `storage_url` is the base URL of the bucket, and `file_name` the object key the dump was uploaded under,
/// typically built with [`dump_object_key`]. The point carries a value of `1` and a `trace_id` tag pointing
/// at the uploaded object.
pub fn oom_dump_alarm(storage_url: &str, file_name: &str, tenant: &str, env: &str, time: i64) -> MetricPoint {
    MetricPoint::from_parts(
        OOM_DUMP_METRIC,
        [
            ("cos_url", storage_url.to_string()),
            ("file_name", file_name.to_string()),
            ("trace_id", format!("{storage_url}/{file_name}")),
            ("ka", tenant.to_string()),
            ("env", env.to_string()),
        ],
        time,
        1.0,
    )
}

/// Builds the object key a heap dump is uploaded under.
pub fn dump_object_key(tenant: &str, env: &str, pod_id: &str, suffix: &str) -> String {
    format!("{tenant}/{env}/jvm/{pod_id}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::{dump_object_key, oom_dump_alarm, OOM_DUMP_METRIC};
    use crate::convert::convert;
    use crate::remote_write_proto::LABEL_NAME;

    #[test]
    fn test_object_key() {
        assert_eq!(
            dump_object_key("default", "test", "ops", "20240102150405"),
            "default/test/jvm/ops-20240102150405"
        );
    }

    #[test]
    fn test_alarm_point() {
        let key = dump_object_key("retail", "prod", "order-7f9c", "20240102150405");
        let point = oom_dump_alarm("https://dumps.example.com", &key, "retail", "prod", 1_704_207_845);

        assert_eq!(point.metric, OOM_DUMP_METRIC);
        assert_eq!(point.time, 1_704_207_845);
        assert_eq!(point.value, 1.0);
        assert_eq!(point.tags.len(), 5);
        assert_eq!(point.tags["cos_url"], "https://dumps.example.com");
        assert_eq!(point.tags["file_name"], "retail/prod/jvm/order-7f9c-20240102150405");
        assert_eq!(
            point.tags["trace_id"],
            "https://dumps.example.com/retail/prod/jvm/order-7f9c-20240102150405"
        );
        assert_eq!(point.tags["ka"], "retail");
        assert_eq!(point.tags["env"], "prod");
    }

    #[test]
    fn test_alarm_point_converts() {
        let point = oom_dump_alarm("https://dumps.example.com", "a/b/jvm/c-d", "a", "b", 1_704_207_845);
        let series = convert(&[point]).unwrap();

        assert_eq!(series.len(), 1);
        let labels = series[0].labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec![LABEL_NAME, "cos_url", "env", "file_name", "ka", "trace_id"]);
        assert_eq!(series[0].samples[0].timestamp, 1_704_207_845_000);
    }
}
