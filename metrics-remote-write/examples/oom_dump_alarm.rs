//! Raises an OOM dump alarm against a Prometheus server accepting remote writes.
//!
//! Usage: `cargo run --example oom_dump_alarm -- [prometheus_addr] [storage_url] [tenant] [env] [pod_id]`
use std::env;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics_remote_write::{
    dump_object_key, oom_dump_alarm, Datasource, DatasourceConfig, RemoteConfig,
};
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let mut arg = |default: &str| args.next().unwrap_or_else(|| default.to_string());
    let prometheus = arg("127.0.0.1:9090");
    let storage_url = arg("https://dumps.example.com");
    let tenant = arg("default");
    let env = arg("test");
    let pod_id = arg("ops");

    let config = DatasourceConfig::new().with_remote_write(
        RemoteConfig::new("prometheus", format!("http://{prometheus}/api/v1/write"))
            .with_timeout(Duration::from_secs(5)),
    );
    let datasource = match Datasource::init(&config) {
        Ok(datasource) => datasource,
        Err(e) => {
            error!(error = %e, "Failed to initialize remote write datasource.");
            return;
        }
    };

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let file_name = dump_object_key(&tenant, &env, &pod_id, &now.to_string());
    let alarm = oom_dump_alarm(&storage_url, &file_name, &tenant, &env, now);

    if let Err(e) = datasource.blocking_remote_write(&[alarm]) {
        error!(error = %e, "Failed to send alarm.");
        return;
    }
    info!(%file_name, "Queued OOM dump alarm.");

    // Delivery happens in the background; give it a chance to finish before exiting.
    thread::sleep(Duration::from_secs(6));
}
