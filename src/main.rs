use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use shuffle_server::server::ServerId;
use shuffle_server::server::handlers::{
    handle_finish_upload, handle_read_partition, handle_remove_shuffle, handle_shuffle_closed,
    handle_start_upload, handle_stats, handle_wait_closed, handle_write_record,
};
use shuffle_server::server::protocol::{
    ENDPOINT_READ_PARTITION, ENDPOINT_REMOVE_SHUFFLE, ENDPOINT_SHUFFLE_CLOSED, ENDPOINT_STATS,
    ENDPOINT_UPLOAD_FINISH, ENDPOINT_UPLOAD_RECORD, ENDPOINT_UPLOAD_START, ENDPOINT_WAIT_CLOSED,
};
use shuffle_server::shuffle::registry::AppShuffleRegistry;
use std::net::SocketAddr;

/// Parses `--bind <addr:port>` out of the argument list.
///
/// A `--bind` with no value following it is an error, not a panic.
fn parse_bind_addr(args: &[String]) -> anyhow::Result<Option<SocketAddr>> {
    let mut bind_addr: Option<SocketAddr> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                if i + 1 >= args.len() {
                    anyhow::bail!("--bind requires a value");
                }
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    Ok(bind_addr)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let bind_addr = match parse_bind_addr(&args) {
        Ok(Some(addr)) => addr,
        Ok(None) => {
            eprintln!("Usage: {} --bind <addr:port>", args[0]);
            eprintln!("Example: {} --bind 127.0.0.1:9000", args[0]);

            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Invalid arguments: {}", e);
            eprintln!("Usage: {} --bind <addr:port>", args[0]);

            std::process::exit(1);
        }
    };

    let server_id = ServerId::new();
    tracing::info!("Starting shuffle server {} on {}", server_id.0, bind_addr);

    // 1. Shuffle engine:
    let registry = AppShuffleRegistry::new();

    // 2. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_UPLOAD_START, post(handle_start_upload))
        .route(ENDPOINT_UPLOAD_RECORD, post(handle_write_record))
        .route(ENDPOINT_UPLOAD_FINISH, post(handle_finish_upload))
        .route(ENDPOINT_READ_PARTITION, post(handle_read_partition))
        .route(ENDPOINT_SHUFFLE_CLOSED, post(handle_shuffle_closed))
        .route(ENDPOINT_WAIT_CLOSED, post(handle_wait_closed))
        .route(ENDPOINT_REMOVE_SHUFFLE, post(handle_remove_shuffle))
        .route(ENDPOINT_STATS, get(handle_stats))
        .layer(Extension(registry.clone()))
        .layer(Extension(server_id));

    // 3. Spawn stats reporter:
    let stats_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            interval.tick().await;
            let stats = stats_registry.stats();
            tracing::info!(
                "Shuffle stats: {} shuffle(s), {} map task(s), {} buffered record(s), {} closed partition(s)",
                stats.shuffles,
                stats.map_tasks,
                stats.buffered_records,
                stats.closed_partitions
            );
        }
    });

    // 4. Start HTTP server:
    tracing::info!("Shuffle server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_bind_addr() {
        let parsed = parse_bind_addr(&args(&["server", "--bind", "127.0.0.1:9000"])).unwrap();
        assert_eq!(parsed, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn test_missing_bind_flag_returns_none() {
        let parsed = parse_bind_addr(&args(&["server"])).unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn test_trailing_bind_flag_is_an_error() {
        assert!(parse_bind_addr(&args(&["server", "--bind"])).is_err());
    }

    #[test]
    fn test_malformed_bind_value_is_an_error() {
        assert!(parse_bind_addr(&args(&["server", "--bind", "not-an-addr"])).is_err());
    }
}
