//! Connects to a spa gateway and prints the snapshot whenever it changes.
//!
//! ```text
//! SPA_HOST=192.168.1.40 SPA_DIALECT=sundance cargo run --example monitor
//! ```
//!
//! `SPA_PORT` overrides the dialect's default port and `RUST_LOG` the log filter.

use spa_rs485::util::init_tracing;
use spa_rs485::{Dialect, Session, SessionConfig};

#[tokio::main]
async fn main() -> spa_rs485::Result<()> {
    init_tracing("info,spa_rs485=debug");

    let host = std::env::var("SPA_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let dialect: Dialect = std::env::var("SPA_DIALECT")
        .unwrap_or_else(|_| "jacuzzi".to_string())
        .parse()?;
    let port = match std::env::var("SPA_PORT") {
        Ok(port) => Some(
            port.parse()
                .map_err(|_| spa_rs485::Error::config(format!("invalid SPA_PORT: {}", port)))?,
        ),
        Err(_) => None,
    };

    let session = Session::new(SessionConfig {
        port,
        ..SessionConfig::new(host, dialect)
    })?;
    println!("Monitoring {} spa at {}:{}", dialect, session.config().host, session.port());

    let runner = session.clone();
    let task = tokio::spawn(async move { runner.run().await });
    let mut updates = session.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = session.snapshot().await;
                println!("{}", session.connection_state_text());
                println!(
                    "  water {:?}  set point {:?}  ({})",
                    state.current_temp, state.set_temp, state.temp_scale
                );
                println!(
                    "  time {:02}:{:02}  date {}/{}",
                    state.time.hour, state.time.minute, state.date.month, state.date.day
                );
                println!("  pumps {:?}  circulation {}", state.pumps, state.circulation_pump);
                println!("  {}", session.last_update_text().await);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down");
                session.shutdown();
                break;
            }
        }
    }

    match task.await {
        Ok(result) => result,
        Err(e) => Err(spa_rs485::Error::invalid_state(format!("session task failed: {}", e))),
    }
}
