//! tradecore server - headless real-time trade execution engine.
//!
//! Runs the Signal Router, Candle Builder, and Trade Manager over
//! channel-backed signal/tick sources. No HTTP ingress; metrics are exposed
//! for scraping on `OBSERVABILITY_PORT` only if a caller pulls `/metrics`
//! through a separate process (this binary does not bind a listener).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveTime;
use tracing::{error, info, warn, Level};
use tracing_subscriber::prelude::*;

use tradecore::application::backtest::{BacktestEngine, SlippageConfig};
use tradecore::application::broker::BrokerGatewayImpl;
use tradecore::application::metrics::Metrics;
use tradecore::application::pivot::CachedPivotClient;
use tradecore::application::router::{RouteDecision, SignalRouter, SignalRouterConfig};
use tradecore::application::trade_manager::TradeManager;
use tradecore::config::{Config, TradingMode};
use tradecore::domain::clock::{Clock, GoldenWindow, SessionWindow, SystemClock};
use tradecore::domain::ports::{BacktestRepository, HistoricalCandleSource};
use tradecore::infrastructure::broker_client::MockBrokerClient;
use tradecore::infrastructure::bus::{
    ChannelSignalSource, ChannelTickSource, LoggingDeadLetterSink, LoggingEventListener, ResultBus,
};
use tradecore::infrastructure::http::HttpClientFactory;
use tradecore::infrastructure::market_data::{HttpHistoricalCandleSource, HttpPivotClient};
use tradecore::infrastructure::persistence::{Database, SqliteBacktestRepository};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("tradecore server {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let timezone: chrono_tz::Tz = config.trading.market_timezone.parse().expect("validated during config load");

    let mut sessions = HashMap::new();
    sessions.insert(
        "NSE".to_string(),
        SessionWindow {
            start: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            end: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        },
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock {
        timezone,
        sessions,
        golden: GoldenWindow {
            start: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        },
    });

    let result_bus = Arc::new(ResultBus::new());
    result_bus.subscribe(Arc::new(LoggingEventListener)).await;

    let dlq = Arc::new(LoggingDeadLetterSink);

    let http_client = HttpClientFactory::create_client();
    let pivot_client: Arc<dyn tradecore::domain::ports::PivotClient> =
        Arc::new(HttpPivotClient::new(http_client.clone(), config.broker.base_url.clone()));
    let pivot = Arc::new(CachedPivotClient::new(pivot_client));

    let historical: Arc<dyn HistoricalCandleSource> =
        Arc::new(HttpHistoricalCandleSource::new(http_client, config.broker.base_url.clone()));

    let broker_raw = Arc::new(MockBrokerClient);
    let broker = Arc::new(BrokerGatewayImpl::new(broker_raw, dlq.clone()));

    let trade_manager = Arc::new(TradeManager::new(
        config.to_trade_manager_config(),
        clock.clone(),
        broker.clone(),
        result_bus.clone(),
        Some(historical.clone()),
        Some(pivot.clone()),
    ));

    let backtest_engine = Arc::new(BacktestEngine::new(
        SlippageConfig {
            entry_bps: config.risk.slippage_entry_bps,
            exit_stop_multiplier: config.risk.slippage_exit_stop_multiplier,
        },
        config.trading.volume_gate_multiplier,
        config.trading.stop_buffer_pct,
        config.trading.trailing_percent_equity,
        config.trading.early_trailing_activation_percent,
    ));
    let backtest_repository = Arc::new(SqliteBacktestRepository::new(
        Database::new(&format!("sqlite://{}", config.trading.backtest_db_path)).await?,
    ));

    let metrics = Metrics::new()?;

    // Senders are the integration point for whatever transport actually
    // carries signals and ticks (a Kafka bridge, a websocket listener); kept
    // alive here so the consumer loops below block on `recv` instead of
    // exiting the moment the channel is observed closed.
    let (_signal_tx, mut signal_source) = ChannelSignalSource::new(1_024);
    let (_tick_tx, mut tick_source) = ChannelTickSource::new(4_096);

    let mut router = SignalRouter::new(
        SignalRouterConfig { live_age_threshold: chrono::Duration::seconds(config.trading.live_age_threshold_seconds) },
        clock.clone(),
        dlq.clone(),
    );

    let router_handle = {
        let trade_manager = trade_manager.clone();
        let metrics = metrics.clone();
        let pivot = pivot.clone();
        let historical = historical.clone();
        let backtest_engine = backtest_engine.clone();
        let backtest_repository = backtest_repository.clone();
        let clock = clock.clone();
        let mode = config.trading.mode;
        tokio::spawn(async move {
            use tradecore::domain::ports::SignalSource;
            while let Some(record) = signal_source.recv().await {
                if let Some((signal, route, correlation_id)) = router.on_signal(&record.payload, record.partition_offset).await {
                    metrics.record_signal_admitted(match route {
                        RouteDecision::Live => "live",
                        RouteDecision::Backtest => "backtest",
                    });
                    // BacktestOnly mode never places live orders, regardless of
                    // the router's age-based classification.
                    let effective_route = if mode == TradingMode::BacktestOnly { RouteDecision::Backtest } else { route };
                    match effective_route {
                        RouteDecision::Live => {
                            trade_manager.admit(signal, rust_decimal::Decimal::ZERO, correlation_id).await;
                        }
                        RouteDecision::Backtest => {
                            let instrument_key = signal.scrip_code.clone();
                            let trading_date = signal.origin_timestamp.with_timezone(&clock.market_timezone()).date_naive();
                            let pivot_level = pivot.daily_pivot(&instrument_key, trading_date).await;
                            match historical.fetch_1m(&instrument_key, trading_date).await {
                                Ok(candles) => {
                                    let signal_time = signal.origin_timestamp;
                                    match backtest_engine.run(signal, signal_time, pivot_level, &candles) {
                                        Some(result) => {
                                            metrics.record_trade_closed(result.realized_pnl > rust_decimal::Decimal::ZERO);
                                            if let Err(e) = backtest_repository.save(&result).await {
                                                error!(instrument = %instrument_key, error = %e, "failed to persist backtest result");
                                            }
                                        }
                                        None => info!(instrument = %instrument_key, "backtest produced no entry"),
                                    }
                                }
                                Err(e) => warn!(instrument = %instrument_key, error = %e, "historical candle fetch failed for backtest route"),
                            }
                        }
                    }
                }
                signal_source.ack(&record).await;
            }
        })
    };

    let candle_handle = {
        use tradecore::application::candles::CandleBuilder;
        use tradecore::domain::ports::TickSource;

        let trade_manager = trade_manager.clone();
        tokio::spawn(async move {
            let mut builder = CandleBuilder::new(5 * 60 * 1_000);
            while let Some(tick) = tick_source.recv().await {
                if let Some(candle) = builder.on_tick(tick) {
                    trade_manager.on_closed_candle(candle).await;
                }
            }
        })
    };

    let sweep_handle = {
        let trade_manager = trade_manager.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                trade_manager.sweep_expired_waiting().await;
            }
        })
    };

    let retention_handle = {
        let backtest_repository = backtest_repository.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3_600));
            loop {
                interval.tick().await;
                let cutoff = chrono::Utc::now() - chrono::Duration::days(90);
                match backtest_repository.prune_older_than(cutoff).await {
                    Ok(pruned) if pruned > 0 => info!(pruned, "pruned expired backtest records"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "backtest record retention sweep failed"),
                }
            }
        })
    };

    info!("server running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    router_handle.abort();
    candle_handle.abort();
    sweep_handle.abort();
    retention_handle.abort();

    Ok(())
}
