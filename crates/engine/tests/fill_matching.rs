//! Cross-checks FIFO reconciliation against the simulated broker's fill
//! history, the same path the reconciler runs in production.

use rust_decimal_macros::dec;
use trade_sentinel_broker_sim::SimBroker;
use trade_sentinel_core::{match_fills, BrokerGateway, TradeSide};

#[tokio::test]
async fn broker_fill_history_reconciles_fifo() {
    let broker = SimBroker::new();

    broker.set_price("AAPL", dec!(5)).await;
    broker
        .place_market_order("AAPL", TradeSide::Buy, dec!(10))
        .await
        .unwrap();
    broker.set_price("AAPL", dec!(6)).await;
    broker
        .place_market_order("AAPL", TradeSide::Buy, dec!(10))
        .await
        .unwrap();
    broker.set_price("AAPL", dec!(7)).await;
    let sell_id = broker
        .place_market_order("AAPL", TradeSide::Sell, dec!(15))
        .await
        .unwrap();

    let report = match_fills(&broker.get_filled_orders().await.unwrap());

    assert_eq!(report.total_pnl, dec!(25));
    assert_eq!(report.winning_matches, 2);
    assert_eq!(report.losing_matches, 0);
    assert!((report.win_rate - 100.0).abs() < f64::EPSILON);
    assert_eq!(report.sell_order_pnl[&sell_id], dec!(25));
    assert_eq!(broker.position("AAPL").await, dec!(5));
}

#[tokio::test]
async fn partial_exits_then_stop_out_net_to_the_expected_pnl() {
    let broker = SimBroker::new();

    // Fill 100 @ $10, take profit on 50 @ $11, stop the remaining 50 @ $9.
    broker.set_price("TSLA", dec!(10)).await;
    broker
        .place_market_order("TSLA", TradeSide::Buy, dec!(100))
        .await
        .unwrap();
    broker.set_price("TSLA", dec!(11)).await;
    broker
        .place_market_order("TSLA", TradeSide::Sell, dec!(50))
        .await
        .unwrap();
    broker.set_price("TSLA", dec!(9)).await;
    broker
        .place_market_order("TSLA", TradeSide::Sell, dec!(50))
        .await
        .unwrap();

    let report = match_fills(&broker.get_filled_orders().await.unwrap());

    assert_eq!(report.total_pnl, dec!(0)); // +50 - 50
    assert_eq!(report.winning_matches, 1);
    assert_eq!(report.losing_matches, 1);
    assert_eq!(broker.position("TSLA").await, dec!(0));
}
