use std::time::Duration;

use phemex_streamer::auth::EnvCredentials;
use phemex_streamer::ws::{FeedMessage, LoopState, Streamer};

fn live_tests_enabled() -> bool {
    std::env::var("PHEMEX_LIVE_TESTS").ok().as_deref() == Some("1")
}

#[tokio::test]
#[ignore]
async fn live_testnet_orderbook_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let credentials = match EnvCredentials::try_from_env() {
        Some(creds) => creds,
        None => return Ok(()),
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<FeedMessage>();
    let mut streamer = Streamer::testnet(credentials)?;
    streamer.subscribe_orderbook(["ETHUSD"], move |msg: FeedMessage| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(msg);
        }
    })?;

    let handle = streamer.handle();
    let task = tokio::spawn(async move { streamer.run().await });

    let update = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await?;
    assert!(update.is_some());
    assert_eq!(handle.state(), LoopState::Streaming);

    handle.stop();
    task.await??;
    Ok(())
}
