//! Minimal embedding: start the agent, then burn some CPU so there is
//! something to watch with `pidtop <pid>`.

use std::time::Duration;

use pidtop_agent::{Agent, Options};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let agent = Agent::start(Options::default()).await?;
    println!(
        "agent listening on {} (pid {}) — press Ctrl-C to quit",
        agent.local_addr(),
        std::process::id()
    );

    // A couple of busy threads so the charts move.
    for _ in 0..2 {
        std::thread::spawn(|| loop {
            let mut v: Vec<u64> = (0..100_000).collect();
            v.reverse();
            std::thread::sleep(Duration::from_millis(50));
        });
    }

    tokio::time::sleep(Duration::from_secs(3600)).await;
    agent.stop();
    Ok(())
}
