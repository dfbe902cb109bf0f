//! Worker process entry point.
//!
//! The first argument names the receiver to run; everything else arrives as
//! a command message on stdin.

// One cooperative scheduler; repair work shares no mutable state across
// threads.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    launcher_core::init_logger();

    let receiver_id = match std::env::args().nth(1) {
        Some(id) => id,
        None => {
            eprintln!("usage: repair-worker <receiver-id>");
            std::process::exit(2);
        }
    };

    let code = launcher_core::worker::run_worker(&receiver_id).await;
    std::process::exit(code);
}
