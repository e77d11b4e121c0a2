
#[macro_use]
extern crate tracing;

use shard::{
    logging::init_logging,
    settings::{
        Settings,
        SETTINGS_FILE_NAME,
    },
    channel::*,
    demo::run_demo,
};
use std::{
    thread,
    env::args,
    process::exit,
};


const CLI_INTRO: &'static str = r#"Gump shard demo.

Plays scripted clients through the welcome dialog and bulletin board."#;

const CLI_HELP: &'static str = r#"
Examples:

    [this command]
    Run the demo with settings from shard.json, or defaults if it's missing.

    [this command] --settings=other.json
    Run the demo with settings from another file.

    [this command] --write-settings
    Write the settings in use back out, filling in any defaults, and exit.

Env var examples:
    RUST_LOG=gump=trace
    Changes logging levels"#;


fn main() {
    println!("{}", CLI_INTRO);
    let args = args().collect::<Vec<_>>();
    if args.get(1).map(String::as_str) == Some("--help") {
        println!("{}", CLI_HELP);
        return;
    }
    if let Err(e) = init_logging() {
        eprintln!("unable to initialize logging: {:#}", e);
    }

    let settings_path = args.iter()
        .filter_map(|arg| arg.strip_prefix("--settings="))
        .next()
        .unwrap_or(SETTINGS_FILE_NAME);
    let settings = Settings::read(settings_path);
    if args.iter().any(|arg| arg == "--write-settings") {
        if let Err(e) = settings.write(settings_path) {
            error!(%e, settings_path, "unable to write settings");
            exit(1);
        }
        info!(settings_path, "wrote settings");
        return;
    }

    let (shard_send, shard_recv) = channel();
    stop_on_kill(shard_send.clone());
    match run_demo(settings, shard_send, shard_recv) {
        Ok(report) => {
            info!(stats = ?report.stats, received = ?report.received, "demo done");
            println!("{}", report.board);
        }
        Err(e) => {
            error!("demo failed: {:?}", e);
            exit(1);
        }
    }
}

fn stop_on_kill(shard_send: ShardSender) {
    let result = ctrlc::set_handler(move || {
        let shard_send = shard_send.clone();
        // don't block inside the signal handler
        thread::spawn(move || {
            info!("stopping shard (process received kill signal)");
            shard_send.send_stop();
        });
    });
    if let Err(e) = result {
        warn!(%e, "error setting kill signal handler");
    }
}
