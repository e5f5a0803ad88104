/*
 * RTCM-LOGGER is part of the nav-solutions framework.
 * Authors: Guillaume W. Bres <guillaume.bressaix@gmail.com> et al,
 * (cf. https://github.com/nav-solutions/rtcm-logger/graphs/contributors)
 * This framework is shipped under Mozilla Public V2 license.
 */

use env_logger::{Builder, Target};

use log::{error, info, warn};

use tokio::{signal, sync::mpsc};

use std::sync::Arc;

use rtcm_logger::prelude::{
    Duration, Error, Event, Session, SessionConfig, SessionState, list_ports,
};

mod cli;

use crate::cli::Cli;

#[tokio::main]
pub async fn main() {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cfg_precision = Duration::from_seconds(1.0);

    // cli
    let cli = Cli::new();

    if cli.list_ports() {
        match list_ports() {
            Ok(ports) => {
                for port in ports {
                    println!("{}", port);
                }
            },
            Err(e) => error!("failed to list serial ports: {}", e),
        }
        return;
    }

    if let Err(e) = run(&cli, cfg_precision).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, cfg_precision: Duration) -> Result<(), Error> {
    let descriptor = cli.descriptor()?;

    let log_settings = cli.log_settings();

    let config = SessionConfig::default()
        .with_read_timeout(cli.read_timeout())
        .with_format(log_settings.format);

    let t_utc = config.deploy_time;

    let log_path = cli
        .output()
        .unwrap_or_else(|| log_settings.filename(t_utc));

    if descriptor.is_read_only() {
        info!("{} - replaying {} once", t_utc.round(cfg_precision), descriptor);
    }

    // session events are forwarded to this task
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let session = Arc::new(Session::new(config));

    info!(
        "{} - logging {} to \"{}\" (read timeout: {:?})",
        t_utc.round(cfg_precision),
        descriptor,
        log_path.display(),
        session.config().read_timeout,
    );

    session.start(descriptor, &log_path, move |event| {
        // receiver only goes away on shutdown
        let _ = tx.send(event);
    })?;

    let quiet = cli.quiet();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("stop requested");
                session.stop()?;
            },
            event = rx.recv() => match event {
                Some(Event::Message(msg)) => {
                    if !quiet {
                        println!("{}", msg);
                    }
                },
                Some(event) => {
                    match &event {
                        Event::EndOfStream { .. } => info!("{}", event),
                        Event::Error { .. } => error!("{}", event),
                        _ => warn!("{}", event),
                    }
                    if event.is_fatal() {
                        info!("session terminating");
                    }
                },
                None => {
                    // session terminated
                    break;
                },
            },
        }
    }

    let waited = Arc::clone(&session);
    let rtm = tokio::task::spawn_blocking(move || waited.wait())
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    debug_assert_eq!(session.state(), SessionState::Closed);

    info!(
        "{} - session closed: {}",
        rtm.utc_time().round(cfg_precision),
        rtm
    );

    Ok(())
}
