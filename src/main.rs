//! VoiceLab main entry point
//!
//! The main loop waits on two sources:
//! 1. stdin (one line at a time) - login fields, then commands
//! 2. the waker - a login, synthesis or voice-list call finished

use anyhow::{bail, Context};
use log::{debug, error, info};
use mio::{Events, Interest, Poll, Token, Waker};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use voicelab::backend::HttpBackend;
use voicelab::input::LineBuffer;
use voicelab::state::config::Config;
use voicelab::state::{Reaction, State};
use voicelab::terminal::{stdin_is_tty, EchoGuard};

/// Token for stdin in mio poll
const STDIN: Token = Token(0);
/// Token for worker wake-ups
const WAKER: Token = Token(1);

/// Upper bound on a poll; finished players are reaped this often
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    if debug_mode {
        // Debug mode: write to voicelab.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("voicelab.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open voicelab.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "VoiceLab version {} starting (debug mode, logging to voicelab.log)",
            voicelab::VERSION
        );
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    debug!("Initializing VoiceLab");

    if !stdin_is_tty() {
        eprintln!("Error: VoiceLab requires an interactive terminal (stdin is not a TTY)");
        eprintln!("Example: voicelab");
        process::exit(1);
    }

    let config = Config::load().context("loading configuration")?;
    info!("Config loaded from {:?}", config.path());

    let backend = Arc::new(HttpBackend::new(
        &config.server_origin(),
        config.connect_timeout(),
    ));
    let mut state = State::new(config, backend.clone(), backend);

    let mut poll = Poll::new().context("creating event loop")?;
    let waker = Arc::new(Waker::new(poll.registry(), WAKER).context("creating waker")?);
    state.set_notifier(Arc::new(move || {
        if let Err(e) = waker.wake() {
            debug!("Wake failed: {}", e);
        }
    }));

    let stdin_fd = io::stdin().as_raw_fd();
    let mut stdin_source = mio::unix::SourceFd(&stdin_fd);
    poll.registry()
        .register(&mut stdin_source, STDIN, Interest::READABLE)
        .context("registering stdin")?;

    let mut events = Events::with_capacity(16);
    let mut lines = LineBuffer::new();
    let mut echo_guard: Option<EchoGuard> = None;

    print!("{}", state.greeting());
    show_prompt(&state)?;

    info!("VoiceLab ready - entering event loop");

    loop {
        if let Err(e) = poll.poll(&mut events, Some(POLL_INTERVAL)) {
            if e.kind() == io::ErrorKind::Interrupted {
                debug!("poll interrupted by signal");
                continue;
            }
            return Err(e).context("waiting for events");
        }

        let mut stdin_closed = false;
        for event in events.iter() {
            match event.token() {
                STDIN => {
                    let mut buf = [0u8; 4096];
                    let n = io::stdin().read(&mut buf).context("reading stdin")?;
                    if n == 0 {
                        stdin_closed = true;
                        if let Some(line) = lines.flush() {
                            if handle_line(&mut state, &line)? {
                                return Ok(());
                            }
                        }
                        continue;
                    }
                    for line in lines.push(&buf[..n]) {
                        if handle_line(&mut state, &line)? {
                            return Ok(());
                        }
                    }
                }
                WAKER => debug!("Woken by worker"),
                _ => {}
            }
        }

        let reaction = state.pump();
        if !reaction.output.is_empty() {
            print!("\n{}", reaction.output);
            show_prompt(&state)?;
        }

        if stdin_closed {
            info!("stdin closed, exiting");
            return Ok(());
        }

        // Hide typing while the password field is active
        match (state.wants_secret_input(), echo_guard.is_some()) {
            (true, false) => echo_guard = Some(EchoGuard::new().context("disabling echo")?),
            (false, true) => echo_guard = None,
            _ => {}
        }
    }
}

/// Feed one line to the state; true when the user asked to quit
fn handle_line(state: &mut State, line: &str) -> anyhow::Result<bool> {
    let Reaction { output, quit } = state.handle_line(line)?;
    print!("{}", output);
    if quit {
        println!("Bye.");
        return Ok(true);
    }
    show_prompt(state)?;
    Ok(false)
}

fn show_prompt(state: &State) -> anyhow::Result<()> {
    let prompt = state.prompt();
    if prompt.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    if stdout.flush().is_err() {
        bail!("stdout closed");
    }
    Ok(())
}
