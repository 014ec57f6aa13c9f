use clap::Parser;
use rtsp_mjpeg::media::{CacheFileSink, FrameSink};
use rtsp_mjpeg::protocol::Method;
use rtsp_mjpeg::session::ReplyOutcome;
use rtsp_mjpeg::{Client, ClientConfig};
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(
    name = "rtsp-mjpeg-client",
    about = "Play a Motion-JPEG stream, writing each frame to cache-<session>.jpg"
)]
struct Args {
    /// Server host
    server: String,

    /// Server control port
    port: u16,

    /// Local UDP port for RTP media
    rtp_port: u16,

    /// Video file to request
    file: String,
}

const HELP: &str = "commands: setup | play | pause | teardown | describe | quit";

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = ClientConfig {
        server_addr: format!("{}:{}", args.server, args.port),
        rtp_port: args.rtp_port,
        resource: args.file,
        ..ClientConfig::default()
    };

    let mut client = match Client::connect_with(
        config,
        Box::new(|session_id| Box::new(CacheFileSink::new(".", session_id)) as Box<dyn FrameSink>),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Connection failed: {}", e);
            return;
        }
    };

    println!("{HELP}");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let command = line.trim().to_ascii_lowercase();

        let result = match command.as_str() {
            "" => continue,
            "setup" => client.setup(),
            "play" => client.play(),
            "pause" => client.pause(),
            "teardown" => client.teardown(),
            "describe" => client.send(Method::Describe),
            "quit" | "exit" => break,
            other => {
                println!("unknown command {other:?}; {HELP}");
                continue;
            }
        };

        match result {
            Ok(ReplyOutcome::Described(sdp)) => print!("{sdp}"),
            Ok(ReplyOutcome::Failed { code, reason }) => {
                println!("server refused: {code} {reason}")
            }
            Ok(outcome) => println!("{outcome:?} ({:?})", client.state()),
            Err(e) => println!("{e}"),
        }
        let _ = io::stdout().flush();

        if client.session().teardown_acknowledged() {
            break;
        }
    }

    let session_id = client.session().session_id();
    if !client.session().teardown_acknowledged() && session_id != 0 {
        if let Err(e) = client.teardown() {
            tracing::debug!(error = %e, "teardown on exit failed");
        }
    }
    drop(client);

    if session_id != 0 {
        CacheFileSink::new(".", session_id).remove();
    }
}
