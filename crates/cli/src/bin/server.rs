use clap::Parser;
use rtsp_mjpeg::media::MediaDirectory;
use rtsp_mjpeg::{Server, ServerConfig};
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rtsp-mjpeg-server",
    about = "Stream Motion-JPEG files to RTSP clients over RTP/UDP"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8554")]
    bind: String,

    /// Directory that SETUP resource names are resolved against
    #[arg(long, short, default_value = ".")]
    media_dir: String,

    /// Delay between frames, in milliseconds
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Host advertised in session descriptions
    #[arg(long)]
    public_host: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = ServerConfig {
        public_host: args.public_host,
        frame_interval: Duration::from_millis(args.interval_ms),
        ..ServerConfig::default()
    };
    let store = Arc::new(MediaDirectory::new(&args.media_dir));
    let mut server = Server::with_store(&args.bind, store, config);

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {}", e);
        return;
    }

    println!(
        "Serving {} on {} - press Enter to stop",
        args.media_dir, args.bind
    );
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        tracing::warn!(error = %e, "stdin closed");
    }

    server.stop();
}
