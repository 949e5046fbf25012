//! Connect to a log source and capture its stream to a file.
//!
//! Usage: fetch [host:port] [output-file] [max-messages]

use logtap::capture::{AtomicFileWriter, CaptureSession};
use logtap::frame::NetworkMessageSource;
use logtap::transport::TcpConnection;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:3490".to_string());
    let output = args.next().unwrap_or_else(|| "capture.log".to_string());
    let limit = args.next().and_then(|s| s.parse().ok());

    let connection = TcpConnection::connect(addr)?;
    let source = NetworkMessageSource::new(connection);
    let writer = AtomicFileWriter::create(&output, false)?;
    let path = writer.real_path().to_path_buf();

    let mut session = CaptureSession::new(source, writer);
    session.run(limit)?;
    let count = session.finish()?;

    println!("captured {count} messages to {}", path.display());
    Ok(())
}
