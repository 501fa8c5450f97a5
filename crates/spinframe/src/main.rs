use clap::{Args, Parser, Subcommand};
use spinframe::fetch::AssetSource;
use spinframe::preload::Preloader;
use spinframe::protocol::{Command, Reply, SOCKET_PATH};
use spinframe::{FrameSequence, InputEvent, Point};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "spinframe", version, about, long_about = None)]
struct Cli {
    /// Socket of the running turntable daemon
    #[arg(short, long, default_value = SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Open a product by its route path (e.g. /drill)
    Open { path: String },
    /// Close the open product
    Close,
    /// Show the current frame and preload progress
    Status,
    /// List the products the daemon knows about
    Products,
    /// Scroll the wheel; only the sign of the delta matters
    Wheel {
        #[arg(allow_hyphen_values = true)]
        delta: f64,
        #[arg(short = 'n', long, default_value_t = 1)]
        ticks: u32,
    },
    /// Drag from the origin by (dx, dy), sampling a move every `step` units
    Drag {
        #[arg(allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        dy: f64,
        #[arg(long, default_value_t = 1.0)]
        step: f64,
    },
    /// Swipe a finger from the origin by (dx, dy)
    Touch {
        #[arg(allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        dy: f64,
        #[arg(long, default_value_t = 1.0)]
        step: f64,
    },
    /// Print the address of a zero-based frame index
    Address {
        #[command(flatten)]
        sequence: SequenceArgs,
        index: usize,
    },
    /// Load every frame of a sequence once and report progress
    Preload {
        #[command(flatten)]
        sequence: SequenceArgs,
        /// Asset origin: an http(s) url, a file:// url or a directory
        #[arg(short, long)]
        origin: String,
        /// Per-frame timeout in milliseconds, 0 disables it
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

#[derive(Args, Debug, Clone)]
struct SequenceArgs {
    /// Base path of the frames, e.g. /drill-images/
    #[arg(long)]
    image_path: String,
    #[arg(long)]
    prefix: String,
    #[arg(long, default_value = "jpg")]
    extension: String,
    #[arg(long)]
    frames: usize,
    #[arg(long, default_value_t = 2)]
    digits: usize,
}

impl SequenceArgs {
    fn sequence(&self) -> anyhow::Result<FrameSequence> {
        Ok(FrameSequence::new(
            self.image_path.clone(),
            self.prefix.clone(),
            self.extension.clone(),
            self.frames,
            self.digits,
        )?)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Open { path } => request(&cli.socket, Command::Open(path)),
        Commands::Close => request(&cli.socket, Command::Close),
        Commands::Status => request(&cli.socket, Command::Status),
        Commands::Products => request(&cli.socket, Command::Products),
        Commands::Wheel { delta, ticks } => {
            let mut daemon = Daemon::connect(&cli.socket)?;
            let mut reply = Reply::ok("");
            for _ in 0..ticks {
                reply = daemon.send(&Command::Input(InputEvent::Wheel(delta)))?;
                if matches!(reply, Reply::Error(_)) {
                    break;
                }
            }
            print_reply(reply)
        }
        Commands::Drag { dx, dy, step } => {
            drag(&mut Daemon::connect(&cli.socket)?, dx, dy, step, false)
        }
        Commands::Touch { dx, dy, step } => {
            drag(&mut Daemon::connect(&cli.socket)?, dx, dy, step, true)
        }
        Commands::Address { sequence, index } => {
            let sequence = sequence.sequence()?;
            anyhow::ensure!(
                index < sequence.total_frames(),
                "frame index {} is outside a sequence of {} frames",
                index,
                sequence.total_frames()
            );
            println!("{}", sequence.address(index));
            Ok(())
        }
        Commands::Preload {
            sequence,
            origin,
            timeout_ms,
        } => {
            let sequence = sequence.sequence()?;
            let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
            tokio::runtime::Runtime::new()?.block_on(preload(sequence, &origin, timeout))
        }
    }
}

struct Daemon {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl Daemon {
    fn connect(socket: &Path) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(socket).map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to turntable daemon at {}: {}. Is turntable running?",
                socket.display(),
                e
            )
        })?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    fn send(&mut self, command: &Command) -> anyhow::Result<Reply> {
        log::debug!("> {command}");
        writeln!(self.stream, "{command}")?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            anyhow::bail!("turntable closed the connection");
        }
        log::debug!("< {}", line.trim_end());
        Ok(line.trim_end().parse()?)
    }
}

fn request(socket: &Path, command: Command) -> anyhow::Result<()> {
    print_reply(Daemon::connect(socket)?.send(&command)?)
}

fn print_reply(reply: Reply) -> anyhow::Result<()> {
    match reply {
        Reply::Ok(text) => {
            for part in text.split(" | ").filter(|p| !p.is_empty()) {
                println!("{part}");
            }
            Ok(())
        }
        Reply::Error(text) => anyhow::bail!("{text}"),
    }
}

fn drag(daemon: &mut Daemon, dx: f64, dy: f64, step: f64, touch: bool) -> anyhow::Result<()> {
    anyhow::ensure!(step > 0.0, "--step must be positive");

    let samples = (dx.hypot(dy) / step).ceil().max(1.0) as usize;
    let at = |i: usize| {
        let t = i as f64 / samples as f64;
        Point::new(dx * t, dy * t)
    };

    let (start, end): (fn(Point) -> InputEvent, InputEvent) = if touch {
        (InputEvent::TouchStart, InputEvent::TouchEnd)
    } else {
        (InputEvent::PointerDown, InputEvent::PointerUp)
    };
    let movement: fn(Point) -> InputEvent = if touch {
        InputEvent::TouchMove
    } else {
        InputEvent::PointerMove
    };

    let reply = daemon.send(&Command::Input(start(at(0))))?;
    if let Reply::Error(_) = reply {
        return print_reply(reply);
    }

    let mut last = reply;
    for i in 1..=samples {
        last = daemon.send(&Command::Input(movement(at(i))))?;
    }
    daemon.send(&Command::Input(end))?;
    print_reply(last)
}

async fn preload(
    sequence: FrameSequence,
    origin: &str,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let source = AssetSource::from_origin(origin)?;
    let mut preloader = Preloader::new(Arc::new(source)).with_timeout(timeout);
    let mut rx = preloader.subscribe();
    preloader.activate(&sequence);

    loop {
        let progress = *rx.borrow_and_update();
        println!("{:>3}% {}", progress.percentage(), progress);
        if progress.ready {
            if progress.failed > 0 {
                log::warn!("{} of {} frames failed to load", progress.failed, progress.total);
            }
            return Ok(());
        }
        rx.changed().await?;
    }
}
