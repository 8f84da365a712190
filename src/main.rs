//! displaysync - drive the display core from the command line
//!
//! ```text
//! displaysync simulate --frames 120          → scripted driver, zstd sink
//! displaysync layout -m 0:0,0,1920x1080 -m 1:1920,0,1920x1080
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use displaysync::{
    ControlChannel, Cursor, Display, DisplayConfig, FrameAcknowledger, FrameAction, LayerId,
    Monitor, MonitorLayout, Rect, RenderHandle, Resize, SizeChange, SourceSession, SurfaceView,
    UpdateEncoder,
};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "displaysync")]
#[command(about = "Dirty-region, frame and monitor-layout core for remote desktop gateways")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted display driver against the core
    /// Paints random rects, marks frames and resizes midway
    Simulate {
        /// TOML display configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the initial width
        #[arg(long)]
        width: Option<u32>,

        /// Override the initial height
        #[arg(long)]
        height: Option<u32>,

        /// Number of frames to paint
        #[arg(short, long, default_value = "60")]
        frames: u32,

        /// Resize to this size (e.g. 2560x1440) halfway through
        #[arg(long)]
        resize: Option<String>,

        /// Delay between frames in milliseconds
        #[arg(long, default_value = "16")]
        interval: u64,
    },

    /// Print the monitor-layout payload for a set of monitors
    Layout {
        /// Monitor as INDEX:LEFT,TOP,WIDTHxHEIGHT (repeatable)
        #[arg(short, long = "monitor", value_name = "MONITOR")]
        monitors: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("displaysync=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            width,
            height,
            frames,
            resize,
            interval,
        } => {
            let mut config = DisplayConfig::load(config.as_deref())?;
            if let Some(width) = width {
                config.width = width;
            }
            if let Some(height) = height {
                config.height = height;
            }
            let resize = resize.as_deref().map(parse_size).transpose()?;
            run_simulate(config, frames, resize, Duration::from_millis(interval)).await
        }
        Commands::Layout { monitors } => {
            let monitors = monitors
                .iter()
                .map(String::as_str)
                .map(parse_monitor)
                .collect::<Result<Vec<_>>>()?;
            let payload = MonitorLayout::from_monitors(monitors).payload()?;
            println!("{}", payload);
            Ok(())
        }
    }
}

/// Parse `WIDTHxHEIGHT`
fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s.split_once('x').context("size must be WIDTHxHEIGHT")?;
    Ok((
        w.trim().parse().context("invalid width")?,
        h.trim().parse().context("invalid height")?,
    ))
}

/// Parse `INDEX:LEFT,TOP,WIDTHxHEIGHT`
fn parse_monitor(s: &str) -> Result<Monitor> {
    let (index, geometry) = s
        .split_once(':')
        .context("monitor must be INDEX:LEFT,TOP,WIDTHxHEIGHT")?;
    let parts: Vec<&str> = geometry.split(',').collect();
    let [left, top, size] = parts[..] else {
        bail!("monitor geometry must be LEFT,TOP,WIDTHxHEIGHT: {geometry}");
    };
    let (width, height) = parse_size(size)?;
    Ok(Monitor {
        index: index.trim().parse().context("invalid monitor index")?,
        left: left.trim().parse().context("invalid left offset")?,
        top: top.trim().parse().context("invalid top offset")?,
        width,
        height,
    })
}

/// Compresses each update with zstd, standing in for a real encoder
struct ZstdEncoder {
    level: i32,
    raw_bytes: usize,
    compressed_bytes: usize,
}

impl UpdateEncoder for ZstdEncoder {
    fn encode(&mut self, layer: LayerId, dirty: Rect, surface: SurfaceView<'_>) -> Result<()> {
        let pixels = surface.copy_rect(dirty);
        let compressed = zstd::encode_all(&pixels[..], self.level)?;
        debug!(
            layer = %layer,
            %dirty,
            raw = pixels.len(),
            compressed = compressed.len(),
            "update encoded"
        );
        self.raw_bytes += pixels.len();
        self.compressed_bytes += compressed.len();
        Ok(())
    }

    fn end_frame(&mut self, frames: u64) -> Result<()> {
        if frames > 0 && frames % 30 == 0 {
            info!(
                "frame {} - {}KB raw, {}KB compressed",
                frames,
                self.raw_bytes / 1024,
                self.compressed_bytes / 1024
            );
        }
        Ok(())
    }
}

/// Logs instructions instead of sending them to a client
struct LogChannel;

impl ControlChannel for LogChannel {
    fn set_layer_parameter(&self, layer: LayerId, key: &str, value: &str) -> Result<()> {
        info!(layer = %layer, "set {} = {}", key, value);
        Ok(())
    }

    fn size_changed(&self, layer: LayerId, size: SizeChange) -> Result<()> {
        info!(
            layer = %layer,
            "size {}x{} monitor {} top {}",
            size.width, size.height, size.monitor_index, size.top_offset
        );
        Ok(())
    }

    fn set_cursor(&self, cursor: Cursor) -> Result<()> {
        info!("cursor {:?}", cursor);
        Ok(())
    }
}

struct LogAcknowledger;

impl FrameAcknowledger for LogAcknowledger {
    fn acknowledge(&self, frame_id: u32) -> Result<()> {
        debug!(frame_id, "frame acknowledged");
        Ok(())
    }
}

async fn run_simulate(
    config: DisplayConfig,
    frames: u32,
    resize: Option<(u32, u32)>,
    interval: Duration,
) -> Result<()> {
    let acknowledger: Arc<dyn FrameAcknowledger> = Arc::new(LogAcknowledger);
    let display = Display::with_acknowledger(config, Some(acknowledger))
        .context("failed to create display")?;
    let render = RenderHandle::spawn(
        Arc::clone(&display),
        Box::new(ZstdEncoder {
            level: 1,
            raw_bytes: 0,
            compressed_bytes: 0,
        }),
    );
    let mut session = SourceSession::new(Arc::clone(&display), Arc::new(LogChannel));

    eprintln!("simulating {} frames", frames);

    for frame_id in 0..frames {
        if let Some((width, height)) = resize {
            if frame_id == frames / 2 {
                session
                    .resize(LayerId::DEFAULT, Resize::primary(width, height))
                    .context("resize failed")?;
            }
        }

        session.surface_frame_marker(frame_id, FrameAction::Start);
        paint_random(&mut session)?;
        session.surface_frame_marker(frame_id, FrameAction::End);

        tokio::time::sleep(interval).await;
    }

    let stats = render.shutdown().await?;
    eprintln!(
        "done: {} passes, {} updates, {} failures",
        stats.passes, stats.updates, stats.failures
    );
    Ok(())
}

/// One paint batch of a few random solid rects
fn paint_random(session: &mut SourceSession) -> Result<()> {
    let mut rng = rand::thread_rng();
    let ctx = session.paint_begin(LayerId::DEFAULT)?;
    let bounds = ctx.bounds();
    let bpp = ctx.bytes_per_pixel();

    for _ in 0..rng.gen_range(1..4) {
        let w = rng.gen_range(1..=bounds.width().min(200));
        let h = rng.gen_range(1..=bounds.height().min(200));
        let rect = Rect::new(
            rng.gen_range(0..=bounds.width() - w),
            rng.gen_range(0..=bounds.height() - h),
            w,
            h,
        );
        let pixel: Vec<u8> = (0..bpp).map(|_| rng.gen()).collect();
        ctx.fill(rect, &pixel);
        ctx.report(rect);
    }

    session.paint_end(LayerId::DEFAULT);
    Ok(())
}
