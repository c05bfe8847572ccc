use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use bpaf::Bpaf;
use push2::abi::{FRAME_HEADER, ROWS_PER_CHUNK, ROW_STRIDE};
use push2::consts::PUSH2;
use push2::encoder::encode_chunk;
use push2::{pack_rgb888, Surface, Transport, UsbTransport};
use push2_core::list_devices;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::lock::DisplayLock;
use crate::media::{draw_image, draw_pattern, hex_dump};

mod config;
mod keepalive;
mod lock;
mod media;

#[derive(Clone, Debug, Bpaf)]
enum Command {
    /// List attached usb devices
    #[bpaf(command)]
    List,
    /// Fill the display with a solid color
    #[bpaf(command)]
    Fill {
        /// Color to fill with (hex: #RRGGBB or #RGB)
        #[bpaf(positional("COLOR"))]
        color: Color,
    },
    /// Draw color bars and a grey ramp
    #[bpaf(command)]
    Pattern,
    /// Draw an image, resized to fill the display
    #[bpaf(command, fallback_to_usage)]
    Image {
        /// Use nearest neighbor interpolation when resizing, otherwise uses gaussian
        #[bpaf(short('n'), long("nearest"))]
        nearest: bool,
        /// Background color for transparent images, overrides the config
        #[bpaf(short, long)]
        bg: Option<Color>,
        /// Path to image to draw
        #[bpaf(positional("PATH"), guard(|p| p.exists(), "file not found"))]
        path: PathBuf,
    },
    /// Print the wire bytes for a solid color frame, without a device
    #[bpaf(command)]
    Dump {
        /// Color to encode (hex: #RRGGBB or #RGB)
        #[bpaf(positional("COLOR"))]
        color: Color,
    },
}

/// Utility for easily parsing hex colors from bpaf
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct Color(pub [u8; 3]);
impl Color {
    fn pixel(&self) -> u16 {
        let [r, g, b] = self.0;
        pack_rgb888(r, g, b)
    }
}
impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        f.write_str(&format!("#{r:02x}{g:02x}{b:02x}"))
    }
}
impl FromStr for Color {
    type Err = String;
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        // parse hex string into rgb
        let mut hex = code.trim_start_matches('#').to_string();
        match hex.len() {
            3 => {
                // Extend 3 character hex colors
                hex = hex.chars().flat_map(|a| [a, a]).collect();
            },
            6 => {},
            l => return Err(format!("Invalid hex length for {code}: {l}")),
        }
        if let Ok(channel_bytes) = u32::from_str_radix(&hex, 16) {
            let r = ((channel_bytes >> 16) & 0xFF) as u8;
            let g = ((channel_bytes >> 8) & 0xFF) as u8;
            let b = (channel_bytes & 0xFF) as u8;
            Ok(Self([r, g, b]))
        } else {
            Err(format!("Invalid hex color: {code}"))
        }
    }
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    /// Increase log verbosity, can be repeated
    #[bpaf(short, long, req_flag(()), count)]
    verbose: usize,
    /// Keep re-sending the frame until interrupted
    #[bpaf(short('k'), long("keep-alive"))]
    keep_alive: bool,
    #[bpaf(external(command))]
    command: Command,
}

fn init_logging(verbose: usize) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print every attached usb device, marking the push 2
fn apply_list() -> Result<(), Box<dyn Error>> {
    let mut usb = UsbTransport::new();
    usb.init()?;
    let res = (|| -> Result<(), Box<dyn Error>> {
        for device in list_devices(&mut usb)? {
            let desc = usb.descriptor(&device)?;
            let mark = if PUSH2.matches(&desc) {
                "  <- push 2 display"
            } else {
                ""
            };
            println!(
                "{:04x}:{:04x} class {:02x}{mark}",
                desc.vendor_id, desc.product_id, desc.class
            );
        }
        Ok(())
    })();
    usb.exit();
    res
}

fn apply_dump(color: Color) -> Result<(), Box<dyn Error>> {
    let mut surface = Surface::default();
    surface.fill(color.pixel());
    let chunk = encode_chunk(
        surface.rows(0, ROWS_PER_CHUNK as u32),
        ROWS_PER_CHUNK,
        surface.width() as usize,
    )?;

    println!("header:");
    hex_dump(&FRAME_HEADER).for_each(|l| println!("{l}"));
    println!("first row of {color} (pixel {:#06x}):", color.pixel());
    hex_dump(&chunk[..ROW_STRIDE]).for_each(|l| println!("{l}"));
    Ok(())
}

/// Open the display, draw with `render`, send, and close again on every path
fn apply_frame(
    config: &Config,
    keep_alive: bool,
    render: impl FnOnce(&mut Surface),
) -> Result<(), Box<dyn Error>> {
    let _lock = DisplayLock::acquire()?;
    push2::set_timeout(config.display.transfer_timeout);
    push2::open()?;

    let res = (|| -> Result<(), Box<dyn Error>> {
        push2::draw(render)?;
        if keep_alive {
            println!("sending frames, press ctrl-c to stop");
            keepalive::run(config.display.keep_alive_interval)?;
        } else {
            push2::send_frame()?;
            println!("sent frame");
        }
        Ok(())
    })();

    push2::close();
    res
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = cli().run();
    init_logging(cli.verbose);

    match cli.command {
        Command::List => apply_list(),
        Command::Dump { color } => apply_dump(color),
        Command::Fill { color } => {
            let config = Config::load_or_create()?;
            apply_frame(&config, cli.keep_alive, |s| s.fill(color.pixel()))
        },
        Command::Pattern => {
            let config = Config::load_or_create()?;
            apply_frame(&config, cli.keep_alive, draw_pattern)
        },
        Command::Image { nearest, bg, path } => {
            let config = Config::load_or_create()?;
            let bg = match bg {
                Some(bg) => bg,
                None => config.media.background_color.parse()?,
            };
            let nearest = nearest || config.media.use_nearest_neighbor;
            let image = image::open(path)?;
            apply_frame(&config, cli.keep_alive, |s| {
                draw_image(s, &image, bg.0, nearest)
            })
        },
    }
}
