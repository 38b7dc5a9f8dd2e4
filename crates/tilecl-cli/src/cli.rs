use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tilecl::{ComputeResult, Runtime, linalg::MatmulStrategy};

use crate::exercise;

#[derive(Parser, Debug)]
#[command(
    name = "tilecl",
    about = "Run vector additions and tiled matrix multiplications on a compute device",
    version
)]
pub struct Args {
    /// Device backend.
    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    pub backend: Backend,

    /// Zero-based index of the device in the backend's catalog.
    #[arg(long, default_value_t = 0)]
    pub device: usize,

    /// List the devices of the backend and exit.
    #[arg(long)]
    pub list: bool,

    /// Build options passed to the program, e.g. "-D SCALE=2.0".
    #[arg(long, default_value = "")]
    pub options: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// F = A + B + E + G through three dependent launches.
    Vadd {
        /// Number of elements.
        #[arg(long, default_value_t = 1024)]
        length: u32,
    },
    /// D = A + B + C in a single launch.
    Vadd3 {
        /// Number of elements.
        #[arg(long, default_value_t = 1024)]
        length: u32,
    },
    /// C = A * B for square matrices.
    Matmul {
        /// Order of the matrices.
        #[arg(long, default_value_t = 1024)]
        order: usize,

        /// Number of timed runs.
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Kernel to launch.
        #[arg(long, value_enum, default_value_t = Strategy::Tiled)]
        strategy: Strategy,

        /// Lanes per work-group. Defaults to `[dispatch] local_size`, then to the device.
        #[arg(long)]
        local_size: Option<u32>,

        /// Multiply uniform random matrices instead of the constant ones.
        #[arg(long)]
        random: bool,

        /// Seed of the random matrices.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Also time the sequential multiplication on the host.
        #[arg(long)]
        host: bool,

        /// Load the program from a WGSL file instead of the embedded one.
        #[arg(long)]
        program: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Host-emulated device.
    Cpu,
    /// GPUs through wgpu.
    Wgpu,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Rows of A staged in local memory.
    Tiled,
    /// A read from global memory.
    Naive,
}

impl From<Strategy> for MatmulStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Tiled => MatmulStrategy::Tiled,
            Strategy::Naive => MatmulStrategy::Naive,
        }
    }
}

pub fn run(args: Args) -> ComputeResult<()> {
    match args.backend {
        Backend::Cpu => run_on::<tilecl::cpu::CpuRuntime>(&args),
        #[cfg(feature = "wgpu")]
        Backend::Wgpu => run_on::<tilecl::wgpu::WgpuRuntime>(&args),
        #[cfg(not(feature = "wgpu"))]
        Backend::Wgpu => Err(tilecl::ComputeError::DeviceUnavailable {
            reason: "this binary was built without the wgpu backend".into(),
        }),
    }
}

fn run_on<R: Runtime>(args: &Args) -> ComputeResult<()> {
    if args.list {
        return exercise::list::<R>();
    }

    let Some(command) = &args.command else {
        println!("Nothing to run, see '--help'");
        return Ok(());
    };

    match command {
        Command::Vadd { length } => exercise::vadd::<R>(args.device, &args.options, *length),
        Command::Vadd3 { length } => exercise::vadd3::<R>(args.device, &args.options, *length),
        Command::Matmul {
            order,
            count,
            strategy,
            local_size,
            random,
            seed,
            host,
            program,
        } => exercise::matmul::<R>(
            args.device,
            &args.options,
            exercise::MatmulSettings {
                order: *order,
                count: *count,
                strategy: (*strategy).into(),
                local_size: *local_size,
                seed: random.then_some(*seed),
                host: *host,
                program: program.clone(),
            },
        ),
    }
}
