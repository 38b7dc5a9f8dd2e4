use std::path::PathBuf;

use tilecl::{
    AccessMode, ComputeResult, ExecutionContext, ProgramSource, Runtime,
    config::GlobalConfig,
    linalg::{
        AVAL, BVAL, HostMatrix, MatmulStrategy, RunSummary, Verifier, host_matmul, kernels,
        mflops, run_matmul,
        vadd::{Vadd3Launcher, VaddLauncher, host_vadd},
    },
};
use web_time::Instant;

pub struct MatmulSettings {
    pub order: usize,
    pub count: usize,
    pub strategy: MatmulStrategy,
    pub local_size: Option<u32>,
    /// Random matrices from this seed, constant ones otherwise.
    pub seed: Option<u64>,
    pub host: bool,
    pub program: Option<PathBuf>,
}

pub fn list<R: Runtime>() -> ComputeResult<()> {
    let catalog = R::catalog()?;

    if catalog.is_empty() {
        println!("No {} device found", R::name());
    }
    for device in catalog.iter() {
        println!("{device}");
    }

    Ok(())
}

fn open<R: Runtime>(
    index: usize,
    source: ProgramSource,
    options: &str,
) -> ComputeResult<ExecutionContext<R>> {
    let catalog = R::catalog()?;
    let mut context = ExecutionContext::from_catalog(&catalog, index)?;
    let program = kernels::build(&mut context, source, options)?;
    log::info!(
        "Built {} for device {index} with options {options:?}",
        program.source().name()
    );

    println!("Using {}", context.device());
    Ok(context)
}

fn inputs(count: usize, len: u32) -> Vec<Vec<f32>> {
    (0..count)
        .map(|k| (0..len).map(|i| (i % 1024) as f32 * 0.5 + k as f32).collect())
        .collect()
}

pub fn vadd<R: Runtime>(device: usize, options: &str, length: u32) -> ComputeResult<()> {
    let context = open::<R>(device, kernels::vadd_source(), options)?;
    let buffers = context.buffers();
    let host = inputs(4, length);
    let handles = host
        .iter()
        .map(|values| buffers.upload(values.as_slice(), AccessMode::ReadOnly))
        .collect::<ComputeResult<Vec<_>>>()?;

    let mut launcher = VaddLauncher::new(&context)?;
    let start = Instant::now();
    let f = launcher.chain(&context, &handles[0], &handles[1], &handles[2], &handles[3])?;
    let actual = buffers.read::<f32>(&f)?;
    let duration = start.elapsed();

    let expected = host_vadd(&host.iter().map(Vec::as_slice).collect::<Vec<_>>());
    let verification = Verifier::default().verify(&expected, &actual);

    println!("F = A + B + E + G over {length} elements");
    println!(" {:.6} seconds", duration.as_secs_f64());
    println!(" {verification}");

    Ok(())
}

pub fn vadd3<R: Runtime>(device: usize, options: &str, length: u32) -> ComputeResult<()> {
    let context = open::<R>(device, kernels::vadd3_source(), options)?;
    let buffers = context.buffers();
    let host = inputs(3, length);
    let handles = host
        .iter()
        .map(|values| buffers.upload(values.as_slice(), AccessMode::ReadOnly))
        .collect::<ComputeResult<Vec<_>>>()?;
    let d = buffers.allocate(
        u64::from(length) * size_of::<f32>() as u64,
        AccessMode::WriteOnly,
    )?;

    let mut launcher = Vadd3Launcher::new(&context)?;
    let start = Instant::now();
    launcher.launch(&handles[0], &handles[1], &handles[2], &d, length)?;
    let actual = buffers.read::<f32>(&d)?;
    let duration = start.elapsed();

    let expected = host_vadd(&host.iter().map(Vec::as_slice).collect::<Vec<_>>());
    let verification = Verifier::default().verify(&expected, &actual);

    println!("D = A + B + C over {length} elements");
    println!(" {:.6} seconds", duration.as_secs_f64());
    println!(" {verification}");

    Ok(())
}

pub fn matmul<R: Runtime>(
    device: usize,
    options: &str,
    settings: MatmulSettings,
) -> ComputeResult<()> {
    let source = match &settings.program {
        Some(path) => ProgramSource::load(path)?,
        None => kernels::matmul_source(),
    };
    let context = open::<R>(device, source, options)?;
    let order = settings.order;
    let local = settings
        .local_size
        .or(GlobalConfig::get().dispatch.local_size);
    match local {
        Some(local) => log::info!("Requested work-groups of {local} lanes"),
        None => log::info!("Work-group size derived from {}", context.device()),
    }

    let (a, b) = match settings.seed {
        Some(seed) => (
            HostMatrix::random(order, seed),
            HostMatrix::random(order, seed.wrapping_add(1)),
        ),
        None => (HostMatrix::filled(order, AVAL), HostMatrix::filled(order, BVAL)),
    };
    let verifier = Verifier::default();

    let mut reference = None;
    if settings.host || settings.seed.is_some() {
        let mut product = HostMatrix::zeros(order);
        let start = Instant::now();
        host_matmul(&a, &b, &mut product);
        let duration = start.elapsed();

        if settings.host {
            println!("Sequential matrix multiplication of order {order} on the host");
            println!(
                " {:.6} seconds at {:.1} MFLOPS",
                duration.as_secs_f64(),
                mflops(order, duration)
            );
        }
        reference = Some(product);
    }
    let expected = settings.seed.and(reference);

    for run in 0..settings.count {
        let result = run_matmul(&context, settings.strategy, &a, &b, local)?;
        log::info!("Run {run} used partition {:?}", result.partition);
        let verification = match &expected {
            Some(expected) => verifier.verify(expected.as_slice(), result.product.as_slice()),
            None => verifier.verify_constant(order, result.product.as_slice()),
        };

        println!(
            "Run {run}: {} matrix multiplication of order {order}, {}x{order} groups of {}",
            settings.strategy,
            result.partition.groups(),
            result.partition.local()
        );
        println!("{}", RunSummary::new(order, result.duration, verification));
    }

    Ok(())
}
