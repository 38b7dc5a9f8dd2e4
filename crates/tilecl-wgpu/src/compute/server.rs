use std::sync::Arc;

use futures_lite::future;
use hashbrown::HashMap;
use tilecl_runtime::{
    BufferId, ComputeError, ComputeResult, DispatchCode, KernelArg, KernelDefinition, Program,
    ProgramId,
    program::BindingKind,
    server::{ComputeServer, KernelKey, KernelLaunch},
};
use wgpu::util::DeviceExt;

use super::{
    WgpuStorage, aligned,
    errors::{capture_out_of_memory, capture_validation},
};

/// Uniform blocks are at least 16 bytes on every backend.
const UNIFORM_SIZE: usize = 16;

/// Wgpu compute server.
///
/// Each program gets one bind group layout built from its declared bindings, shared by every
/// entry point. Pipelines are compiled per [KernelKey] and cached.
#[derive(Debug)]
pub struct WgpuServer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    storage: WgpuStorage,
    programs: HashMap<ProgramId, WgpuProgram>,
    pipelines: HashMap<KernelKey, Arc<wgpu::ComputePipeline>>,
}

#[derive(Debug)]
struct WgpuProgram {
    program: Arc<Program>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl WgpuServer {
    /// Create a server on an opened device.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            storage: WgpuStorage::new(device.clone()),
            device,
            queue,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    fn program(&self, id: ProgramId) -> ComputeResult<&WgpuProgram> {
        self.programs.get(&id).ok_or_else(|| {
            ComputeError::dispatch(
                DispatchCode::InvalidKernel,
                format!("program {id} isn't built on this device"),
            )
        })
    }

    fn compile(&self, label: &str, text: String) -> (wgpu::ShaderModule, Option<wgpu::Error>) {
        capture_validation(&self.device, || {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(text.into()),
                })
        })
    }

    fn wait(&self) -> ComputeResult<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| ComputeError::dispatch(DispatchCode::Device, err.to_string()))
    }
}

impl ComputeServer for WgpuServer {
    fn build(&mut self, program: Arc<Program>) -> ComputeResult<String> {
        let mut entries = Vec::new();
        for binding in program.source().bindings() {
            let ty = match binding.kind {
                BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
                BindingKind::StorageRead => wgpu::BufferBindingType::Storage { read_only: true },
                BindingKind::StorageReadWrite => {
                    wgpu::BufferBindingType::Storage { read_only: false }
                }
                BindingKind::Other => {
                    return Err(ComputeError::BuildFailure {
                        log: format!(
                            "{}: binding {} isn't a buffer",
                            program.source().name(),
                            binding.ordinal
                        ),
                    });
                }
            };

            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding.ordinal as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        // Launch constants only change array sizes and attributes; any valid value tells
        // whether the program compiles.
        let (module, error) = self.compile(program.source().name(), program.specialize_with(1, 1));
        let info = future::block_on(module.get_compilation_info());
        let log = info
            .messages
            .iter()
            .map(|message| match &message.location {
                Some(location) => format!(
                    "{}:{}:{}: {:?}: {}",
                    program.source().name(),
                    location.line_number,
                    location.line_position,
                    message.message_type,
                    message.message
                ),
                None => format!("{:?}: {}", message.message_type, message.message),
            })
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(error) = error {
            return Err(ComputeError::BuildFailure {
                log: if log.is_empty() { error.to_string() } else { log },
            });
        }

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(program.source().name()),
                    entries: &entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(program.source().name()),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        self.programs.insert(
            program.id(),
            WgpuProgram {
                program,
                bind_group_layout,
                pipeline_layout,
            },
        );

        Ok(log)
    }

    fn check_kernel(
        &mut self,
        program: ProgramId,
        definition: &KernelDefinition,
    ) -> ComputeResult<()> {
        self.program(program)?.program.check_interface(definition)
    }

    fn prepare(&mut self, key: KernelKey) -> ComputeResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let program = self.program(key.program)?;
        let (module, error) = self.compile(key.entry, program.program.specialize(&key));
        let (pipeline, error) = match error {
            Some(error) => (None, Some(error)),
            None => {
                let (pipeline, error) = capture_validation(&self.device, || {
                    self.device
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(key.entry),
                            layout: Some(&program.pipeline_layout),
                            module: &module,
                            entry_point: Some(key.entry),
                            compilation_options: Default::default(),
                            cache: None,
                        })
                });
                (Some(pipeline), error)
            }
        };

        match (pipeline, error) {
            (Some(pipeline), None) => {
                log::debug!(
                    "Compiled pipeline {} for work-groups of {} and tiles of {}",
                    key.entry,
                    key.workgroup_size,
                    key.tile_len
                );
                self.pipelines.insert(key, Arc::new(pipeline));
                Ok(())
            }
            (_, error) => Err(ComputeError::dispatch(
                DispatchCode::InvalidKernel,
                format!(
                    "{} with work-groups of {}: {}",
                    key.entry,
                    key.workgroup_size,
                    error.map(|err| err.to_string()).unwrap_or_default()
                ),
            )),
        }
    }

    fn create(&mut self, id: BufferId, data: Vec<u8>) -> ComputeResult<()> {
        let size = data.len() as u64;
        let ((), error) = capture_out_of_memory(&self.device, || self.storage.create(id, &data));

        match error {
            None => Ok(()),
            Some(_) => Err(ComputeError::AllocationFailure {
                requested: size,
                available: 0,
            }),
        }
    }

    fn empty(&mut self, id: BufferId, size: u64) -> ComputeResult<()> {
        let ((), error) = capture_out_of_memory(&self.device, || self.storage.empty(id, size));

        match error {
            None => Ok(()),
            Some(_) => Err(ComputeError::AllocationFailure {
                requested: size,
                available: 0,
            }),
        }
    }

    fn read(&mut self, id: BufferId) -> ComputeResult<Vec<u8>> {
        let resource = self.storage.get(id)?;
        let size = resource.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: aligned(size),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(resource.buffer(), 0, &staging, 0, aligned(size));
        self.queue.submit([encoder.finish()]);

        let (sender, receiver) = async_channel::bounded(1);
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                // The receiver is only gone if the read was abandoned.
                let _ = sender.try_send(result);
            });
        self.wait()?;

        future::block_on(receiver.recv())
            .map_err(|_| {
                ComputeError::dispatch(DispatchCode::InvalidQueue, "the buffer was never mapped")
            })?
            .map_err(|err| ComputeError::dispatch(DispatchCode::Device, err.to_string()))?;

        let data = staging.slice(..).get_mapped_range()[..size as usize].to_vec();
        staging.unmap();

        Ok(data)
    }

    fn release(&mut self, id: BufferId) {
        self.storage.release(id);
    }

    fn execute(&mut self, launch: KernelLaunch) -> ComputeResult<()> {
        self.prepare(launch.key)?;

        let program = self.program(launch.key.program)?;
        let pipeline = self.pipelines.get(&launch.key).cloned().ok_or_else(|| {
            ComputeError::dispatch(DispatchCode::InvalidKernel, "the pipeline wasn't compiled")
        })?;

        let uniforms = launch
            .args
            .iter()
            .enumerate()
            .filter_map(|(ordinal, arg)| match arg {
                KernelArg::Int(value) => {
                    let mut contents = [0u32; UNIFORM_SIZE / 4];
                    contents[0] = *value;
                    let buffer = self
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: None,
                            contents: bytemuck::cast_slice(&contents),
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                    Some((ordinal, buffer))
                }
                _ => None,
            })
            .collect::<HashMap<_, _>>();

        let mut entries = Vec::with_capacity(launch.args.len());
        for (ordinal, arg) in launch.args.iter().enumerate() {
            let buffer = match arg {
                KernelArg::Int(_) => &uniforms[&ordinal],
                KernelArg::Buffer(handle) => self.storage.get(handle.id())?.buffer(),
                KernelArg::LocalScratch(_) => continue,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: ordinal as u32,
                resource: buffer.as_entire_binding(),
            });
        }

        let [groups_x, groups_y] = launch.grid.group_count();
        let ((), error) = capture_validation(&self.device, || {
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout: &program.bind_group_layout,
                entries: &entries,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(launch.key.entry),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            self.queue.submit([encoder.finish()]);
        });

        match error {
            None => Ok(()),
            Some(error) => Err(ComputeError::dispatch(
                DispatchCode::ExecutionFault,
                format!("{}: {error}", launch.key.entry),
            )),
        }
    }

    fn sync(&mut self) -> ComputeResult<()> {
        self.wait()
    }
}
