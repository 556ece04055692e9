//! wgpu compute backend.
//!
//! State lives in `Rgba32Float` textures: a ping-pong pair for positions, a
//! pair for velocities and one collision output texture. Kernels fetch texels
//! with `textureLoad` (exact, no filtering) and write with `textureStore`.
//! Bind groups are prebuilt for both ping-pong parities so a step never
//! rebuilds GPU objects.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::backend::{CollisionReport, ComputeBackend, StepParams};
use crate::error::GpuError;
use crate::pingpong::PingPong;
use crate::store::grid_side;

const TEXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = 16;
const WORKGROUP_SIZE: u32 = 8;

pub(crate) const VELOCITY_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("velocity.wgsl"));
pub(crate) const POSITION_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("position.wgsl"));
pub(crate) const COLLISION_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("collision.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Uniforms {
    dt: f32,
    gravity: f32,
    side: u32,
    active_count: u32,
    collision_radius: f32,
    _padding: [f32; 3],
}

/// Bytes per row of a read-back copy, padded to the copy alignment.
fn padded_bytes_per_row(side: u32) -> u32 {
    let unpadded = side * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// GPU-resident simulation state and the three compute passes.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    side: u32,
    positions: PingPong<wgpu::Texture>,
    velocities: PingPong<wgpu::Texture>,
    collision_texture: wgpu::Texture,
    uniforms: Uniforms,
    uniform_buffer: wgpu::Buffer,
    /// Two regions of `padded_bytes_per_row * side` bytes.
    staging_buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    velocity_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    collision_pipeline: wgpu::ComputePipeline,
    // Indexed by ping-pong parity
    velocity_bind_groups: [wgpu::BindGroup; 2],
    position_bind_groups: [wgpu::BindGroup; 2],
    collision_bind_groups: [wgpu::BindGroup; 2],
    scratch: Vec<Vec4>,
}

impl GpuBackend {
    /// Bring up a headless device and allocate state for `capacity` slots.
    ///
    /// Fails when no adapter is found, the device cannot be created, or the
    /// adapter cannot write `Rgba32Float` storage textures.
    pub async fn new(capacity: usize) -> Result<Self, GpuError> {
        let side = grid_side(capacity.max(1)) as u32;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let format_features = adapter.get_texture_format_features(TEXEL_FORMAT);
        if !format_features
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
        {
            return Err(GpuError::UnsupportedFormat(TEXEL_FORMAT));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("N-body Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using adapter {} ({:?}), {}x{} texel grid",
            adapter_info.name,
            adapter_info.backend,
            side,
            side
        );

        let positions = PingPong::new(
            create_state_texture(&device, side, "Position Texture A"),
            create_state_texture(&device, side, "Position Texture B"),
        );
        let velocities = PingPong::new(
            create_state_texture(&device, side, "Velocity Texture A"),
            create_state_texture(&device, side, "Velocity Texture B"),
        );
        let collision_texture = create_state_texture(&device, side, "Collision Texture");

        let uniforms = Uniforms {
            dt: 0.0,
            gravity: 0.0,
            side,
            active_count: 0,
            collision_radius: 0.0,
            _padding: [0.0; 3],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let padded_bytes_per_row = padded_bytes_per_row(side);
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read-back Staging Buffer"),
            size: 2 * padded_bytes_per_row as u64 * side as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let layout = create_pass_layout(&device);
        let velocity_pipeline = create_pipeline(&device, &layout, VELOCITY_WGSL, "Velocity");
        let position_pipeline = create_pipeline(&device, &layout, POSITION_WGSL, "Position");
        let collision_pipeline = create_pipeline(&device, &layout, COLLISION_WGSL, "Collision");

        // Parity p: role "current" is texture p of each pair, "next" is 1 - p
        let pos_views = texture_views(&positions);
        let vel_views = texture_views(&velocities);
        let collision_view = collision_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let velocity_bind_groups = [0usize, 1].map(|p| {
            create_pass_bind_group(
                &device,
                &layout,
                "Velocity Bind Group",
                &pos_views[p],
                &vel_views[p],
                &vel_views[1 - p],
                &uniform_buffer,
            )
        });
        let position_bind_groups = [0usize, 1].map(|p| {
            create_pass_bind_group(
                &device,
                &layout,
                "Position Bind Group",
                &pos_views[p],
                &vel_views[1 - p],
                &pos_views[1 - p],
                &uniform_buffer,
            )
        });
        let collision_bind_groups = [0usize, 1].map(|p| {
            create_pass_bind_group(
                &device,
                &layout,
                "Collision Bind Group",
                &pos_views[p],
                &vel_views[p],
                &collision_view,
                &uniform_buffer,
            )
        });

        Ok(Self {
            device,
            queue,
            adapter_info,
            side,
            positions,
            velocities,
            collision_texture,
            uniforms,
            uniform_buffer,
            staging_buffer,
            padded_bytes_per_row,
            velocity_pipeline,
            position_pipeline,
            collision_pipeline,
            velocity_bind_groups,
            position_bind_groups,
            collision_bind_groups,
            scratch: vec![Vec4::ZERO; (side * side) as usize],
        })
    }

    /// Information about the adapter in use.
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn write_uniforms(&self) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    fn write_texture(&self, texture: &wgpu::Texture, texels: &[Vec4]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.side * TEXEL_BYTES),
                rows_per_image: Some(self.side),
            },
            self.extent(),
        );
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.side,
            height: self.side,
            depth_or_array_layers: 1,
        }
    }

    fn workgroups(&self) -> u32 {
        self.side.div_ceil(WORKGROUP_SIZE)
    }

    fn region_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.side as u64
    }

    /// Queue a copy of `texture` into staging region `region`.
    fn copy_to_staging(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture, region: u64) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: region * self.region_size(),
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.side),
                },
            },
            self.extent(),
        );
    }

    /// Map the staging buffer, strip row padding from each requested region
    /// into its output slice, then unmap. Blocks until the GPU is idle.
    fn read_staging(&self, outputs: &mut [&mut [Vec4]]) -> Result<(), GpuError> {
        let slice = self.staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(format!("map callback dropped: {}", e)))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            let side = self.side as usize;
            let row_bytes = side * TEXEL_BYTES as usize;
            for (region, out) in outputs.iter_mut().enumerate() {
                let base = region * self.region_size() as usize;
                for row in 0..side {
                    let start = base + row * self.padded_bytes_per_row as usize;
                    let dst = &mut out[row * side..(row + 1) * side];
                    bytemuck::cast_slice_mut::<Vec4, u8>(dst)
                        .copy_from_slice(&data[start..start + row_bytes]);
                }
            }
        }

        self.staging_buffer.unmap();
        Ok(())
    }
}

impl ComputeBackend for GpuBackend {
    fn side(&self) -> usize {
        self.side as usize
    }

    fn upload(&mut self, positions: &[Vec4], velocities: &[Vec4]) {
        self.write_texture(self.positions.current(), positions);
        self.write_texture(self.positions.next(), positions);
        self.write_texture(self.velocities.current(), velocities);
        self.write_texture(self.velocities.next(), velocities);
    }

    fn read_back(&mut self, positions: &mut [Vec4], velocities: &mut [Vec4]) -> Result<(), GpuError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read-back Encoder"),
            });
        self.copy_to_staging(&mut encoder, self.positions.current(), 0);
        self.copy_to_staging(&mut encoder, self.velocities.current(), 1);
        self.queue.submit(std::iter::once(encoder.finish()));

        self.read_staging(&mut [positions, velocities])
    }

    fn integrate(&mut self, params: StepParams) {
        self.uniforms.dt = params.dt;
        self.uniforms.gravity = params.gravity;
        self.write_uniforms();

        let parity = self.positions.parity();
        let workgroups = self.workgroups();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Integrate Encoder"),
            });

        // Separate passes: the position pass must see every velocity written
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Velocity Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.velocity_pipeline);
            pass.set_bind_group(0, &self.velocity_bind_groups[parity], &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Position Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.position_pipeline);
            pass.set_bind_group(0, &self.position_bind_groups[parity], &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        self.velocities.swap();
        self.positions.swap();
    }

    fn detect_collisions(
        &mut self,
        active_count: usize,
        radius: f32,
        reports: &mut [CollisionReport],
    ) -> Result<(), GpuError> {
        self.uniforms.active_count = active_count as u32;
        self.uniforms.collision_radius = radius;
        self.write_uniforms();

        let parity = self.positions.parity();
        let workgroups = self.workgroups();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Collision Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Collision Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.collision_pipeline);
            pass.set_bind_group(0, &self.collision_bind_groups[parity], &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }
        self.copy_to_staging(&mut encoder, &self.collision_texture, 0);
        self.queue.submit(std::iter::once(encoder.finish()));

        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.read_staging(&mut [scratch.as_mut_slice()]);
        for (report, texel) in reports.iter_mut().zip(&scratch) {
            *report = CollisionReport::from_texel(*texel);
        }
        self.scratch = scratch;
        result
    }
}

fn create_state_texture(device: &wgpu::Device, side: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXEL_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn texture_views(pair: &PingPong<wgpu::Texture>) -> [wgpu::TextureView; 2] {
    // Parity 0 means texture A is current
    let (a, b) = (pair.current(), pair.next());
    [
        a.create_view(&wgpu::TextureViewDescriptor::default()),
        b.create_view(&wgpu::TextureViewDescriptor::default()),
    ]
}

/// Layout shared by all passes: two read textures, one storage output, uniforms.
fn create_pass_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let read_texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Simulation Pass Bind Group Layout"),
        entries: &[
            read_texture(0),
            read_texture(1),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: TEXEL_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

fn create_pass_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    positions: &wgpu::TextureView,
    velocities: &wgpu::TextureView,
    output: &wgpu::TextureView,
    uniforms: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(positions),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(velocities),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(output),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: uniforms.as_entire_binding(),
            },
        ],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    name: &str,
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} Shader", name)),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Pipeline Layout", name)),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{} Pipeline", name)),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}
