//! GPU context management using wgpu

use std::sync::Arc;
use winit::window::Window;
use crate::core::error::Error;

/// GPU rendering context
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    timestamps: bool,
}

impl GpuContext {
    /// Create new GPU context from window.
    ///
    /// Fails when the adapter cannot honour `first_instance` in indirect
    /// draws, which the LOD buckets depend on.
    pub async fn new(window: Arc<Window>, vsync: bool, frames_in_flight: u32) -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let adapter_features = adapter.features();
        if !adapter_features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE) {
            return Err(Error::Gpu(format!(
                "adapter {} does not support INDIRECT_FIRST_INSTANCE",
                adapter.get_info().name
            )));
        }
        let timestamps = adapter_features.contains(wgpu::Features::TIMESTAMP_QUERY);
        let mut required_features = wgpu::Features::INDIRECT_FIRST_INSTANCE;
        if timestamps {
            required_features |= wgpu::Features::TIMESTAMP_QUERY;
        } else {
            log::warn!("TIMESTAMP_QUERY unavailable, GPU profiling disabled");
        }

        let adapter_limits = adapter.limits();

        let device_desc = wgpu::DeviceDescriptor {
            label: Some("meshlod_device"),
            required_features,
            required_limits: wgpu::Limits {
                max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                max_buffer_size: adapter_limits.max_buffer_size,
                ..Default::default()
            },
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: Default::default(),
        };

        let (device, queue) = adapter
            .request_device(&device_desc)
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("GPU: {} ({:?})", info.name, info.backend);
        log::info!("GPU buffer limits: max_buffer_size={}MB, max_storage_binding={}MB",
            adapter_limits.max_buffer_size / 1024 / 1024,
            adapter_limits.max_storage_buffer_binding_size / 1024 / 1024);

        let size = window.inner_size();
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| Error::Gpu("surface reports no formats".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: frames_in_flight.max(1),
        };

        surface.configure(&device, &config);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface,
            config,
            timestamps,
        })
    }

    /// Resize the surface
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Next surface texture, or `None` when this frame should be skipped.
    ///
    /// A stale surface is reconfigured and the frame dropped; running out of
    /// memory is fatal.
    pub fn acquire_frame(&mut self) -> Result<Option<wgpu::SurfaceTexture>, Error> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                log::warn!("surface out of date, reconfiguring");
                self.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface acquire timed out, skipping frame");
                Ok(None)
            }
            Err(e) => Err(Error::Gpu(format!("surface acquire failed: {}", e))),
        }
    }

    /// Present, then rebuild the swapchain if it no longer matches the surface
    pub fn present(&mut self, frame: wgpu::SurfaceTexture) {
        let suboptimal = frame.suboptimal;
        frame.present();
        if suboptimal {
            log::warn!("suboptimal surface, reconfiguring");
            self.reconfigure();
        }
    }

    /// Get surface size
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Get surface format
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Whether timestamp queries were enabled on the device
    pub fn timestamps_supported(&self) -> bool {
        self.timestamps
    }
}
