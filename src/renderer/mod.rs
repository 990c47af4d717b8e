//! 渲染器模块
//!
//! 本模块实现设备与帧生命周期的核心：适配器选择、交换链、
//! 每帧的命令分配器与栅栏、开始 / 结束帧协议以及上传缓冲区。
//!
//! # 架构设计
//!
//! - `Graphics<B>`：显式的上下文对象，对外提供全部接口
//! - `B: Backend`：原生 API 绑定（`gfx::dx12::Dx12` 或 `gfx::mock::MockGpu`）
//! - 子模块各负责一个组件，均对后端泛型
//!
//! # 模块组织
//!
//! - `device`：调试层、工厂、适配器选择、设备创建
//! - `frame`：帧槽（命令分配器 + 栅栏 + 栅栏值）
//! - `swap_chain`：交换链、RTV 描述符堆和渲染目标
//! - `controller`：帧状态机
//! - `upload`：上传堆上的顶点 / 索引缓冲区
//! - `command`：命令列表和命令队列
//! - `sync`：栅栏值和带超时的等待

use std::num::NonZeroU32;

use tracing::{debug, error, info, trace, warn};

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::Backend;
use crate::gfx::types::{
    Format, IndexBufferView, SurfaceHandle, VertexBufferView, YDirection,
};

pub mod command;
pub mod controller;
pub mod device;
pub mod frame;
pub mod swap_chain;
pub mod sync;
pub mod upload;

pub use controller::{FrameState, CLEAR_COLOR};

use command::{CommandList, Queue};
use device::{select_adapter_and_device, SelectedDevice};
use frame::FrameResources;
use swap_chain::SwapChainTarget;
use sync::wait_for_fence;
use upload::{BufferKind, TransientBuffer};

/// 图像句柄
///
/// 纹理尚未实现，所有图像都是空句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageHandle(Option<NonZeroU32>);

impl ImageHandle {
    pub const NULL: ImageHandle = ImageHandle(None);

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// 着色器句柄（同样始终为空）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaderHandle(Option<NonZeroU32>);

impl ShaderHandle {
    pub const NULL: ShaderHandle = ShaderHandle(None);

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// 图形上下文
///
/// 拥有设备、命令队列、帧资源、上传缓冲区以及（延迟创建的）交换链。
/// 原生对象的字段按获取顺序的逆序声明，因此析构时按逆序释放。
pub struct Graphics<B: Backend> {
    frame_state: FrameState,
    /// 当前帧的后缓冲区索引，`None` 表示无窗口
    frame_index: Option<usize>,
    surface: Option<SurfaceHandle>,
    vertex_view: VertexBufferView,
    index_view: IndexBufferView,
    config: GraphicsConfig,

    swap_chain: Option<SwapChainTarget<B>>,
    index_buffer: TransientBuffer<B>,
    vertex_buffer: TransientBuffer<B>,
    event: B::Event,
    command_list: CommandList<B>,
    frames: FrameResources<B>,
    queue: Queue<B>,
    device: SelectedDevice<B>,
    backend: B,
}

impl<B: Backend> Graphics<B> {
    /// 初始化图形上下文
    ///
    /// 创建设备、命令队列、帧资源、命令列表、等待事件和上传缓冲区。
    /// 交换链在绑定窗口后的第一帧才创建。
    ///
    /// # 返回值
    ///
    /// 任何一步失败时返回错误，此前获取的所有对象都已按逆序释放。
    pub fn initialize(backend: B, config: &GraphicsConfig) -> Result<Self> {
        config.validate()?;

        Self::acquire(backend, config).inspect_err(|e| {
            error!(error = %e, "Graphics initialization failed");
        })
    }

    fn acquire(backend: B, config: &GraphicsConfig) -> Result<Self> {
        let device = select_adapter_and_device(&backend, config.prefer_software_adapter, config.debug_layer)?;
        let queue = Queue::create(&device.device)?;
        let frames = FrameResources::initialize(&device.device)?;
        let command_list = CommandList::create(&device.device, frames.slot(0).allocator())?;
        let event = backend.create_event().map_err(GraphicsError::init("CreateEvent"))?;

        let vertex_buffer =
            TransientBuffer::create(&device.device, BufferKind::Vertex, config.vertex_buffer_capacity())?;
        let index_buffer =
            TransientBuffer::create(&device.device, BufferKind::Index, config.index_buffer_capacity())?;

        let vertex_view = VertexBufferView {
            buffer_location: vertex_buffer.gpu_address(),
            size_in_bytes: 0,
            stride_in_bytes: config.vertex_stride() as u32,
        };
        let index_view = IndexBufferView {
            buffer_location: index_buffer.gpu_address(),
            size_in_bytes: 0,
            format: Format::R16Uint,
        };

        info!(
            backend = backend.name(),
            vertex_capacity = vertex_buffer.capacity(),
            index_capacity = index_buffer.capacity(),
            "Graphics initialized"
        );

        Ok(Self {
            frame_state: FrameState::Idle,
            frame_index: None,
            surface: None,
            vertex_view,
            index_view,
            config: config.clone(),
            swap_chain: None,
            index_buffer,
            vertex_buffer,
            event,
            command_list,
            frames,
            queue,
            device,
            backend,
        })
    }

    /// 绑定原生窗口句柄
    ///
    /// 必须在第一次创建交换链之前调用；交换链创建后再绑定不会生效。
    pub fn bind_surface(&mut self, surface: SurfaceHandle) {
        if self.swap_chain.is_some() {
            warn!("Swap chain already exists; new surface ignored");
            return;
        }
        debug!(hwnd = surface.raw(), "Surface bound");
        self.surface = Some(surface);
    }

    /// 确保交换链存在
    ///
    /// 已存在时什么也不做。尺寸变化时不会重建交换链。
    pub fn ensure_swap_chain(&mut self, width: u32, height: u32) -> Result<()> {
        if let Some(swap_chain) = &self.swap_chain {
            if swap_chain.size() != (width, height) {
                // TODO: 支持 ResizeBuffers，需要先释放渲染目标并重建 RTV
                debug!(width, height, current = ?swap_chain.size(), "Swap chain resize is not supported");
            }
            return Ok(());
        }

        let surface = self.surface.ok_or(GraphicsError::SurfaceNotBound)?;
        let target = SwapChainTarget::create(
            &self.device.factory,
            &self.device.device,
            self.queue.raw(),
            surface,
            width,
            height,
        )?;
        self.swap_chain = Some(target);
        Ok(())
    }

    /// 屏幕帧缓冲区图像：确保交换链存在，返回空图像
    pub fn new_screen_framebuffer_image(&mut self, width: u32, height: u32) -> Result<ImageHandle> {
        self.ensure_swap_chain(width, height)?;
        Ok(ImageHandle::NULL)
    }

    /// 上传本帧的顶点和索引
    ///
    /// # 参数
    ///
    /// * `vertices` - 顶点数据，每个顶点 `vertex_float_count` 个 f32
    /// * `indices` - 16 位索引
    ///
    /// 超出缓冲区容量时返回 `CapacityExceeded`，两个缓冲区都不会被修改。
    /// 每个视图在对应缓冲区写入成功后立即更新：索引缓冲区映射失败时，
    /// 顶点视图已描述新数据，索引视图仍描述上一次的上传。
    pub fn upload_mesh(&mut self, vertices: &[f32], indices: &[u16]) -> Result<()> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        self.vertex_buffer.check_capacity(vertex_bytes.len())?;
        self.index_buffer.check_capacity(index_bytes.len())?;

        // 容量在配置验证时已限制在 u32 以内
        self.vertex_buffer.write(vertex_bytes)?;
        self.vertex_view = VertexBufferView {
            buffer_location: self.vertex_buffer.gpu_address(),
            size_in_bytes: vertex_bytes.len() as u32,
            stride_in_bytes: self.config.vertex_stride() as u32,
        };

        self.index_buffer.write(index_bytes)?;
        self.index_view = IndexBufferView {
            buffer_location: self.index_buffer.gpu_address(),
            size_in_bytes: index_bytes.len() as u32,
            format: Format::R16Uint,
        };
        Ok(())
    }

    pub fn vertex_buffer_view(&self) -> VertexBufferView {
        self.vertex_view
    }

    pub fn index_buffer_view(&self) -> IndexBufferView {
        self.index_view
    }

    pub fn new_image(&mut self, width: u32, height: u32) -> ImageHandle {
        trace!(width, height, "new_image is not implemented");
        ImageHandle::NULL
    }

    pub fn new_shader(&mut self, _source: &[u8]) -> ShaderHandle {
        ShaderHandle::NULL
    }

    /// 绘制三角形（尚未实现）
    pub fn draw_triangles(&mut self, _dst: ImageHandle, _shader: ShaderHandle, index_offset: u32, index_count: u32) {
        trace!(index_offset, index_count, "draw_triangles is not implemented");
    }

    pub fn set_vsync_enabled(&mut self, _enabled: bool) {}

    pub fn set_fullscreen(&mut self, _fullscreen: bool) {}

    pub fn set_transparent(&mut self, _transparent: bool) {}

    pub fn max_image_size(&self) -> u32 {
        4096
    }

    pub fn framebuffer_y_direction(&self) -> YDirection {
        YDirection::Downward
    }

    pub fn has_high_precision_float(&self) -> bool {
        true
    }

    pub fn needs_clearing_screen(&self) -> bool {
        true
    }

    pub fn needs_restoring(&self) -> bool {
        false
    }

    pub fn is_gl(&self) -> bool {
        false
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame_state
    }

    /// 当前帧（或最近一帧）的后缓冲区索引
    pub fn frame_index(&self) -> Option<usize> {
        self.frame_index
    }

    /// 帧槽最后一次提交对应的栅栏值
    pub fn fence_value(&self, slot: usize) -> u64 {
        self.frames.slot(slot).fence_value().value()
    }

    pub fn has_swap_chain(&self) -> bool {
        self.swap_chain.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// 等待 GPU 空闲后按获取顺序的逆序释放所有对象
    ///
    /// 等待失败时仍会释放，并返回等待的错误。
    pub fn shutdown(mut self) -> Result<()> {
        if self.frame_state != FrameState::Idle {
            self.abort_frame();
        }

        let result = self.wait_for_idle();
        if let Err(e) = &result {
            warn!(error = %e, "GPU did not become idle before shutdown");
        }

        info!(backend = self.backend.name(), "Graphics shut down");
        result
    }

    /// 在每个槽上 Signal 一个新值并等待
    fn wait_for_idle(&mut self) -> Result<()> {
        for index in 0..self.frames.len() {
            let slot = self.frames.slot_mut(index);
            let value = slot.advance();
            self.queue.signal(slot.fence(), value.value())?;
            wait_for_fence::<B>(slot.fence(), &self.event, value, index, self.config.gpu_wait_timeout())?;
        }
        Ok(())
    }
}
