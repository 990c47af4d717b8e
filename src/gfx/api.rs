//! 原生图形 API 的统一抽象接口
//!
//! D3D12 / DXGI 的每一种对象（设备、队列、栅栏、命令列表……）在这里对应一个
//! trait，`Backend` 用关联类型把它们组合到一起。帧核心只依赖这些 trait，
//! 因此同一套逻辑既能驱动真实的 `Dx12` 后端，也能驱动测试用的 `MockGpu`。
//!
//! 原生对象的释放由 `Drop` 完成（COM 的 `Release`、事件句柄的 `CloseHandle`）。

use std::ops::Range;
use std::ptr::NonNull;
use std::time::Duration;

use super::types::{
    AdapterDesc, CommandListType, CpuDescriptorHandle, DescriptorHeapType, FeatureLevel,
    SurfaceHandle, SwapChainDesc, TransitionBarrier, WaitStatus,
};

/// 原生调用的结果
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// 原生调用失败（HRESULT + 描述）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HRESULT 0x{:08X}: {message}", *.code as u32)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

impl ApiError {
    /// 通用失败码 E_FAIL
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    /// WAIT_FAILED 等 Win32 错误映射后的码
    pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(Self::E_FAIL, message)
    }
}

/// 图形后端
///
/// 后端实例本身是一个显式的上下文对象（不是全局单例），
/// 因此同一进程里可以同时存在多个互不干扰的后端。
pub trait Backend {
    type DebugLayer;
    type Factory: Factory<Self>;
    type Adapter: Adapter;
    type Device: Device<Self>;
    type CommandQueue: CommandQueue<Self>;
    type CommandAllocator: CommandAllocator;
    type Fence: Fence<Self>;
    type CommandList: GraphicsCommandList<Self>;
    type DescriptorHeap: DescriptorHeap;
    type Resource: Resource;
    type SwapChain: SwapChain<Self>;
    type Event: WaitEvent;

    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    /// 启用调试（验证）层，必须在创建设备之前调用
    fn enable_debug_layer(&self) -> ApiResult<Self::DebugLayer>;

    /// 创建 DXGI 工厂
    fn create_factory(&self, debug: bool) -> ApiResult<Self::Factory>;

    /// 能力探测：在不创建设备的情况下检查适配器是否支持给定特性级别
    fn probe_device(&self, adapter: &Self::Adapter, level: FeatureLevel) -> ApiResult<()>;

    /// 在适配器上创建逻辑设备
    fn create_device(&self, adapter: &Self::Adapter, level: FeatureLevel) -> ApiResult<Self::Device>;

    /// 创建用于等待栅栏的事件对象
    fn create_event(&self) -> ApiResult<Self::Event>;
}

pub trait Factory<B: Backend + ?Sized> {
    /// 按索引枚举适配器；越界时返回 `Ok(None)`（DXGI_ERROR_NOT_FOUND）
    fn enum_adapter(&self, index: u32) -> ApiResult<Option<B::Adapter>>;

    /// 软件光栅化（WARP）适配器
    fn enum_warp_adapter(&self) -> ApiResult<B::Adapter>;

    fn create_swap_chain(
        &self,
        queue: &B::CommandQueue,
        surface: SurfaceHandle,
        desc: &SwapChainDesc,
    ) -> ApiResult<B::SwapChain>;
}

pub trait Adapter {
    fn desc(&self) -> ApiResult<AdapterDesc>;
}

pub trait Device<B: Backend + ?Sized> {
    fn create_command_queue(&self, ty: CommandListType) -> ApiResult<B::CommandQueue>;

    fn create_command_allocator(&self, ty: CommandListType) -> ApiResult<B::CommandAllocator>;

    fn create_fence(&self, initial_value: u64) -> ApiResult<B::Fence>;

    /// 创建的命令列表处于打开（记录中）状态
    fn create_command_list(
        &self,
        ty: CommandListType,
        allocator: &B::CommandAllocator,
    ) -> ApiResult<B::CommandList>;

    fn create_descriptor_heap(&self, ty: DescriptorHeapType, count: u32) -> ApiResult<B::DescriptorHeap>;

    fn descriptor_handle_increment_size(&self, ty: DescriptorHeapType) -> u32;

    fn create_render_target_view(&self, resource: &B::Resource, handle: CpuDescriptorHandle);

    /// 在上传堆上创建缓冲区（初始状态 GENERIC_READ）
    fn create_upload_buffer(&self, size_in_bytes: u64) -> ApiResult<B::Resource>;
}

pub trait CommandQueue<B: Backend + ?Sized> {
    fn execute_command_lists(&self, lists: &[&B::CommandList]);

    fn signal(&self, fence: &B::Fence, value: u64) -> ApiResult<()>;
}

pub trait CommandAllocator {
    fn reset(&self) -> ApiResult<()>;
}

pub trait Fence<B: Backend + ?Sized> {
    fn completed_value(&self) -> u64;

    /// 栅栏达到 `value` 时触发 `event`
    fn set_event_on_completion(&self, value: u64, event: &B::Event) -> ApiResult<()>;
}

pub trait WaitEvent {
    /// 阻塞当前线程直到事件触发或超时
    fn wait(&self, timeout: Duration) -> ApiResult<WaitStatus>;
}

pub trait GraphicsCommandList<B: Backend + ?Sized> {
    /// 基于分配器重置，不设置初始管线状态
    fn reset(&self, allocator: &B::CommandAllocator) -> ApiResult<()>;

    fn close(&self) -> ApiResult<()>;

    fn resource_barrier(&self, barrier: &TransitionBarrier<'_, B::Resource>);

    fn clear_render_target_view(&self, handle: CpuDescriptorHandle, color: [f32; 4]);

    fn om_set_render_targets(&self, handles: &[CpuDescriptorHandle]);
}

pub trait DescriptorHeap {
    fn cpu_handle_for_heap_start(&self) -> CpuDescriptorHandle;
}

pub trait Resource {
    /// 映射子资源 0，返回 CPU 可写指针；`read_range` 为空区间表示 CPU 不读取
    fn map(&self, read_range: Range<usize>) -> ApiResult<NonNull<u8>>;

    /// 解除映射；`written_range` 为 `None` 表示整个缓冲区都可能被写入
    fn unmap(&self, written_range: Option<Range<usize>>) -> ApiResult<()>;

    fn gpu_virtual_address(&self) -> u64;
}

pub trait SwapChain<B: Backend + ?Sized> {
    fn current_back_buffer_index(&self) -> u32;

    fn get_buffer(&self, index: u32) -> ApiResult<B::Resource>;

    fn present(&self, sync_interval: u32) -> ApiResult<()>;
}
