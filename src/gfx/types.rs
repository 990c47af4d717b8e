//! 原生绑定层使用的纯数据类型
//!
//! 这些类型与 D3D12 / DXGI 的结构体一一对应，但不依赖 `windows` crate，
//! 因此模拟后端和测试在任意平台上都能使用。

use std::fmt;
use std::num::NonZeroIsize;

use raw_window_handle::RawWindowHandle;

/// 交换链缓冲区数量，同时也是帧资源槽的数量
pub const FRAME_COUNT: usize = 2;

/// Direct3D 特性级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLevel {
    Level11_0,
}

impl FeatureLevel {
    /// 设备创建所需的最低特性级别
    pub const MINIMUM: FeatureLevel = FeatureLevel::Level11_0;
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureLevel::Level11_0 => "feature level 11_0",
        };
        f.write_str(name)
    }
}

/// 适配器描述（DXGI_ADAPTER_DESC1 的子集）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDesc {
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: usize,
    /// 是否为软件适配器（如 Microsoft Basic Render Driver）
    pub software: bool,
}

/// 命令列表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListType {
    Direct,
}

/// 描述符堆类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorHeapType {
    RenderTargetView,
}

/// 资源状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    RenderTarget,
}

/// 像素 / 索引格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R8G8B8A8Unorm,
    R16Uint,
}

/// CPU 描述符句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: usize,
}

impl CpuDescriptorHandle {
    /// 创建新的 CPU 描述符句柄
    pub fn new(ptr: usize) -> Self {
        Self { ptr }
    }

    /// 偏移句柄
    pub fn offset(&self, count: usize, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + count * increment_size as usize,
        }
    }
}

/// 资源状态转换屏障（所有子资源）
#[derive(Debug, Clone, Copy)]
pub struct TransitionBarrier<'a, R> {
    pub resource: &'a R,
    pub before: ResourceState,
    pub after: ResourceState,
}

impl<'a, R> TransitionBarrier<'a, R> {
    pub fn new(resource: &'a R, before: ResourceState, after: ResourceState) -> Self {
        Self { resource, before, after }
    }
}

/// 交换链描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub buffer_count: u32,
    pub sample_count: u32,
    pub sample_quality: u32,
}

impl SwapChainDesc {
    /// 翻转丢弃模式、无多重采样的交换链
    pub fn flip_discard(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: Format::R8G8B8A8Unorm,
            buffer_count: FRAME_COUNT as u32,
            sample_count: 1,
            sample_quality: 0,
        }
    }
}

/// 顶点缓冲区视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

/// 索引缓冲区视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub format: Format,
}

impl Default for IndexBufferView {
    fn default() -> Self {
        Self {
            buffer_location: 0,
            size_in_bytes: 0,
            format: Format::R16Uint,
        }
    }
}

/// 等待事件的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    TimedOut,
}

/// 不透明的原生窗口句柄（Win32 下为 HWND）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(NonZeroIsize);

impl SurfaceHandle {
    pub fn new(raw: NonZeroIsize) -> Self {
        Self(raw)
    }

    /// 从原始整数构造，0 返回 `None`
    pub fn from_raw(raw: isize) -> Option<Self> {
        NonZeroIsize::new(raw).map(Self)
    }

    pub fn raw(&self) -> isize {
        self.0.get()
    }
}

impl TryFrom<RawWindowHandle> for SurfaceHandle {
    type Error = UnsupportedWindowHandle;

    fn try_from(handle: RawWindowHandle) -> std::result::Result<Self, Self::Error> {
        match handle {
            RawWindowHandle::Win32(win32) => Ok(Self(win32.hwnd)),
            other => Err(UnsupportedWindowHandle(format!("{other:?}"))),
        }
    }
}

/// 非 Win32 窗口句柄
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a Win32 window handle, got {0}")]
pub struct UnsupportedWindowHandle(pub String);

/// 帧缓冲区 Y 轴方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YDirection {
    Upward,
    Downward,
}
