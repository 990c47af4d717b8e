//! DirectX 12 后端入口
//!
//! `Dx12` 是一个零大小的上下文对象，负责调试层、DXGI 工厂、设备和事件的创建。
//! 其余对象的操作在各自的 COM 接口上实现（见同目录的其他文件）。

use tracing::debug;
use windows::{
    core::Interface, Win32::Graphics::Direct3D::*, Win32::Graphics::Direct3D12::*,
    Win32::Graphics::Dxgi::*, Win32::System::Threading::CreateEventA,
};

use super::context::FenceEvent;
use crate::gfx::api::{Adapter, ApiError, ApiResult, Backend, Factory};
use crate::gfx::types::{AdapterDesc, FeatureLevel, Format, SurfaceHandle, SwapChainDesc};

/// DirectX 12 图形后端
#[derive(Debug, Default, Clone, Copy)]
pub struct Dx12;

impl From<windows::core::Error> for ApiError {
    fn from(err: windows::core::Error) -> Self {
        ApiError::new(err.code().0, err.message())
    }
}

pub(crate) fn d3d_feature_level(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
    }
}

pub(crate) fn dxgi_format(format: Format) -> windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT {
    use windows::Win32::Graphics::Dxgi::Common::*;
    match format {
        Format::R8G8B8A8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        Format::R16Uint => DXGI_FORMAT_R16_UINT,
    }
}

impl Backend for Dx12 {
    type DebugLayer = ID3D12Debug;
    type Factory = IDXGIFactory4;
    type Adapter = IDXGIAdapter1;
    type Device = ID3D12Device;
    type CommandQueue = ID3D12CommandQueue;
    type CommandAllocator = ID3D12CommandAllocator;
    type Fence = ID3D12Fence;
    type CommandList = ID3D12GraphicsCommandList;
    type DescriptorHeap = ID3D12DescriptorHeap;
    type Resource = ID3D12Resource;
    type SwapChain = IDXGISwapChain3;
    type Event = FenceEvent;

    fn name(&self) -> &'static str {
        "DirectX 12"
    }

    fn enable_debug_layer(&self) -> ApiResult<ID3D12Debug> {
        let mut debug: Option<ID3D12Debug> = None;
        unsafe { D3D12GetDebugInterface(&mut debug)? };
        let debug = debug.ok_or_else(|| ApiError::fail("D3D12GetDebugInterface returned no interface"))?;
        unsafe { debug.EnableDebugLayer() };
        debug!("DX12 Debug Layer enabled");
        Ok(debug)
    }

    fn create_factory(&self, debug: bool) -> ApiResult<IDXGIFactory4> {
        let flags = if debug { DXGI_CREATE_FACTORY_DEBUG } else { DXGI_CREATE_FACTORY_FLAGS(0) };
        Ok(unsafe { CreateDXGIFactory2(flags)? })
    }

    fn probe_device(&self, adapter: &IDXGIAdapter1, level: FeatureLevel) -> ApiResult<()> {
        // 只检查支持情况，不接收设备
        unsafe {
            D3D12CreateDevice(
                adapter,
                d3d_feature_level(level),
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )?
        };
        Ok(())
    }

    fn create_device(&self, adapter: &IDXGIAdapter1, level: FeatureLevel) -> ApiResult<ID3D12Device> {
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(adapter, d3d_feature_level(level), &mut device)? };
        device.ok_or_else(|| ApiError::fail("D3D12CreateDevice returned no device"))
    }

    fn create_event(&self) -> ApiResult<FenceEvent> {
        let handle = unsafe { CreateEventA(None, false, false, None)? };
        if handle.is_invalid() {
            return Err(windows::core::Error::from_thread().into());
        }
        Ok(FenceEvent::new(handle))
    }
}

impl Factory<Dx12> for IDXGIFactory4 {
    fn enum_adapter(&self, index: u32) -> ApiResult<Option<IDXGIAdapter1>> {
        match unsafe { self.EnumAdapters1(index) } {
            Ok(adapter) => Ok(Some(adapter)),
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn enum_warp_adapter(&self) -> ApiResult<IDXGIAdapter1> {
        Ok(unsafe { self.EnumWarpAdapter()? })
    }

    fn create_swap_chain(
        &self,
        queue: &ID3D12CommandQueue,
        surface: SurfaceHandle,
        desc: &SwapChainDesc,
    ) -> ApiResult<IDXGISwapChain3> {
        let hwnd = windows::Win32::Foundation::HWND(surface.raw() as *mut core::ffi::c_void);

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: desc.width,
            Height: desc.height,
            Format: dxgi_format(desc.format),
            SampleDesc: windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC {
                Count: desc.sample_count,
                Quality: desc.sample_quality,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: desc.buffer_count,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            ..Default::default()
        };

        let swap_chain: IDXGISwapChain1 =
            unsafe { self.CreateSwapChainForHwnd(queue, hwnd, &swap_chain_desc, None, None)? };
        Ok(swap_chain.cast()?)
    }
}

impl Adapter for IDXGIAdapter1 {
    fn desc(&self) -> ApiResult<AdapterDesc> {
        let desc = unsafe { self.GetDesc1()? };
        let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());

        Ok(AdapterDesc {
            description: String::from_utf16_lossy(&desc.Description[..len]),
            vendor_id: desc.VendorId,
            device_id: desc.DeviceId,
            dedicated_video_memory: desc.DedicatedVideoMemory,
            software: (DXGI_ADAPTER_FLAG(desc.Flags as i32) & DXGI_ADAPTER_FLAG_SOFTWARE)
                != DXGI_ADAPTER_FLAG_NONE,
        })
    }
}
