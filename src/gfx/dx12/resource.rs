//! DirectX 12 资源与交换链

use std::ops::Range;
use std::ptr::NonNull;

use windows::{
    Win32::Graphics::Direct3D12::*, Win32::Graphics::Dxgi::Common::*, Win32::Graphics::Dxgi::*,
};

use super::backend::Dx12;
use crate::gfx::api::{ApiError, ApiResult, Resource, SwapChain};

/// 在上传堆上创建缓冲区
pub(crate) fn create_upload_buffer(device: &ID3D12Device, size_in_bytes: u64) -> ApiResult<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: D3D12_HEAP_TYPE_UPLOAD,
        ..Default::default()
    };
    let resource_desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Width: size_in_bytes,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        ..Default::default()
    };

    let mut buffer: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &heap_props,
            D3D12_HEAP_FLAG_NONE,
            &resource_desc,
            D3D12_RESOURCE_STATE_GENERIC_READ,
            None,
            &mut buffer,
        )?
    };
    buffer.ok_or_else(|| ApiError::fail("CreateCommittedResource returned no resource"))
}

fn d3d12_range(range: &Range<usize>) -> D3D12_RANGE {
    D3D12_RANGE { Begin: range.start, End: range.end }
}

impl Resource for ID3D12Resource {
    fn map(&self, read_range: Range<usize>) -> ApiResult<NonNull<u8>> {
        let read_range = d3d12_range(&read_range);
        let mut data = std::ptr::null_mut();
        unsafe { self.Map(0, Some(&read_range), Some(&mut data))? };
        NonNull::new(data as *mut u8).ok_or_else(|| ApiError::fail("Map returned a null pointer"))
    }

    fn unmap(&self, written_range: Option<Range<usize>>) -> ApiResult<()> {
        let written_range = written_range.as_ref().map(d3d12_range);
        unsafe { self.Unmap(0, written_range.as_ref().map(|r| r as *const D3D12_RANGE)) };
        Ok(())
    }

    fn gpu_virtual_address(&self) -> u64 {
        unsafe { self.GetGPUVirtualAddress() }
    }
}

impl SwapChain<Dx12> for IDXGISwapChain3 {
    fn current_back_buffer_index(&self) -> u32 {
        unsafe { self.GetCurrentBackBufferIndex() }
    }

    fn get_buffer(&self, index: u32) -> ApiResult<ID3D12Resource> {
        Ok(unsafe { self.GetBuffer(index)? })
    }

    fn present(&self, sync_interval: u32) -> ApiResult<()> {
        unsafe { self.Present(sync_interval, DXGI_PRESENT(0)) }.ok()?;
        Ok(())
    }
}
