//! DirectX 12 描述符堆实现

use windows::Win32::Graphics::Direct3D12::*;

use crate::gfx::api::DescriptorHeap;
use crate::gfx::types::CpuDescriptorHandle;

impl DescriptorHeap for ID3D12DescriptorHeap {
    fn cpu_handle_for_heap_start(&self) -> CpuDescriptorHandle {
        let handle = unsafe { self.GetCPUDescriptorHandleForHeapStart() };
        CpuDescriptorHandle::new(handle.ptr)
    }
}

/// 转换为 D3D12 的 CPU 描述符句柄
pub(crate) fn d3d12_cpu_handle(handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}
