//! DirectX 12 图形命令列表

use std::mem::ManuallyDrop;

use windows::Win32::Graphics::Direct3D12::*;

use super::backend::Dx12;
use super::descriptor::d3d12_cpu_handle;
use crate::gfx::api::{ApiResult, GraphicsCommandList};
use crate::gfx::types::{CpuDescriptorHandle, ResourceState, TransitionBarrier};

fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
    }
}

/// 构造作用于所有子资源的状态转换屏障
///
/// 屏障只借用资源指针，不增加引用计数。
fn transition_barrier(
    resource: &ID3D12Resource,
    state_before: D3D12_RESOURCE_STATES,
    state_after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                StateBefore: state_before,
                StateAfter: state_after,
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
            }),
        },
    }
}

impl GraphicsCommandList<Dx12> for ID3D12GraphicsCommandList {
    fn reset(&self, allocator: &ID3D12CommandAllocator) -> ApiResult<()> {
        Ok(unsafe { self.Reset(allocator, None::<&ID3D12PipelineState>)? })
    }

    fn close(&self) -> ApiResult<()> {
        Ok(unsafe { self.Close()? })
    }

    fn resource_barrier(&self, barrier: &TransitionBarrier<'_, ID3D12Resource>) {
        let barrier = transition_barrier(
            barrier.resource,
            resource_state(barrier.before),
            resource_state(barrier.after),
        );
        unsafe { self.ResourceBarrier(&[barrier]) };
    }

    fn clear_render_target_view(&self, handle: CpuDescriptorHandle, color: [f32; 4]) {
        unsafe { self.ClearRenderTargetView(d3d12_cpu_handle(handle), &color, None) };
    }

    fn om_set_render_targets(&self, handles: &[CpuDescriptorHandle]) {
        let handles: Vec<D3D12_CPU_DESCRIPTOR_HANDLE> =
            handles.iter().copied().map(d3d12_cpu_handle).collect();
        unsafe {
            self.OMSetRenderTargets(handles.len() as u32, Some(handles.as_ptr()), false, None)
        };
    }
}
