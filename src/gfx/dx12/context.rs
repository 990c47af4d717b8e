//! 设备、命令队列、命令分配器、栅栏和等待事件
//!
//! 这些对象构成了 CPU-GPU 同步的基础。

use std::time::Duration;

use windows::{
    Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT},
    Win32::Graphics::Direct3D12::*,
    Win32::System::Threading::WaitForSingleObject,
};

use super::backend::Dx12;
use crate::gfx::api::{
    ApiError, ApiResult, CommandAllocator, CommandQueue, Device, Fence, WaitEvent,
};
use crate::gfx::types::{CommandListType, CpuDescriptorHandle, DescriptorHeapType, WaitStatus};

fn command_list_type(ty: CommandListType) -> D3D12_COMMAND_LIST_TYPE {
    match ty {
        CommandListType::Direct => D3D12_COMMAND_LIST_TYPE_DIRECT,
    }
}

pub(crate) fn descriptor_heap_type(ty: DescriptorHeapType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match ty {
        DescriptorHeapType::RenderTargetView => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
    }
}

/// 栅栏等待事件
///
/// 拥有一个 Win32 事件句柄，析构时关闭。
#[derive(Debug)]
pub struct FenceEvent(HANDLE);

impl FenceEvent {
    pub(crate) fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub(crate) fn handle(&self) -> HANDLE {
        self.0
    }
}

impl Drop for FenceEvent {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

impl WaitEvent for FenceEvent {
    fn wait(&self, timeout: Duration) -> ApiResult<WaitStatus> {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX - 1);
        let result = unsafe { WaitForSingleObject(self.0, millis) };

        if result == WAIT_OBJECT_0 {
            Ok(WaitStatus::Signaled)
        } else if result == WAIT_TIMEOUT {
            Ok(WaitStatus::TimedOut)
        } else {
            let err = windows::core::Error::from_thread();
            Err(ApiError::new(err.code().0, format!("WaitForSingleObject: {}", err.message())))
        }
    }
}

impl Device<Dx12> for ID3D12Device {
    fn create_command_queue(&self, ty: CommandListType) -> ApiResult<ID3D12CommandQueue> {
        let queue_desc = D3D12_COMMAND_QUEUE_DESC {
            Type: command_list_type(ty),
            Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
            ..Default::default()
        };
        Ok(unsafe { self.CreateCommandQueue(&queue_desc)? })
    }

    fn create_command_allocator(&self, ty: CommandListType) -> ApiResult<ID3D12CommandAllocator> {
        Ok(unsafe { self.CreateCommandAllocator(command_list_type(ty))? })
    }

    fn create_fence(&self, initial_value: u64) -> ApiResult<ID3D12Fence> {
        Ok(unsafe { self.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE)? })
    }

    fn create_command_list(
        &self,
        ty: CommandListType,
        allocator: &ID3D12CommandAllocator,
    ) -> ApiResult<ID3D12GraphicsCommandList> {
        Ok(unsafe {
            self.CreateCommandList(0, command_list_type(ty), allocator, None::<&ID3D12PipelineState>)?
        })
    }

    fn create_descriptor_heap(&self, ty: DescriptorHeapType, count: u32) -> ApiResult<ID3D12DescriptorHeap> {
        let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
            NumDescriptors: count,
            Type: descriptor_heap_type(ty),
            Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
            ..Default::default()
        };
        Ok(unsafe { self.CreateDescriptorHeap(&heap_desc)? })
    }

    fn descriptor_handle_increment_size(&self, ty: DescriptorHeapType) -> u32 {
        unsafe { self.GetDescriptorHandleIncrementSize(descriptor_heap_type(ty)) }
    }

    fn create_render_target_view(&self, resource: &ID3D12Resource, handle: CpuDescriptorHandle) {
        unsafe {
            self.CreateRenderTargetView(resource, None, D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr });
        }
    }

    fn create_upload_buffer(&self, size_in_bytes: u64) -> ApiResult<ID3D12Resource> {
        super::resource::create_upload_buffer(self, size_in_bytes)
    }
}

impl CommandQueue<Dx12> for ID3D12CommandQueue {
    fn execute_command_lists(&self, lists: &[&ID3D12GraphicsCommandList]) {
        let lists: Vec<Option<ID3D12CommandList>> =
            lists.iter().map(|list| Some((*list).clone().into())).collect();
        unsafe { self.ExecuteCommandLists(&lists) };
    }

    fn signal(&self, fence: &ID3D12Fence, value: u64) -> ApiResult<()> {
        Ok(unsafe { self.Signal(fence, value)? })
    }
}

impl CommandAllocator for ID3D12CommandAllocator {
    fn reset(&self) -> ApiResult<()> {
        Ok(unsafe { self.Reset()? })
    }
}

impl Fence<Dx12> for ID3D12Fence {
    fn completed_value(&self) -> u64 {
        unsafe { self.GetCompletedValue() }
    }

    fn set_event_on_completion(&self, value: u64, event: &FenceEvent) -> ApiResult<()> {
        Ok(unsafe { self.SetEventOnCompletion(value, event.handle())? })
    }
}
